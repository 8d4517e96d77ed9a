//! Device-scoped note repository.
//!
//! Every query filters on `device_id` and `is_deleted = 0`, so a note that
//! belongs to another device and a note that does not exist are reported the
//! same way. Updates are last-writer-wins: no version check, whichever write
//! reaches the connection last is what remains.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::{
    ctx::{BaseParams, DeviceId},
    db, Error, Result,
};

use super::{CreateNote, Note, UpdateNote, DEFAULT_COLOR};

pub(crate) const NOTE_COLUMNS: &str =
    "id, title, content, is_pinned, tags, color, device_id, is_deleted, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for Note {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            is_pinned: row.get(3)?,
            tags: db::json_column(row, 4)?,
            color: row.get(5)?,
            device_id: row.get(6)?,
            is_deleted: row.get(7)?,
            created_at: db::timestamp_column(row, 8)?,
            updated_at: db::timestamp_column(row, 9)?,
        })
    }
}

/// Visible note lookup for use inside other `db.call` closures.
pub(crate) fn find_visible_note(conn: &Connection, note_id: Uuid, device_id: &DeviceId) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND device_id = ? AND is_deleted = 0"),
        params![note_id, device_id],
        |row| Note::try_from(row),
    )
    .optional()
}

/// `updated_at` must move forward on every write, even within one clock tick.
fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = db::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).map_err(|e| Error::Unexpected(e.to_string()))
}

pub async fn list_notes(BaseParams { db, ctx }: BaseParams) -> Result<Vec<Note>> {
    db.call(move |conn| {
        let notes = conn
            .prepare(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes WHERE device_id = ? AND is_deleted = 0 ORDER BY updated_at DESC, id DESC"
            ))?
            .query_map(params![ctx.device_id], |row| Note::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

pub async fn get_note(note_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<Note> {
    db.call(move |conn| {
        find_visible_note(conn, note_id, &ctx.device_id)?
            .ok_or_else(|| Error::NotFound("Note not found".into()).into())
    })
    .await
    .map_err(Error::from)
}

pub async fn create_note(args: CreateNote, BaseParams { db, ctx }: BaseParams) -> Result<Note> {
    args.validate()?;

    let CreateNote {
        title,
        content,
        is_pinned,
        tags,
        color,
    } = args;
    let tags = encode_tags(&tags.unwrap_or_default())?;
    let color = color.unwrap_or_else(|| DEFAULT_COLOR.into());
    let now = db::timestamp(&db::now());

    let note = db
        .call(move |conn| {
            conn.query_row(
                &format!(
                    r#"INSERT INTO notes (device_id, title, content, is_pinned, tags, color, is_deleted, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
                    RETURNING {NOTE_COLUMNS}"#
                ),
                params![ctx.device_id, title, content, is_pinned.unwrap_or(false), tags, color, now, now],
                |row| Note::try_from(row),
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(Error::from)?;

    tracing::debug!(device_id = %note.device_id, "created note {}", note.id);
    Ok(note)
}

pub async fn update_note(note_id: Uuid, args: UpdateNote, BaseParams { db, ctx }: BaseParams) -> Result<Note> {
    args.validate()?;

    let UpdateNote {
        title,
        content,
        is_pinned,
        tags,
        color,
    } = args;
    let tags = tags.as_deref().map(encode_tags).transpose()?;

    db.call(move |conn| {
        let tx = conn.transaction()?;

        let previous = tx.query_row(
            "SELECT updated_at FROM notes WHERE id = ? AND device_id = ? AND is_deleted = 0",
            params![note_id, ctx.device_id],
            |row| db::timestamp_column(row, 0),
        )?;
        let updated_at = db::timestamp(&next_updated_at(previous));

        let note = tx.query_row(
            &format!(
                r#"UPDATE notes SET
                    title = coalesce(?, title),
                    content = coalesce(?, content),
                    is_pinned = coalesce(?, is_pinned),
                    tags = coalesce(?, tags),
                    color = coalesce(?, color),
                    updated_at = ?
                WHERE id = ? AND device_id = ? AND is_deleted = 0
                RETURNING {NOTE_COLUMNS}"#
            ),
            params![title, content, is_pinned, tags, color, updated_at, note_id, ctx.device_id],
            |row| Note::try_from(row),
        )?;

        tx.commit()?;
        Ok(note)
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| db::Error::not_found_message(e, "Note not found"))
    .map_err(Error::from)
}

/// Soft delete. Returns whether a visible note was flagged; attachment files stay on disk.
pub async fn delete_note(note_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<bool> {
    let updated_at = db::timestamp(&db::now());

    let affected = db
        .call(move |conn| {
            conn.execute(
                "UPDATE notes SET is_deleted = 1, updated_at = ? WHERE id = ? AND device_id = ? AND is_deleted = 0",
                params![updated_at, note_id, ctx.device_id],
            )
            .map_err(|e| e.into())
        })
        .await
        .map_err(db::Error::from)
        .map_err(Error::from)?;

    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ctx::{BaseParams, Ctx},
        db::init_test_db,
        Result,
    };

    fn base(db: &db::DB, device: &str) -> BaseParams {
        BaseParams::new(db.clone(), Ctx::new(DeviceId::parse(device).unwrap()))
    }

    fn new_note(title: &str) -> CreateNote {
        CreateNote {
            title: title.into(),
            content: format!("<p>{title}</p>"),
            is_pinned: None,
            tags: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_defaults() -> Result<()> {
        let db = init_test_db().await?;

        let note = create_note(new_note("Shopping"), base(&db, "dev1")).await?;

        assert_eq!(note.title, "Shopping");
        assert_eq!(note.device_id, "dev1");
        assert!(!note.is_deleted);
        assert!(!note.is_pinned);
        assert!(note.tags.is_empty());
        assert_eq!(note.color, DEFAULT_COLOR);
        assert_eq!(note.created_at, note.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn list_is_device_scoped_and_newest_first() -> Result<()> {
        let db = init_test_db().await?;

        let first = create_note(new_note("first"), base(&db, "dev1")).await?;
        let second = create_note(new_note("second"), base(&db, "dev1")).await?;
        create_note(new_note("other"), base(&db, "dev2")).await?;

        update_note(
            first.id,
            UpdateNote {
                content: Some("<p>edited</p>".into()),
                ..Default::default()
            },
            base(&db, "dev1"),
        )
        .await?;

        let notes = list_notes(base(&db, "dev1")).await?;
        let titles = notes.iter().map(|n| n.title.as_str()).collect::<Vec<_>>();

        assert_eq!(titles, vec!["first", "second"]);
        assert!(notes.iter().all(|n| n.device_id == "dev1"));
        assert_ne!(notes[0].id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn get_hides_other_devices() -> Result<()> {
        let db = init_test_db().await?;
        let note = create_note(new_note("secret"), base(&db, "dev1")).await?;

        let error = get_note(note.id, base(&db, "dev2")).await.unwrap_err();

        assert!(matches!(error, Error::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn update_is_partial_and_bumps_updated_at() -> Result<()> {
        let db = init_test_db().await?;
        let note = create_note(
            CreateNote {
                tags: Some(vec!["home".into()]),
                color: Some("yellow".into()),
                ..new_note("Shopping")
            },
            base(&db, "dev1"),
        )
        .await?;

        let updated = update_note(
            note.id,
            UpdateNote {
                is_pinned: Some(true),
                ..Default::default()
            },
            base(&db, "dev1"),
        )
        .await?;

        assert!(updated.is_pinned);
        assert_eq!(updated.title, note.title);
        assert_eq!(updated.content, note.content);
        assert_eq!(updated.tags, vec!["home".to_string()]);
        assert_eq!(updated.color, "yellow");
        assert_eq!(updated.created_at, note.created_at);
        assert!(updated.updated_at > note.updated_at);

        let again = update_note(note.id, UpdateNote::default(), base(&db, "dev1")).await?;
        assert!(again.updated_at > updated.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn update_from_other_device_is_not_found() -> Result<()> {
        let db = init_test_db().await?;
        let note = create_note(new_note("mine"), base(&db, "dev1")).await?;

        let error = update_note(
            note.id,
            UpdateNote {
                title: Some("hijacked".into()),
                ..Default::default()
            },
            base(&db, "dev2"),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, Error::NotFound(_)));
        assert_eq!(get_note(note.id, base(&db, "dev1")).await?.title, "mine");
        Ok(())
    }

    #[tokio::test]
    async fn soft_delete_keeps_row() -> Result<()> {
        let db = init_test_db().await?;
        let note = create_note(new_note("bye"), base(&db, "dev1")).await?;

        assert!(!delete_note(note.id, base(&db, "dev2")).await?);
        assert!(delete_note(note.id, base(&db, "dev1")).await?);
        assert!(!delete_note(note.id, base(&db, "dev1")).await?);

        assert!(matches!(get_note(note.id, base(&db, "dev1")).await, Err(Error::NotFound(_))));
        assert!(list_notes(base(&db, "dev1")).await?.is_empty());
        assert!(matches!(
            update_note(note.id, UpdateNote::default(), base(&db, "dev1")).await,
            Err(Error::NotFound(_))
        ));

        let stored = db
            .call(move |conn| {
                conn.query_row("SELECT is_deleted FROM notes WHERE id = ?", params![note.id], |row| {
                    row.get::<_, bool>(0)
                })
                .map_err(|e| e.into())
            })
            .await?;
        assert!(stored);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_overlapping_updates_are_last_writer_wins() -> Result<()> {
        let db = init_test_db().await?;
        let note = create_note(new_note("original"), base(&db, "dev1")).await?;

        let title = |t: &str| UpdateNote {
            title: Some(t.into()),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            update_note(note.id, title("from tab A"), base(&db, "dev1")),
            update_note(note.id, title("from tab B"), base(&db, "dev1")),
        );
        let (a, b) = (a?, b?);

        let last = if a.updated_at > b.updated_at { &a } else { &b };
        let stored = get_note(note.id, base(&db, "dev1")).await?;

        assert_ne!(a.updated_at, b.updated_at);
        assert_eq!(stored.title, last.title);
        assert_eq!(stored.updated_at, last.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_disjoint_updates_both_apply() -> Result<()> {
        let db = init_test_db().await?;
        let note = create_note(new_note("original"), base(&db, "dev1")).await?;

        let (a, b) = tokio::join!(
            update_note(
                note.id,
                UpdateNote {
                    title: Some("renamed".into()),
                    ..Default::default()
                },
                base(&db, "dev1")
            ),
            update_note(
                note.id,
                UpdateNote {
                    is_pinned: Some(true),
                    ..Default::default()
                },
                base(&db, "dev1")
            ),
        );
        a?;
        b?;

        let stored = get_note(note.id, base(&db, "dev1")).await?;
        assert_eq!(stored.title, "renamed");
        assert!(stored.is_pinned);
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_blank_tags() -> Result<()> {
        let db = init_test_db().await?;

        let error = create_note(
            CreateNote {
                tags: Some(vec!["".into()]),
                ..new_note("x")
            },
            base(&db, "dev1"),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, Error::Validation(_)));
        Ok(())
    }
}
