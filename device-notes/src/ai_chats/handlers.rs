//! Chat transcripts hang off a note. Ownership is never read from the chat's
//! own `device_id` column: every statement joins the parent note and requires
//! it to be visible to the caller.

use rusqlite::{params, Row};
use uuid::Uuid;

use crate::{
    ai::ChatMessage,
    ctx::BaseParams,
    db,
    notes::handlers::find_visible_note,
    Error, Result,
};

use super::AiChat;

const CHAT_COLUMNS: &str = "c.id, c.note_id, c.device_id, c.messages, c.created_at, c.updated_at";
const RETURNING_COLUMNS: &str = "id, note_id, device_id, messages, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for AiChat {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            note_id: row.get(1)?,
            device_id: row.get(2)?,
            messages: db::json_column(row, 3)?,
            created_at: db::timestamp_column(row, 4)?,
            updated_at: db::timestamp_column(row, 5)?,
        })
    }
}

fn encode_messages(messages: &[ChatMessage]) -> Result<String> {
    serde_json::to_string(messages).map_err(|e| Error::Unexpected(e.to_string()))
}

pub async fn list_chats(note_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<Vec<AiChat>> {
    db.call(move |conn| {
        let chats = conn
            .prepare(&format!(
                r#"SELECT {CHAT_COLUMNS} FROM ai_chats c
                JOIN notes n ON n.id = c.note_id
                WHERE c.note_id = ? AND n.device_id = ? AND n.is_deleted = 0
                ORDER BY c.created_at DESC, c.id DESC"#
            ))?
            .query_map(params![note_id, ctx.device_id], |row| AiChat::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chats)
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

pub async fn get_chat(chat_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<AiChat> {
    db.call(move |conn| {
        conn.query_row(
            &format!(
                r#"SELECT {CHAT_COLUMNS} FROM ai_chats c
                JOIN notes n ON n.id = c.note_id
                WHERE c.id = ? AND n.device_id = ? AND n.is_deleted = 0"#
            ),
            params![chat_id, ctx.device_id],
            |row| AiChat::try_from(row),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| db::Error::not_found_message(e, "Chat not found"))
    .map_err(Error::from)
}

pub async fn create_chat(note_id: Uuid, messages: Vec<ChatMessage>, BaseParams { db, ctx }: BaseParams) -> Result<AiChat> {
    let messages = encode_messages(&messages)?;
    let now = db::timestamp(&db::now());

    db.call(move |conn| {
        let tx = conn.transaction()?;

        let note = find_visible_note(&tx, note_id, &ctx.device_id)?
            .ok_or_else(|| Error::NotFound("Note not found".into()))?;

        let chat = tx.query_row(
            &format!(
                r#"INSERT INTO ai_chats (note_id, device_id, messages, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                RETURNING {RETURNING_COLUMNS}"#
            ),
            params![note.id, note.device_id, messages, now, now],
            |row| AiChat::try_from(row),
        )?;

        tx.commit()?;
        Ok(chat)
    })
    .await
    .map_err(Error::from)
}

pub async fn update_chat(chat_id: Uuid, messages: Vec<ChatMessage>, BaseParams { db, ctx }: BaseParams) -> Result<AiChat> {
    let messages = encode_messages(&messages)?;
    let now = db::timestamp(&db::now());

    db.call(move |conn| {
        conn.query_row(
            &format!(
                r#"UPDATE ai_chats SET messages = ?, updated_at = ?
                WHERE id = ? AND note_id IN (SELECT id FROM notes WHERE device_id = ? AND is_deleted = 0)
                RETURNING {RETURNING_COLUMNS}"#
            ),
            params![messages, now, chat_id, ctx.device_id],
            |row| AiChat::try_from(row),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| db::Error::not_found_message(e, "Chat not found"))
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ctx::{Ctx, DeviceId},
        db::init_test_db,
        notes::{self, CreateNote, Note},
        Result,
    };

    fn base(db: &db::DB, device: &str) -> BaseParams {
        BaseParams::new(db.clone(), Ctx::new(DeviceId::parse(device).unwrap()))
    }

    async fn note(db: &db::DB, device: &str) -> Result<Note> {
        notes::handlers::create_note(
            CreateNote {
                title: "Trip".into(),
                content: "<p>pack</p>".into(),
                is_pinned: None,
                tags: None,
                color: None,
            },
            base(db, device),
        )
        .await
    }

    #[tokio::test]
    async fn create_inherits_note_device() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;

        let chat = create_chat(note.id, vec![ChatMessage::user("hi")], base(&db, "dev1")).await?;

        assert_eq!(chat.note_id, note.id);
        assert_eq!(chat.device_id, "dev1");
        assert_eq!(chat.messages, vec![ChatMessage::user("hi")]);
        Ok(())
    }

    #[tokio::test]
    async fn create_for_foreign_note_is_not_found() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;

        let error = create_chat(note.id, vec![], base(&db, "dev2")).await.unwrap_err();

        assert!(matches!(error, Error::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn update_replaces_messages() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;
        let chat = create_chat(note.id, vec![ChatMessage::user("one")], base(&db, "dev1")).await?;

        let replaced = vec![ChatMessage::user("two"), ChatMessage::assistant("three")];
        let updated = update_chat(chat.id, replaced.clone(), base(&db, "dev1")).await?;

        assert_eq!(updated.messages, replaced);
        assert_eq!(get_chat(chat.id, base(&db, "dev1")).await?.messages, replaced);
        assert!(updated.updated_at >= chat.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn ownership_goes_through_parent_note() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;
        let chat = create_chat(note.id, vec![], base(&db, "dev1")).await?;

        assert!(matches!(get_chat(chat.id, base(&db, "dev2")).await, Err(Error::NotFound(_))));
        assert!(matches!(
            update_chat(chat.id, vec![ChatMessage::user("x")], base(&db, "dev2")).await,
            Err(Error::NotFound(_))
        ));
        assert!(list_chats(note.id, base(&db, "dev2")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn chats_disappear_with_their_note() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;
        let chat = create_chat(note.id, vec![], base(&db, "dev1")).await?;

        notes::handlers::delete_note(note.id, base(&db, "dev1")).await?;

        assert!(list_chats(note.id, base(&db, "dev1")).await?.is_empty());
        assert!(matches!(get_chat(chat.id, base(&db, "dev1")).await, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn hard_delete_cascades() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;
        create_chat(note.id, vec![], base(&db, "dev1")).await?;

        let remaining = db
            .call(move |conn| {
                conn.execute("DELETE FROM notes WHERE id = ?", params![note.id])?;
                conn.query_row("SELECT count(*) FROM ai_chats", [], |r| r.get::<_, u32>(0))
                    .map_err(|e| e.into())
            })
            .await?;

        assert_eq!(remaining, 0);
        Ok(())
    }

    #[tokio::test]
    async fn list_is_newest_first() -> Result<()> {
        let db = init_test_db().await?;
        let note = note(&db, "dev1").await?;
        let first = create_chat(note.id, vec![], base(&db, "dev1")).await?;
        let second = create_chat(note.id, vec![], base(&db, "dev1")).await?;

        let ids = list_chats(note.id, base(&db, "dev1"))
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect::<Vec<_>>();

        assert_eq!(ids, vec![second.id, first.id]);
        Ok(())
    }
}
