use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::{
    ctx::{BaseParams, FileParams},
    db,
    notes::handlers::find_visible_note,
    uploads::sanitize_file_name,
    Error, Result,
};

use super::{Attachment, CreateAttachment};

const ATTACHMENT_COLUMNS: &str = "a.id, a.note_id, a.device_id, a.file_path, a.file_type, a.file_name, a.created_at";
const RETURNING_COLUMNS: &str = "id, note_id, device_id, file_path, file_type, file_name, created_at";

impl<'a> TryFrom<&Row<'a>> for Attachment {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            note_id: row.get(1)?,
            device_id: row.get(2)?,
            file_path: row.get(3)?,
            file_type: row.get(4)?,
            file_name: row.get(5)?,
            created_at: db::timestamp_column(row, 6)?,
        })
    }
}

pub async fn list_attachments(note_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<Vec<Attachment>> {
    db.call(move |conn| {
        let attachments = conn
            .prepare(&format!(
                r#"SELECT {ATTACHMENT_COLUMNS} FROM attachments a
                JOIN notes n ON n.id = a.note_id
                WHERE a.note_id = ? AND n.device_id = ? AND n.is_deleted = 0
                ORDER BY a.created_at DESC, a.id DESC"#
            ))?
            .query_map(params![note_id, ctx.device_id], |row| Attachment::try_from(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(attachments)
    })
    .await
    .map_err(db::Error::from)
    .map_err(Error::from)
}

pub async fn create_attachment(
    note_id: Uuid,
    args: CreateAttachment,
    FileParams { base: BaseParams { db, ctx }, uploads }: FileParams,
) -> Result<Attachment> {
    let stored = uploads.resolve(&args.file_path)?;
    let file_type = args.file_type.trim().to_string();
    if file_type.is_empty() {
        return Err(Error::validation("file_type is required"));
    }

    let file_path = stored.path.to_string_lossy().into_owned();
    let file_name = sanitize_file_name(&args.file_name);
    let now = db::timestamp(&db::now());

    db.call(move |conn| {
        let tx = conn.transaction()?;

        let note = find_visible_note(&tx, note_id, &ctx.device_id)?
            .ok_or_else(|| Error::NotFound("Note not found".into()))?;

        let attachment = tx.query_row(
            &format!(
                r#"INSERT INTO attachments (note_id, device_id, file_path, file_type, file_name, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING {RETURNING_COLUMNS}"#
            ),
            params![note.id, note.device_id, file_path, file_type, file_name, now],
            |row| Attachment::try_from(row),
        )?;

        tx.commit()?;
        Ok(attachment)
    })
    .await
    .map_err(Error::from)
}

/// Removes the row, then the backing file once no other attachment points at
/// it. The row is authoritative: a file that cannot be unlinked is logged and
/// left behind.
pub async fn delete_attachment(
    attachment_id: Uuid,
    FileParams { base: BaseParams { db, ctx }, uploads }: FileParams,
) -> Result<()> {
    let (file_path, remaining) = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let Some(file_path) = tx
                .query_row(
                    r#"DELETE FROM attachments
                    WHERE id = ? AND note_id IN (SELECT id FROM notes WHERE device_id = ?)
                    RETURNING file_path"#,
                    params![attachment_id, ctx.device_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            else {
                return Ok(None);
            };

            let remaining = tx.query_row(
                "SELECT count(*) FROM attachments WHERE file_path = ?",
                params![file_path],
                |row| row.get::<_, i64>(0),
            )?;

            tx.commit()?;
            Ok(Some((file_path, remaining)))
        })
        .await
        .map_err(db::Error::from)
        .map_err(Error::from)?
        .ok_or_else(|| Error::NotFound("Attachment not found".into()))?;

    if remaining > 0 {
        tracing::debug!("attachment {attachment_id}: {file_path} still used by {remaining} attachment(s)");
        return Ok(());
    }

    match uploads.remove(&file_path).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("attachment {attachment_id}: file {file_path} was already missing"),
        Err(e) => tracing::warn!("attachment {attachment_id}: could not remove {file_path}: {e:?}"),
    }

    Ok(())
}
