use lazy_static::lazy_static;
use rusqlite_migration::{Migrations, M};

lazy_static! {
    pub static ref MIGRATIONS: Migrations<'static> = Migrations::new(vec![
        M::up(
            r#"
            CREATE TABLE notes (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                device_id TEXT NOT NULL,

                title TEXT NOT NULL,
                content TEXT NOT NULL,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                color TEXT NOT NULL DEFAULT 'default',
                is_deleted INTEGER NOT NULL DEFAULT 0,

                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX notes_device_idx ON notes (device_id, is_deleted, updated_at DESC);
        "#
        ),
        M::up(
            r#"
            CREATE TABLE ai_chats (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                note_id BLOB NOT NULL CHECK(length(note_id) = 16),
                device_id TEXT NOT NULL,

                messages TEXT NOT NULL DEFAULT '[]',

                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,

                FOREIGN KEY (note_id) REFERENCES notes (id) ON DELETE CASCADE
            );

            CREATE INDEX ai_chats_note_idx ON ai_chats (note_id, created_at DESC);
        "#
        ),
        M::up(
            r#"
            CREATE TABLE attachments (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                note_id BLOB NOT NULL CHECK(length(note_id) = 16),
                device_id TEXT NOT NULL,

                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_name TEXT NOT NULL,

                created_at TEXT NOT NULL,

                FOREIGN KEY (note_id) REFERENCES notes (id) ON DELETE CASCADE
            );

            CREATE INDEX attachments_note_idx ON attachments (note_id, created_at DESC);
        "#
        ),
    ]);
}
