//! SQLite message store.
//!
//! rusqlite is synchronous, so the connection sits behind a mutex and every
//! query runs on the blocking pool.

use super::{MessageStore, NewMessage, SeenOutcome, StoreError};
use async_trait::async_trait;
use chatloop_protocol::api::UnseenMap;
use chatloop_protocol::{now_millis, ChatMessage, MessageId, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const SCHEMA_VERSION: u32 = 2;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id   TEXT    NOT NULL,
    receiver_id TEXT    NOT NULL,
    text        TEXT,
    image       TEXT,
    seen        INTEGER NOT NULL DEFAULT 0 CHECK (seen IN (0, 1)),
    created_at  INTEGER NOT NULL,
    CHECK (text IS NOT NULL OR image IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_messages_unseen
    ON messages (receiver_id, seen, sender_id);

CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages (sender_id, receiver_id, created_at);

CREATE TRIGGER IF NOT EXISTS messages_seen_monotonic
    BEFORE UPDATE OF seen ON messages
    WHEN OLD.seen = 1 AND NEW.seen = 0
BEGIN
    SELECT RAISE(ABORT, 'seen flag cannot be cleared');
END;
";

// Inserts read the newest timestamp to keep creation times monotonic.
const SCHEMA_V2: &str = "
CREATE INDEX IF NOT EXISTS idx_messages_created_at
    ON messages (created_at);
";

const SELECT_COLUMNS: &str = "id, sender_id, receiver_id, text, image, seen, created_at";

/// Message store backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrate(&conn)?;

        info!(path = %path.display(), "SQLite message store opened");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("connection mutex poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await?
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current < 1 {
        info!("Applying message store schema v1");
        conn.execute_batch(SCHEMA_V1)?;
    }
    if current < 2 {
        info!("Applying message store schema v2");
        conn.execute_batch(SCHEMA_V2)?;
    }
    if current < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id: i64 = row.get(0)?;
    let created_at: i64 = row.get(6)?;

    Ok(ChatMessage {
        id: MessageId(id as u64),
        sender_id: UserId::new(row.get::<_, String>(1)?),
        receiver_id: UserId::new(row.get::<_, String>(2)?),
        text: row.get(3)?,
        image: row.get(4)?,
        seen: row.get(5)?,
        created_at: created_at as u64,
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let last: Option<i64> =
                tx.query_row("SELECT MAX(created_at) FROM messages", [], |row| row.get(0))?;
            let created_at = now_millis().max(last.unwrap_or(0) as u64);

            tx.execute(
                "INSERT INTO messages (sender_id, receiver_id, text, image, seen, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    message.sender_id.as_str(),
                    message.receiver_id.as_str(),
                    message.payload.text,
                    message.payload.image,
                    created_at as i64,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(ChatMessage {
                id: MessageId(id as u64),
                sender_id: message.sender_id,
                receiver_id: message.receiver_id,
                text: message.payload.text,
                image: message.payload.image,
                seen: false,
                created_at,
            })
        })
        .await
    }

    async fn get(&self, id: MessageId) -> Result<Option<ChatMessage>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM messages WHERE id = ?1");
            Ok(conn
                .query_row(&sql, params![id.get() as i64], row_to_message)
                .optional()?)
        })
        .await
    }

    async fn conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, StoreError> {
        let (a, b) = (a.clone(), b.clone());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![a.as_str(), b.as_str()], row_to_message)?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
    }

    async fn mark_seen(&self, id: MessageId) -> Result<SeenOutcome, StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET seen = 1 WHERE id = ?1 AND seen = 0",
                params![id.get() as i64],
            )?;
            if changed > 0 {
                return Ok(SeenOutcome::Marked);
            }

            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM messages WHERE id = ?1",
                    params![id.get() as i64],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(if exists.is_some() {
                SeenOutcome::AlreadySeen
            } else {
                SeenOutcome::NotFound
            })
        })
        .await
    }

    async fn unseen_counts(&self, viewer: &UserId) -> Result<UnseenMap, StoreError> {
        let viewer = viewer.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sender_id, COUNT(*) FROM messages
                 WHERE receiver_id = ?1 AND seen = 0
                 GROUP BY sender_id",
            )?;
            let rows = stmt.query_map(params![viewer.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = UnseenMap::new();
            for row in rows {
                let (sender, count) = row?;
                counts.insert(UserId::new(sender), count as u32);
            }
            Ok(counts)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatloop_protocol::MessagePayload;

    fn draft(from: &str, to: &str, payload: MessagePayload) -> NewMessage {
        NewMessage {
            sender_id: UserId::new(from),
            receiver_id: UserId::new(to),
            payload,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let msg = store
            .insert(draft("a", "b", MessagePayload::image("https://cdn/x.png")))
            .await
            .unwrap();

        let fetched = store.get(msg.id).await.unwrap().unwrap();
        assert_eq!(fetched, msg);
        assert!(fetched.text.is_none());
        assert!(store.get(MessageId(12345)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("chat.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let msg = store
                .insert(draft("a", "b", MessagePayload::text("hello")))
                .await
                .unwrap();
            store.mark_seen(msg.id).await.unwrap();
            msg.id
        };

        let store = SqliteStore::open(&path).unwrap();
        let msg = store.get(id).await.unwrap().unwrap();
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert!(msg.seen);
    }

    #[tokio::test]
    async fn test_conversation_and_unseen_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(draft("a", "v", MessagePayload::text("1"))).await.unwrap();
        store.insert(draft("v", "a", MessagePayload::text("2"))).await.unwrap();
        let third = store.insert(draft("a", "v", MessagePayload::text("3"))).await.unwrap();
        store.insert(draft("b", "v", MessagePayload::text("4"))).await.unwrap();

        let conversation = store
            .conversation(&UserId::new("v"), &UserId::new("a"))
            .await
            .unwrap();
        let texts: Vec<_> = conversation.iter().filter_map(|m| m.text.clone()).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);

        store.mark_seen(third.id).await.unwrap();
        let counts = store.unseen_counts(&UserId::new("v")).await.unwrap();
        assert_eq!(counts.get(&UserId::new("a")), Some(&1));
        assert_eq!(counts.get(&UserId::new("b")), Some(&1));
    }

    #[test]
    fn test_v1_database_gains_timestamp_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_V1).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        migrate(&conn).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let mut stmt = conn
            .prepare("EXPLAIN QUERY PLAN SELECT MAX(created_at) FROM messages")
            .unwrap();
        let plan: Vec<String> = stmt
            .query_map([], |row| row.get(3))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(
            plan.iter().any(|step| step.contains("idx_messages_created_at")),
            "plan: {plan:?}"
        );
    }

    #[tokio::test]
    async fn test_mark_seen_outcomes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let msg = store.insert(draft("a", "b", MessagePayload::text("x"))).await.unwrap();

        assert_eq!(store.mark_seen(msg.id).await.unwrap(), SeenOutcome::Marked);
        assert_eq!(store.mark_seen(msg.id).await.unwrap(), SeenOutcome::AlreadySeen);
        assert_eq!(store.mark_seen(MessageId(77)).await.unwrap(), SeenOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_schema_rejects_clearing_seen() {
        let store = SqliteStore::open_in_memory().unwrap();
        let msg = store.insert(draft("a", "b", MessagePayload::text("x"))).await.unwrap();
        store.mark_seen(msg.id).await.unwrap();

        let id = msg.id.get() as i64;
        let result = store
            .with_conn(move |conn| {
                Ok(conn.execute("UPDATE messages SET seen = 0 WHERE id = ?1", params![id])?)
            })
            .await;
        assert!(result.is_err());
        assert!(store.get(msg.id).await.unwrap().unwrap().seen);
    }

    #[tokio::test]
    async fn test_schema_rejects_empty_message() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.insert(draft("a", "b", MessagePayload::default())).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert!(store
            .conversation(&UserId::new("a"), &UserId::new("b"))
            .await
            .unwrap()
            .is_empty());
    }
}
