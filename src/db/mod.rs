//! Relational persistence for chats, messages, usage logs, feedback and the
//! knowledge base.
//!
//! Row helpers take a `&mut SqliteConnection` so callers decide the
//! transaction scope: pass `&mut *tx` inside a request transaction.

mod models;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::core::errors::DatabaseError;

pub use models::{
    Chat, Feedback, KnowledgeRow, Message, MessageLog, MessageType, NewKnowledgeRow,
    NewMessageLog,
};

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    pub async fn with_path(db_path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let url = format!("sqlite://{}?mode=rwc", db_path.as_ref().to_string_lossy());
        Self::connect(&url, 5).await
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                message_type TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(chat_id) REFERENCES chats(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS message_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL,
                model TEXT NOT NULL,
                prompt_tokens INTEGER NOT NULL,
                completion_tokens INTEGER NOT NULL,
                total_tokens INTEGER NOT NULL,
                total_cost REAL NOT NULL,
                response_time REAL NOT NULL,
                has_error BOOLEAN NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(message_id) REFERENCES messages(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS datastore (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keywords TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                is_embedded BOOLEAN NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Starts a write transaction. Dropping it uncommitted rolls back.
    ///
    /// Keep it short: no hosted-API call may run while one is open.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, DatabaseError> {
        Ok(self.pool.begin().await?)
    }

    /// A pooled connection for reads outside any transaction.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, DatabaseError> {
        Ok(self.pool.acquire().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub async fn insert_chat(conn: &mut SqliteConnection, user: &str) -> Result<Chat, DatabaseError> {
    let created_at = now();
    let result = sqlx::query("INSERT INTO chats (user, created_at) VALUES (?, ?)")
        .bind(user)
        .bind(&created_at)
        .execute(&mut *conn)
        .await?;

    Ok(Chat {
        id: result.last_insert_rowid(),
        user: user.to_string(),
        created_at,
    })
}

pub async fn find_chat(
    conn: &mut SqliteConnection,
    chat_id: i64,
) -> Result<Option<Chat>, DatabaseError> {
    let chat = sqlx::query_as::<_, Chat>("SELECT id, user, created_at FROM chats WHERE id = ?")
        .bind(chat_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(chat)
}

/// Messages of a chat in insertion order.
pub async fn list_messages(
    conn: &mut SqliteConnection,
    chat_id: i64,
) -> Result<Vec<Message>, DatabaseError> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT id, chat_id, message_type, content, created_at
         FROM messages WHERE chat_id = ? ORDER BY id ASC",
    )
    .bind(chat_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(messages)
}

pub async fn insert_message(
    conn: &mut SqliteConnection,
    chat_id: i64,
    message_type: MessageType,
    content: &str,
) -> Result<Message, DatabaseError> {
    let created_at = now();
    let result = sqlx::query(
        "INSERT INTO messages (chat_id, message_type, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(chat_id)
    .bind(message_type.as_str())
    .bind(content)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?;

    Ok(Message {
        id: result.last_insert_rowid(),
        chat_id,
        message_type: message_type.as_str().to_string(),
        content: content.to_string(),
        created_at,
    })
}

pub async fn insert_message_log(
    conn: &mut SqliteConnection,
    log: &NewMessageLog,
) -> Result<i64, DatabaseError> {
    let result = sqlx::query(
        "INSERT INTO message_logs (message_id, model, prompt_tokens, completion_tokens,
            total_tokens, total_cost, response_time, has_error, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(log.message_id)
    .bind(&log.model)
    .bind(log.prompt_tokens)
    .bind(log.completion_tokens)
    .bind(log.total_tokens)
    .bind(log.total_cost)
    .bind(log.response_time)
    .bind(log.has_error)
    .bind(now())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn message_logs_for(
    conn: &mut SqliteConnection,
    message_id: i64,
) -> Result<Vec<MessageLog>, DatabaseError> {
    let logs = sqlx::query_as::<_, MessageLog>(
        "SELECT id, message_id, model, prompt_tokens, completion_tokens, total_tokens,
                total_cost, response_time, has_error, created_at
         FROM message_logs WHERE message_id = ? ORDER BY id ASC",
    )
    .bind(message_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(logs)
}

pub async fn insert_feedback(
    conn: &mut SqliteConnection,
    chat_id: i64,
    content: &str,
    rating: i64,
) -> Result<Feedback, DatabaseError> {
    let created_at = now();
    let result = sqlx::query(
        "INSERT INTO feedback (chat_id, content, rating, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(chat_id)
    .bind(content)
    .bind(rating)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?;

    Ok(Feedback {
        id: result.last_insert_rowid(),
        chat_id,
        content: content.to_string(),
        rating,
        created_at,
    })
}

pub async fn insert_knowledge_rows(
    conn: &mut SqliteConnection,
    rows: &[NewKnowledgeRow],
) -> Result<u64, DatabaseError> {
    let mut inserted = 0;
    for row in rows {
        let result = sqlx::query(
            "INSERT INTO datastore (keywords, title, source, content, category, is_embedded)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&row.keywords)
        .bind(&row.title)
        .bind(&row.source)
        .bind(&row.content)
        .bind(&row.category)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Rows not yet embedded, newest first.
pub async fn pending_knowledge_rows(
    conn: &mut SqliteConnection,
) -> Result<Vec<KnowledgeRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, KnowledgeRow>(
        "SELECT id, keywords, title, source, content, category, is_embedded
         FROM datastore WHERE is_embedded = 0 ORDER BY id DESC",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Flips the embedded flag. Already-embedded rows are left untouched.
pub async fn mark_rows_embedded(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<u64, DatabaseError> {
    let mut updated = 0;
    for id in ids {
        let result =
            sqlx::query("UPDATE datastore SET is_embedded = 1 WHERE id = ? AND is_embedded = 0")
                .bind(id)
                .execute(&mut *conn)
                .await?;
        updated += result.rows_affected();
    }
    Ok(updated)
}

/// Throwaway database file for tests.
#[cfg(test)]
pub(crate) async fn temp_database() -> Database {
    let tmp = std::env::temp_dir().join(format!("ragchat-db-test-{}.db", uuid::Uuid::new_v4()));
    Database::with_path(tmp).await.unwrap()
}
