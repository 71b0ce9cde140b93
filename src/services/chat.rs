use sqlx::SqliteConnection;
use thiserror::Error;

use crate::core::errors::{ApiError, ChatNotFound, DatabaseError};
use crate::core::messages;
use crate::db::{self, Chat, Database};

#[derive(Debug, Error)]
pub enum ChatLookupError {
    #[error(transparent)]
    NotFound(#[from] ChatNotFound),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ChatLookupError> for ApiError {
    fn from(err: ChatLookupError) -> Self {
        match err {
            ChatLookupError::NotFound(err) => err.into(),
            ChatLookupError::Database(err) => err.into(),
        }
    }
}

/// Opens a chat session owned by `email` and returns its id.
pub async fn create_chat(db: &Database, email: Option<&str>) -> Result<i64, ApiError> {
    tracing::info!("Action: create_chat");

    let Some(email) = email.filter(|e| !e.trim().is_empty()) else {
        return Err(ApiError::BadRequest(messages::ERROR_MESSAGE_EMPTY_EMAIL.to_string()));
    };

    let created: Result<Chat, DatabaseError> = async {
        let mut tx = db.begin().await?;
        let chat = db::insert_chat(&mut tx, email).await?;
        tx.commit().await?;
        Ok::<Chat, DatabaseError>(chat)
    }
    .await;

    match created {
        Ok(chat) => {
            tracing::info!("Chat created successfully with id {}, User: {}", chat.id, chat.user);
            Ok(chat.id)
        }
        Err(err) => {
            let message = messages::fill(messages::ERROR_MESSAGE_CHAT_CREATE, &err);
            tracing::error!("{}", message);
            Err(ApiError::Internal(message))
        }
    }
}

/// Fetches a chat, distinguishing a missing chat from a failed lookup.
pub async fn get_chat(conn: &mut SqliteConnection, chat_id: i64) -> Result<Chat, ChatLookupError> {
    match db::find_chat(conn, chat_id).await? {
        Some(chat) => Ok(chat),
        None => {
            let err = ChatNotFound(chat_id);
            tracing::info!("{}", err);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::temp_database;

    #[tokio::test]
    async fn missing_email_is_rejected_without_writing() {
        let db = temp_database().await;
        let err = create_chat(&db, None).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == messages::ERROR_MESSAGE_EMPTY_EMAIL));

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(db::find_chat(&mut conn, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn creates_chat_and_finds_it_again() {
        let db = temp_database().await;
        let id = create_chat(&db, Some("a@b.com")).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let chat = get_chat(&mut conn, id).await.unwrap();
        assert_eq!(chat.user, "a@b.com");

        let missing = get_chat(&mut conn, id + 1).await.unwrap_err();
        assert!(matches!(missing, ChatLookupError::NotFound(ChatNotFound(n)) if n == id + 1));
    }
}
