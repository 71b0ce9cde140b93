use serde::Serialize;

use super::chat::get_chat;
use crate::core::errors::{ApiError, DatabaseError};
use crate::core::messages;
use crate::db::{self, Database, Message};

/// Wire shape of a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "ChatId")]
    pub chat_id: i64,
    #[serde(rename = "Type")]
    pub message_type: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Created")]
    pub created: String,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            chat_id: m.chat_id,
            message_type: m.message_type,
            content: m.content,
            created: m.created_at,
        }
    }
}

/// Messages of a chat in insertion order.
///
/// Messages are selected by chat id alone; `email` must be present but is
/// not matched against the chat owner.
pub async fn get_messages(
    db: &Database,
    chat_id: Option<i64>,
    email: Option<&str>,
) -> Result<Vec<MessageView>, ApiError> {
    tracing::info!("Action: get_messages");

    let Some(chat_id) = chat_id else {
        return Err(ApiError::BadRequest(messages::ERROR_MESSAGE_EMPTY_CHATID.to_string()));
    };
    let Some(email) = email.filter(|e| !e.trim().is_empty()) else {
        return Err(ApiError::BadRequest(messages::ERROR_MESSAGE_EMPTY_EMAIL.to_string()));
    };

    let mut conn = db.pool().acquire().await.map_err(DatabaseError::from)?;
    let chat = get_chat(&mut conn, chat_id).await?;
    if chat.user != email {
        tracing::debug!("Chat {} requested by {}, owned by {}", chat_id, email, chat.user);
    }

    let rows = db::list_messages(&mut conn, chat_id).await?;
    Ok(rows.into_iter().map(MessageView::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{temp_database, MessageType};

    #[tokio::test]
    async fn missing_inputs_are_rejected_in_order() {
        let db = temp_database().await;

        let err = get_messages(&db, None, Some("u@x.com")).await.unwrap_err();
        assert_eq!(err.message(), messages::ERROR_MESSAGE_EMPTY_CHATID);

        let err = get_messages(&db, Some(1), None).await.unwrap_err();
        assert_eq!(err.message(), messages::ERROR_MESSAGE_EMPTY_EMAIL);
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let db = temp_database().await;
        let err = get_messages(&db, Some(42), Some("u@x.com")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn returns_messages_with_wire_keys() {
        let db = temp_database().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let chat = db::insert_chat(&mut conn, "u@x.com").await.unwrap();
        db::insert_message(&mut conn, chat.id, MessageType::User, "q").await.unwrap();
        db::insert_message(&mut conn, chat.id, MessageType::Assistant, "a").await.unwrap();
        drop(conn);

        let views = get_messages(&db, Some(chat.id), Some("u@x.com")).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].message_type, "assistant");

        let json = serde_json::to_value(&views[0]).unwrap();
        for key in ["Id", "ChatId", "Type", "Content", "Created"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
