use crate::core::errors::{ApiError, DatabaseError};
use crate::core::messages;
use crate::db::{self, Database, Feedback};

pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// Stores feedback for a chat and returns its id. Ratings outside 1..=10 are
/// rejected before anything is written.
pub async fn create_feedback(
    db: &Database,
    chat_id: Option<i64>,
    content: Option<&str>,
    rating: Option<i64>,
) -> Result<i64, ApiError> {
    tracing::info!("Action: create_feedback");

    let Some(chat_id) = chat_id else {
        return Err(ApiError::BadRequest(messages::ERROR_MESSAGE_EMPTY_CHATID.to_string()));
    };
    let Some(rating) = rating.filter(|r| RATING_RANGE.contains(r)) else {
        return Err(ApiError::BadRequest(messages::ERROR_MESSAGE_EMPTY_RATING.to_string()));
    };
    let content = content.unwrap_or_default();

    let saved: Result<Feedback, DatabaseError> = async {
        let mut tx = db.begin().await?;
        let feedback = db::insert_feedback(&mut tx, chat_id, content, rating).await?;
        tx.commit().await?;
        Ok::<Feedback, DatabaseError>(feedback)
    }
    .await;

    let feedback = saved.map_err(|err| {
        tracing::error!("{}", err);
        ApiError::general(err)
    })?;
    tracing::info!(
        "Feedback created successfully with id {}, ChatId: {}, Rating: {}",
        feedback.id,
        feedback.chat_id,
        feedback.rating
    );
    Ok(feedback.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::temp_database;

    #[tokio::test]
    async fn rating_bounds_are_inclusive() {
        let db = temp_database().await;

        for rating in [0, 11, -3] {
            let err = create_feedback(&db, Some(1), Some("x"), Some(rating)).await.unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(ref m) if m == messages::ERROR_MESSAGE_EMPTY_RATING));
        }

        let first = create_feedback(&db, Some(1), Some("ok"), Some(1)).await.unwrap();
        let last = create_feedback(&db, Some(1), None, Some(10)).await.unwrap();
        assert!(last > first);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let db = temp_database().await;
        let err = create_feedback(&db, None, Some("x"), Some(5)).await.unwrap_err();
        assert_eq!(err.message(), messages::ERROR_MESSAGE_EMPTY_CHATID);

        let err = create_feedback(&db, Some(1), Some("x"), None).await.unwrap_err();
        assert_eq!(err.message(), messages::ERROR_MESSAGE_EMPTY_RATING);
    }
}
