//! Committed quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::members::{from_timestamp, to_timestamp};

/// A committed quote. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub id: i64,
    /// The quoted message's Discord id, unique, which backstops the
    /// exactly-once commit of the vote state machine.
    pub message_id: String,
    pub member_discord_id: String,
    pub text: String,
    pub context_text: Option<String>,
    pub context_author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New quote awaiting insertion.
#[derive(Debug, Clone)]
pub struct NewQuote<'a> {
    pub message_id: &'a str,
    pub member_discord_id: &'a str,
    pub text: &'a str,
    pub context_text: Option<&'a str>,
    pub context_author: Option<&'a str>,
}

/// Quote repository
pub struct QuoteRepository;

impl QuoteRepository {
    /// Whether a quote for this source message already exists.
    pub async fn exists(pool: &SqlitePool, message_id: &str) -> DbResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM quotes WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a quote. Returns `false` without writing when a quote for
    /// the same source message already exists.
    pub async fn insert(pool: &SqlitePool, quote: &NewQuote<'_>) -> DbResult<bool> {
        if Self::exists(pool, quote.message_id).await? {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO quotes (message_id, member_discord_id, text, context_text, context_author, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(quote.message_id)
        .bind(quote.member_discord_id)
        .bind(quote.text)
        .bind(quote.context_text)
        .bind(quote.context_author)
        .bind(to_timestamp(Utc::now()))
        .execute(pool)
        .await?;

        info!("Committed quote for message {}", quote.message_id);
        Ok(true)
    }

    /// Pick a random quote, optionally restricted to one member.
    pub async fn random(pool: &SqlitePool, member_discord_id: Option<&str>) -> DbResult<Option<Quote>> {
        let row = if let Some(member) = member_discord_id {
            sqlx::query_as::<_, QuoteRow>(
                r#"
                SELECT id, message_id, member_discord_id, text, context_text, context_author, created_at
                FROM quotes
                WHERE member_discord_id = ?
                ORDER BY RANDOM()
                LIMIT 1
                "#,
            )
            .bind(member)
            .fetch_optional(pool)
            .await?
        } else {
            sqlx::query_as::<_, QuoteRow>(
                r#"
                SELECT id, message_id, member_discord_id, text, context_text, context_author, created_at
                FROM quotes
                ORDER BY RANDOM()
                LIMIT 1
                "#,
            )
            .fetch_optional(pool)
            .await?
        };

        Ok(row.map(|r| r.into()))
    }

    /// Count quotes, optionally per member.
    pub async fn count(pool: &SqlitePool, member_discord_id: Option<&str>) -> DbResult<i64> {
        let (count,): (i64,) = if let Some(member) = member_discord_id {
            sqlx::query_as("SELECT COUNT(*) FROM quotes WHERE member_discord_id = ?")
                .bind(member)
                .fetch_one(pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM quotes")
                .fetch_one(pool)
                .await?
        };
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: i64,
    message_id: String,
    member_discord_id: String,
    text: String,
    context_text: Option<String>,
    context_author: Option<String>,
    created_at: i64,
}

impl From<QuoteRow> for Quote {
    fn from(row: QuoteRow) -> Self {
        Quote {
            id: row.id,
            message_id: row.message_id,
            member_discord_id: row.member_discord_id,
            text: row.text,
            context_text: row.context_text,
            context_author: row.context_author,
            created_at: from_timestamp(row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_helpers::create_test_pool;

    fn new_quote<'a>(message_id: &'a str, member: &'a str, text: &'a str) -> NewQuote<'a> {
        NewQuote {
            message_id,
            member_discord_id: member,
            text,
            context_text: None,
            context_author: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_random() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(
            QuoteRepository::insert(pool, &new_quote("m1", "1001", "never lift"))
                .await
                .unwrap()
        );

        let quote = QuoteRepository::random(pool, None).await.unwrap().unwrap();
        assert_eq!(quote.text, "never lift");
        assert_eq!(quote.member_discord_id, "1001");
    }

    #[tokio::test]
    async fn test_duplicate_message_id_is_skipped() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(
            QuoteRepository::insert(pool, &new_quote("m1", "1001", "first"))
                .await
                .unwrap()
        );
        // Replayed commit: not inserted again.
        assert!(
            !QuoteRepository::insert(pool, &new_quote("m1", "1001", "second"))
                .await
                .unwrap()
        );
        assert_eq!(QuoteRepository::count(pool, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_random_by_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        QuoteRepository::insert(pool, &new_quote("m1", "1001", "alice said"))
            .await
            .unwrap();
        QuoteRepository::insert(pool, &new_quote("m2", "1002", "bob said"))
            .await
            .unwrap();

        let quote = QuoteRepository::random(pool, Some("1002"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quote.member_discord_id, "1002");

        let none = QuoteRepository::random(pool, Some("1003")).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_context_round_trips() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let quote = NewQuote {
            message_id: "m9",
            member_discord_id: "1001",
            text: "no",
            context_text: Some("are you ok?"),
            context_author: Some("Seb"),
        };
        QuoteRepository::insert(pool, &quote).await.unwrap();

        let stored = QuoteRepository::random(pool, None).await.unwrap().unwrap();
        assert_eq!(stored.context_text.as_deref(), Some("are you ok?"));
        assert_eq!(stored.context_author.as_deref(), Some("Seb"));
    }
}
