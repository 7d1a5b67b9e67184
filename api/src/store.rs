use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use warmline_core::auth::generate_public_id;
use warmline_core::letters::{Letter, LetterResponse, LetterSource, ReplyMethod, ResponseKind};

/// Queues are review surfaces, not exports; a shift never needs more.
const QUEUE_LIMIT: i64 = 100;

/// Input for a new letter. Ids are minted here so callers can't reuse one.
pub struct NewLetter {
    pub topic: Option<String>,
    pub content: String,
    pub reply_method: ReplyMethod,
    pub anonymous_email: Option<String>,
    pub is_flagged: bool,
    pub source: LetterSource,
}

pub struct NewResponse {
    pub letter_id: Uuid,
    pub content: String,
    pub kind: ResponseKind,
    pub ai_model: Option<String>,
    pub responder_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct LetterRow {
    id: Uuid,
    public_id: String,
    topic: Option<String>,
    content: String,
    reply_method: String,
    anonymous_email: Option<String>,
    is_flagged: bool,
    is_processed: bool,
    source: String,
    responder_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LetterRow {
    fn into_letter(self) -> Letter {
        Letter {
            id: self.id,
            public_id: self.public_id,
            topic: self.topic,
            content: self.content,
            reply_method: ReplyMethod::parse(&self.reply_method),
            anonymous_email: self.anonymous_email,
            is_flagged: self.is_flagged,
            is_processed: self.is_processed,
            source: LetterSource::parse(&self.source),
            responder_id: self.responder_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: Uuid,
    letter_id: Uuid,
    content: String,
    kind: String,
    ai_model: Option<String>,
    responder_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl ResponseRow {
    fn into_response(self) -> LetterResponse {
        LetterResponse {
            id: self.id,
            letter_id: self.letter_id,
            content: self.content,
            kind: ResponseKind::parse(&self.kind),
            ai_model: self.ai_model,
            responder_id: self.responder_id,
            created_at: self.created_at,
        }
    }
}

const LETTER_COLUMNS: &str = "id, public_id, topic, content, reply_method, anonymous_email, \
                              is_flagged, is_processed, source, responder_id, created_at, \
                              updated_at";

/// Persist a letter, minting its internal id and public capability id.
pub async fn create_letter(pool: &PgPool, new: NewLetter) -> Result<Letter, sqlx::Error> {
    let row = sqlx::query_as::<_, LetterRow>(&format!(
        "INSERT INTO letters \
         (id, public_id, topic, content, reply_method, anonymous_email, is_flagged, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {LETTER_COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(generate_public_id())
    .bind(&new.topic)
    .bind(&new.content)
    .bind(new.reply_method.as_str())
    .bind(&new.anonymous_email)
    .bind(new.is_flagged)
    .bind(new.source.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row.into_letter())
}

pub async fn get_letter_by_public_id(
    pool: &PgPool,
    public_id: &str,
) -> Result<Option<Letter>, sqlx::Error> {
    let row = sqlx::query_as::<_, LetterRow>(&format!(
        "SELECT {LETTER_COLUMNS} FROM letters WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(LetterRow::into_letter))
}

/// Letters still waiting for a reply, oldest first. Flagged letters are
/// held out of this queue entirely.
pub async fn list_unprocessed(pool: &PgPool) -> Result<Vec<Letter>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LetterRow>(&format!(
        "SELECT {LETTER_COLUMNS} FROM letters \
         WHERE is_processed = FALSE AND is_flagged = FALSE \
         ORDER BY created_at ASC, id ASC \
         LIMIT $1"
    ))
    .bind(QUEUE_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LetterRow::into_letter).collect())
}

/// Flagged letters, newest first so fresh crisis content surfaces at
/// the top. Processed state does not remove a letter from this queue.
pub async fn list_flagged(pool: &PgPool) -> Result<Vec<Letter>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LetterRow>(&format!(
        "SELECT {LETTER_COLUMNS} FROM letters \
         WHERE is_flagged = TRUE \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(QUEUE_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LetterRow::into_letter).collect())
}

/// Mark a letter handled, recording who handled it (None for the
/// automatic pipeline). Returns false when the letter no longer exists.
pub async fn set_processed(
    pool: &PgPool,
    letter_id: Uuid,
    responder_id: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE letters \
         SET is_processed = TRUE, responder_id = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(letter_id)
    .bind(responder_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_response(
    pool: &PgPool,
    new: NewResponse,
) -> Result<LetterResponse, sqlx::Error> {
    let row = sqlx::query_as::<_, ResponseRow>(
        "INSERT INTO responses (id, letter_id, content, kind, ai_model, responder_id) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, letter_id, content, kind, ai_model, responder_id, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(new.letter_id)
    .bind(&new.content)
    .bind(new.kind.as_str())
    .bind(&new.ai_model)
    .bind(new.responder_id)
    .fetch_one(pool)
    .await?;

    Ok(row.into_response())
}

/// All responses for a letter in the order they arrived.
pub async fn list_responses(
    pool: &PgPool,
    letter_id: Uuid,
) -> Result<Vec<LetterResponse>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ResponseRow>(
        "SELECT id, letter_id, content, kind, ai_model, responder_id, created_at \
         FROM responses \
         WHERE letter_id = $1 \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(letter_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ResponseRow::into_response).collect())
}

/// Remove a letter. Responses go with it (ON DELETE CASCADE). Returns
/// false when the letter was already gone.
pub async fn delete_letter(pool: &PgPool, letter_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM letters WHERE id = $1")
        .bind(letter_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
