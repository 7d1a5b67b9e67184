use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Letter content must be a real message, not a test poke.
pub const MIN_CONTENT_LEN: usize = 10;
/// Upper bound keeps a single letter readable in one sitting.
pub const MAX_CONTENT_LEN: usize = 10_000;
/// Optional topic tag length cap.
pub const MAX_TOPIC_LEN: usize = 100;
/// Queue listings truncate content to this many characters; full content
/// is only returned on a single-letter fetch.
pub const PREVIEW_LEN: usize = 200;

/// How the writer wants to receive their reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ReplyMethod {
    /// Check back later with the letter's public id.
    #[serde(rename = "website")]
    Website,
    /// Reply forwarded to a throwaway address the writer provided.
    #[serde(rename = "anonymous-email")]
    AnonymousEmail,
    /// Immediate reply from the AI companion.
    #[serde(rename = "ai")]
    Ai,
}

impl ReplyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyMethod::Website => "website",
            ReplyMethod::AnonymousEmail => "anonymous-email",
            ReplyMethod::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> ReplyMethod {
        match s {
            "anonymous-email" => ReplyMethod::AnonymousEmail,
            "ai" => ReplyMethod::Ai,
            _ => ReplyMethod::Website,
        }
    }
}

/// Where the letter physically came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LetterSource {
    #[serde(rename = "online")]
    Online,
    /// Keyed in by staff from the physical mailbox.
    #[serde(rename = "physical-mailbox")]
    PhysicalMailbox,
}

impl LetterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterSource::Online => "online",
            LetterSource::PhysicalMailbox => "physical-mailbox",
        }
    }

    pub fn parse(s: &str) -> LetterSource {
        match s {
            "physical-mailbox" => LetterSource::PhysicalMailbox,
            _ => LetterSource::Online,
        }
    }
}

/// Who authored a response. A hybrid interaction writes two rows: the
/// human text as `hybrid` plus a companion `ai` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Ai,
    Human,
    Hybrid,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Ai => "ai",
            ResponseKind::Human => "human",
            ResponseKind::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> ResponseKind {
        match s {
            "ai" => ResponseKind::Ai,
            "hybrid" => ResponseKind::Hybrid,
            _ => ResponseKind::Human,
        }
    }
}

/// Tone selector for generated replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Supportive,
    Practical,
    Reflective,
}

impl ResponseStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStyle::Supportive => "supportive",
            ResponseStyle::Practical => "practical",
            ResponseStyle::Reflective => "reflective",
        }
    }
}

/// A letter as the store sees it. Content is immutable once created; only
/// the lifecycle flags (is_processed, responder_id) change afterward, and
/// is_flagged never leaves true once set.
#[derive(Debug, Clone)]
pub struct Letter {
    pub id: Uuid,
    /// Externally shared capability token; possession grants read access.
    pub public_id: String,
    pub topic: Option<String>,
    pub content: String,
    pub reply_method: ReplyMethod,
    pub anonymous_email: Option<String>,
    pub is_flagged: bool,
    pub is_processed: bool,
    pub source: LetterSource,
    pub responder_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reply attached to a letter. Many per letter, insertion-ordered.
#[derive(Debug, Clone)]
pub struct LetterResponse {
    pub id: Uuid,
    pub letter_id: Uuid,
    pub content: String,
    pub kind: ResponseKind,
    /// Model identifier, present only when an AI contributed.
    pub ai_model: Option<String>,
    pub responder_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ──────────────────────────────────────────────
// Wire DTOs shared by the API and the CLI
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitLetterRequest {
    #[serde(default)]
    pub topic: Option<String>,
    pub content: String,
    pub reply_method: ReplyMethod,
    /// Required when reply_method is anonymous-email.
    #[serde(default)]
    pub anonymous_email: Option<String>,
    /// Origin tag; defaults to online. The mailbox intake CLI sends
    /// physical-mailbox.
    #[serde(default)]
    pub source: Option<LetterSource>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitLetterResponse {
    pub success: bool,
    /// Public id to check back for replies.
    pub letter_id: String,
    pub flagged: bool,
    /// Normal acknowledgement, or the crisis message when flagged.
    pub message: String,
}

/// Letter fields safe to show to whoever holds the public id. The
/// anonymous reply address and internal ids never appear here.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LetterView {
    pub public_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub content: String,
    pub reply_method: ReplyMethod,
    pub is_flagged: bool,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

impl LetterView {
    pub fn from_letter(letter: &Letter) -> Self {
        Self {
            public_id: letter.public_id.clone(),
            topic: letter.topic.clone(),
            content: letter.content.clone(),
            reply_method: letter.reply_method,
            is_flagged: letter.is_flagged,
            is_processed: letter.is_processed,
            created_at: letter.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseView {
    pub kind: ResponseKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResponseView {
    pub fn from_response(response: &LetterResponse) -> Self {
        Self {
            kind: response.kind,
            content: response.content.clone(),
            ai_model: response.ai_model.clone(),
            created_at: response.created_at,
        }
    }
}

/// Payload for the public "check my reply" fetch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicLetterResponse {
    pub letter: LetterView,
    /// Oldest first, in the store's insertion order.
    pub responses: Vec<ResponseView>,
}

/// One row in a triage queue listing. Content is a bounded preview.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueLetter {
    pub public_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub preview: String,
    pub reply_method: ReplyMethod,
    pub source: LetterSource,
    pub is_flagged: bool,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

impl QueueLetter {
    pub fn from_letter(letter: &Letter) -> Self {
        Self {
            public_id: letter.public_id.clone(),
            topic: letter.topic.clone(),
            preview: preview(&letter.content),
            reply_method: letter.reply_method,
            source: letter.source,
            is_flagged: letter.is_flagged,
            is_processed: letter.is_processed,
            created_at: letter.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueResponse {
    pub letters: Vec<QueueLetter>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RespondRequest {
    pub content: String,
    /// "hybrid" pairs the human reply with an AI companion reply;
    /// anything else (or omitted) is a plain human reply.
    #[serde(default)]
    pub response_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RespondResponse {
    pub success: bool,
    pub letter_id: String,
    /// The rows created by this call: two for a hybrid reply when the
    /// companion generation succeeds, otherwise one.
    pub responses: Vec<ResponseView>,
}

/// Truncate content for queue listings, preserving char boundaries.
pub fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LEN {
        return content.to_string();
    }
    let truncated: String = content.chars().take(PREVIEW_LEN).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::{
        Letter, LetterSource, PREVIEW_LEN, QueueLetter, ReplyMethod, ResponseKind, preview,
    };
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn short_content_is_not_truncated() {
        assert_eq!(preview("a short letter"), "a short letter");
    }

    #[test]
    fn long_content_is_cut_at_the_preview_length() {
        let content = "x".repeat(PREVIEW_LEN + 50);
        let p = preview(&content);
        assert_eq!(p.chars().count(), PREVIEW_LEN + 1);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn preview_respects_multibyte_boundaries() {
        let content = "é".repeat(PREVIEW_LEN + 5);
        let p = preview(&content);
        assert_eq!(p.chars().count(), PREVIEW_LEN + 1);
    }

    #[test]
    fn reply_method_text_round_trips() {
        for method in [
            ReplyMethod::Website,
            ReplyMethod::AnonymousEmail,
            ReplyMethod::Ai,
        ] {
            assert_eq!(ReplyMethod::parse(method.as_str()), method);
        }
    }

    #[test]
    fn response_kind_defaults_to_human_for_unknown_text() {
        assert_eq!(ResponseKind::parse("hybrid"), ResponseKind::Hybrid);
        assert_eq!(ResponseKind::parse("robot"), ResponseKind::Human);
    }

    #[test]
    fn queue_letter_carries_a_preview_not_full_content() {
        let letter = Letter {
            id: Uuid::now_v7(),
            public_id: "ltr_test".to_string(),
            topic: None,
            content: "y".repeat(PREVIEW_LEN * 2),
            reply_method: ReplyMethod::Website,
            anonymous_email: None,
            is_flagged: false,
            is_processed: false,
            source: LetterSource::Online,
            responder_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let row = QueueLetter::from_letter(&letter);
        assert!(row.preview.chars().count() <= PREVIEW_LEN + 1);
    }
}
