use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use warmline_core::letters::ResponseStyle;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_COMPLETION_TOKENS: u32 = 512;

/// Replies served when no completion provider is reachable. The chat
/// endpoint must always answer with something supportive.
const FALLBACK_REPLIES: &[&str] = &[
    "Thank you for sharing that with me. What you're feeling is real and it matters. \
     I'm here to listen whenever you want to keep talking.",
    "That sounds really heavy to carry. You don't have to have it all figured out right \
     now. Taking the step to write it down already counts for something.",
    "I hear you. Whatever brought you here today, you deserve support and kindness, \
     including from yourself.",
    "It takes courage to put difficult feelings into words. However small it feels, \
     reaching out is a real step, and you've just taken it.",
    "You're not alone in this. Many people carry struggles nobody sees, and talking \
     about yours is a meaningful way to start lightening the load.",
];

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no completion provider is configured")]
    NotConfigured,
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion provider returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("completion provider returned an empty reply")]
    EmptyReply,
}

/// A generated reply plus the model that produced it. `model` is `None`
/// when the text came from the fallback pool.
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub content: String,
    pub model: Option<String>,
}

#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, system: &str, message: &str) -> Result<String, ProviderError>;
}

/// The system prompt keeps generated replies in a warm, non-clinical
/// register. Styles adjust emphasis, never the safety constraints.
pub fn system_prompt(style: ResponseStyle) -> String {
    let base = "You are a compassionate volunteer replying to an anonymous letter on a \
                mental-health support platform. Write with warmth and without judgment. \
                Never diagnose conditions, never recommend medication, and never promise \
                outcomes. If the writer seems to be in danger, gently encourage them to \
                contact a crisis line or emergency services. Keep the reply under 250 \
                words and write in plain, human language.";

    let emphasis = match style {
        ResponseStyle::Supportive => {
            "Lead with validation: acknowledge what the writer is feeling before anything else."
        }
        ResponseStyle::Practical => {
            "After acknowledging their feelings, offer one or two small, gentle next steps \
             they could consider. Frame them as options, not instructions."
        }
        ResponseStyle::Reflective => {
            "Mirror the writer's own words back to them and close with one open question \
             that invites them to keep exploring what they shared."
        }
    };

    format!("{base} {emphasis}")
}

/// Format a letter for the provider. Topic goes first when present so
/// the model sees what the writer chose to call it.
pub fn letter_prompt(topic: Option<&str>, content: &str) -> String {
    match topic {
        Some(topic) if !topic.trim().is_empty() => {
            format!("Topic: {}\n\n{}", topic.trim(), content)
        }
        _ => content.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

fn extract_reply(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    let reply = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .unwrap_or_default();

    if reply.is_empty() {
        return Err(ProviderError::EmptyReply);
    }
    Ok(reply)
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// OpenAI-compatible chat-completions client. Any endpoint speaking
/// that wire shape works, including local inference servers.
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpProvider {
    /// Build from WARMLINE_AI_* variables. Returns `None` when no base
    /// URL is set, which is a supported deployment mode.
    pub fn from_env() -> Option<Self> {
        let base_url = env_trimmed("WARMLINE_AI_BASE_URL")?;
        let timeout = env_trimmed("WARMLINE_AI_TIMEOUT_SECS")
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to build completion HTTP client");
                return None;
            }
        };

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: env_trimmed("WARMLINE_AI_API_KEY"),
            model: env_trimmed("WARMLINE_AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for HttpProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, message: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": message},
            ],
            "max_tokens": MAX_COMPLETION_TOKENS,
            "temperature": 0.7,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        extract_reply(parsed)
    }
}

/// Shared handle over whichever provider (if any) is configured.
#[derive(Clone)]
pub struct Responder {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl Responder {
    pub fn from_env() -> Self {
        let provider = HttpProvider::from_env();
        if provider.is_none() {
            tracing::info!(
                "WARMLINE_AI_BASE_URL not set; chat will use fallback replies and letters \
                 will wait for human responders"
            );
        }
        Self {
            provider: provider.map(|p| Arc::new(p) as Arc<dyn CompletionProvider>),
        }
    }

    pub fn with_provider(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Ask the provider for a reply. Errors when no provider is
    /// configured or the request fails; callers decide whether that
    /// failure is swallowed (letter pipeline) or surfaced.
    pub async fn complete(
        &self,
        style: ResponseStyle,
        message: &str,
    ) -> Result<GeneratedReply, ProviderError> {
        let provider = self.provider.as_ref().ok_or(ProviderError::NotConfigured)?;
        let content = provider.complete(&system_prompt(style), message).await?;
        Ok(GeneratedReply {
            content,
            model: Some(provider.model().to_string()),
        })
    }

    /// Like `complete`, but never fails: provider errors degrade to a
    /// reply drawn from the fallback pool.
    pub async fn generate(&self, style: ResponseStyle, message: &str) -> GeneratedReply {
        match self.complete(style, message).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "Completion failed; serving fallback reply");
                GeneratedReply {
                    content: fallback_reply().to_string(),
                    model: None,
                }
            }
        }
    }

    /// Liveness probe: true iff a round-trip through the provider yields
    /// a non-empty reply.
    pub async fn test_connection(&self) -> bool {
        self.complete(
            ResponseStyle::Supportive,
            "Connection check. Reply with a short greeting.",
        )
        .await
        .is_ok()
    }
}

fn fallback_reply() -> &'static str {
    let index = rand::thread_rng().gen_range(0..FALLBACK_REPLIES.len());
    FALLBACK_REPLIES[index]
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{CompletionProvider, ProviderError};

    /// Returns a canned reply and counts invocations.
    pub struct StubProvider {
        pub reply: String,
        pub calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait::async_trait]
    impl CompletionProvider for StubProvider {
        fn model(&self) -> &str {
            "stub-model"
        }

        async fn complete(&self, _system: &str, _message: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    /// Always fails, for exercising degraded paths.
    pub struct FailingProvider;

    #[async_trait::async_trait]
    impl CompletionProvider for FailingProvider {
        fn model(&self) -> &str {
            "failing-model"
        }

        async fn complete(&self, _system: &str, _message: &str) -> Result<String, ProviderError> {
            Err(ProviderError::Request("connection refused".to_string()))
        }
    }
}
