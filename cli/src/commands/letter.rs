use clap::Subcommand;
use serde_json::json;

use crate::util::{api_request, exit_error, require_token};

#[derive(Subcommand)]
pub enum LetterCommands {
    /// Key in a letter (defaults to the physical-mailbox source)
    Submit {
        /// Letter text (use --file to read it from a file instead)
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read the letter text from a file, or "-" for stdin
        #[arg(long)]
        file: Option<String>,
        /// Optional topic line
        #[arg(long)]
        topic: Option<String>,
        /// Reply method: website, anonymous-email, or ai
        #[arg(long, default_value = "website")]
        reply_method: String,
        /// Reply address, required for the anonymous-email reply method
        #[arg(long)]
        anonymous_email: Option<String>,
        /// Origin tag: physical-mailbox or online
        #[arg(long, default_value = "physical-mailbox")]
        source: String,
    },
    /// Fetch a letter and its responses by public id
    Show {
        /// Public letter id (ltr_...)
        #[arg(long)]
        public_id: String,
    },
    /// Write a reply to a letter (volunteer access)
    Respond {
        /// Public letter id (ltr_...)
        #[arg(long)]
        public_id: String,
        /// Reply text
        #[arg(long)]
        content: String,
        /// Also attach an AI companion reply
        #[arg(long)]
        hybrid: bool,
    },
    /// Mark a letter handled without writing a reply (volunteer access)
    Processed {
        /// Public letter id (ltr_...)
        #[arg(long)]
        public_id: String,
    },
}

pub async fn run(api_url: &str, raw: bool, command: LetterCommands) -> i32 {
    match command {
        LetterCommands::Submit {
            content,
            file,
            topic,
            reply_method,
            anonymous_email,
            source,
        } => {
            submit(
                api_url,
                raw,
                content,
                file,
                topic.as_deref(),
                &reply_method,
                anonymous_email.as_deref(),
                &source,
            )
            .await
        }
        LetterCommands::Show { public_id } => show(api_url, raw, &public_id).await,
        LetterCommands::Respond {
            public_id,
            content,
            hybrid,
        } => respond(api_url, raw, &public_id, &content, hybrid).await,
        LetterCommands::Processed { public_id } => processed(api_url, raw, &public_id).await,
    }
}

/// Letter text comes from --content or --file; "-" reads stdin so staff can
/// pipe in transcribed mailbox letters.
fn read_content(content: Option<String>, file: Option<String>) -> String {
    match (content, file) {
        (Some(c), None) => c,
        (None, Some(path)) => {
            if path == "-" {
                let mut buf = String::new();
                if let Err(e) = std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf) {
                    exit_error(&format!("Failed to read stdin: {e}"), None);
                }
                buf
            } else {
                match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => exit_error(&format!("Failed to read file '{path}': {e}"), None),
                }
            }
        }
        _ => exit_error(
            "Letter text is required",
            Some("Pass --content <TEXT> or --file <PATH> (use --file - for stdin)"),
        ),
    }
}

fn submit_body(
    content: &str,
    topic: Option<&str>,
    reply_method: &str,
    anonymous_email: Option<&str>,
    source: &str,
) -> serde_json::Value {
    let mut body = json!({
        "content": content,
        "reply_method": reply_method,
        "source": source
    });
    if let Some(t) = topic {
        body["topic"] = json!(t);
    }
    if let Some(email) = anonymous_email {
        body["anonymous_email"] = json!(email);
    }
    body
}

fn respond_body(content: &str, hybrid: bool) -> serde_json::Value {
    let mut body = json!({ "content": content });
    if hybrid {
        body["response_type"] = json!("hybrid");
    }
    body
}

#[allow(clippy::too_many_arguments)]
async fn submit(
    api_url: &str,
    raw: bool,
    content: Option<String>,
    file: Option<String>,
    topic: Option<&str>,
    reply_method: &str,
    anonymous_email: Option<&str>,
    source: &str,
) -> i32 {
    let content = read_content(content, file);
    let body = submit_body(&content, topic, reply_method, anonymous_email, source);

    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/letters/submit",
        None,
        Some(body),
        raw,
    )
    .await
}

async fn show(api_url: &str, raw: bool, public_id: &str) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        &format!("/v1/letters/{public_id}"),
        None,
        None,
        raw,
    )
    .await
}

async fn respond(api_url: &str, raw: bool, public_id: &str, content: &str, hybrid: bool) -> i32 {
    let token = require_token().await;

    api_request(
        api_url,
        reqwest::Method::POST,
        &format!("/v1/letters/{public_id}/respond"),
        Some(&token),
        Some(respond_body(content, hybrid)),
        raw,
    )
    .await
}

async fn processed(api_url: &str, raw: bool, public_id: &str) -> i32 {
    let token = require_token().await;

    api_request(
        api_url,
        reqwest::Method::POST,
        &format!("/v1/letters/{public_id}/processed"),
        Some(&token),
        None,
        raw,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::{respond_body, submit_body};
    use serde_json::json;

    #[test]
    fn submit_body_omits_absent_optionals() {
        let body = submit_body("Dear someone", None, "website", None, "physical-mailbox");
        assert_eq!(
            body,
            json!({
                "content": "Dear someone",
                "reply_method": "website",
                "source": "physical-mailbox"
            })
        );
    }

    #[test]
    fn submit_body_carries_topic_and_reply_address() {
        let body = submit_body(
            "Dear someone",
            Some("loneliness"),
            "anonymous-email",
            Some("writer@example.com"),
            "physical-mailbox",
        );
        assert_eq!(body["topic"], json!("loneliness"));
        assert_eq!(body["anonymous_email"], json!("writer@example.com"));
        assert_eq!(body["reply_method"], json!("anonymous-email"));
    }

    #[test]
    fn respond_body_marks_hybrid_only_when_asked() {
        assert_eq!(respond_body("You are heard.", false), json!({"content": "You are heard."}));
        assert_eq!(
            respond_body("You are heard.", true)["response_type"],
            json!("hybrid")
        );
    }
}
