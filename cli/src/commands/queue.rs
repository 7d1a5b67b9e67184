use clap::Subcommand;

use crate::util::{api_request, require_token};

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Letters awaiting a reply, oldest first (volunteer access)
    Unprocessed,
    /// Flagged letters for review, newest first (admin access)
    Flagged,
}

pub async fn run(api_url: &str, raw: bool, command: QueueCommands) -> i32 {
    let token = require_token().await;

    let path = match command {
        QueueCommands::Unprocessed => "/v1/letters/queue/unprocessed",
        QueueCommands::Flagged => "/v1/letters/queue/flagged",
    };

    api_request(api_url, reqwest::Method::GET, path, Some(&token), None, raw).await
}
