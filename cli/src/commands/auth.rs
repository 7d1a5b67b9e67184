use clap::Subcommand;
use serde_json::json;

use crate::util::{
    LoginResponse, StoredCredentials, check_auth_configured, client, config_path, exit_error,
    load_credentials, raw_api_request, resolve_token, save_credentials,
};

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Log in with email and password, storing the session token locally
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
    },
    /// Revoke the stored session and remove the local credentials file
    Logout,
    /// Show how the CLI is authenticated and whether the session is accepted
    Status,
}

pub async fn run(api_url: &str, command: AuthCommands) -> i32 {
    match command {
        AuthCommands::Login { email, password } => {
            match login(api_url, &email, &password).await {
                Ok(()) => 0,
                Err(e) => exit_error(&e.to_string(), None),
            }
        }
        AuthCommands::Logout => match logout(api_url).await {
            Ok(()) => 0,
            Err(e) => exit_error(&e.to_string(), None),
        },
        AuthCommands::Status => status(api_url).await,
    }
}

async fn login(
    api_url: &str,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let resp = client()
        .post(format!("{api_url}/v1/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?;

    if !resp.status().is_success() {
        let body: serde_json::Value = resp.json().await?;
        return Err(format!("Login failed: {}", serde_json::to_string_pretty(&body)?).into());
    }

    let login_resp: LoginResponse = resp.json().await?;

    let creds = StoredCredentials {
        api_url: api_url.to_string(),
        token: login_resp.token,
        expires_at: login_resp.expires_at,
    };

    save_credentials(&creds)?;

    let output = json!({
        "status": "authenticated",
        "expires_at": creds.expires_at,
        "config_path": config_path().to_string_lossy()
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn logout(api_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Revoke server-side first; a dead server should not trap the local file.
    if let Some(creds) = load_credentials() {
        let _ = client()
            .post(format!("{api_url}/v1/auth/logout"))
            .header("Authorization", format!("Bearer {}", creds.token))
            .send()
            .await;
    }

    let path = config_path();
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    let output = json!({
        "status": "logged_out",
        "config_path": path.to_string_lossy()
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn status(api_url: &str) -> i32 {
    let Some((method, detail)) = check_auth_configured() else {
        let output = json!({
            "status": "unauthenticated",
            "docs_hint": "Run `warmline auth login` or set WARMLINE_TOKEN."
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
        return 1;
    };

    let token = match resolve_token().await {
        Ok(t) => t,
        Err(e) => {
            let output = json!({
                "status": "expired",
                "auth_method": method,
                "detail": detail,
                "message": e.to_string()
            });
            eprintln!("{}", serde_json::to_string_pretty(&output).unwrap());
            return 1;
        }
    };

    match raw_api_request(api_url, reqwest::Method::GET, "/v1/auth/verify", Some(&token)).await {
        Ok((status, body)) if (200..300).contains(&status) => {
            let output = json!({
                "status": "authenticated",
                "auth_method": method,
                "detail": detail,
                "identity": body
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            0
        }
        Ok((status, body)) => {
            let output = json!({
                "status": "rejected",
                "auth_method": method,
                "detail": detail,
                "http_status": status,
                "body": body
            });
            eprintln!("{}", serde_json::to_string_pretty(&output).unwrap());
            1
        }
        Err(e) => {
            let output = json!({
                "error": "connection_error",
                "message": e,
                "docs_hint": "Is the API server running? Check WARMLINE_API_URL."
            });
            eprintln!("{}", serde_json::to_string_pretty(&output).unwrap());
            3
        }
    }
}
