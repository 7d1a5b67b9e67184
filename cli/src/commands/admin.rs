use clap::Subcommand;
use serde_json::json;

use crate::util::{api_request, exit_error, require_token};

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create an account directly in the database (requires DATABASE_URL)
    ///
    /// First-run bootstrap: this path can mint the ultimate_admin account,
    /// which the HTTP API refuses to assign.
    CreateUser {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
        /// Display name
        #[arg(long)]
        display_name: Option<String>,
        /// Role: user, admin, or ultimate_admin
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// List accounts (ultimate admin only, via API)
    ListUsers,
    /// Change an account's role (ultimate admin only, via API)
    SetRole {
        /// User UUID
        #[arg(long)]
        user_id: String,
        /// New role: user or admin
        #[arg(long)]
        role: String,
    },
    /// Permanently delete an account (ultimate admin only, via API)
    DeleteUser {
        /// User UUID to delete
        #[arg(long)]
        user_id: String,
        /// Confirm deletion (required)
        #[arg(long)]
        confirm: bool,
    },
    /// Permanently delete a letter and its responses (admin only, via API)
    DeleteLetter {
        /// Public letter id (ltr_...)
        #[arg(long)]
        public_id: String,
        /// Confirm deletion (required)
        #[arg(long)]
        confirm: bool,
    },
}

pub async fn run(api_url: &str, raw: bool, command: AdminCommands) -> i32 {
    match command {
        AdminCommands::CreateUser {
            email,
            password,
            display_name,
            role,
        } => create_user(&email, &password, display_name.as_deref(), &role).await,
        AdminCommands::ListUsers => list_users(api_url, raw).await,
        AdminCommands::SetRole { user_id, role } => set_role(api_url, raw, &user_id, &role).await,
        AdminCommands::DeleteUser { user_id, confirm } => {
            delete_user(api_url, raw, &user_id, confirm).await
        }
        AdminCommands::DeleteLetter { public_id, confirm } => {
            delete_letter(api_url, raw, &public_id, confirm).await
        }
    }
}

async fn create_user(email: &str, password: &str, display_name: Option<&str>, role: &str) -> i32 {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => exit_error(
            "DATABASE_URL must be set for admin create commands",
            Some("Account bootstrap connects directly to the database, not the API"),
        ),
    };

    let role = match warmline_core::roles::Role::parse_strict(role) {
        Some(r) => r,
        None => exit_error(
            &format!("Unknown role: {role}"),
            Some("Valid roles: user, admin, ultimate_admin"),
        ),
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
    {
        Ok(p) => p,
        Err(e) => exit_error(&format!("Failed to connect to database: {e}"), None),
    };

    let password_hash = match warmline_core::auth::hash_password(password) {
        Ok(h) => h,
        Err(e) => exit_error(&format!("Failed to hash password: {e}"), None),
    };

    let user_id = uuid::Uuid::now_v7();

    if let Err(e) = sqlx::query(
        "INSERT INTO users (id, email, password_hash, display_name, role) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(email)
    .bind(&password_hash)
    .bind(display_name)
    .bind(role.as_str())
    .execute(&pool)
    .await
    {
        exit_error(&format!("Failed to create user: {e}"), None);
    }

    let output = json!({
        "user_id": user_id,
        "email": email,
        "display_name": display_name,
        "role": role.as_str()
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    0
}

async fn list_users(api_url: &str, raw: bool) -> i32 {
    let token = require_token().await;

    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/admin/users",
        Some(&token),
        None,
        raw,
    )
    .await
}

async fn set_role(api_url: &str, raw: bool, user_id: &str, role: &str) -> i32 {
    let token = require_token().await;

    api_request(
        api_url,
        reqwest::Method::PUT,
        &format!("/v1/admin/users/{user_id}/role"),
        Some(&token),
        Some(json!({ "role": role })),
        raw,
    )
    .await
}

async fn delete_user(api_url: &str, raw: bool, user_id: &str, confirm: bool) -> i32 {
    if !confirm {
        exit_error(
            "Account deletion is permanent and irreversible",
            Some("Add --confirm to proceed: warmline admin delete-user --user-id <UUID> --confirm"),
        );
    }

    let token = require_token().await;

    api_request(
        api_url,
        reqwest::Method::DELETE,
        &format!("/v1/admin/users/{user_id}"),
        Some(&token),
        None,
        raw,
    )
    .await
}

async fn delete_letter(api_url: &str, raw: bool, public_id: &str, confirm: bool) -> i32 {
    if !confirm {
        exit_error(
            "Letter deletion removes the letter and every response to it",
            Some(
                "Add --confirm to proceed: warmline admin delete-letter --public-id <ID> --confirm",
            ),
        );
    }

    let token = require_token().await;

    api_request(
        api_url,
        reqwest::Method::DELETE,
        &format!("/v1/admin/letters/{public_id}"),
        Some(&token),
        None,
        raw,
    )
    .await
}
