//! Credential commands.

use clap::Subcommand;
use console::style;
use dialoguer::Password;

use sd_core::auth::CredentialStore;
use sd_core::error::{SdError, SdResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Save a credential for later commands.
    SetToken {
        /// The token. Prompted for when omitted.
        token: Option<String>,
    },
    /// Show the saved session.
    Show,
    /// Forget the saved session.
    Logout,
}

pub async fn run(action: AuthAction, format: OutputFormat) -> SdResult<()> {
    let mut store = CredentialStore::open_default()?;

    match action {
        AuthAction::SetToken { token } => {
            let token = match token {
                Some(t) => t,
                None => Password::new()
                    .with_prompt("Token")
                    .interact()
                    .map_err(|e| SdError::Internal(e.to_string()))?,
            };
            let token = token.trim().to_string();
            if token.is_empty() {
                return Err(SdError::AuthFailed("token must not be empty".into()));
            }
            store.set_auth(token, None)?;
            println!(
                "  {} Credential saved to {}",
                style("OK").green().bold(),
                store.path().display()
            );
        }
        AuthAction::Show => match format {
            OutputFormat::Json => {
                super::print_json(&serde_json::json!({
                    "authenticated": store.is_authenticated(),
                    "token": store.token().map(super::mask_token),
                    "user": store.user(),
                }))?;
            }
            OutputFormat::Text => match store.token() {
                Some(token) => {
                    println!("  Signed in:  {}", style("yes").green());
                    println!("  Token:      {}", super::mask_token(token));
                    if let Some(user) = store.user() {
                        println!("  User:       {} (#{})", user.username, user.id);
                    }
                }
                None => println!("  Signed in:  {}", style("no").yellow()),
            },
        },
        AuthAction::Logout => {
            store.logout()?;
            println!("  {} Signed out.", style("OK").green().bold());
        }
    }

    Ok(())
}
