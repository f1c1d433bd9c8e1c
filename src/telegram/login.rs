//! Interactive first-time login on the terminal.

use dialoguer::{Input, Password};
use tracing::info;

use super::{TelegramBot, TelegramError};
use crate::config::TelegramConfig;

/// Prompts for phone number, login code and, if enabled, the 2FA password,
/// and signs the session in.
///
/// Prompts run on the blocking pool so the sender pool keeps running.
///
/// # Errors
///
/// Returns an error if a prompt fails or Telegram rejects the credentials.
pub async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<(), TelegramError> {
    info!("Authentication required");

    let phone = prompt_text("Enter your phone number (with country code)").await?;

    let token = bot.request_login_code(&phone, &config.api_hash).await?;

    info!("Login code sent to your Telegram app");

    let code = prompt_text("Enter the login code").await?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => Ok(()),
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password = tokio::task::spawn_blocking(|| {
                Password::new()
                    .with_prompt("Enter your 2FA password")
                    .interact()
            })
            .await
            .map_err(|e| TelegramError::SignInFailed(format!("prompt task failed: {e}")))?
            .map_err(prompt_error)?;

            bot.check_password(password_token, &password).await
        }
        Err(e) => Err(e),
    }
}

async fn prompt_text(prompt: &'static str) -> Result<String, TelegramError> {
    tokio::task::spawn_blocking(move || Input::<String>::new().with_prompt(prompt).interact_text())
        .await
        .map_err(|e| TelegramError::SignInFailed(format!("prompt task failed: {e}")))?
        .map_err(prompt_error)
}

fn prompt_error(err: dialoguer::Error) -> TelegramError {
    TelegramError::SignInFailed(format!("prompt failed: {err}"))
}
