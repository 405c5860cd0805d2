//! Session commands.

use anyhow::{Context, Result};

use fluentfm_core::TokenCache;
use fluentfm_http::Repository;

use crate::output;
use crate::token_store::FileTokenCache;

pub async fn refresh_token(repo: &mut Repository) -> Result<()> {
    repo.refresh_token()
        .await
        .context("Failed to open a new session")?;

    output::success("Session token refreshed");
    if let Some(issued) = repo.session().issued_at() {
        output::field("Issued", &issued.to_rfc3339());
    }
    Ok(())
}

/// Without a token cache the session is closed on the server. With one the
/// session is left to expire and only the cached token is forgotten.
pub async fn logout(repo: &mut Repository, file_cache: Option<&FileTokenCache>) -> Result<()> {
    let key = repo.session().cache_key().to_string();
    repo.logout().await;

    match file_cache {
        Some(cache) => {
            cache.delete(&key).await;
            output::success("Cached session token removed");
        }
        None => output::success("Logged out"),
    }
    Ok(())
}
