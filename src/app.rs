//! Application context.
//!
//! [`App`] owns every long-lived piece of state (catalog store, database,
//! auth flow) and is passed by reference to whatever needs it. The catalog
//! and identity clients are only built when their API keys are configured.

use anyhow::{Context, Result};
use reqwest::redirect::Policy;
use secrecy::SecretString;
use std::sync::Arc;

use crate::catalog::{ApiEndpoint, CatalogClient, CatalogStore, CatalogView, HttpTransport};
use crate::config::Config;
use crate::favourites::Favourites;
use crate::session::{AuthFlow, RestIdentityProvider};
use crate::storage::Database;
use crate::util::validate_base_url;

pub struct App {
    config: Config,
    db: Database,
    catalog: Option<CatalogView>,
    auth: Option<AuthFlow<RestIdentityProvider>>,
}

fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Shared HTTP client. No request timeout is set: failures surface from the
/// transport itself.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .user_agent(concat!("fakeflix/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")
}

impl App {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let http = http_client()?;

        let catalog = match config.api_key.clone() {
            Some(key) => {
                let base = validate_base_url(&config.api_base_url)
                    .with_context(|| format!("Invalid api_base_url '{}'", config.api_base_url))?;
                let endpoint = ApiEndpoint::new(
                    base,
                    SecretString::from(key),
                    config.language.clone(),
                    config.region.clone(),
                );
                let transport = HttpTransport::new(http.clone(), config.max_response_bytes);
                let client = CatalogClient::new(endpoint, Arc::new(transport));
                Some(CatalogView::new(client, Arc::new(CatalogStore::new())))
            }
            None => {
                tracing::debug!("No catalog API key configured");
                None
            }
        };

        let auth = match config.identity_api_key.clone() {
            Some(key) => {
                let base = validate_base_url(&config.identity_base_url).with_context(|| {
                    format!("Invalid identity_base_url '{}'", config.identity_base_url)
                })?;
                let token_base = validate_base_url(&config.token_base_url).with_context(|| {
                    format!("Invalid token_base_url '{}'", config.token_base_url)
                })?;
                let provider = RestIdentityProvider::new(
                    http,
                    base,
                    token_base,
                    SecretString::from(key),
                    db.clone(),
                )
                .with_max_response_bytes(config.max_response_bytes);
                Some(AuthFlow::new(provider))
            }
            None => None,
        };

        Ok(Self {
            config,
            db,
            catalog,
            auth,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn catalog(&self) -> Result<&CatalogView> {
        self.catalog.as_ref().context(
            "No catalog API key configured. Set FAKEFLIX_API_KEY or api_key in config.toml",
        )
    }

    pub fn auth(&self) -> Result<&AuthFlow<RestIdentityProvider>> {
        self.auth.as_ref().context(
            "No identity API key configured. Set FAKEFLIX_IDENTITY_API_KEY or identity_api_key in config.toml",
        )
    }

    /// Favourites of the stored session's user, if someone is signed in.
    ///
    /// Reads the session from the database only, so it works offline.
    pub async fn favourites(&self) -> Result<Option<Favourites>> {
        let Some(session) = self.db.load_session().await? else {
            return Ok(None);
        };
        Ok(Some(Favourites::load(self.db.clone(), session.user_id).await?))
    }
}
