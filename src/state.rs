use std::sync::Arc;

use crate::{
    accounts::repo::{PgUserDirectory, UserDirectory},
    auth::{
        google::{GoogleIdentityProvider, IdentityProvider},
        jwt::JwtKeys,
    },
    config::AppConfig,
    db,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn UserDirectory>,
    pub provider: Arc<dyn IdentityProvider>,
    pub keys: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        if config.uses_default_secret() {
            tracing::warn!("JWT_SECRET is not set; signing session tokens with the insecure development default");
        }
        if config.google.client_id.is_none() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; google sign-in will fail");
        }

        let db = db::connect(&config.database_url).await?;
        let directory = Arc::new(PgUserDirectory::new(db)) as Arc<dyn UserDirectory>;
        let provider =
            Arc::new(GoogleIdentityProvider::new(reqwest::Client::new())) as Arc<dyn IdentityProvider>;

        Ok(Self::from_parts(Arc::new(config), directory, provider))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        directory: Arc<dyn UserDirectory>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            config,
            directory,
            provider,
            keys,
        }
    }
}
