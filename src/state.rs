use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::billing::gateway::{PaymentGateway, RazorpayClient};
use crate::config::AppConfig;
use crate::db::{PgStore, Store};
use crate::mail::{Mailer, SesMailer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        let mailer = Arc::new(SesMailer::new(&config.mail).await?) as Arc<dyn Mailer>;
        let gateway = Arc::new(RazorpayClient::new(&config.razorpay)?) as Arc<dyn PaymentGateway>;

        Ok(Self::from_parts(
            Arc::new(PgStore::new(pool)),
            config,
            mailer,
            gateway,
        ))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            config,
            mailer,
            gateway,
        }
    }

    /// In-memory store, recording mailer and stub gateway.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(
            Arc::new(crate::mail::fake::RecordingMailer::default()),
            Arc::new(crate::billing::gateway::fake::StubGateway::default()),
        )
    }

    #[cfg(test)]
    pub fn fake_with(mailer: Arc<dyn Mailer>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::from_parts(
            Arc::new(crate::db::memory::MemoryStore::default()),
            Arc::new(AppConfig::for_tests()),
            mailer,
            gateway,
        )
    }
}
