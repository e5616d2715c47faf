use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_sesv2::{
    config::Region,
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use tracing::info;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> anyhow::Result<()>;
}

/// Sends mail through AWS SES v2.
#[derive(Clone)]
pub struct SesMailer {
    client: Client,
    from: String,
}

impl SesMailer {
    pub async fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access), Some(secret)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access.as_str(),
                secret.as_str(),
                None,
                None,
                "static",
            ));
        }
        let shared = loader.load().await;
        Ok(Self {
            client: Client::new(&shared),
            from: cfg.from.clone(),
        })
    }
}

fn reset_body(reset_link: &str) -> String {
    format!(
        "We received a request to reset your password.\n\n\
         Open the link below to choose a new one:\n{reset_link}\n\n\
         If you did not ask for this, you can ignore this email."
    )
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        let subject = Content::builder()
            .data("Reset your password")
            .build()
            .context("build subject")?;
        let text = Content::builder()
            .data(reset_body(reset_link))
            .build()
            .context("build body")?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().text(text).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("ses send_email")?;

        info!("password reset email dispatched");
        Ok(())
    }
}
