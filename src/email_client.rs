use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use lettre::{
    message::{MessageBuilder, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use crate::{configuration::EmailClientSettings, domain::EmailObject};

#[async_trait]
pub trait GenericEmailService: Send + Sync {
    async fn send_text_email(
        &self,
        to: &str,
        subject: &str,
        body: String,
    ) -> Result<(), anyhow::Error>;

    /// Sends `html_body` with `text_body` as the plain-text alternative.
    async fn send_html_email(
        &self,
        to: &str,
        subject: &str,
        html_body: String,
        text_body: String,
    ) -> Result<(), anyhow::Error>;
}

pub struct SmtpEmailClient {
    pub sender: EmailObject,
    pub mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailClient {
    #[tracing::instrument(skip(email_config))]
    pub fn new(email_config: &EmailClientSettings) -> Result<Self, anyhow::Error> {
        let sender = email_config
            .sender()
            .map_err(|e| anyhow!("Invalid sender email address: {}", e))?;
        let smtp_credentials = Credentials::new(
            email_config.username.to_string(),
            email_config.password.expose_secret().to_string(),
        );
        tracing::info!("Establishing connection to the SMTP server.");
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&email_config.base_url)?
                .credentials(smtp_credentials)
                .pool_config(
                    PoolConfig::new()
                        .min_idle(1)
                        .max_size(10)
                        .idle_timeout(Duration::new(300, 0)),
                )
                .build();

        tracing::info!("SMTP connection created successfully");
        Ok(Self { sender, mailer })
    }

    fn message_builder(&self, to: &str, subject: &str) -> Result<MessageBuilder, anyhow::Error> {
        Ok(Message::builder()
            .from(self.sender.as_ref().parse()?)
            .to(to.parse()?)
            .subject(subject))
    }
}

#[async_trait]
impl GenericEmailService for SmtpEmailClient {
    #[tracing::instrument(name = "Send text email", skip(self, body))]
    async fn send_text_email(
        &self,
        to: &str,
        subject: &str,
        body: String,
    ) -> Result<(), anyhow::Error> {
        let email = self.message_builder(to, subject)?.body(body)?;
        self.mailer.send(email).await?;
        tracing::info!("Mail sent successfully");
        Ok(())
    }

    #[tracing::instrument(name = "Send HTML email", skip(self, html_body, text_body))]
    async fn send_html_email(
        &self,
        to: &str,
        subject: &str,
        html_body: String,
        text_body: String,
    ) -> Result<(), anyhow::Error> {
        let email = self.message_builder(to, subject)?.multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(text_body))
                .singlepart(SinglePart::html(html_body)),
        )?;
        self.mailer.send(email).await?;
        tracing::info!("HTML email sent successfully");
        Ok(())
    }
}
