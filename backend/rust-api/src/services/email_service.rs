use std::collections::HashMap;

use anyhow::{Context, Result};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpSettings;

/// Transactional templates this service knows how to render.
#[derive(Debug, Clone, Copy)]
pub enum EmailTemplate {
    PlacementResult,
}

impl EmailTemplate {
    fn subject(self) -> &'static str {
        match self {
            EmailTemplate::PlacementResult => "Your LinguaHub placement result",
        }
    }

    fn render(self, params: &HashMap<String, String>) -> String {
        match self {
            EmailTemplate::PlacementResult => {
                let name = params.get("name").map(String::as_str).unwrap_or("there");
                let level = params.get("level").map(String::as_str).unwrap_or("?");
                let confidence = params
                    .get("confidence")
                    .map(String::as_str)
                    .unwrap_or("unknown");
                let correct = params.get("correct").map(String::as_str).unwrap_or("?");
                let total = params.get("total").map(String::as_str).unwrap_or("?");
                format!(
                    "Hi {},\n\nYou completed the placement quiz with {} of {} correct answers.\nEstimated level: {} (confidence: {}).\n\nYour course recommendations are ready in your dashboard.\n",
                    name, correct, total, level, confidence
                )
            }
        }
    }
}

/// Fire-and-forget transactional email. Callers are expected to spawn the
/// send and log failures; a broken mail relay must never fail a quiz
/// completion response.
#[derive(Clone)]
pub struct EmailService {
    settings: SmtpSettings,
}

impl EmailService {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub async fn send_template(
        &self,
        template: EmailTemplate,
        recipient_email: &str,
        recipient_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<()> {
        if Self::sending_disabled() {
            tracing::info!("Email sending disabled, skipping {:?}", template);
            return Ok(());
        }

        let from_address: Mailbox = format!(
            "{} <{}>",
            self.settings.from_name, self.settings.from_email
        )
        .parse()
        .context("Invalid from email address")?;
        let to_address: Mailbox = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(template.subject())
            .body(template.render(params))
            .context("Failed to build email message")?;

        let mailer = self.build_mailer()?;
        mailer
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    fn build_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(self.settings.login.clone(), self.settings.password.clone());

        let builder = if self.settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.settings.server)
        }
        .port(self.settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}
