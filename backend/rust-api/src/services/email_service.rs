use anyhow::{Context, Result};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailSettings;
use crate::metrics::record_email;

pub struct EmailService {
    settings: EmailSettings,
}

impl EmailService {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub async fn send_activation_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        code: &str,
        activation_link: &str,
    ) -> Result<()> {
        let body = format!(
            "Hello {},\n\nYour NextGoal activation code is: {}\n\nYou can also activate your account here:\n{}\n",
            recipient_name, code, activation_link
        );
        self.send("activation", recipient_email, recipient_name, "Activate your NextGoal account", body)
            .await
    }

    pub async fn send_password_reset_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        code: &str,
    ) -> Result<()> {
        let body = format!(
            "Hello {},\n\nUse this code to reset your NextGoal password: {}\n\nIf you did not ask for a reset, ignore this email.\n",
            recipient_name, code
        );
        self.send("password_reset", recipient_email, recipient_name, "Reset your NextGoal password", body)
            .await
    }

    async fn send(
        &self,
        kind: &str,
        recipient_email: &str,
        recipient_name: &str,
        subject: &str,
        body: String,
    ) -> Result<()> {
        if Self::sending_disabled() {
            tracing::info!(kind, to = %recipient_email, "Email sending disabled, skipping");
            record_email(kind, "skipped");
            return Ok(());
        }

        let result = self
            .deliver(recipient_email, recipient_name, subject, body)
            .await;
        record_email(kind, if result.is_ok() { "sent" } else { "failed" });
        result
    }

    async fn deliver(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        subject: &str,
        body: String,
    ) -> Result<()> {
        let from_address: Mailbox = format!("{} <{}>", self.settings.from_name, self.settings.from_email)
            .parse()
            .context("Invalid from email address")?;
        let to_address: Mailbox = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(subject)
            .body(body)
            .context("Failed to build email message")?;

        self.build_mailer()?
            .send(email)
            .await
            .context("Failed to send email")?;
        Ok(())
    }

    fn build_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let settings = &self.settings;
        let creds = Credentials::new(settings.login.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            server: "localhost".into(),
            port: 2525,
            login: String::new(),
            password: String::new(),
            use_tls: false,
            from_name: "NextGoal".into(),
            from_email: "no-reply@nextgoal.dev".into(),
        }
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn disabled_sending_short_circuits() {
        std::env::set_var("EMAIL_SEND_DISABLED", "true");
        let service = EmailService::new(settings());
        let result = service
            .send_password_reset_email("a@b.dev", "A", "ABC123")
            .await;
        std::env::remove_var("EMAIL_SEND_DISABLED");
        assert!(result.is_ok());
    }
}
