use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use portal_core::error::AppError;
use secrecy::ExposeSecret;
use std::time::Duration;

use crate::config::SmtpConfig;

/// Outbound notification mail. Everything behind this trait is best-effort from
/// the caller's point of view: status updates succeed even when delivery fails.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), AppError>;

    async fn send_transaction_status(
        &self,
        to_email: &str,
        reference: &str,
        service_name: &str,
        status_label: &str,
    ) -> Result<(), AppError>;

    async fn send_application_status(
        &self,
        to_email: &str,
        service_name: &str,
        status_label: &str,
        remarks: Option<&str>,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
    city_name: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig, city_name: String) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
            city_name,
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::InternalError(e.into()))?;

        // Send in the blocking pool; lettre's sync transport would stall the runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e.to_string(), to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<(), AppError> {
        let html_body = format!(
            r#"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>{city} Citizen Portal</h2>
                    <p>Your email verification code is:</p>
                    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{code}</p>
                    <p style="color: #666; font-size: 12px;">
                        This code expires in 24 hours. If you didn't register, please ignore this email.
                    </p>
                </body>
            </html>"#,
            city = self.city_name,
            code = code
        );

        let plain_body = format!(
            "{} Citizen Portal\n\nYour email verification code is: {}\n\nThis code expires in 24 hours. If you didn't register, please ignore this email.",
            self.city_name, code
        );

        self.send_email(to_email, "Verify Your Email Address", &plain_body, &html_body)
            .await
    }

    async fn send_transaction_status(
        &self,
        to_email: &str,
        reference: &str,
        service_name: &str,
        status_label: &str,
    ) -> Result<(), AppError> {
        let subject = format!("Payment {} - {}", reference, status_label);
        let html_body = format!(
            r#"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Payment update</h2>
                    <p>Your payment <b>{}</b> for <b>{}</b> is now: <b>{}</b>.</p>
                    <p style="color: #666; font-size: 12px;">{} Citizen Portal</p>
                </body>
            </html>"#,
            reference, service_name, status_label, self.city_name
        );
        let plain_body = format!(
            "Payment update\n\nYour payment {} for {} is now: {}.\n\n{} Citizen Portal",
            reference, service_name, status_label, self.city_name
        );

        self.send_email(to_email, &subject, &plain_body, &html_body)
            .await
    }

    async fn send_application_status(
        &self,
        to_email: &str,
        service_name: &str,
        status_label: &str,
        remarks: Option<&str>,
    ) -> Result<(), AppError> {
        let subject = format!("Application update - {}", service_name);
        let remarks_html = remarks
            .map(|r| format!("<p>Remarks: {}</p>", r))
            .unwrap_or_default();
        let remarks_plain = remarks
            .map(|r| format!("\nRemarks: {}", r))
            .unwrap_or_default();

        let html_body = format!(
            r#"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Application update</h2>
                    <p>Your application for <b>{}</b> is now: <b>{}</b>.</p>
                    {}
                    <p style="color: #666; font-size: 12px;">{} Citizen Portal</p>
                </body>
            </html>"#,
            service_name, status_label, remarks_html, self.city_name
        );
        let plain_body = format!(
            "Application update\n\nYour application for {} is now: {}.{}\n\n{} Citizen Portal",
            service_name, status_label, remarks_plain, self.city_name
        );

        self.send_email(to_email, &subject, &plain_body, &html_body)
            .await
    }
}

/// No-op provider for tests and for deployments without SMTP credentials.
#[derive(Clone)]
pub struct MockEmailService;

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_code(&self, _to_email: &str, _code: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn send_transaction_status(
        &self,
        _to_email: &str,
        _reference: &str,
        _service_name: &str,
        _status_label: &str,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn send_application_status(
        &self,
        _to_email: &str,
        _service_name: &str,
        _status_label: &str,
        _remarks: Option<&str>,
    ) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    #[test]
    fn test_email_service_creation() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "portal@lgu.gov.ph".to_string(),
            password: Secret::new("app-password".to_string()),
            from: "portal@lgu.gov.ph".to_string(),
        };

        let service = SmtpEmailService::new(&config, "Test City".to_string());
        assert!(service.is_ok());
    }
}
