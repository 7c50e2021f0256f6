//! Transactional email.
//!
//! Uses SMTP via lettre with Askama HTML and plain text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use meridian_core::CurrencyCode;
use meridian_core::types::money::format_amount;
use meridian_db::models::{Order, OrderItem};

use crate::config::EmailConfig;

/// One line of an order confirmation, preformatted for the templates.
#[derive(Debug, Clone)]
pub struct OrderEmailLine {
    pub name: String,
    pub size: Option<String>,
    pub quantity: i32,
    pub line_total: String,
}

/// Everything the order confirmation templates render.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub store_name: String,
    pub order_number: String,
    pub lines: Vec<OrderEmailLine>,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub shipping_lines: Vec<String>,
    pub order_url: String,
}

impl OrderConfirmation {
    /// Build the confirmation contents for a paid order.
    #[must_use]
    pub fn new(order: &Order, items: &[OrderItem], store_name: &str, order_url: String) -> Self {
        let currency: CurrencyCode = order.currency.parse().unwrap_or_default();
        let fmt = |amount| format_amount(amount, currency);

        Self {
            store_name: store_name.to_string(),
            order_number: order.number(),
            lines: items
                .iter()
                .map(|item| OrderEmailLine {
                    name: item.product_name.clone(),
                    size: item.size_name.clone(),
                    quantity: item.quantity,
                    line_total: fmt(item.line_total()),
                })
                .collect(),
            subtotal: fmt(order.subtotal),
            shipping: fmt(order.shipping),
            tax: fmt(order.tax),
            total: fmt(order.total),
            shipping_lines: order
                .shipping_address()
                .map(|a| a.lines())
                .unwrap_or_default(),
            order_url,
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderConfirmation,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderConfirmation,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    store_name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    store_name: &'a str,
    shop_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the order confirmation for a paid order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order: &OrderConfirmation,
    ) -> Result<(), EmailError> {
        let html = OrderConfirmationHtml { order }.render()?;
        let text = OrderConfirmationText { order }.render()?;
        let subject = format!(
            "{} order {} confirmed",
            order.store_name, order.order_number
        );

        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome_email(
        &self,
        to: &str,
        name: &str,
        store_name: &str,
        shop_url: &str,
    ) -> Result<(), EmailError> {
        let html = WelcomeEmailHtml {
            name,
            store_name,
            shop_url,
        }
        .render()?;
        let text = WelcomeEmailText {
            name,
            store_name,
            shop_url,
        }
        .render()?;

        self.send_multipart_email(to, &format!("Welcome to {store_name}"), &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use meridian_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            user_id: None,
            email: Email::parse("buyer@example.com").unwrap(),
            status: OrderStatus::Paid,
            subtotal: Decimal::new(5000, 2),
            shipping: Decimal::new(500, 2),
            tax: Decimal::new(413, 2),
            total: Decimal::new(5913, 2),
            currency: "usd".to_string(),
            checkout_session_id: Some("cs_test_1".to_string()),
            payment_intent_id: None,
            subscription_id: None,
            shipping_name: Some("Ada Byron".to_string()),
            shipping_line1: Some("12 Harbour St".to_string()),
            shipping_line2: None,
            shipping_city: Some("Bristol".to_string()),
            shipping_postal_code: Some("BS1 4RN".to_string()),
            shipping_country: Some("GB".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            paid_at: Some(Utc::now()),
        }
    }

    fn item() -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(42),
            product_id: Some(ProductId::new(7)),
            product_name: "Wool Beanie".to_string(),
            size_name: Some("M".to_string()),
            unit_price: Decimal::new(2500, 2),
            quantity: 2,
        }
    }

    #[test]
    fn test_confirmation_formats_amounts() {
        let confirmation = OrderConfirmation::new(
            &order(),
            &[item()],
            "Meridian",
            "https://shop.example.com/account/orders/42".to_string(),
        );
        assert_eq!(confirmation.order_number, "#000042");
        assert_eq!(confirmation.total, "$59.13");
        assert_eq!(confirmation.lines[0].line_total, "$50.00");
        assert!(!confirmation.shipping_lines.is_empty());
    }

    #[test]
    fn test_confirmation_templates_render() {
        let confirmation = OrderConfirmation::new(
            &order(),
            &[item()],
            "Meridian",
            "https://shop.example.com/account/orders/42".to_string(),
        );
        let text = OrderConfirmationText {
            order: &confirmation,
        }
        .render()
        .unwrap();
        assert!(text.contains("#000042"));
        assert!(text.contains("Wool Beanie"));

        let html = OrderConfirmationHtml {
            order: &confirmation,
        }
        .render()
        .unwrap();
        assert!(html.contains("$59.13"));
    }
}
