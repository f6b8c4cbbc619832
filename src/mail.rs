use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::env::MailSettings;
use crate::error::AppError;

pub const CONTACT_SUBJECT: &str = "Contact Form Submission";

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingMessage {
    /// The message the contact form relays to the site owner.
    pub fn contact_submission(recipient: &str, sender_email: &str, message: &str) -> Self {
        Self {
            to: recipient.to_string(),
            reply_to: Some(sender_email.to_string()),
            subject: CONTACT_SUBJECT.to_string(),
            body: format!("From: {}\n\nMessage:\n{}", sender_email, message),
        }
    }
}

#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, AppError> {
        let from: Mailbox = settings.default_sender.parse()?;
        // Contact messages go here; a bad address stops startup
        settings.contact_recipient.parse::<Mailbox>()?;
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        };

        let transport = builder
            .port(settings.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, message: OutgoingMessage) -> Result<Message, AppError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse()?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN);

        // The submitter typed this address; a malformed one only loses Reply-To
        if let Some(reply_to) = message.reply_to.as_deref() {
            if let Ok(mailbox) = reply_to.parse::<Mailbox>() {
                builder = builder.reply_to(mailbox);
            }
        }

        Ok(builder.body(message.body)?)
    }
}

#[rocket::async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: OutgoingMessage) -> Result<(), AppError> {
        let email = self.build_message(message)?;

        let response = self.transport.send(email).await?;
        info!(code = %response.code(), "Message accepted by SMTP relay");

        Ok(())
    }
}
