//! Email alerting for scan results and failed channels.
//!
//! Delivery failures are logged by the caller and never abort a run.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Message, SmtpTransport, Transport};

use crate::errors::NotifyError;

/// An end-of-run report, optionally with an attached playlist.
#[derive(Debug, Clone)]
pub struct Report {
    pub subject: String,
    pub body: String,
    /// `(file name, content)` attached as plain text.
    pub attachment: Option<(String, String)>,
}

impl Report {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.attachment = Some((name.into(), content.into()));
        self
    }
}

/// Destination for end-of-run reports.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, report: Report) -> Result<(), NotifyError>;
}

/// Plain SMTP submission, no transport encryption, the way in-network
/// monitoring relays usually accept mail on port 25.
pub struct Mailer {
    server: String,
    port: u16,
    sender: String,
    receivers: Vec<String>,
}

impl Mailer {
    pub fn new(server: String, port: u16, sender: String, receivers: Vec<String>) -> Self {
        Self {
            server,
            port,
            sender,
            receivers,
        }
    }

    fn build_message(&self, report: &Report) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.sender.parse::<Mailbox>()?)
            .subject(report.subject.clone());
        for receiver in &self.receivers {
            builder = builder.to(receiver.parse::<Mailbox>()?);
        }

        let message = match &report.attachment {
            Some((name, content)) => builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(report.body.clone()))
                    .singlepart(
                        Attachment::new(name.clone())
                            .body(content.clone(), ContentType::TEXT_PLAIN),
                    ),
            )?,
            None => builder.body(report.body.clone())?,
        };
        Ok(message)
    }
}

#[async_trait]
impl AlertSink for Mailer {
    async fn send(&self, report: Report) -> Result<(), NotifyError> {
        let message = self.build_message(&report)?;
        let transport = SmtpTransport::builder_dangerous(&self.server)
            .port(self.port)
            .build();
        // lettre's plain transport is blocking; keep it off the runtime.
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        Ok(())
    }
}
