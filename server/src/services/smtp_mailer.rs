// printflow_server/src/services/smtp_mailer.rs

//! SMTP delivery of print jobs over STARTTLS.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use printflow::{EmailAttachment, FlowError, Mailer, OutboundEmail};
use tracing::{info, instrument};

pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
  pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
      builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }
    Ok(Self {
      transport: builder.build(),
    })
  }
}

fn parse_mailbox(raw: &str, role: &str) -> Result<Mailbox, FlowError> {
  raw
    .parse::<Mailbox>()
    .map_err(|e| FlowError::mail(anyhow::anyhow!("invalid {} address '{}': {}", role, raw, e)))
}

fn attachment_part(attachment: EmailAttachment) -> Result<SinglePart, FlowError> {
  let content_type = ContentType::parse(&attachment.content_type)
    .or_else(|_| ContentType::parse("application/octet-stream"))
    .map_err(|e| FlowError::mail(anyhow::anyhow!("bad content type: {}", e)))?;
  Ok(Attachment::new(attachment.file_name).body(attachment.bytes, content_type))
}

/// Assembles the MIME message: a plain-text body followed by the attachments.
pub fn build_message(email: OutboundEmail) -> Result<Message, FlowError> {
  let from = parse_mailbox(&email.from, "sender")?;
  let to = parse_mailbox(&email.to, "recipient")?;

  let mut body = MultiPart::mixed().singlepart(SinglePart::plain(email.body));
  for attachment in email.attachments {
    body = body.singlepart(attachment_part(attachment)?);
  }

  Message::builder()
    .from(from)
    .to(to)
    .subject(email.subject)
    .multipart(body)
    .map_err(|e| FlowError::mail(anyhow::anyhow!(e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
  #[instrument(name = "SmtpMailer::send", skip_all, fields(to = %email.to, attachments = email.attachments.len()))]
  async fn send(&self, email: OutboundEmail) -> Result<String, FlowError> {
    let message = build_message(email)?;
    let response = self
      .transport
      .send(message)
      .await
      .map_err(|e| FlowError::mail(anyhow::anyhow!(e)))?;
    let reply = response.message().collect::<Vec<_>>().join(" ");
    info!(code = %response.code(), %reply, "SMTP server accepted the message.");
    Ok(format!("{} {}", response.code(), reply))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builds_multipart_message_with_attachments() {
    let email = OutboundEmail {
      from: "shop@print.test".to_string(),
      to: "front@print.test".to_string(),
      subject: "Print Request".to_string(),
      body: "2 files".to_string(),
      attachments: vec![EmailAttachment {
        file_name: "a.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.5".to_vec(),
      }],
    };
    let formatted = String::from_utf8(build_message(email).unwrap().formatted()).unwrap();
    assert!(formatted.contains("Subject: Print Request"));
    assert!(formatted.contains("filename=\"a.pdf\""));
  }

  #[test]
  fn rejects_unparseable_recipient() {
    let email = OutboundEmail {
      from: "shop@print.test".to_string(),
      to: "not an address".to_string(),
      ..Default::default()
    };
    assert!(matches!(build_message(email), Err(FlowError::Mail { .. })));
  }
}
