//! SMTP delivery through `lettre`.

use festive_core::transport::{MessageId, OutgoingMessage, TransportError};
use lettre::{
  Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
  message::{
    Mailbox, MultiPart, SinglePart,
    header::{ContentType, Header, HeaderName, HeaderValue},
  },
  transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

fn default_port() -> u16 { 587 }

fn default_use_tls() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
  pub host:     String,
  /// 587 for STARTTLS submission.
  #[serde(default = "default_port")]
  pub port:     u16,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default, skip_serializing)]
  pub password: Option<String>,
  /// Envelope and `From:` mailbox, e.g. `"Maple Homes <noreply@example.com>"`.
  pub from:     String,
  /// Require STARTTLS. Disable only for a local relay.
  #[serde(default = "default_use_tls")]
  pub use_tls:  bool,
}

/// Comma-separated message tags, for provider-side filtering and analytics.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tags(String);

impl Header for Tags {
  fn name() -> HeaderName { HeaderName::new_from_ascii_str("X-Festive-Tags") }

  fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
    Ok(Self(s.to_owned()))
  }

  fn display(&self) -> HeaderValue { HeaderValue::new(Self::name(), self.0.clone()) }
}

/// A pooled STARTTLS connection to one relay.
pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
  from:      Mailbox,
}

impl SmtpMailer {
  pub fn new(config: &SmtpConfig) -> Result<Self> {
    let from: Mailbox = config
      .from
      .parse()
      .map_err(|_| Error::InvalidSender(config.from.clone()))?;

    let mut builder = if config.use_tls {
      AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
    } else {
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };
    builder = builder.port(config.port);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
      builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    tracing::info!(host = %config.host, port = config.port, tls = config.use_tls, "smtp transport configured");
    Ok(Self { transport: builder.build(), from })
  }

  pub async fn send(&self, message: OutgoingMessage) -> Result<MessageId, TransportError> {
    let (email, id) = build_message(&self.from, &message)?;
    self.transport.send(email).await.map_err(|e| {
      if e.is_permanent() {
        TransportError::Rejected(e.to_string())
      } else {
        TransportError::Unavailable(e.to_string())
      }
    })?;
    Ok(id)
  }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, TransportError> {
  let email: Address = address
    .parse()
    .map_err(|_| TransportError::InvalidAddress(address.to_owned()))?;
  Ok(Mailbox::new(name.map(str::to_owned), email))
}

/// Build the wire message and the `Message-ID` it carries.
fn build_message(
  from: &Mailbox,
  message: &OutgoingMessage,
) -> Result<(Message, MessageId), TransportError> {
  let id = MessageId(format!("<{}@{}>", Uuid::new_v4(), from.email.domain()));

  let mut builder = Message::builder()
    .from(from.clone())
    .to(mailbox(message.to_name.as_deref(), &message.to)?)
    .subject(message.subject.clone())
    .message_id(Some(id.0.clone()));
  if let Some(cc) = &message.cc {
    builder = builder.cc(mailbox(None, cc)?);
  }
  if !message.tags.is_empty() {
    builder = builder.header(Tags(message.tags.join(", ")));
  }

  let email = builder
    .multipart(
      MultiPart::alternative()
        .singlepart(
          SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone()),
        )
        .singlepart(
          SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(html_body(&message.body)),
        ),
    )
    .map_err(|e| TransportError::Build(e.to_string()))?;
  Ok((email, id))
}

/// The plain-text body as HTML: escaped, with line breaks kept.
fn html_body(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace("\r\n", "\n")
    .replace('\n', "<br>")
}
