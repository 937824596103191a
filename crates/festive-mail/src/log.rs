use festive_core::transport::{MessageId, OutgoingMessage, TransportError};
use uuid::Uuid;

/// Accepts every message and writes it to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl LogMailer {
  pub async fn send(&self, message: OutgoingMessage) -> Result<MessageId, TransportError> {
    let id = MessageId(format!("<{}@log.invalid>", Uuid::new_v4()));
    tracing::info!(
      message_id = %id,
      to = %message.to,
      cc = ?message.cc,
      subject = %message.subject,
      tags = ?message.tags,
      "greeting logged, not sent"
    );
    tracing::debug!(message_id = %id, body = %message.body);
    Ok(id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn accepts_everything_with_unique_ids() {
    let message = OutgoingMessage {
      to:      "ann@example.com".into(),
      to_name: None,
      subject: "Hello".into(),
      body:    "Hi".into(),
      cc:      None,
      tags:    vec![],
    };
    let a = LogMailer.send(message.clone()).await.unwrap();
    let b = LogMailer.send(message).await.unwrap();
    assert_ne!(a, b);
    assert!(a.0.ends_with("@log.invalid>"));
  }
}
