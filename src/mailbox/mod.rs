//! Access to the user's mailbox.
//!
//! [`Mailbox`] is the seam between the control loop and the provider:
//! listing unread messages, fetching one in full, sending a reply and
//! clearing the unread flag. [`GmailGateway`] talks to the Gmail REST API;
//! tests substitute their own implementation.

mod gmail;

pub use gmail::GmailGateway;

use crate::utils::google_auth::AuthError;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const UNKNOWN_SENDER: &str = "Unknown";
pub const NO_SUBJECT: &str = "(No Subject)";

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("Mailbox request failed: {0}")]
    Api(String),
    #[error("Message {0} not found")]
    NotFound(String),
}

/// Identifies a message as returned by the list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub thread_id: Option<String>,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    /// Plain-text body, empty when the message has none.
    pub body: String,
    /// RFC 822 `Message-ID` header, used to thread the reply.
    pub message_id_header: Option<String>,
    pub is_read: bool,
}

impl Message {
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
        }
    }
}

/// A reply ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReply {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
}

impl OutgoingReply {
    /// Addresses `body` back to the sender of `original`, in the same thread.
    pub fn reply_to(original: &Message, body: impl Into<String>) -> Self {
        let subject = if original.subject.to_ascii_lowercase().starts_with("re:") {
            original.subject.clone()
        } else {
            format!("Re: {}", original.subject)
        };
        Self {
            to: extract_address(&original.from),
            subject,
            body: body.into(),
            thread_id: original.thread_id.clone(),
            in_reply_to: original.message_id_header.clone(),
        }
    }

    /// Renders the reply as an RFC 822 `text/plain` message.
    pub fn to_rfc822(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("To: {}\r\n", self.to));
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        if let Some(reference) = &self.in_reply_to {
            out.push_str(&format!("In-Reply-To: {reference}\r\n"));
            out.push_str(&format!("References: {reference}\r\n"));
        }
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");
        out.push_str("\r\n");
        out.push_str(&self.body.replace("\r\n", "\n").replace('\n', "\r\n"));
        out
    }
}

lazy_static! {
    static ref ANGLE_ADDRESS: Regex = Regex::new(r"<(.+?)>").expect("address pattern is valid");
}

/// `"Jane <jane@example.com>"` becomes `jane@example.com`; anything without
/// angle brackets is returned trimmed.
pub fn extract_address(sender: &str) -> String {
    ANGLE_ADDRESS
        .captures(sender)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| sender.trim().to_string())
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Makes sure a valid credential is available.
    async fn authenticate(&self) -> Result<(), AuthError>;

    /// Up to `limit` unread inbox messages, newest first.
    async fn list_unread(&self, limit: u32) -> Result<Vec<MessageRef>, MailboxError>;

    async fn fetch_full(&self, message: &MessageRef) -> Result<Message, MailboxError>;

    /// Sends `reply`. Failures are logged and reported as `false`.
    async fn send(&self, reply: &OutgoingReply) -> bool;

    /// Clears the unread flag. Failures are logged and reported as `false`.
    async fn mark_read(&self, message: &MessageRef) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(from: &str, subject: &str) -> Message {
        Message {
            id: "m1".to_string(),
            thread_id: Some("t1".to_string()),
            from: from.to_string(),
            subject: subject.to_string(),
            snippet: String::new(),
            body: "hello".to_string(),
            message_id_header: Some("<abc@mail.example.com>".to_string()),
            is_read: false,
        }
    }

    #[test]
    fn address_is_taken_from_angle_brackets() {
        assert_eq!(extract_address("Jane Doe <jane@example.com>"), "jane@example.com");
        assert_eq!(extract_address("  bob@example.com "), "bob@example.com");
        assert_eq!(extract_address(UNKNOWN_SENDER), "Unknown");
    }

    #[test]
    fn reply_is_addressed_and_threaded() {
        let reply = OutgoingReply::reply_to(&message("Jane <jane@example.com>", "Lunch"), "Sounds good");

        assert_eq!(reply.to, "jane@example.com");
        assert_eq!(reply.subject, "Re: Lunch");
        assert_eq!(reply.thread_id.as_deref(), Some("t1"));
        assert_eq!(reply.in_reply_to.as_deref(), Some("<abc@mail.example.com>"));
    }

    #[test]
    fn existing_reply_prefix_is_not_doubled() {
        let reply = OutgoingReply::reply_to(&message("a@b.c", "RE: Lunch"), "ok");
        assert_eq!(reply.subject, "RE: Lunch");
    }

    #[test]
    fn rfc822_rendering_has_headers_then_body() {
        let reply = OutgoingReply::reply_to(&message("a@b.c", "Lunch"), "line one\nline two");
        let raw = reply.to_rfc822();

        assert!(raw.starts_with("To: a@b.c\r\nSubject: Re: Lunch\r\n"));
        assert!(raw.contains("In-Reply-To: <abc@mail.example.com>\r\n"));
        assert!(raw.contains("References: <abc@mail.example.com>\r\n"));
        assert!(raw.ends_with("\r\n\r\nline one\r\nline two"));
    }

    #[test]
    fn rfc822_without_message_id_has_no_threading_headers() {
        let mut original = message("a@b.c", "Lunch");
        original.message_id_header = None;
        let raw = OutgoingReply::reply_to(&original, "ok").to_rfc822();
        assert!(!raw.contains("In-Reply-To"));
    }
}
