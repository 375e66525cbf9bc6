use super::{
    Mailbox, MailboxError, Message, MessageRef, NO_SUBJECT, OutgoingReply, UNKNOWN_SENDER,
};
use crate::utils::CredentialStore;
use crate::utils::google_auth::AuthError;
use async_trait::async_trait;
use google_gmail1::api::{self, MessagePart, ModifyMessageRequest};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const USER: &str = "me";

/// [`Mailbox`] backed by the Gmail REST API.
pub struct GmailGateway {
    store: Arc<CredentialStore>,
}

impl GmailGateway {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    async fn try_send(&self, reply: &OutgoingReply) -> Result<(), SendError> {
        let hub = self.store.get_valid_credential().await?;

        let envelope = api::Message {
            thread_id: reply.thread_id.clone(),
            ..Default::default()
        };
        let raw = Cursor::new(reply.to_rfc822().into_bytes());
        let Ok(mime_type) = "message/rfc822".parse() else {
            return Err(SendError::Mime);
        };

        hub.users()
            .messages_send(envelope, USER)
            .upload(raw, mime_type)
            .await?;
        Ok(())
    }

    /// A 403 means the token was revoked or lacks the send scope, so it is
    /// discarded and the next use asks for consent again.
    async fn report_send_failure(&self, reply: &OutgoingReply, err: SendError) {
        match err {
            SendError::Api(e) if is_permission_denied(&e) => {
                warn!(to = %reply.to, error = %e, "Permission denied while sending, discarding credentials");
                self.store.invalidate().await;
            }
            e => error!(to = %reply.to, error = %e, "Failed to send reply"),
        }
    }
}

#[derive(Error, Debug)]
enum SendError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] google_gmail1::Error),
    #[error("Invalid upload MIME type")]
    Mime,
}

#[async_trait]
impl Mailbox for GmailGateway {
    async fn authenticate(&self) -> Result<(), AuthError> {
        self.store.get_valid_credential().await.map(|_| ())
    }

    async fn list_unread(&self, limit: u32) -> Result<Vec<MessageRef>, MailboxError> {
        let hub = self.store.get_valid_credential().await?;
        let (_, listing) = hub
            .users()
            .messages_list(USER)
            .add_label_ids("INBOX")
            .add_label_ids("UNREAD")
            .max_results(limit)
            .doit()
            .await
            .map_err(|e| MailboxError::Api(e.to_string()))?;

        let refs: Vec<MessageRef> = listing
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                m.id.map(|id| MessageRef {
                    id,
                    thread_id: m.thread_id,
                })
            })
            .collect();
        debug!(count = refs.len(), "Listed unread messages");
        Ok(refs)
    }

    async fn fetch_full(&self, message: &MessageRef) -> Result<Message, MailboxError> {
        let hub = self.store.get_valid_credential().await?;
        let (_, full) = hub
            .users()
            .messages_get(USER, &message.id)
            .format("full")
            .doit()
            .await
            .map_err(|e| MailboxError::Api(e.to_string()))?;

        Ok(to_message(message, full))
    }

    async fn send(&self, reply: &OutgoingReply) -> bool {
        match self.try_send(reply).await {
            Ok(()) => {
                info!(to = %reply.to, subject = %reply.subject, "Reply sent");
                true
            }
            Err(e) => {
                self.report_send_failure(reply, e).await;
                false
            }
        }
    }

    async fn mark_read(&self, message: &MessageRef) -> bool {
        let hub = match self.store.get_valid_credential().await {
            Ok(hub) => hub,
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Cannot mark message read");
                return false;
            }
        };

        let request = ModifyMessageRequest {
            add_label_ids: None,
            remove_label_ids: Some(vec!["UNREAD".to_string()]),
        };
        match hub
            .users()
            .messages_modify(request, USER, &message.id)
            .doit()
            .await
        {
            Ok(_) => {
                debug!(message_id = %message.id, "Marked message read");
                true
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Failed to mark message read");
                false
            }
        }
    }
}

fn is_permission_denied(err: &google_gmail1::Error) -> bool {
    match err {
        google_gmail1::Error::BadRequest(json) => json["error"]["code"].as_u64() == Some(403),
        google_gmail1::Error::Failure(response) => response.status().as_u16() == 403,
        _ => false,
    }
}

fn to_message(reference: &MessageRef, full: api::Message) -> Message {
    let payload = full.payload.as_ref();
    let header = |name: &str| payload.and_then(|p| find_header(p, name));

    Message {
        id: full.id.clone().unwrap_or_else(|| reference.id.clone()),
        thread_id: full.thread_id.clone().or_else(|| reference.thread_id.clone()),
        from: header("From").unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        subject: header("Subject").unwrap_or_else(|| NO_SUBJECT.to_string()),
        message_id_header: header("Message-ID"),
        snippet: full.snippet.clone().unwrap_or_default(),
        body: payload.map(extract_body).unwrap_or_default(),
        is_read: !full
            .label_ids
            .as_ref()
            .is_some_and(|labels| labels.iter().any(|l| l == "UNREAD")),
    }
}

fn find_header(part: &MessagePart, name: &str) -> Option<String> {
    part.headers
        .as_ref()?
        .iter()
        .find(|h| h.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .and_then(|h| h.value.clone())
}

/// First top-level `text/plain` part, else the top-level body, else empty.
fn extract_body(payload: &MessagePart) -> String {
    let plain_part = payload.parts.as_ref().and_then(|parts| {
        parts
            .iter()
            .find(|p| p.mime_type.as_deref() == Some("text/plain"))
            .and_then(body_text)
    });

    plain_part.or_else(|| body_text(payload)).unwrap_or_default()
}

fn body_text(part: &MessagePart) -> Option<String> {
    let data = part.body.as_ref()?.data.as_ref()?;
    Some(String::from_utf8_lossy(data).into_owned())
}
