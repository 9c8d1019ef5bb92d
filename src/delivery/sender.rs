use std::sync::Arc;

use crate::chat::Messenger;
use crate::config::DeliveryConfig;
use crate::models::{ChatId, MessageRef};
use crate::utils::tail_chars;

use super::chunker::split_for_channel;

/// Prepended when a chunk had to be cut down to the hard transport limit.
const TRUNCATION_MARKER: &str = "[…] ";

/// Size-aware outbound delivery. Nothing here propagates a transport error:
/// rich sends degrade to plain, edits degrade to fresh messages, uploads
/// degrade to chunks, and the worst case is a dropped chunk with a warning
/// in the log.
pub struct SafeDelivery {
    chat: Arc<dyn Messenger>,
    config: DeliveryConfig,
}

impl SafeDelivery {
    pub fn new(chat: Arc<dyn Messenger>, config: DeliveryConfig) -> Self {
        Self { chat, config }
    }

    /// Delivers arbitrary-size text: chunked messages below the
    /// upload-as-file threshold, a file upload above it. Returns the ref of
    /// the last message sent, if any.
    pub async fn send_safe(&self, chat: ChatId, text: &str) -> Option<MessageRef> {
        if text.trim().is_empty() {
            return None;
        }

        if text.chars().count() > self.config.file_threshold && self.upload(chat, text).await {
            return None;
        }

        let mut last = None;
        for chunk in split_for_channel(text, self.config.chunk_len) {
            let body = clamp_to_limit(&chunk, self.config.message_limit);
            if let Some(id) = self.send_degrading(chat, &body).await {
                last = Some(id);
            }
        }
        last
    }

    /// Edits a message in place, degrading rich edit → plain edit → fresh
    /// shortened message. Returns the ref now carrying the text.
    pub async fn edit_safe(&self, chat: ChatId, message: MessageRef, text: &str) -> MessageRef {
        let body = clamp_to_limit(text, self.config.message_limit);

        if self.chat.edit_message(chat, message, &body, true).await.is_ok() {
            return message;
        }
        if self.chat.edit_message(chat, message, &body, false).await.is_ok() {
            return message;
        }

        tracing::warn!(message, "edit failed twice, sending a fresh message");
        let short = tail_chars(&body, self.config.chunk_len);
        match self.chat.send_message(chat, &short, false).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!("fallback send failed as well: {:#}", err);
                message
            }
        }
    }

    async fn send_degrading(&self, chat: ChatId, body: &str) -> Option<MessageRef> {
        match self.chat.send_message(chat, body, true).await {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!("rich send failed, retrying plain: {:#}", err);
                match self.chat.send_message(chat, body, false).await {
                    Ok(id) => Some(id),
                    Err(err) => {
                        tracing::warn!("plain send failed, dropping chunk: {:#}", err);
                        None
                    }
                }
            }
        }
    }

    async fn upload(&self, chat: ChatId, text: &str) -> bool {
        match self.chat.upload_file(chat, "output.txt", text.as_bytes()).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("file upload failed, falling back to chunks: {:#}", err);
                false
            }
        }
    }
}

/// Cuts a chunk that still exceeds the hard transport limit, keeping the
/// tail behind a marker.
fn clamp_to_limit(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(TRUNCATION_MARKER.chars().count());
    let tail: String = text.chars().skip(count - keep).collect();
    format!("{}{}", TRUNCATION_MARKER, tail)
}
