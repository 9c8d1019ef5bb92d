use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::models::{ChatId, MessageRef};

/// Practical per-message ceiling of the chat transport, in characters.
pub const MESSAGE_CEILING: usize = 4096;

/// Outbound chat transport. The concrete backend (command parsing, menus,
/// durable storage) lives outside this crate; the bridge only needs to send,
/// edit, upload and show typing. `rich` requests markup rendering; callers
/// must be prepared for rich sends to fail and retry plain.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat: ChatId, text: &str, rich: bool) -> Result<MessageRef>;
    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        rich: bool,
    ) -> Result<()>;
    async fn upload_file(&self, chat: ChatId, filename: &str, bytes: &[u8]) -> Result<()>;
    async fn send_typing(&self, chat: ChatId) -> Result<()>;
}

/// Renders messages to stdout so the CLI can drive the engine without a
/// remote chat backend attached.
#[derive(Debug, Default)]
pub struct ConsoleMessenger {
    counter: AtomicI64,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_message(&self, chat: ChatId, text: &str, _rich: bool) -> Result<MessageRef> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[chat {}] {}", chat, text);
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        _rich: bool,
    ) -> Result<()> {
        println!("[chat {}] (update #{}) {}", chat, message, text);
        Ok(())
    }

    async fn upload_file(&self, chat: ChatId, filename: &str, bytes: &[u8]) -> Result<()> {
        println!(
            "[chat {}] (file upload) {} ({} bytes)",
            chat,
            filename,
            bytes.len()
        );
        Ok(())
    }

    async fn send_typing(&self, _chat: ChatId) -> Result<()> {
        Ok(())
    }
}
