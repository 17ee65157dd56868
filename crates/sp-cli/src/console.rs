//! Console chat transport: renders bot output to stdout.
//!
//! Lets every bot flow run end-to-end from the command line without a
//! chat platform attached. Edits reprint the message with a marker since
//! a terminal has no in-place message mutation.

use async_trait::async_trait;
use colored::Colorize;
use sp_bot::chat::{ChatId, ChatMessenger, ChatResult, EditOutcome, MessageRef};
use sp_bot::MessageAction;
use std::sync::atomic::{AtomicI64, Ordering};

/// [`ChatMessenger`] that writes to stdout.
#[derive(Default)]
pub struct ConsoleMessenger {
    next_id: AtomicI64,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatMessenger for ConsoleMessenger {
    async fn send(&self, _chat: ChatId, text: &str) -> ChatResult<MessageRef> {
        println!("{}", text);
        Ok(MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn send_with_actions(
        &self,
        chat: ChatId,
        text: &str,
        actions: &[MessageAction],
    ) -> ChatResult<MessageRef> {
        let message = self.send(chat, text).await?;
        for action in actions {
            println!("  {} {}", action.label.bold(), action.url.blue().underline());
        }
        Ok(message)
    }

    async fn edit(
        &self,
        _chat: ChatId,
        _message: &MessageRef,
        text: &str,
    ) -> ChatResult<EditOutcome> {
        println!("{} {}", "↻".dimmed(), text);
        Ok(EditOutcome::Edited)
    }
}
