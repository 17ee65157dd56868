//! Chat-message abstraction.
//!
//! The bot core renders everything through this trait; the concrete
//! transport (Telegram, console, test recorder) lives outside. Edits are
//! first-class because the monitor updates a single progress message in
//! place instead of posting per poll.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from the chat transport.
#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Edit failed: {0}")]
    EditFailed(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// A chat conversation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Handle to a previously sent message, used for in-place edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef(pub i64);

/// Result of an edit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    /// The transport reported the content was already identical. Not an
    /// error; callers ignore it.
    Unchanged,
}

/// A follow-up action attached to a message (rendered as a link button).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAction {
    pub label: String,
    pub url: String,
}

/// Outbound chat operations the bot core needs.
#[async_trait]
pub trait ChatMessenger: Send + Sync {
    /// Sends a plain message.
    async fn send(&self, chat: ChatId, text: &str) -> ChatResult<MessageRef>;

    /// Sends a message with attached follow-up actions.
    async fn send_with_actions(
        &self,
        chat: ChatId,
        text: &str,
        actions: &[MessageAction],
    ) -> ChatResult<MessageRef>;

    /// Edits a previously sent message in place.
    async fn edit(&self, chat: ChatId, message: &MessageRef, text: &str)
        -> ChatResult<EditOutcome>;
}

/// A message captured by [`RecordingMessenger`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat: ChatId,
    pub text: String,
    pub actions: Vec<MessageAction>,
}

/// An edit captured by [`RecordingMessenger`].
#[derive(Debug, Clone)]
pub struct RecordedEdit {
    pub message: MessageRef,
    pub text: String,
}

/// Recording messenger for tests: stores every send and edit.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    edits: Arc<RwLock<Vec<RecordedEdit>>>,
    next_id: AtomicI64,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    pub async fn edits(&self) -> Vec<RecordedEdit> {
        self.edits.read().await.clone()
    }

    /// Number of edits whose text contains the given fragment.
    pub async fn edit_count_containing(&self, fragment: &str) -> usize {
        self.edits
            .read()
            .await
            .iter()
            .filter(|e| e.text.contains(fragment))
            .count()
    }
}

#[async_trait]
impl ChatMessenger for RecordingMessenger {
    async fn send(&self, chat: ChatId, text: &str) -> ChatResult<MessageRef> {
        self.send_with_actions(chat, text, &[]).await
    }

    async fn send_with_actions(
        &self,
        chat: ChatId,
        text: &str,
        actions: &[MessageAction],
    ) -> ChatResult<MessageRef> {
        self.sent.write().await.push(SentMessage {
            chat,
            text: text.to_string(),
            actions: actions.to_vec(),
        });
        Ok(MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit(
        &self,
        _chat: ChatId,
        message: &MessageRef,
        text: &str,
    ) -> ChatResult<EditOutcome> {
        let mut edits = self.edits.write().await;
        let outcome = if edits
            .iter()
            .rev()
            .find(|e| e.message == *message)
            .is_some_and(|e| e.text == text)
        {
            EditOutcome::Unchanged
        } else {
            EditOutcome::Edited
        };
        edits.push(RecordedEdit {
            message: message.clone(),
            text: text.to_string(),
        });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_messenger_captures_sends_and_edits() {
        let messenger = RecordingMessenger::new();

        let m1 = messenger.send(ChatId(1), "hello").await.unwrap();
        let m2 = messenger.send(ChatId(1), "progress").await.unwrap();
        assert_ne!(m1, m2);

        messenger.edit(ChatId(1), &m2, "running").await.unwrap();
        messenger.edit(ChatId(1), &m2, "done").await.unwrap();

        assert_eq!(messenger.sent().await.len(), 2);
        assert_eq!(messenger.edits().await.len(), 2);
        assert_eq!(messenger.edit_count_containing("running").await, 1);
    }

    #[tokio::test]
    async fn identical_edit_reports_unchanged() {
        let messenger = RecordingMessenger::new();
        let m = messenger.send(ChatId(1), "x").await.unwrap();

        assert_eq!(
            messenger.edit(ChatId(1), &m, "a").await.unwrap(),
            EditOutcome::Edited
        );
        assert_eq!(
            messenger.edit(ChatId(1), &m, "a").await.unwrap(),
            EditOutcome::Unchanged
        );
    }
}
