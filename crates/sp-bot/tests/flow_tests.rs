//! End-to-end submission flows over the real SQLite store.
//!
//! These exercise the controller and monitor through the crate's public
//! surface, with a scripted sandbox and a recording chat transport, and
//! the actual sqlx repositories behind the access gate and task store.

use sp_bot::chat::RecordingMessenger;
use sp_bot::{ChatId, ChatInput, MonitorConfig, MonitorPool, RenderConfig, SubmissionController};
use sp_connectors::{AnalysisState, MockSandboxConnector, SandboxApi};
use sp_core::db::{
    create_active_task_repository, create_credential_repository, create_memory_pool,
    create_user_repository, ActiveTaskRepository, CredentialRepository, UserRepository,
};
use sp_core::{AccessGate, Secret, TextCatalog};
use std::sync::Arc;
use std::time::Duration;

struct World {
    api: Arc<MockSandboxConnector>,
    chat: Arc<RecordingMessenger>,
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialRepository>,
    tasks: Arc<dyn ActiveTaskRepository>,
    pool: Arc<MonitorPool>,
    controller: SubmissionController,
}

async fn world() -> World {
    let db = create_memory_pool().await.expect("in-memory database");
    let users = create_user_repository(db.clone());
    let credentials = create_credential_repository(db.clone());
    let tasks = create_active_task_repository(db);

    let api = Arc::new(MockSandboxConnector::new());
    let chat = Arc::new(RecordingMessenger::new());
    let texts = Arc::new(TextCatalog::builtin());
    let pool = Arc::new(MonitorPool::new());

    let gate = Arc::new(AccessGate::new(
        users.clone(),
        credentials.clone(),
        texts.clone(),
    ));
    let controller = SubmissionController::new(
        api.clone() as Arc<dyn SandboxApi>,
        tasks.clone(),
        gate,
        chat.clone(),
        texts,
        pool.clone(),
        RenderConfig::default(),
        MonitorConfig {
            max_attempts: 60,
            poll_interval: Duration::ZERO,
        },
    );

    World {
        api,
        chat,
        users,
        credentials,
        tasks,
        pool,
        controller,
    }
}

async fn register_with_key(world: &World, owner_id: i64) {
    world.users.register(owner_id).await.unwrap();
    world
        .credentials
        .add(owner_id, &Secret::from("api-key"), "default")
        .await
        .unwrap();
}

#[tokio::test]
async fn url_submission_happy_path() {
    let w = world().await;
    register_with_key(&w, 10).await;

    w.api.set_next_task_id("abc").await;
    w.api
        .script_statuses(
            "abc",
            [
                Ok(AnalysisState::Running),
                Ok(AnalysisState::Running),
                Ok(AnalysisState::Completed),
            ],
        )
        .await;
    w.api
        .add_report("abc", Ok(MockSandboxConnector::sample_report("abc")))
        .await;

    let task_id = w
        .controller
        .handle(ChatId(10), 10, "en", ChatInput::from_text("https://example.com"))
        .await
        .expect("monitor launched");
    assert_eq!(task_id.as_str(), "abc");

    w.pool.wait_all().await;

    // Recorded once, resolved to inactive, exactly one report fetch.
    assert!(w.tasks.list_active(10).await.unwrap().is_empty());
    assert_eq!(w.api.report_calls(), 1);
    assert_eq!(w.api.status_calls(), 3);

    let sent = w.chat.sent().await;
    let report_message = sent.last().unwrap();
    assert!(report_message.text.contains("abc"));
    assert!(report_message
        .actions
        .iter()
        .any(|a| a.url == "https://app.any.run/tasks/abc/"));
}

#[tokio::test]
async fn failed_analysis_is_terminal_without_report() {
    let w = world().await;
    register_with_key(&w, 11).await;

    w.api.set_next_task_id("bad").await;
    w.api
        .script_statuses("bad", [Ok(AnalysisState::Failed)])
        .await;

    w.controller
        .handle(ChatId(11), 11, "en", ChatInput::from_text("https://evil.example"))
        .await
        .expect("monitor launched");
    w.pool.wait_all().await;

    assert!(w.tasks.list_active(11).await.unwrap().is_empty());
    assert_eq!(w.api.report_calls(), 0);
    assert_eq!(w.chat.edit_count_containing("failed").await, 1);
}

#[tokio::test]
async fn banned_user_is_denied_verbatim_before_any_submission() {
    let w = world().await;
    w.users.register(12).await.unwrap();
    w.credentials
        .add(12, &Secret::from("api-key"), "default")
        .await
        .unwrap();
    w.users.set_banned(12, true).await.unwrap();

    let result = w
        .controller
        .handle(ChatId(12), 12, "en", ChatInput::from_text("https://example.com"))
        .await;

    assert!(result.is_none());
    assert_eq!(w.api.submission_count(), 0);

    let texts = TextCatalog::builtin();
    let sent = w.chat.sent().await;
    assert_eq!(sent[0].text, texts.resolve("en", "USER_BANNED"));
}

#[tokio::test]
async fn timeout_leaves_the_task_active_for_later_reconciliation() {
    let w = world().await;
    register_with_key(&w, 13).await;
    w.api.set_next_task_id("slow").await;
    // No script: the steady state stays Running for all 60 attempts.

    w.controller
        .handle(ChatId(13), 13, "en", ChatInput::from_text("https://slow.example"))
        .await
        .expect("monitor launched");
    w.pool.wait_all().await;

    assert_eq!(w.api.status_calls(), 60);

    let still_active = w.tasks.list_active(13).await.unwrap();
    assert_eq!(still_active.len(), 1);
    assert_eq!(still_active[0].task_id, "slow");

    let edits = w.chat.edits().await;
    assert!(edits.last().unwrap().text.contains("slow"));
}
