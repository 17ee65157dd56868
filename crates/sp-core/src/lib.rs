//! # sp-core
//!
//! Core domain types and services for Sandpiper: user and credential
//! models, the access gate, the localization catalog, and the sqlx
//! persistence layer with in-memory mocks for tests.

pub mod access;
pub mod db;
pub mod lang;
pub mod secret;
pub mod user;

pub use access::{AccessDecision, AccessGate};
pub use lang::TextCatalog;
pub use secret::Secret;
pub use user::{ActiveTask, Credential, UserAccount};

pub use db::{
    create_active_task_repository, create_credential_repository, create_user_repository,
    ActiveTaskRepository, CredentialRepository, DbError, UserRepository,
};
