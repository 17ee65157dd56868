//! Access gate: the single authorization check in front of every
//! sandbox submission.
//!
//! One call answers not-found, banned, deleted, and missing-credential in
//! that order; a denial carries the exact display message for the user.

use crate::db::{CredentialRepository, DbError, UserRepository};
use crate::lang::TextCatalog;
use crate::user::Credential;
use std::sync::Arc;
use tracing::warn;

/// Outcome of an access check.
#[derive(Debug)]
pub enum AccessDecision {
    /// Access granted; carries the owner's active credential.
    Granted(Credential),
    /// Access denied; the message is shown to the user verbatim.
    Denied(String),
}

/// Authorization gate over the user and credential repositories.
pub struct AccessGate {
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialRepository>,
    texts: Arc<TextCatalog>,
}

impl AccessGate {
    pub fn new(
        users: Arc<dyn UserRepository>,
        credentials: Arc<dyn CredentialRepository>,
        texts: Arc<TextCatalog>,
    ) -> Self {
        Self {
            users,
            credentials,
            texts,
        }
    }

    /// Checks whether the owner may submit analyses right now.
    pub async fn check(&self, owner_id: i64) -> Result<AccessDecision, DbError> {
        let Some(user) = self.users.get(owner_id).await? else {
            warn!(owner_id, "access denied: user not found");
            return Ok(self.deny("en", "USER_NOT_FOUND"));
        };
        if user.is_banned {
            warn!(owner_id, "access denied: user is banned");
            return Ok(self.deny(&user.lang, "USER_BANNED"));
        }
        if user.is_deleted {
            warn!(owner_id, "access denied: user is deleted");
            return Ok(self.deny(&user.lang, "USER_DELETED"));
        }

        match self.credentials.get_active(owner_id).await? {
            Some(credential) => Ok(AccessDecision::Granted(credential)),
            None => {
                warn!(owner_id, "access denied: no active API key");
                Ok(self.deny(&user.lang, "NO_API_KEY"))
            }
        }
    }

    fn deny(&self, lang: &str, key: &str) -> AccessDecision {
        AccessDecision::Denied(self.texts.resolve(lang, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mocks::{MockCredentialRepository, MockUserRepository};
    use crate::user::UserAccount;
    use chrono::Utc;

    fn banned_user(owner_id: i64) -> UserAccount {
        UserAccount {
            owner_id,
            lang: "en".to_string(),
            is_admin: false,
            is_banned: true,
            is_deleted: false,
            first_seen: Utc::now(),
        }
    }

    fn gate(users: MockUserRepository, credentials: MockCredentialRepository) -> AccessGate {
        AccessGate::new(
            Arc::new(users),
            Arc::new(credentials),
            Arc::new(TextCatalog::builtin()),
        )
    }

    #[tokio::test]
    async fn unknown_user_is_denied() {
        let gate = gate(MockUserRepository::new(), MockCredentialRepository::new());
        let decision = gate.check(1).await.unwrap();
        assert!(matches!(decision, AccessDecision::Denied(_)));
    }

    #[tokio::test]
    async fn banned_user_is_denied_before_credential_lookup() {
        let users = MockUserRepository::new();
        users.insert(banned_user(1)).await;
        let credentials = MockCredentialRepository::with_active_key(1, "key").await;

        let decision = gate(users, credentials).check(1).await.unwrap();
        let AccessDecision::Denied(message) = decision else {
            panic!("expected denial");
        };
        assert!(message.contains("banned"));
    }

    #[tokio::test]
    async fn user_without_key_is_denied() {
        let users = MockUserRepository::new();
        users.register(1).await.unwrap();

        let decision = gate(users, MockCredentialRepository::new()).check(1).await.unwrap();
        let AccessDecision::Denied(message) = decision else {
            panic!("expected denial");
        };
        assert!(message.contains("API key"));
    }

    #[tokio::test]
    async fn user_with_active_key_is_granted() {
        let users = MockUserRepository::new();
        users.register(1).await.unwrap();
        let credentials = MockCredentialRepository::with_active_key(1, "key-1").await;

        let decision = gate(users, credentials).check(1).await.unwrap();
        let AccessDecision::Granted(credential) = decision else {
            panic!("expected grant");
        };
        assert_eq!(credential.key.expose(), "key-1");
    }
}
