//! Account → user identity lookup.

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::GateError;

/// Resolves an external account to the internal user ID, creating the user
/// on first sign-in.
pub trait UserDirectory: Send + Sync {
    fn resolve(&self, account_id: &str) -> Result<String, GateError>;
}

/// Process-local directory. IDs are UUID v4 and live until restart.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, String>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account_id: &str) -> Option<String> {
        self.users.get(account_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn resolve(&self, account_id: &str) -> Result<String, GateError> {
        let user_id = self
            .users
            .entry(account_id.to_string())
            .or_insert_with(|| {
                tracing::info!(account_id = %account_id, "Created user");
                Uuid::new_v4().to_string()
            })
            .value()
            .clone();
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_stable_per_account() {
        let dir = InMemoryUserDirectory::new();
        let a1 = dir.resolve("alice.near").unwrap();
        let a2 = dir.resolve("alice.near").unwrap();
        let b = dir.resolve("bob.near").unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get("alice.near"), Some(a1));
        assert!(Uuid::parse_str(&b).is_ok());
    }
}
