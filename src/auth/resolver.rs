use std::sync::Arc;

use crate::users::{repo::UserStore, repo_types::UserRecord};

/// Read-only view of the user store used for role checks.
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// `None` for an unknown email; only store failures are errors.
    pub async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        self.users.find_by_email(email).await
    }
}
