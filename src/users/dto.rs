use serde::{Deserialize, Serialize};

use super::repo_types::UserRecord;
use crate::auth::claims::Role;

/// Request body for `POST /users`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

/// Returned when the email is already registered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingUser {
    pub message: &'static str,
    pub existing_user: UserRecord,
}
