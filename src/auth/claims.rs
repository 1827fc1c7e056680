use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Access level stored on every user record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role {other:?}"),
        }
    }
}

/// Identity payload carried inside a token.
///
/// `email` is the only field the guards read; anything else the caller sent
/// at sign-in rides along in `extra` and comes back out of `verify` as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialClaim {
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialClaim {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_parses_lowercase_names_only() {
        assert_eq!("teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("Admin".parse::<Role>().is_err());
        assert!("tutor".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Student);
    }

    #[test]
    fn claim_keeps_unknown_fields() {
        let raw = json!({ "email": "a@x.com", "name": "Ann", "photo": null });
        let claim: CredentialClaim = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(claim.email, "a@x.com");
        assert_eq!(claim.extra.get("name"), Some(&json!("Ann")));
        assert_eq!(serde_json::to_value(&claim).unwrap(), raw);
    }
}
