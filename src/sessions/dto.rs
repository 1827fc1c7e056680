use serde::{Deserialize, Serialize};
use serde_json::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub amount: Number,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: SessionStatus,
    #[serde(rename = "type")]
    pub session_type: Option<SessionType>,
    pub amount: Option<Number>,
}

/// Fee rules: never negative, zero for free sessions, non-zero for paid ones.
pub fn check_fee(session_type: SessionType, amount: &Number) -> Result<(), &'static str> {
    let value = amount.as_f64().unwrap_or(-1.0);
    if value < 0.0 {
        return Err("amount must not be negative");
    }
    match session_type {
        SessionType::Free if value != 0.0 => Err("free sessions cannot carry an amount"),
        SessionType::Paid if value == 0.0 => Err("paid sessions need an amount"),
        _ => Ok(()),
    }
}
