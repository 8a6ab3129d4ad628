//! Structured action outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of executing one compiled action.
///
/// Failures are data, not exceptions: whatever goes wrong during execution
/// (bad arguments, HTTP error status, transport failure) is folded into a
/// failed outcome so the model can see it and recover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionOutcome {
    /// Whether the call succeeded.
    pub success: bool,

    /// Human/model-readable summary of what happened.
    pub message: String,

    /// Parsed response payload, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionOutcome {
    /// A successful outcome with a summary message and parsed payload.
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// A failed outcome carrying only a reason.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
