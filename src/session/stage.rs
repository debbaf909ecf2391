//! Login stages a session passes through

use serde::{Deserialize, Serialize};

/// Where a session is in the login handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginStage {
    /// Waiting for a user name
    NeedName,
    /// Known user, waiting for a password
    NeedPassword,
    /// Unknown name, waiting for the new user to confirm
    NeedConfirmNewUser,
    /// Being shown the welcome message
    NeedPrompt,
    /// Logged in and in the registry
    Active,
}

impl LoginStage {
    /// The single authority on whether a session has completed login
    pub fn is_logged_in(self) -> bool {
        matches!(self, LoginStage::Active)
    }
}

impl std::fmt::Display for LoginStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoginStage::NeedName => "need-name",
            LoginStage::NeedPassword => "need-password",
            LoginStage::NeedConfirmNewUser => "need-confirm",
            LoginStage::NeedPrompt => "need-prompt",
            LoginStage::Active => "active",
        };
        f.write_str(label)
    }
}
