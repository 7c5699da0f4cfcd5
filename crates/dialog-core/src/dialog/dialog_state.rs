//! Dialog lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a dialog, driven by responses to the request that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogState {
    /// Created, no tagged response yet
    Null,

    /// Provisional response with a To tag seen
    Early,

    /// 2xx seen
    Established,

    Terminated,
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogState::Null => write!(f, "Null"),
            DialogState::Early => write!(f, "Early"),
            DialogState::Established => write!(f, "Established"),
            DialogState::Terminated => write!(f, "Terminated"),
        }
    }
}

impl DialogState {
    /// Early and established dialogs accept in-dialog requests
    pub fn is_active(&self) -> bool {
        matches!(self, DialogState::Early | DialogState::Established)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, DialogState::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_state_display() {
        assert_eq!(DialogState::Early.to_string(), "Early");
        assert_eq!(DialogState::Established.to_string(), "Established");
        assert!(DialogState::Established.is_active());
        assert!(!DialogState::Null.is_active());
    }
}
