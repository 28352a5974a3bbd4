use serde::{Deserialize, Serialize};

/// The only thing the classifier hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub is_human_skin: bool,
    /// Set when the image passed but the evidence was thin.
    pub warning: Option<String>,
}

impl ClassificationVerdict {
    pub fn accept() -> Self {
        Self {
            is_human_skin: true,
            warning: None,
        }
    }

    pub fn accept_with_warning(warning: impl Into<String>) -> Self {
        Self {
            is_human_skin: true,
            warning: Some(warning.into()),
        }
    }

    pub fn reject() -> Self {
        Self {
            is_human_skin: false,
            warning: None,
        }
    }
}
