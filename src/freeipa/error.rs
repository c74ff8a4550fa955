use serde::Deserialize;
use thiserror::Error;

pub const ERRNO_NOT_FOUND: i64 = 4001;
pub const ERRNO_EMPTY_MODLIST: i64 = 4202;
pub const ERRNO_ALREADY_ACTIVE: i64 = 4204;
pub const ERRNO_ALREADY_INACTIVE: i64 = 4205;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("no modifications to be performed")]
    EmptyModlist,

    #[error("user '{uid}' is already enabled")]
    AlreadyActive { uid: String },

    #[error("user '{uid}' is already disabled")]
    AlreadyInactive { uid: String },

    #[error("FreeIPA error {code} ({name}): {message}")]
    Remote {
        code: i64,
        name: String,
        message: String,
    },

    #[error("Authentication against FreeIPA failed: {0}")]
    Authentication(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parsing failed: {0}")]
    Json(String),
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }

    pub fn is_empty_modlist(&self) -> bool {
        matches!(self, DirectoryError::EmptyModlist)
    }

    /// True for the enable/disable replies that mean "nothing to do".
    pub fn is_already_in_status(&self) -> bool {
        matches!(
            self,
            DirectoryError::AlreadyActive { .. } | DirectoryError::AlreadyInactive { .. }
        )
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(error: reqwest::Error) -> Self {
        DirectoryError::Http(error.to_string())
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(error: serde_json::Error) -> Self {
        DirectoryError::Json(error.to_string())
    }
}

/// The `error` member of a JSON-RPC reply.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

impl RpcErrorBody {
    /// Map a reply error onto a typed kind. `uid` is the primary argument of the
    /// failing call and only feeds the message.
    pub fn classify(&self, uid: &str) -> DirectoryError {
        match (self.name.as_str(), self.code) {
            ("NotFound", _) | (_, ERRNO_NOT_FOUND) => DirectoryError::NotFound {
                what: if self.message.is_empty() {
                    format!("user '{}'", uid)
                } else {
                    self.message.clone()
                },
            },
            ("EmptyModlist", _) | (_, ERRNO_EMPTY_MODLIST) => DirectoryError::EmptyModlist,
            ("AlreadyActive", _) | (_, ERRNO_ALREADY_ACTIVE) => DirectoryError::AlreadyActive {
                uid: uid.to_string(),
            },
            ("AlreadyInactive", _) | (_, ERRNO_ALREADY_INACTIVE) => {
                DirectoryError::AlreadyInactive {
                    uid: uid.to_string(),
                }
            }
            // Older servers sometimes omit the name and code on these replies
            _ if self.message.contains("already enabled") => DirectoryError::AlreadyActive {
                uid: uid.to_string(),
            },
            _ if self.message.contains("already disabled") => DirectoryError::AlreadyInactive {
                uid: uid.to_string(),
            },
            _ => DirectoryError::Remote {
                code: self.code,
                name: self.name.clone(),
                message: self.message.clone(),
            },
        }
    }
}
