//! Import identifiers for existing users.
//!
//! An import id is the login name, optionally followed by the lifecycle
//! state the user is currently in: `alice`, `alice;staged`, `bob;preserved`.

use crate::user::model::{validate_uid, AttributeError};
use crate::user::state::{AccountState, LifecycleError};
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportIdError {
    #[error(transparent)]
    Uid(#[from] AttributeError),

    #[error("Invalid import id '{id}': {source}")]
    State {
        id: String,
        #[source]
        source: LifecycleError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportId {
    pub uid: String,
    pub state: AccountState,
}

impl ImportId {
    pub fn parse(id: &str) -> Result<Self, ImportIdError> {
        let (uid, state) = match id.split_once(';') {
            Some((uid, suffix)) => {
                let state = suffix
                    .parse::<AccountState>()
                    .map_err(|source| ImportIdError::State {
                        id: id.to_string(),
                        source,
                    })?;
                (uid, state)
            }
            None => (id, AccountState::Active),
        };
        validate_uid(uid)?;
        Ok(Self {
            uid: uid.to_string(),
            state,
        })
    }
}

impl Display for ImportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};{}", self.uid, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_id() {
        let id = ImportId::parse("alice").unwrap();
        assert_eq!(id.uid, "alice");
        assert_eq!(id.state, AccountState::Active);

        assert_eq!(
            ImportId::parse("carol;staged").unwrap().state,
            AccountState::Staged
        );
        assert_eq!(
            ImportId::parse("bob;preserved").unwrap().to_string(),
            "bob;preserved"
        );
        assert_eq!(
            ImportId::parse("dave;active").unwrap().state,
            AccountState::Active
        );
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert!(matches!(
            ImportId::parse("alice;deleted"),
            Err(ImportIdError::State { .. })
        ));
        assert!(matches!(
            ImportId::parse(";staged"),
            Err(ImportIdError::Uid(_))
        ));
        assert!(ImportId::parse("alice;staged;extra").is_err());
    }
}
