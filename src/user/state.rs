//! Lifecycle states of a directory user and the rules for moving between them.
//!
//! A user is in exactly one of three states. The legal edges are:
//!
//! ```text
//!   staged ──activate──▶ active ──preserve──▶ preserved
//!     ▲                    ▲                     │
//!     │                    └───────undelete──────┤
//!     └───────────────────────stage──────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    #[default]
    Active,
    Staged,
    Preserved,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Active => "active",
            AccountState::Staged => "staged",
            AccountState::Preserved => "preserved",
        }
    }
}

impl Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountState {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountState::Active),
            "staged" => Ok(AccountState::Staged),
            "preserved" => Ok(AccountState::Preserved),
            _ => Err(LifecycleError::UnknownState(s.to_string())),
        }
    }
}

/// The two declarative booleans a configuration uses to request a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecycleIntent {
    pub account_staged: bool,
    pub account_preserved: bool,
}

impl LifecycleIntent {
    pub fn new(account_staged: bool, account_preserved: bool) -> Self {
        Self {
            account_staged,
            account_preserved,
        }
    }

    /// The intent that, applied to an existing user in `state`, keeps it there.
    pub fn matching(state: AccountState) -> Self {
        match state {
            AccountState::Active => Self::new(false, false),
            AccountState::Staged => Self::new(true, false),
            AccountState::Preserved => Self::new(false, true),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("account_staged and account_preserved cannot both be true.")]
    ConflictingIntents,

    #[error("Creating a preserved user is not authorized.")]
    CreatePreserved,

    #[error("Preserving a staged user is not authorized.")]
    StagedToPreserved,

    #[error("Staging an active user is not authorized.")]
    ActiveToStaged,

    #[error("Unknown account state '{0}'. Valid states: active, staged, preserved")]
    UnknownState(String),
}

/// Resolve the state a user should end up in. `prior` is `None` when the user
/// does not exist yet.
pub fn resolve_target_state(
    prior: Option<AccountState>,
    intent: LifecycleIntent,
) -> Result<AccountState, LifecycleError> {
    match (intent.account_staged, intent.account_preserved) {
        (true, true) => Err(LifecycleError::ConflictingIntents),
        (false, true) => match prior {
            None => Err(LifecycleError::CreatePreserved),
            Some(AccountState::Staged) => Err(LifecycleError::StagedToPreserved),
            Some(_) => Ok(AccountState::Preserved),
        },
        (true, false) => match prior {
            Some(AccountState::Active) => Err(LifecycleError::ActiveToStaged),
            _ => Ok(AccountState::Staged),
        },
        (false, false) => Ok(AccountState::Active),
    }
}

/// A directory-side move between two different states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ActivateStaged,
    ActivatePreserved,
    PreserveActive,
    StagePreserved,
}

impl Transition {
    /// The transition taking a user from `from` to `to`. `Ok(None)` when they
    /// are equal; an error for the two forbidden edges.
    pub fn between(from: AccountState, to: AccountState) -> Result<Option<Self>, LifecycleError> {
        use self::AccountState::*;
        match (from, to) {
            (Active, Active) | (Staged, Staged) | (Preserved, Preserved) => Ok(None),
            (Staged, Active) => Ok(Some(Transition::ActivateStaged)),
            (Preserved, Active) => Ok(Some(Transition::ActivatePreserved)),
            (Active, Preserved) => Ok(Some(Transition::PreserveActive)),
            (Preserved, Staged) => Ok(Some(Transition::StagePreserved)),
            (Active, Staged) => Err(LifecycleError::ActiveToStaged),
            (Staged, Preserved) => Err(LifecycleError::StagedToPreserved),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::ActivateStaged => "activate staged user",
            Transition::ActivatePreserved => "activate preserved user",
            Transition::PreserveActive => "preserve active user",
            Transition::StagePreserved => "stage preserved user",
        }
    }
}
