use crate::user::model::UserRecord;
use serde::{Deserialize, Serialize};

/// The three attribute trees the framework hands to an operation.
///
/// `plan` is the proposed new record, `state` the prior persisted one and
/// `config` the raw user-authored values. Create has no `state`, delete has no
/// `plan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRequest {
    #[serde(default)]
    pub plan: Option<UserRecord>,
    #[serde(default)]
    pub state: Option<UserRecord>,
    #[serde(default)]
    pub config: Option<UserRecord>,
}

impl ResourceRequest {
    pub fn create(plan: UserRecord) -> Self {
        Self {
            config: Some(plan.clone()),
            plan: Some(plan),
            state: None,
        }
    }

    pub fn update(plan: UserRecord, state: UserRecord) -> Self {
        Self {
            config: Some(plan.clone()),
            plan: Some(plan),
            state: Some(state),
        }
    }

    pub fn delete(state: UserRecord) -> Self {
        Self {
            plan: None,
            state: Some(state),
            config: None,
        }
    }

    /// Replace the config tree when it differs from the plan.
    pub fn with_config(mut self, config: UserRecord) -> Self {
        self.config = Some(config);
        self
    }
}
