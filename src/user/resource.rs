use crate::freeipa::client::DirectoryClient;
use crate::freeipa::error::DirectoryError;
use crate::provider::diagnostics::Diagnostics;
use crate::provider::import::{ImportId, ImportIdError};
use crate::provider::request::ResourceRequest;
use crate::shared::logging;
use crate::user::active;
use crate::user::handler::StateHandler;
use crate::user::model::{validate_uid, AttributeError, UserRecord};
use crate::user::state::{
    resolve_target_state, AccountState, LifecycleError, LifecycleIntent, Transition,
};
use crate::user::transition;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, Instrument};

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error(transparent)]
    ImportId(#[from] ImportIdError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("{operation} requires a {tree} record")]
    MissingRecord {
        operation: &'static str,
        tree: &'static str,
    },

    #[error("uid cannot change from '{from}' to '{to}'; the user must be replaced")]
    UidChanged { from: String, to: String },

    #[error("Cannot import non-existent remote object: {0}")]
    ImportNotFound(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),
}

impl ResourceError {
    /// Errors raised before the directory was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ResourceError::Lifecycle(_)
                | ResourceError::Attribute(_)
                | ResourceError::ImportId(_)
                | ResourceError::MissingRecord { .. }
                | ResourceError::UidChanged { .. }
        )
    }
}

/// Record a failed operation in `diags` and pass the result through.
fn report<T>(
    diags: &mut Diagnostics,
    operation: &str,
    uid: &str,
    result: Result<T, ResourceError>,
) -> Result<T, ResourceError> {
    if let Err(e) = &result {
        diags.error(format!("{} failed for user {}", operation, uid), e.to_string());
    }
    result
}

fn resolve_plan(
    prior: Option<&UserRecord>,
    mut plan: UserRecord,
) -> Result<UserRecord, ResourceError> {
    plan.validate()?;
    // A different uid means a replacement, which starts from nothing
    let prior = prior.filter(|p| p.uid == plan.uid);
    if let Some(prior) = prior {
        plan.attributes.fill_computed(&prior.attributes);
    }
    let prior_state = prior.map(|p| p.state.unwrap_or_default());
    plan.state = Some(resolve_target_state(prior_state, plan.intent())?);
    plan.id = prior_state.map(|_| plan.uid.clone());
    Ok(plan)
}

/// Lifecycle manager for directory users.
pub struct UserResource<C: DirectoryClient + ?Sized> {
    client: Arc<C>,
}

impl<C: DirectoryClient + ?Sized> Clone for UserResource<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: DirectoryClient + ?Sized> UserResource<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        self.client.as_ref()
    }

    /// Resolve the planned lifecycle state. Runs before any directory call and
    /// never contacts the directory. A `None` plan (destroy) passes through.
    pub fn modify_plan(
        &self,
        prior: Option<&UserRecord>,
        plan: Option<UserRecord>,
        diags: &mut Diagnostics,
    ) -> Result<Option<UserRecord>, ResourceError> {
        let Some(plan) = plan else {
            return Ok(None);
        };
        let uid = plan.uid.clone();
        report(diags, "plan", &uid, resolve_plan(prior, plan)).map(Some)
    }

    pub async fn create(
        &self,
        request: &ResourceRequest,
        diags: &mut Diagnostics,
    ) -> Result<UserRecord, ResourceError> {
        let Some(plan) = request.plan.as_ref() else {
            return Err(ResourceError::MissingRecord {
                operation: "create",
                tree: "plan",
            });
        };

        let result = async {
            plan.validate()?;
            let target = resolve_target_state(None, plan.intent())?;
            StateHandler::for_state(target)
                .create(self.client(), plan)
                .await
        }
        .instrument(logging::operation_span("create", &plan.uid))
        .await;

        report(diags, "create", &plan.uid, result)
    }

    /// `Ok(None)` means the user is gone and should be dropped from state.
    pub async fn read(
        &self,
        state: &UserRecord,
        diags: &mut Diagnostics,
    ) -> Result<Option<UserRecord>, ResourceError> {
        let current = state.state.unwrap_or_default();
        let result = StateHandler::for_state(current)
            .read(self.client(), state)
            .instrument(logging::operation_span("read", &state.uid))
            .await;

        if let Ok(None) = result {
            info!("User {} no longer exists in the directory", state.uid);
        }
        report(diags, "read", &state.uid, result)
    }

    pub async fn update(
        &self,
        request: &ResourceRequest,
        diags: &mut Diagnostics,
    ) -> Result<UserRecord, ResourceError> {
        let (Some(plan), Some(state)) = (request.plan.as_ref(), request.state.as_ref()) else {
            return Err(ResourceError::MissingRecord {
                operation: "update",
                tree: "plan and state",
            });
        };
        let config = request.config.as_ref().unwrap_or(plan);

        let result = self
            .apply_update(plan, state, config)
            .instrument(logging::operation_span("update", &plan.uid))
            .await;

        report(diags, "update", &plan.uid, result)
    }

    async fn apply_update(
        &self,
        plan: &UserRecord,
        state: &UserRecord,
        config: &UserRecord,
    ) -> Result<UserRecord, ResourceError> {
        if plan.uid != state.uid {
            return Err(ResourceError::UidChanged {
                from: state.uid.clone(),
                to: plan.uid.clone(),
            });
        }
        plan.validate()?;

        let prior_state = state.state.unwrap_or_default();
        let target = resolve_target_state(Some(prior_state), plan.intent())?;
        let transition = Transition::between(prior_state, target)?;

        let mut working = state.clone();
        let mut status_applied = false;
        if let Some(step) = transition {
            info!(
                "Running '{}' for user {} ({} -> {})",
                step.name(),
                plan.uid,
                prior_state,
                target
            );
            working.account_disabled = plan.account_disabled;
            status_applied = transition::run(self.client(), step, &mut working, config).await?;
        }

        let mut record = StateHandler::for_state(target)
            .update(self.client(), plan, &working, status_applied)
            .await?;

        // Preserving keeps the lock flag the configuration asked for
        if transition == Some(Transition::PreserveActive) {
            record.account_disabled = working.account_disabled;
        }
        Ok(record)
    }

    pub async fn delete(
        &self,
        request: &ResourceRequest,
        diags: &mut Diagnostics,
    ) -> Result<(), ResourceError> {
        let Some(state) = request.state.as_ref() else {
            return Err(ResourceError::MissingRecord {
                operation: "delete",
                tree: "state",
            });
        };

        let current = state.state.unwrap_or_default();
        let result = async {
            match current {
                AccountState::Active | AccountState::Preserved => {
                    self.client().user_del(&state.uid, false).await?
                }
                AccountState::Staged => self.client().stageuser_del(&state.uid).await?,
            }
            info!("Deleted {} user {}", current, state.uid);
            Ok::<(), ResourceError>(())
        }
        .instrument(logging::operation_span("delete", &state.uid))
        .await;

        report(diags, "delete", &state.uid, result)
    }

    /// Import by `uid[;active|;staged|;preserved]`.
    pub async fn import(
        &self,
        id: &str,
        diags: &mut Diagnostics,
    ) -> Result<UserRecord, ResourceError> {
        let result = async {
            let import_id = ImportId::parse(id)?;
            let intent = LifecycleIntent::matching(import_id.state);
            let skeleton = UserRecord {
                id: Some(import_id.uid.clone()),
                uid: import_id.uid.clone(),
                state: Some(import_id.state),
                account_staged: intent.account_staged,
                account_preserved: intent.account_preserved,
                ..UserRecord::default()
            };

            StateHandler::for_state(import_id.state)
                .read(self.client(), &skeleton)
                .await?
                .ok_or_else(|| ResourceError::ImportNotFound(import_id.to_string()))
        }
        .instrument(logging::operation_span("import", id))
        .await;

        report(diags, "import", id, result)
    }

    /// Read-only lookup for the user data source. Tries the active tree (which
    /// also holds preserved users), then the staging area.
    pub async fn lookup(
        &self,
        uid: &str,
        diags: &mut Diagnostics,
    ) -> Result<UserRecord, ResourceError> {
        let result = async {
            validate_uid(uid)?;
            let skeleton = UserRecord {
                uid: uid.to_string(),
                ..UserRecord::default()
            };

            match self.client().user_show(uid).await {
                Ok(entry) => {
                    let state = if entry.is_preserved() {
                        AccountState::Preserved
                    } else {
                        AccountState::Active
                    };
                    let mut record = active::record_from_entry(&entry, &skeleton, state);
                    let intent = LifecycleIntent::matching(state);
                    record.account_staged = intent.account_staged;
                    record.account_preserved = intent.account_preserved;
                    return Ok(record);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }

            let mut staged_skeleton = skeleton.clone();
            staged_skeleton.account_staged = true;
            StateHandler::Staged
                .read(self.client(), &staged_skeleton)
                .await?
                .ok_or_else(|| ResourceError::UserNotFound(uid.to_string()))
        }
        .instrument(logging::operation_span("lookup", uid))
        .await;

        report(diags, "lookup", uid, result)
    }
}
