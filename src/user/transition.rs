//! Moves between lifecycle states.
//!
//! Each operation issues one directory call and only then flips `state` on
//! the record. Activation also re-applies the lock flag, which the directory
//! resets. That follow-up is a separate call: if it fails, the user has
//! already moved and `state` says so.

use crate::freeipa::client::DirectoryClient;
use crate::user::model::UserRecord;
use crate::user::resource::ResourceError;
use crate::user::state::{AccountState, Transition};
use crate::user::status::apply_account_status;
use tracing::{info, warn};

pub async fn activate_staged_user<C>(client: &C, record: &mut UserRecord) -> Result<(), ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    client.stageuser_activate(&record.uid).await?;
    record.state = Some(AccountState::Active);
    info!("Activated staged user {}", record.uid);
    apply_status_after_activation(client, record).await
}

pub async fn activate_preserved_user<C>(
    client: &C,
    record: &mut UserRecord,
) -> Result<(), ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    client.user_undel(&record.uid).await?;
    record.state = Some(AccountState::Active);
    info!("Restored preserved user {}", record.uid);
    apply_status_after_activation(client, record).await
}

async fn apply_status_after_activation<C>(client: &C, record: &UserRecord) -> Result<(), ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    apply_account_status(client, &record.uid, record.account_disabled)
        .await
        .map_err(|e| {
            warn!(
                "User {} is active but its account status could not be set: {}",
                record.uid, e
            );
            e.into()
        })
}

/// `account_disabled` is taken from `config`, the user-authored tree, rather
/// than from the plan or the prior state.
pub async fn preserve_active_user<C>(
    client: &C,
    record: &mut UserRecord,
    config: &UserRecord,
) -> Result<(), ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    client.user_del(&record.uid, true).await?;
    record.state = Some(AccountState::Preserved);
    record.account_disabled = config.account_disabled;
    info!("Preserved user {}", record.uid);
    Ok(())
}

pub async fn stage_preserved_user<C>(client: &C, record: &mut UserRecord) -> Result<(), ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    client.user_stage(&record.uid).await?;
    record.state = Some(AccountState::Staged);
    info!("Moved preserved user {} back to staging", record.uid);
    Ok(())
}

/// Run `transition` on `record`. Returns true when the lock flag was applied
/// as part of it.
pub async fn run<C>(
    client: &C,
    transition: Transition,
    record: &mut UserRecord,
    config: &UserRecord,
) -> Result<bool, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    match transition {
        Transition::ActivateStaged => activate_staged_user(client, record).await.map(|_| true),
        Transition::ActivatePreserved => {
            activate_preserved_user(client, record).await.map(|_| true)
        }
        Transition::PreserveActive => preserve_active_user(client, record, config)
            .await
            .map(|_| false),
        Transition::StagePreserved => stage_preserved_user(client, record).await.map(|_| false),
    }
}
