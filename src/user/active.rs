//! Active users: the `user_*` commands.

use crate::freeipa::client::DirectoryClient;
use crate::freeipa::types::UserEntry;
use crate::user::model::{UserAttributes, UserRecord};
use crate::user::resource::ResourceError;
use crate::user::state::AccountState;
use crate::user::status::apply_account_status;
use tracing::{debug, info, warn};

pub async fn create<C>(client: &C, plan: &UserRecord) -> Result<UserRecord, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    let options = plan.attributes.to_add_options()?;
    let entry = client.user_add(&plan.uid, options).await?;
    info!("Created active user {}", plan.uid);

    apply_account_status(client, &plan.uid, plan.account_disabled).await?;

    let mut record = plan.clone();
    record.id = Some(plan.uid.clone());
    record.state = Some(AccountState::Active);
    record.generated_password = entry.first("randompassword");
    Ok(record)
}

/// `Ok(None)` when the user no longer exists.
pub async fn read<C>(client: &C, prior: &UserRecord) -> Result<Option<UserRecord>, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    read_as(client, prior, AccountState::Active).await
}

/// Shared by the active and preserved readers: both live behind `user_show`.
/// The returned state follows the entry's `preserved` flag, not `state`.
pub(crate) async fn read_as<C>(
    client: &C,
    prior: &UserRecord,
    state: AccountState,
) -> Result<Option<UserRecord>, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    match client.user_show(&prior.uid).await {
        Ok(entry) => {
            // Preserving or restoring outside this tool moves the user between
            // the two states without changing the tree it lives in.
            let found = if entry.is_preserved() {
                AccountState::Preserved
            } else {
                AccountState::Active
            };
            if found != state {
                warn!(
                    "User {} is {} in the directory but recorded as {}",
                    prior.uid, found, state
                );
            }
            Ok(Some(record_from_entry(&entry, prior, found)))
        }
        Err(e) if e.is_not_found() => {
            debug!("User {} not found, dropping it from state", prior.uid);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn record_from_entry(
    entry: &UserEntry,
    prior: &UserRecord,
    state: AccountState,
) -> UserRecord {
    UserRecord {
        id: Some(prior.uid.clone()),
        uid: entry.uid().unwrap_or_else(|| prior.uid.clone()),
        state: Some(state),
        account_disabled: entry.is_disabled(),
        account_staged: prior.account_staged,
        account_preserved: prior.account_preserved,
        attributes: UserAttributes::from_entry(entry, Some(&prior.attributes)),
        generated_password: prior.generated_password.clone(),
    }
}

/// Send changed attributes through `user_mod`, then lock or unlock the
/// account if `account_disabled` changed and `status_applied` is false.
pub async fn update<C>(
    client: &C,
    plan: &UserRecord,
    prior: &UserRecord,
    status_applied: bool,
) -> Result<UserRecord, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    modify_attributes(client, plan, prior).await?;

    if !status_applied && plan.account_disabled != prior.account_disabled {
        apply_account_status(client, &plan.uid, plan.account_disabled).await?;
        info!(
            "User {} is now {}",
            plan.uid,
            if plan.account_disabled { "disabled" } else { "enabled" }
        );
    }

    let mut record = plan.clone();
    record.id = Some(plan.uid.clone());
    record.state = Some(AccountState::Active);
    record.generated_password = prior.generated_password.clone();
    Ok(record)
}

/// `user_mod` with the attribute diff. No call is made for an empty diff, and
/// an `EmptyModlist` reply is not an error.
pub(crate) async fn modify_attributes<C>(
    client: &C,
    plan: &UserRecord,
    prior: &UserRecord,
) -> Result<(), ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    let changes = plan.attributes.changes_from(&prior.attributes)?;
    if changes.is_empty() {
        debug!("No attribute changes for user {}", plan.uid);
        return Ok(());
    }

    debug!(
        "Modifying user {}: {:?}",
        plan.uid,
        changes.keys().collect::<Vec<_>>()
    );
    match client.user_mod(&plan.uid, changes).await {
        Err(e) if e.is_empty_modlist() => {
            debug!("Directory reported no modifications for {}", plan.uid);
            Ok(())
        }
        other => other.map(|_| ()).map_err(Into::into),
    }
}
