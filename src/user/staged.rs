//! Staged users: the `stageuser_*` commands.

use crate::freeipa::client::DirectoryClient;
use crate::user::model::{UserAttributes, UserRecord};
use crate::user::resource::ResourceError;
use crate::user::state::AccountState;
use tracing::{debug, info};

pub async fn create<C>(client: &C, plan: &UserRecord) -> Result<UserRecord, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    let options = plan.attributes.to_add_options()?;
    let entry = client.stageuser_add(&plan.uid, options).await?;
    info!("Created staged user {}", plan.uid);

    let mut record = plan.clone();
    record.id = Some(plan.uid.clone());
    record.state = Some(AccountState::Staged);
    record.generated_password = entry.first("randompassword");
    Ok(record)
}

pub async fn read<C>(client: &C, prior: &UserRecord) -> Result<Option<UserRecord>, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    let entry = match client.stageuser_show(&prior.uid).await {
        Ok(entry) => entry,
        Err(e) if e.is_not_found() => {
            debug!("Staged user {} not found, dropping it from state", prior.uid);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    // Staged entries are always locked; the flag only matters after activation.
    Ok(Some(UserRecord {
        id: Some(prior.uid.clone()),
        uid: entry.uid().unwrap_or_else(|| prior.uid.clone()),
        state: Some(AccountState::Staged),
        account_disabled: prior.account_disabled,
        account_staged: prior.account_staged,
        account_preserved: prior.account_preserved,
        attributes: UserAttributes::from_entry(&entry, Some(&prior.attributes)),
        generated_password: prior.generated_password.clone(),
    }))
}

pub async fn update<C>(
    client: &C,
    plan: &UserRecord,
    prior: &UserRecord,
) -> Result<UserRecord, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    let changes = plan.attributes.changes_from(&prior.attributes)?;
    if changes.is_empty() {
        debug!("No attribute changes for staged user {}", plan.uid);
    } else {
        match client.stageuser_mod(&plan.uid, changes).await {
            Err(e) if e.is_empty_modlist() => {
                debug!("Directory reported no modifications for {}", plan.uid);
            }
            other => {
                other?;
            }
        }
    }

    let mut record = plan.clone();
    record.id = Some(plan.uid.clone());
    record.state = Some(AccountState::Staged);
    record.generated_password = prior.generated_password.clone();
    Ok(record)
}
