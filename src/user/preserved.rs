//! Preserved users. The directory keeps them in the same tree as active
//! users, flagged as preserved, so reads and modifications go through the
//! `user_*` commands.

use crate::freeipa::client::DirectoryClient;
use crate::user::active;
use crate::user::model::UserRecord;
use crate::user::resource::ResourceError;
use crate::user::state::AccountState;

pub async fn read<C>(client: &C, prior: &UserRecord) -> Result<Option<UserRecord>, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    active::read_as(client, prior, AccountState::Preserved).await
}

/// Attribute changes only; a preserved account has no lock status to manage.
pub async fn update<C>(
    client: &C,
    plan: &UserRecord,
    prior: &UserRecord,
) -> Result<UserRecord, ResourceError>
where
    C: DirectoryClient + ?Sized,
{
    active::modify_attributes(client, plan, prior).await?;

    let mut record = plan.clone();
    record.id = Some(plan.uid.clone());
    record.state = Some(AccountState::Preserved);
    record.generated_password = prior.generated_password.clone();
    Ok(record)
}
