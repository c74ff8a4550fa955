use crate::freeipa::client::DirectoryClient;
use crate::user::model::UserRecord;
use crate::user::resource::ResourceError;
use crate::user::state::{AccountState, LifecycleError};
use crate::user::{active, preserved, staged};

/// Create/read/update for one lifecycle state, picked by [`StateHandler::for_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateHandler {
    Active,
    Staged,
    Preserved,
}

impl StateHandler {
    pub fn for_state(state: AccountState) -> Self {
        match state {
            AccountState::Active => StateHandler::Active,
            AccountState::Staged => StateHandler::Staged,
            AccountState::Preserved => StateHandler::Preserved,
        }
    }

    pub async fn create<C>(&self, client: &C, plan: &UserRecord) -> Result<UserRecord, ResourceError>
    where
        C: DirectoryClient + ?Sized,
    {
        match self {
            StateHandler::Active => active::create(client, plan).await,
            StateHandler::Staged => staged::create(client, plan).await,
            StateHandler::Preserved => Err(LifecycleError::CreatePreserved.into()),
        }
    }

    pub async fn read<C>(
        &self,
        client: &C,
        prior: &UserRecord,
    ) -> Result<Option<UserRecord>, ResourceError>
    where
        C: DirectoryClient + ?Sized,
    {
        match self {
            StateHandler::Active => active::read(client, prior).await,
            StateHandler::Staged => staged::read(client, prior).await,
            StateHandler::Preserved => preserved::read(client, prior).await,
        }
    }

    /// `status_applied` tells the active handler that a transition already set
    /// the lock flag.
    pub async fn update<C>(
        &self,
        client: &C,
        plan: &UserRecord,
        prior: &UserRecord,
        status_applied: bool,
    ) -> Result<UserRecord, ResourceError>
    where
        C: DirectoryClient + ?Sized,
    {
        match self {
            StateHandler::Active => active::update(client, plan, prior, status_applied).await,
            StateHandler::Staged => staged::update(client, plan, prior).await,
            StateHandler::Preserved => preserved::update(client, plan, prior).await,
        }
    }
}
