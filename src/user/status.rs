use crate::freeipa::client::DirectoryClient;
use crate::freeipa::error::DirectoryError;
use tracing::debug;

/// Lock or unlock an active account. The directory's "already enabled" and
/// "already disabled" replies count as success.
pub async fn apply_account_status<C>(
    client: &C,
    uid: &str,
    disabled: bool,
) -> Result<(), DirectoryError>
where
    C: DirectoryClient + ?Sized,
{
    let result = if disabled {
        client.user_disable(uid).await
    } else {
        client.user_enable(uid).await
    };

    match result {
        Err(e) if e.is_already_in_status() => {
            debug!("{}; nothing to do", e);
            Ok(())
        }
        other => other,
    }
}
