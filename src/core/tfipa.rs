use crate::config;
use crate::freeipa::client::{DirectoryClient, FreeIpaClient};
use crate::provider::diagnostics::Diagnostics;
use crate::provider::request::ResourceRequest;
use crate::user::model::UserRecord;
use crate::user::resource::UserResource;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Result of one command: the record to persist (if any) and what went wrong
/// or deserves attention.
#[derive(Debug, Default, Serialize)]
pub struct Outcome {
    pub record: Option<UserRecord>,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    fn new(record: Option<UserRecord>, diagnostics: Diagnostics) -> Self {
        Self {
            record,
            diagnostics,
        }
    }
}

pub fn read_record(path: &Path) -> anyhow::Result<UserRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse record file {}", path.display()))
}

pub struct TfIpa {
    users: UserResource<dyn DirectoryClient>,
}

impl TfIpa {
    pub fn new(config_path: Option<String>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => {
                let path_buf = PathBuf::from(&path);
                let abs_path = if path_buf.is_absolute() {
                    path_buf
                } else {
                    std::env::current_dir()?.join(path_buf)
                };
                info!("Using config file: {}", abs_path.display());
                config::init_from_path(&abs_path.to_string_lossy())?
            }
            None => {
                info!("No config path provided, using default configuration");
                config::init_default()?
            }
        };

        let client = FreeIpaClient::new(&config.freeipa)?;
        info!(
            "FreeIPA client ready for {}",
            config.freeipa.host.as_deref().unwrap_or_default()
        );
        Ok(Self::with_client(Arc::new(client)))
    }

    pub fn with_client(client: Arc<dyn DirectoryClient>) -> Self {
        Self {
            users: UserResource::new(client),
        }
    }

    /// Refresh the prior state, resolve the plan, then create or update.
    pub async fn apply(
        &self,
        plan: UserRecord,
        state: Option<UserRecord>,
        config: Option<UserRecord>,
    ) -> Outcome {
        let mut diags = Diagnostics::new();

        let mut prior = match state {
            Some(state) => match self.users.read(&state, &mut diags).await {
                Ok(refreshed) => refreshed,
                Err(_) => return Outcome::new(Some(state), diags),
            },
            None => None,
        };

        // A changed uid is a replacement: remove the old user first
        if let Some(old) = prior.clone().filter(|p| p.uid != plan.uid) {
            diags.warning(
                format!("user {} will be replaced by {}", old.uid, plan.uid),
                "the uid of a user cannot change in place",
            );
            if self
                .users
                .delete(&ResourceRequest::delete(old), &mut diags)
                .await
                .is_err()
            {
                return Outcome::new(prior, diags);
            }
            prior = None;
        }

        let planned = match self.users.modify_plan(prior.as_ref(), Some(plan), &mut diags) {
            Ok(Some(planned)) => planned,
            Ok(None) | Err(_) => return Outcome::new(prior, diags),
        };

        let is_update = prior.is_some();
        let mut request = match prior.clone() {
            Some(prior_record) => ResourceRequest::update(planned, prior_record),
            None => ResourceRequest::create(planned),
        };
        if let Some(config) = config {
            request = request.with_config(config);
        }

        let result = if is_update {
            self.users.update(&request, &mut diags).await
        } else {
            self.users.create(&request, &mut diags).await
        };

        match result {
            Ok(record) => Outcome::new(Some(record), diags),
            Err(_) => Outcome::new(prior, diags),
        }
    }

    pub async fn destroy(&self, state: UserRecord) -> Outcome {
        let mut diags = Diagnostics::new();
        let request = ResourceRequest::delete(state);
        match self.users.delete(&request, &mut diags).await {
            Ok(()) => Outcome::new(None, diags),
            Err(_) => Outcome::new(request.state, diags),
        }
    }

    pub async fn import(&self, id: &str) -> Outcome {
        let mut diags = Diagnostics::new();
        let record = self.users.import(id, &mut diags).await.ok();
        Outcome::new(record, diags)
    }

    pub async fn show(&self, uid: &str) -> Outcome {
        let mut diags = Diagnostics::new();
        let record = self.users.lookup(uid, &mut diags).await.ok();
        Outcome::new(record, diags)
    }
}
