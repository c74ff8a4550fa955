use crate::config::FreeIpaConfig;
use crate::freeipa::error::{DirectoryError, RpcErrorBody};
use crate::freeipa::types::{Options, UserEntry};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The directory operations the user lifecycle depends on.
///
/// Implementations must report the idempotent replies (`NotFound`,
/// `EmptyModlist`, `AlreadyActive`, `AlreadyInactive`) as their typed
/// [`DirectoryError`] variants; callers never look at message text.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn user_add(&self, uid: &str, options: Options) -> Result<UserEntry, DirectoryError>;
    async fn user_show(&self, uid: &str) -> Result<UserEntry, DirectoryError>;
    async fn user_mod(&self, uid: &str, changes: Options) -> Result<UserEntry, DirectoryError>;
    async fn user_enable(&self, uid: &str) -> Result<(), DirectoryError>;
    async fn user_disable(&self, uid: &str) -> Result<(), DirectoryError>;
    async fn user_del(&self, uid: &str, preserve: bool) -> Result<(), DirectoryError>;
    async fn user_undel(&self, uid: &str) -> Result<(), DirectoryError>;
    async fn user_stage(&self, uid: &str) -> Result<(), DirectoryError>;

    async fn stageuser_add(&self, uid: &str, options: Options)
        -> Result<UserEntry, DirectoryError>;
    async fn stageuser_show(&self, uid: &str) -> Result<UserEntry, DirectoryError>;
    async fn stageuser_mod(&self, uid: &str, changes: Options)
        -> Result<UserEntry, DirectoryError>;
    async fn stageuser_del(&self, uid: &str) -> Result<(), DirectoryError>;
    async fn stageuser_activate(&self, uid: &str) -> Result<(), DirectoryError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: (Vec<Value>, Options),
    id: u32,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// JSON-RPC client for a FreeIPA server using session-cookie authentication.
pub struct FreeIpaClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    api_version: String,
}

impl FreeIpaClient {
    pub fn new(config: &FreeIpaConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let host = config.host.clone().unwrap_or_default();

        let mut builder = Client::builder()
            .user_agent(concat!("tfipa/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure);

        if let Some(ca_path) = &config.ca_certificate {
            let pem = std::fs::read(ca_path).map_err(|e| {
                anyhow::anyhow!("Failed to read CA certificate {}: {}", ca_path.display(), e)
            })?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        if config.insecure {
            warn!("TLS certificate verification is disabled for {}", host);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: format!("https://{}/ipa", host.trim_end_matches('/')),
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            api_version: config.api_version.clone(),
        })
    }

    /// Open a session. The cookie is kept by the client's cookie store.
    pub async fn login(&self) -> Result<(), DirectoryError> {
        let url = format!("{}/session/login_password", self.base_url);
        debug!("Logging in to FreeIPA as {} at {}", self.username, url);

        let response = self
            .client
            .post(&url)
            .header(REFERER, &self.base_url)
            .header(ACCEPT, "text/plain")
            .form(&[("user", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("FreeIPA session opened for {}", self.username);
            return Ok(());
        }

        let reason = response
            .headers()
            .get("X-IPA-Rejection-Reason")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        error!("FreeIPA login rejected with HTTP {} ({})", status, reason);
        Err(DirectoryError::Authentication(format!(
            "HTTP {} ({})",
            status, reason
        )))
    }

    async fn send(&self, request: &RpcRequest<'_>) -> Result<Response, DirectoryError> {
        let url = format!("{}/session/json", self.base_url);
        Ok(self
            .client
            .post(&url)
            .header(REFERER, &self.base_url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?)
    }

    /// Issue one command. `args` holds the positional arguments; the first one
    /// (or the first element of it, for list-taking commands) names the user in
    /// error reports.
    async fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        mut options: Options,
    ) -> Result<Value, DirectoryError> {
        let subject = match args.first() {
            Some(Value::Array(uids)) => uids.first().and_then(|v| v.as_str()),
            Some(v) => v.as_str(),
            None => None,
        }
        .unwrap_or_default()
        .to_string();
        options.insert("version".to_string(), json!(self.api_version));
        let request = RpcRequest {
            method,
            params: (args, options),
            id: 0,
        };

        debug!("FreeIPA call {} for '{}'", method, subject);
        let mut response = self.send(&request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("FreeIPA session missing or expired, logging in again");
            self.login().await?;
            response = self.send(&request).await?;
        }

        let status = response.status();
        if !status.is_success() {
            error!("HTTP error {} for FreeIPA call {}", status, method);
            return Err(DirectoryError::Http(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: RpcResponse = serde_json::from_str(&response.text().await?)?;
        if let Some(err) = body.error {
            let classified = err.classify(&subject);
            debug!("FreeIPA call {} returned error: {}", method, classified);
            return Err(classified);
        }

        body.result
            .ok_or_else(|| DirectoryError::Json(format!("{} reply has no result", method)))
    }

    async fn call_entry(
        &self,
        method: &str,
        uid: &str,
        options: Options,
    ) -> Result<UserEntry, DirectoryError> {
        let mut result = self.call(method, vec![json!(uid)], options).await?;
        let entry = result
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null);
        match entry {
            Value::Object(attrs) => Ok(UserEntry::new(attrs)),
            _ => Err(DirectoryError::Json(format!(
                "{} reply has no entry for '{}'",
                method, uid
            ))),
        }
    }

    async fn call_unit(
        &self,
        method: &str,
        uid: &str,
        options: Options,
    ) -> Result<(), DirectoryError> {
        self.call(method, vec![json!(uid)], options).await.map(|_| ())
    }
}

fn show_options() -> Options {
    let mut options = Options::new();
    options.insert("all".to_string(), json!(true));
    options
}

#[async_trait]
impl DirectoryClient for FreeIpaClient {
    async fn user_add(&self, uid: &str, options: Options) -> Result<UserEntry, DirectoryError> {
        self.call_entry("user_add", uid, options).await
    }

    async fn user_show(&self, uid: &str) -> Result<UserEntry, DirectoryError> {
        self.call_entry("user_show", uid, show_options()).await
    }

    async fn user_mod(&self, uid: &str, changes: Options) -> Result<UserEntry, DirectoryError> {
        self.call_entry("user_mod", uid, changes).await
    }

    async fn user_enable(&self, uid: &str) -> Result<(), DirectoryError> {
        self.call_unit("user_enable", uid, Options::new()).await
    }

    async fn user_disable(&self, uid: &str) -> Result<(), DirectoryError> {
        self.call_unit("user_disable", uid, Options::new()).await
    }

    async fn user_del(&self, uid: &str, preserve: bool) -> Result<(), DirectoryError> {
        let mut options = Options::new();
        options.insert("preserve".to_string(), json!(preserve));
        // user_del takes a list of uids
        self.call("user_del", vec![json!([uid])], options)
            .await
            .map(|_| ())
    }

    async fn user_undel(&self, uid: &str) -> Result<(), DirectoryError> {
        self.call_unit("user_undel", uid, Options::new()).await
    }

    async fn user_stage(&self, uid: &str) -> Result<(), DirectoryError> {
        self.call("user_stage", vec![json!([uid])], Options::new())
            .await
            .map(|_| ())
    }

    async fn stageuser_add(
        &self,
        uid: &str,
        options: Options,
    ) -> Result<UserEntry, DirectoryError> {
        self.call_entry("stageuser_add", uid, options).await
    }

    async fn stageuser_show(&self, uid: &str) -> Result<UserEntry, DirectoryError> {
        self.call_entry("stageuser_show", uid, show_options()).await
    }

    async fn stageuser_mod(
        &self,
        uid: &str,
        changes: Options,
    ) -> Result<UserEntry, DirectoryError> {
        self.call_entry("stageuser_mod", uid, changes).await
    }

    async fn stageuser_del(&self, uid: &str) -> Result<(), DirectoryError> {
        self.call("stageuser_del", vec![json!([uid])], Options::new())
            .await
            .map(|_| ())
    }

    async fn stageuser_activate(&self, uid: &str) -> Result<(), DirectoryError> {
        self.call_unit("stageuser_activate", uid, Options::new())
            .await
    }
}
