// Re-export modules for testing and external use
pub mod freeipa {
    pub mod client;
    pub mod error;
    pub mod types;

    pub use client::{DirectoryClient, FreeIpaClient};
    pub use error::DirectoryError;
    pub use types::{Options, UserEntry};
}

pub mod provider {
    pub mod diagnostics;
    pub mod import;
    pub mod request;

    pub use diagnostics::{Diagnostic, Diagnostics, Severity};
    pub use import::ImportId;
    pub use request::ResourceRequest;
}

pub mod user {
    pub mod active;
    pub mod handler;
    pub mod model;
    pub mod preserved;
    pub mod resource;
    pub mod staged;
    pub mod state;
    pub mod status;
    pub mod transition;

    pub use model::{UserAttributes, UserRecord};
    pub use resource::{ResourceError, UserResource};
    pub use state::{resolve_target_state, AccountState, LifecycleError, LifecycleIntent};
}

pub mod shared {
    pub mod logging;
}

pub mod core {
    pub mod tfipa;
}

pub mod config;

// Re-export commonly used types for easier testing and external use
pub use core::tfipa::TfIpa;
pub use freeipa::client::{DirectoryClient, FreeIpaClient};
pub use user::resource::UserResource;
