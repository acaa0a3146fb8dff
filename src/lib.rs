//! Registrar is a lightweight account provisioning library for web
//! applications.
//!
//! Two components, no shared mutable state between them: a user factory
//! ([`user::UserService`]) which validates incoming fields, hashes
//! credentials and persists accounts through an [`user::IdentityStore`],
//! and a [`mail::Notifier`] which dispatches one email per call through a
//! [`mail::MailGateway`]. Neither component calls the other.

#![forbid(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod mail;
pub mod user;

use std::sync::Arc;

use error::Result;
use mail::{Notifier, SmtpGateway};
use user::{PgIdentityStore, UserService};

/// State sharing account services between callers.
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: UserService<PgIdentityStore>,
    /// `None` when the configuration has no `mail` entry.
    pub mail: Option<Notifier<SmtpGateway>>,
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read();

    let store = match config.postgres {
        Some(ref cfg) => PgIdentityStore::connect(cfg).await?,
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            return Err(error::ServerError::MissingConfig("postgres"));
        },
    };

    let pwd = crypto::PasswordManager::new(config.argon2.clone())?;
    let users = UserService::new(store, pwd);

    // handle mail sender.
    let mail = match &config.mail {
        Some(cfg) => {
            let gateway = SmtpGateway::new(cfg)?;
            Some(Notifier::new(Arc::clone(&config), gateway))
        },
        None => None,
    };

    Ok(AppState {
        config,
        users,
        mail,
    })
}
