//! Campus event management: colleges publish events, students register and check in, and
//! administrators pull participation, attendance and feedback reports.
//!
//! Everything goes through [`EventManager`], which owns one SQLite connection. The registration,
//! attendance and feedback rules live in their own modules as methods on it.

use anyhow::Result;

pub mod attendance;
pub mod auth;
pub mod cli;
pub mod display;
pub mod error;
pub mod events;
pub mod feedback;
pub mod manager;
pub mod models;
pub mod registration;
pub mod reports;
pub mod response;
pub mod schema;
pub mod settings;
pub mod validation;

pub use error::{Entity, Error, ErrorKind};
pub use manager::EventManager;
pub use settings::Settings;

/// Installs the `tracing` subscriber for a binary, writing to stderr. `RUST_LOG` takes
/// precedence over the configured filter.
pub fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter));

    // A subscriber installed earlier (e.g. by a test harness) stays in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Loads the layered configuration, installs logging and opens the configured database.
pub fn create_default_manager() -> Result<(EventManager, Settings)> {
    let settings = Settings::load()?;
    init_tracing(&settings);

    let manager = EventManager::from_settings(&settings)?;
    Ok((manager, settings))
}
