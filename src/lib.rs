// Public API
pub mod cli;
pub mod commands;

// Bootstrap procedure
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod prompt;
pub mod repository;
pub mod runner;
pub mod stages;
pub mod ui;
pub mod version;

mod util;

// Re-export main types
pub use bootstrap::{preflight, Bootstrapper, Preflight, Summary};
pub use config::BootstrapConfig;
pub use error::BootstrapError;
pub use prompt::{Prompter, StdinPrompter};
pub use repository::Repository;
pub use runner::{CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use version::ToolVersion;
