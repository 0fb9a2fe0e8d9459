//! Configuration management
//!
//! Settings are loaded from several sources and merged in priority order.
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Environment variables (`KILN_*`, `KILN_OVERRIDE_<NAME>`)
//! 2. A config file passed to [`Config::build`]
//! 3. Global `<kiln home>/config.json` (`$KILN_HOME` or the platform config dir)
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_env::config::Config;
//! use std::path::Path;
//!
//! let config = Config::build(Some(Path::new("/etc/kiln.json")), true).unwrap();
//! println!("Channel alias: {}", config.channel_alias);
//! println!("Solve timeout: {:?}", config.solve_timeout_duration());
//! ```

#[allow(clippy::module_inception)]
mod config;
mod source;

pub use config::Config;
pub use source::{ConfigLoader, ConfigSource, RawConfig};
