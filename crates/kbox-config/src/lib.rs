//! Configuration for kbox
//!
//! Settings are layered, lowest precedence first:
//! - built-in defaults per tool
//! - a TOML file (`$KBOX_CONFIG` or `$XDG_CONFIG_HOME/kbox/config.toml`)
//! - environment variables (`KBOX_RUNTIME`, `KBOX_MODE`, `<TOOL>_IMAGE`,
//!   `<TOOL>_VERSION`, `<TOOL>_MODE`)
//! - command-line overrides

mod defaults;
mod error;
mod settings;

pub use defaults::{DEFAULT_RUNTIME, default_spec};
pub use error::ConfigError;
pub use settings::{CliOverrides, FileConfig, Settings, ToolOverride, config_path};
