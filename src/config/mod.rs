//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_str, ConfigError};
pub use schema::{AppConfig, LoggingConfig, MetricsConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
