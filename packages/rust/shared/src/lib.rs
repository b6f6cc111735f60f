//! Shared types, error model, and configuration for contentpipe.
//!
//! This crate is the foundation depended on by all other contentpipe crates.
//! It provides:
//! - [`ContentPipeError`] and [`ErrorKind`], the unified error model
//! - Domain types ([`Record`], [`RecordId`], [`FieldValue`], [`Stage`])
//! - Configuration ([`AppConfig`], config loading, env-var secrets)
//! - Bounded polling ([`poll_until`]) and selection strategies

pub mod config;
pub mod error;
pub mod http;
pub mod poll;
pub mod select;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GenerationConfig, InstagramConfig, JobsConfig, ListingConfig, MediumConfig,
    PollSettings, ProviderChoice, RunnerConfig, ScrapeConfig, StoreBackend, StoreConfig, TextMode,
    WordPressConfig, account_env_name, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_env,
};
pub use error::{ContentPipeError, ErrorKind, Result};
pub use http::{USER_AGENT, build_client, transport_error};
pub use poll::{PollConfig, PollStatus, poll_until};
pub use select::{FirstChoice, RoundRobin, SelectionStrategy, UniformRandom, choose};
pub use types::{FieldValue, Fields, Record, RecordId, STATE_FIELD, Stage};
