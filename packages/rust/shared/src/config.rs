//! Application configuration for contentpipe.
//!
//! User config lives at `~/.contentpipe/contentpipe.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: each section names the environment
//! variable that holds them, and [`resolve_env`] reads it once at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentPipeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentpipe.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentpipe";

// ---------------------------------------------------------------------------
// Config structs (matching contentpipe.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub poll: PollSettings,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub medium: MediumConfig,

    #[serde(default)]
    pub wordpress: WordPressConfig,

    #[serde(default)]
    pub instagram: InstagramConfig,
}

/// Record store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Airtable,
    Local,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Env var holding the Airtable personal access token.
    #[serde(default = "default_airtable_key_env")]
    pub api_key_env: String,

    /// Env var holding the Airtable base id.
    #[serde(default = "default_base_id_env")]
    pub base_id_env: String,

    /// Env var holding the table name or id.
    #[serde(default = "default_table_env")]
    pub table_name_env: String,

    #[serde(default = "default_airtable_url")]
    pub api_url: String,

    /// Optional Airtable view to list from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Database path for the local backend.
    #[serde(default = "default_local_path")]
    pub local_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_key_env: default_airtable_key_env(),
            base_id_env: default_base_id_env(),
            table_name_env: default_table_env(),
            api_url: default_airtable_url(),
            view: None,
            local_path: default_local_path(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Airtable
}
fn default_airtable_key_env() -> String {
    "AIRTABLE_API_KEY".into()
}
fn default_base_id_env() -> String {
    "AIRTABLE_BASE_ID".into()
}
fn default_table_env() -> String {
    "AIRTABLE_TABLE_NAME".into()
}
fn default_airtable_url() -> String {
    "https://api.airtable.com/v0".into()
}
fn default_local_path() -> String {
    "var/contentpipe.db".into()
}

/// `[runner]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Records processed at once. 1 means strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound for one processor invocation. Must cover the poll
    /// deadline plus three requests (submit, last check, publish).
    #[serde(default = "default_record_timeout")]
    pub record_timeout_secs: u64,

    /// Upper bound for each HTTP request to any collaborator.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            record_timeout_secs: default_record_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_record_timeout() -> u64 {
    1200
}
fn default_request_timeout() -> u64 {
    120
}

/// Which generation provider the jobs call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    Openai,
    Gemini,
    /// Pick one of the configured providers per call.
    Random,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderChoice,

    #[serde(default = "default_openai_key_env")]
    pub openai_api_key_env: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_url")]
    pub openai_base_url: String,

    #[serde(default = "default_gemini_key_env")]
    pub gemini_api_key_env: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            openai_api_key_env: default_openai_key_env(),
            openai_model: default_openai_model(),
            openai_base_url: default_openai_url(),
            gemini_api_key_env: default_gemini_key_env(),
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> ProviderChoice {
    ProviderChoice::Openai
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-4o".into()
}
fn default_openai_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_max_tokens() -> u32 {
    4095
}
fn default_temperature() -> f32 {
    1.0
}

/// `[poll]` section: bounds for submit-then-poll collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_poll_initial")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_poll_max")]
    pub max_delay_ms: u64,

    /// Overall deadline across all attempts.
    #[serde(default = "default_poll_deadline")]
    pub deadline_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_poll_attempts(),
            initial_delay_ms: default_poll_initial(),
            max_delay_ms: default_poll_max(),
            deadline_secs: default_poll_deadline(),
        }
    }
}

fn default_poll_attempts() -> u32 {
    30
}
fn default_poll_initial() -> u64 {
    5000
}
fn default_poll_max() -> u64 {
    30_000
}
fn default_poll_deadline() -> u64 {
    600
}

/// How scraped pages are turned into `source_content_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Visible text joined by single spaces.
    Text,
    /// Main content converted to Markdown.
    Markdown,
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_text_mode")]
    pub text_mode: TextMode,

    /// Words that disqualify an element (own text or ancestor id/class)
    /// when extracting company site text.
    #[serde(default = "default_skip_words")]
    pub skip_words: Vec<String>,

    /// Listing page used by `seed-urls`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing: Option<ListingConfig>,

    /// Sitemaps checked by `noindex-check`.
    #[serde(default)]
    pub sitemaps: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            text_mode: default_text_mode(),
            skip_words: default_skip_words(),
            listing: None,
            sitemaps: Vec::new(),
        }
    }
}

fn default_text_mode() -> TextMode {
    TextMode::Text
}
fn default_skip_words() -> Vec<String> {
    [
        "copyright", "사업자", "대표", "whatsapp", "facebook", "kakao", "e-mail", "email", "+82-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// `[scrape.listing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Listing page URL.
    pub url: String,
    /// CSS selector for one article entry.
    pub item_selector: String,
    /// CSS selector for the link inside an entry.
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    /// CSS selector for the publish date inside an entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_selector: Option<String>,
    /// Only accept entries published after this date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_after: Option<String>,
    /// Links containing any of these substrings are dropped.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// When set, the listing lives inside this frame (e.g. `iframe#mainFrame`)
    /// and its `src` is fetched instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_selector: Option<String>,
}

fn default_link_selector() -> String {
    "a[href]".into()
}

/// `[jobs]` section: prompt and text overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_prompt: Option<String>,

    /// Appended to every generated article.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_disclaimer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faq_example: Option<String>,
}

/// `[medium]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumConfig {
    #[serde(default = "default_medium_token_env")]
    pub token_env: String,

    #[serde(default = "default_medium_publication_env")]
    pub publication_id_env: String,

    #[serde(default = "default_medium_url")]
    pub api_url: String,

    /// Directory of `.png` header images.
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            token_env: default_medium_token_env(),
            publication_id_env: default_medium_publication_env(),
            api_url: default_medium_url(),
            image_dir: default_image_dir(),
        }
    }
}

fn default_medium_token_env() -> String {
    "MEDIUM_INTEGRATION_TOKEN".into()
}
fn default_medium_publication_env() -> String {
    "PUBLICATION_ID".into()
}
fn default_medium_url() -> String {
    "https://api.medium.com/v1".into()
}
fn default_image_dir() -> String {
    "images".into()
}

/// `[wordpress]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressConfig {
    #[serde(default)]
    pub site_url: String,

    #[serde(default = "default_wp_user_env")]
    pub username_env: String,

    #[serde(default = "default_wp_password_env")]
    pub password_env: String,

    /// Media library ids eligible as featured images.
    #[serde(default)]
    pub media_ids: Vec<u64>,
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            username_env: default_wp_user_env(),
            password_env: default_wp_password_env(),
            media_ids: Vec::new(),
        }
    }
}

fn default_wp_user_env() -> String {
    "WORDPRESS_APP_USERNAME".into()
}
fn default_wp_password_env() -> String {
    "WORDPRESS_APP_PASSWORD".into()
}

/// `[instagram]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    /// Env var pattern for the account id; `{account}` is replaced.
    #[serde(default = "default_ig_id_pattern")]
    pub account_id_env: String,

    /// Env var pattern for the page access token; `{account}` is replaced.
    #[serde(default = "default_ig_token_pattern")]
    pub access_token_env: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            graph_url: default_graph_url(),
            account_id_env: default_ig_id_pattern(),
            access_token_env: default_ig_token_pattern(),
        }
    }
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v21.0".into()
}
fn default_ig_id_pattern() -> String {
    "INSTAGRAM_{account}_ID".into()
}
fn default_ig_token_pattern() -> String {
    "FACEBOOK_{account}_PAGE_ACCESS_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject settings under which a record could time out between a
    /// publish request and recording its result.
    pub fn validate(&self) -> Result<()> {
        let needed = self
            .poll
            .deadline_secs
            .saturating_add(self.runner.request_timeout_secs.saturating_mul(3));
        if self.runner.record_timeout_secs < needed {
            return Err(ContentPipeError::config(format!(
                "runner.record_timeout_secs ({}) must be at least poll.deadline_secs + 3 * \
                 runner.request_timeout_secs ({needed})",
                self.runner.record_timeout_secs
            )));
        }
        Ok(())
    }
}

/// Get the path to the config directory (`~/.contentpipe/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentPipeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentpipe/contentpipe.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentPipeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContentPipeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentPipeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| ContentPipeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentPipeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required, non-empty environment variable.
pub fn resolve_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ContentPipeError::config(format!(
            "{var_name} is not set. Export it before running this job."
        ))),
    }
}

/// Expand an `{account}` env-var pattern, e.g. `INSTAGRAM_{account}_ID`.
pub fn account_env_name(pattern: &str, account: &str) -> String {
    let normalized: String = account
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    pattern.replace("{account}", &normalized)
}
