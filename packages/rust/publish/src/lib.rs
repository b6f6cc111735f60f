//! Publishing targets: Medium, WordPress and Instagram.
//!
//! Each target takes a [`Post`] and returns the id (and URL, when the
//! platform reports one) of the published post. Targets never touch the
//! record store; the jobs persist the returned ids.

mod fake;
mod instagram;
mod medium;
mod wordpress;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use contentpipe_shared::{ContentPipeError, Result};
use reqwest::Response;
use serde::Serialize;

pub use fake::FakeTarget;
pub use instagram::{AccountCredentials, InstagramTarget};
pub use medium::MediumTarget;
pub use wordpress::WordPressTarget;

/// Markup of [`Post::body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostFormat {
    Markdown,
    Html,
}

/// Media attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    /// Image file on disk, uploaded by the target before posting.
    LocalImage(PathBuf),
    /// Item already in the target's media library.
    LibraryId(u64),
    /// Publicly reachable image.
    ImageUrl(String),
    /// Publicly reachable video.
    VideoUrl(String),
}

/// Content to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub title: String,
    pub body: String,
    pub format: PostFormat,
    pub media: Option<Media>,
    /// Publish at this time instead of immediately, where supported.
    pub scheduled_at: Option<NaiveDateTime>,
    /// Target-side account, for targets with several (e.g. one per property).
    pub account: Option<String>,
}

impl Post {
    pub fn new(title: impl Into<String>, body: impl Into<String>, format: PostFormat) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            format,
            media: None,
            scheduled_at: None,
            account: None,
        }
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    pub fn scheduled(mut self, at: Option<NaiveDateTime>) -> Self {
        self.scheduled_at = at;
        self
    }

    pub fn for_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// External id of a published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub id: String,
    pub url: Option<String>,
}

/// A blog or social platform.
#[async_trait]
pub trait PublishingTarget: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<PublishedPost>;

    fn name(&self) -> &str;
}

/// Read a JSON body from a response that must carry `expected` (or any 2xx
/// when `None`); anything else is a `Publish` error with the response body.
async fn expect_json(
    target: &str,
    step: &str,
    response: Response,
    expected: Option<u16>,
) -> Result<serde_json::Value> {
    let status = response.status();
    let ok = match expected {
        Some(code) => status.as_u16() == code,
        None => status.is_success(),
    };
    if !ok {
        let body = response.text().await.unwrap_or_default();
        return Err(ContentPipeError::Publish(format!(
            "{target} {step} returned {status}: {body}"
        )));
    }
    response
        .json()
        .await
        .map_err(|e| ContentPipeError::Publish(format!("{target} {step}: malformed response: {e}")))
}

/// A JSON value as an id string (Graph and WordPress ids may be numbers).
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
