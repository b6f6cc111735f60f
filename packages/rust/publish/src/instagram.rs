//! Instagram content publishing through the Graph API.
//!
//! Publishing is two-phase: create a media container, wait for it to reach
//! `FINISHED`, then publish the container. Each property has its own
//! business account whose id and page token live in environment variables
//! named after the property.

use std::collections::HashMap;

use async_trait::async_trait;
use contentpipe_shared::{
    ContentPipeError, InstagramConfig, PollConfig, PollStatus, Result, account_env_name,
    poll_until, resolve_env, transport_error,
};
use reqwest::Client;
use tracing::{debug, info, instrument};

use crate::{Media, Post, PublishedPost, PublishingTarget, expect_json, id_string};

/// Business account credentials for one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account_id: String,
    pub access_token: String,
}

pub struct InstagramTarget {
    client: Client,
    graph_url: String,
    account_id_env: String,
    access_token_env: String,
    poll: PollConfig,
    accounts: HashMap<String, AccountCredentials>,
}

impl InstagramTarget {
    pub fn new(client: Client, config: &InstagramConfig, poll: PollConfig) -> Self {
        Self {
            client,
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            account_id_env: config.account_id_env.clone(),
            access_token_env: config.access_token_env.clone(),
            poll,
            accounts: HashMap::new(),
        }
    }

    /// Register credentials for `account` instead of reading the environment.
    pub fn with_account(mut self, account: impl Into<String>, credentials: AccountCredentials) -> Self {
        self.accounts.insert(account.into(), credentials);
        self
    }

    fn credentials(&self, account: &str) -> Result<AccountCredentials> {
        if let Some(known) = self.accounts.get(account) {
            return Ok(known.clone());
        }
        Ok(AccountCredentials {
            account_id: resolve_env(&account_env_name(&self.account_id_env, account))?,
            access_token: resolve_env(&account_env_name(&self.access_token_env, account))?,
        })
    }

    async fn create_container(&self, creds: &AccountCredentials, post: &Post) -> Result<String> {
        let url = format!("{}/{}/media", self.graph_url, creds.account_id);
        let mut query: Vec<(&str, &str)> = vec![
            ("caption", post.body.as_str()),
            ("access_token", creds.access_token.as_str()),
        ];
        match &post.media {
            Some(Media::VideoUrl(video)) => {
                query.push(("media_type", "REELS"));
                query.push(("video_url", video.as_str()));
            }
            Some(Media::ImageUrl(image)) => query.push(("image_url", image.as_str())),
            _ => return Err(ContentPipeError::validation("instagram post needs an image or video URL")),
        }

        let response = self
            .client
            .post(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(&url, e.without_url()))?;

        let body = expect_json("instagram", "container", response, None).await?;
        id_string(&body["id"])
            .ok_or_else(|| ContentPipeError::Publish("instagram container: no id in response".into()))
    }

    async fn container_status(&self, container_id: &str, token: &str) -> Result<PollStatus<()>> {
        let url = format!("{}/{}", self.graph_url, container_id);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "status_code"), ("access_token", token)])
            .send()
            .await
            .map_err(|e| transport_error(&url, e.without_url()))?;

        let body = expect_json("instagram", "container status", response, None).await?;
        let status = body["status_code"].as_str().unwrap_or_default();
        debug!(container_id, status, "container status");
        Ok(match status {
            "FINISHED" => PollStatus::Ready(()),
            "ERROR" | "EXPIRED" => PollStatus::Failed(format!("container {container_id} is {status}")),
            _ => PollStatus::Pending,
        })
    }

    async fn publish_container(&self, creds: &AccountCredentials, container_id: &str) -> Result<String> {
        let url = format!("{}/{}/media_publish", self.graph_url, creds.account_id);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "creation_id": container_id,
                "access_token": creds.access_token,
            }))
            .send()
            .await
            .map_err(|e| transport_error(&url, e.without_url()))?;

        let body = expect_json("instagram", "media_publish", response, None).await?;
        id_string(&body["id"])
            .ok_or_else(|| ContentPipeError::Publish("instagram media_publish: no id in response".into()))
    }
}

#[async_trait]
impl PublishingTarget for InstagramTarget {
    #[instrument(skip_all, fields(account = post.account.as_deref().unwrap_or("")))]
    async fn publish(&self, post: &Post) -> Result<PublishedPost> {
        let account = post
            .account
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| ContentPipeError::validation("instagram post needs an account"))?;
        let creds = self.credentials(account)?;

        let container_id = self.create_container(&creds, post).await?;
        info!(%container_id, "created media container");

        poll_until(&self.poll, "instagram media container", || {
            self.container_status(&container_id, &creds.access_token)
        })
        .await?;

        let id = self.publish_container(&creds, &container_id).await?;
        info!(%id, "published to instagram");
        Ok(PublishedPost { id, url: None })
    }

    fn name(&self) -> &str {
        "instagram"
    }
}
