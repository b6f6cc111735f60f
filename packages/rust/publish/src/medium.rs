//! Medium publications API.

use std::path::Path;

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, MediumConfig, Result, resolve_env, transport_error};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, instrument};

use crate::{Media, Post, PostFormat, PublishedPost, PublishingTarget, expect_json, id_string};

/// Publishes to a Medium publication, with an optional uploaded header image.
pub struct MediumTarget {
    client: Client,
    api_url: String,
    token: String,
    publication_id: String,
}

impl MediumTarget {
    pub fn new(client: Client, api_url: &str, token: String, publication_id: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            publication_id,
        }
    }

    /// Resolve the integration token and publication id named by `[medium]`.
    pub fn from_config(client: Client, config: &MediumConfig) -> Result<Self> {
        Ok(Self::new(
            client,
            &config.api_url,
            resolve_env(&config.token_env)?,
            resolve_env(&config.publication_id_env)?,
        ))
    }

    /// Upload an image file; returns its Medium-hosted URL.
    #[instrument(skip(self))]
    async fn upload_image(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ContentPipeError::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "header.png".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| ContentPipeError::Publish(format!("medium image part: {e}")))?;
        let form = Form::new().part("image", part);

        let url = format!("{}/images", self.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let body = expect_json("medium", "image upload", response, Some(201)).await?;
        body["data"]["url"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| ContentPipeError::Publish("medium image upload: no url in response".into()))
    }
}

#[async_trait]
impl PublishingTarget for MediumTarget {
    #[instrument(skip_all, fields(title = %post.title))]
    async fn publish(&self, post: &Post) -> Result<PublishedPost> {
        let header_url = match &post.media {
            Some(Media::LocalImage(path)) => Some(self.upload_image(path).await?),
            Some(Media::ImageUrl(url)) => Some(url.clone()),
            _ => None,
        };

        let content = match header_url {
            Some(url) if post.format == PostFormat::Markdown => {
                format!("![Header Image]({url})\n\n{}", post.body)
            }
            Some(url) => format!("<img src=\"{url}\" alt=\"Header Image\">\n{}", post.body),
            None => post.body.clone(),
        };

        let request = serde_json::json!({
            "title": post.title,
            "contentFormat": post.format,
            "content": content,
            "publishStatus": "public",
        });

        let url = format!("{}/publications/{}/posts", self.api_url, self.publication_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let body = expect_json("medium", "publish", response, Some(201)).await?;
        let data = &body["data"];
        let id = id_string(&data["id"])
            .ok_or_else(|| ContentPipeError::Publish("medium publish: no id in response".into()))?;
        let post_url = data["url"].as_str().map(String::from);

        info!(%id, url = post_url.as_deref().unwrap_or(""), "published to medium");
        Ok(PublishedPost { id, url: post_url })
    }

    fn name(&self) -> &str {
        "medium"
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn target(server: &MockServer) -> MediumTarget {
        MediumTarget::new(Client::new(), &format!("{}/v1", server.uri()), "tok".into(), "pub1".into())
    }

    fn temp_png() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("cp_header_{}.png", uuid::Uuid::now_v7()));
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").expect("write temp image");
        path
    }

    #[tokio::test]
    async fn uploads_header_then_publishes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"url": "https://cdn-images.medium.com/h.png"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/publications/pub1/posts"))
            .and(body_partial_json(serde_json::json!({
                "title": "Tax tips",
                "contentFormat": "markdown",
                "content": "![Header Image](https://cdn-images.medium.com/h.png)\n\n# Body",
                "publishStatus": "public"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "abc123", "url": "https://medium.com/p/abc123"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let post = Post::new("Tax tips", "# Body", PostFormat::Markdown)
            .with_media(Media::LocalImage(temp_png()));
        let published = target(&server).publish(&post).await.unwrap();
        assert_eq!(published.id, "abc123");
        assert_eq!(published.url.as_deref(), Some("https://medium.com/p/abc123"));
    }

    #[tokio::test]
    async fn upload_must_return_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
            .mount(&server)
            .await;

        let post = Post::new("t", "b", PostFormat::Markdown).with_media(Media::LocalImage(temp_png()));
        let err = target(&server).publish(&post).await.unwrap_err();
        assert!(matches!(err, ContentPipeError::Publish(_)));
        assert!(err.to_string().contains("image upload"));
    }

    #[tokio::test]
    async fn missing_image_file_is_io_error() {
        let server = MockServer::start().await;
        let post = Post::new("t", "b", PostFormat::Markdown)
            .with_media(Media::LocalImage("/nonexistent/cp/header.png".into()));
        let err = target(&server).publish(&post).await.unwrap_err();
        assert!(matches!(err, ContentPipeError::Io { .. }));
    }
}
