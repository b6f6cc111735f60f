//! `publish-instagram`: post today's scheduled reels and images per property.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use contentpipe_publish::{Media, Post, PostFormat, PublishingTarget};
use contentpipe_shared::{ContentPipeError, Fields, Record, Result};

use super::JobDefinition;
use crate::runner::{Processor, Transition};

const PROPERTY: &str = "property";
const CAPTION: &str = "caption";
const HASHTAGS: &str = "hashtags";
const VIDEO: &str = "video (from reusable_post)";
const IMAGE: &str = "image";
const POST_ID: &str = "external_instagram_post_id";

pub struct PublishInstagram {
    target: Arc<dyn PublishingTarget>,
}

impl PublishInstagram {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "publish-instagram",
        filter: "AND(NOT({property} = ''), {state} = 'READY_TO_PUBLISH', FIND('INSTAGRAM', {platform}), \
                 IS_SAME({publish_date}, TODAY(), 'day'), {external_instagram_post_id} = '')",
        persist: &[POST_ID],
    };

    pub fn new(target: Arc<dyn PublishingTarget>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl Processor for PublishInstagram {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let property = record.require(PROPERTY)?;

        // A reel wins over a still image when both are attached.
        let media = match (record.first_item(VIDEO), record.first_item(IMAGE)) {
            (Some(video), _) => Media::VideoUrl(video),
            (None, Some(image)) => Media::ImageUrl(image),
            (None, None) => {
                return Err(ContentPipeError::validation("record has neither a video nor an image"));
            }
        };

        let caption = format!("{} {}", record.text(CAPTION), record.text(HASHTAGS))
            .trim()
            .to_string();
        let post = Post::new("", caption, PostFormat::Markdown)
            .with_media(media)
            .for_account(property);
        let published = self.target.publish(&post).await?;

        let mut fields = Fields::new();
        fields.insert(POST_ID.into(), published.id.into());
        Ok(Transition::Updated(fields))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use contentpipe_publish::FakeTarget;
    use contentpipe_shared::FieldValue;

    use super::*;
    use crate::jobs::testing::rec;

    fn with_list(mut record: Record, name: &str, items: &[&str]) -> Record {
        record.fields.insert(
            name.to_string(),
            FieldValue::List(items.iter().map(|s| s.to_string()).collect()),
        );
        record
    }

    #[tokio::test]
    async fn reel_preferred_over_image() {
        let target = Arc::new(FakeTarget::named("ig"));
        let job = PublishInstagram::new(target.clone());

        let record = rec(
            "rec1",
            &[("property", "seoul"), ("caption", "Open house"), ("hashtags", "#seoul #home")],
        );
        let record = with_list(record, VIDEO, &["https://cdn.example.com/v.mp4"]);
        let record = with_list(record, IMAGE, &["https://cdn.example.com/i.jpg"]);

        let Transition::Updated(fields) = job.process(&record).await.unwrap() else {
            panic!("expected update");
        };
        assert_eq!(fields[POST_ID].to_text(), "ig-1");

        let post = &target.posts()[0];
        assert_eq!(post.media, Some(Media::VideoUrl("https://cdn.example.com/v.mp4".into())));
        assert_eq!(post.body, "Open house #seoul #home");
        assert_eq!(post.account.as_deref(), Some("seoul"));
    }

    #[tokio::test]
    async fn no_media_is_data_error() {
        let job = PublishInstagram::new(Arc::new(FakeTarget::named("ig")));
        let err = job
            .process(&rec("rec1", &[("property", "seoul")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentPipeError::Validation { .. }));
    }

    #[test]
    fn filter_selects_todays_instagram_posts() {
        let filter = PublishInstagram::DEFINITION.default_filter().unwrap();
        let today = Utc::now().date_naive();
        let date = today.format("%Y-%m-%d").to_string();
        let base = [
            ("property", "seoul"),
            ("state", "READY_TO_PUBLISH"),
            ("platform", "INSTAGRAM, FACEBOOK"),
            ("publish_date", date.as_str()),
        ];

        assert!(filter.matches_on(&rec("a", &base), today));
        let mut posted = base.to_vec();
        posted.push((POST_ID, "1784"));
        assert!(!filter.matches_on(&rec("b", &posted), today));
        let tomorrow = today.succ_opt().unwrap();
        assert!(!filter.matches_on(&rec("c", &base), tomorrow));
    }
}
