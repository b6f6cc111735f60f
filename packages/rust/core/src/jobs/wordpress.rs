//! `publish-wordpress`: publish (or schedule) rendered articles.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::instrument;

use contentpipe_publish::{Media, Post, PostFormat, PublishingTarget};
use contentpipe_shared::{
    ContentPipeError, Fields, Record, Result, STATE_FIELD, SelectionStrategy, Stage, choose,
};

use super::JobDefinition;
use crate::runner::{Processor, Transition};

const TITLE: &str = "title";
const HTML: &str = "html";
const SCHEDULE_DATE: &str = "schedule_date";
const WP_ID: &str = "wp_id";

pub struct PublishWordPress {
    target: Arc<dyn PublishingTarget>,
    media_ids: Vec<u64>,
    strategy: Arc<dyn SelectionStrategy>,
}

impl PublishWordPress {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "publish-wordpress",
        filter: "AND({state} = 'READY_TO_PUBLISH', {wp_id} = '')",
        persist: &[WP_ID, STATE_FIELD],
    };

    /// `media_ids` are featured images already in the WordPress media library.
    pub fn new(
        target: Arc<dyn PublishingTarget>,
        media_ids: Vec<u64>,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Self {
        Self {
            target,
            media_ids,
            strategy,
        }
    }
}

/// ISO 8601 schedule date. An offset is dropped: WordPress reads `date` in site time.
fn parse_schedule(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| ContentPipeError::validation(format!("unparseable {SCHEDULE_DATE}: {text:?}")))
}

#[async_trait]
impl Processor for PublishWordPress {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let title = record.require(TITLE)?;
        let html = record.require(HTML)?;
        let scheduled = record
            .non_blank(SCHEDULE_DATE)
            .map(|s| parse_schedule(&s))
            .transpose()?;

        let mut post = Post::new(title, html, PostFormat::Html).scheduled(scheduled);
        if let Some(id) = choose(self.strategy.as_ref(), &self.media_ids) {
            post = post.with_media(Media::LibraryId(*id));
        }
        let published = self.target.publish(&post).await?;

        let mut fields = Fields::new();
        fields.insert(WP_ID.into(), published.id.into());
        fields.insert(STATE_FIELD.into(), Stage::Published.into());
        Ok(Transition::Updated(fields))
    }
}
