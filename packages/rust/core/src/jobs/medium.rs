//! `publish-medium`: publish approved articles with a header image.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use contentpipe_publish::{Media, Post, PostFormat, PublishingTarget};
use contentpipe_shared::{
    ContentPipeError, Fields, Record, Result, STATE_FIELD, SelectionStrategy, Stage, choose,
};

use super::JobDefinition;
use crate::runner::{Processor, Transition};

const TITLE: &str = "title";
const ARTICLE_TEXT: &str = "article_text";
const POST_ID: &str = "post_id";
const MEDIUM_URL: &str = "medium_url";

pub struct PublishMedium {
    target: Arc<dyn PublishingTarget>,
    image_dir: PathBuf,
    strategy: Arc<dyn SelectionStrategy>,
}

impl PublishMedium {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "publish-medium",
        filter: "AND({state} = 'READY_TO_PUBLISH', NOT({title} = ''), NOT({article_text} = ''), {post_id} = '')",
        persist: &[POST_ID, MEDIUM_URL, STATE_FIELD],
    };

    pub fn new(
        target: Arc<dyn PublishingTarget>,
        image_dir: impl Into<PathBuf>,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Self {
        Self {
            target,
            image_dir: image_dir.into(),
            strategy,
        }
    }
}

/// `.png` files in `dir`, sorted by name.
async fn header_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ContentPipeError::io(dir, e))?;
    let mut images = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ContentPipeError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[async_trait]
impl Processor for PublishMedium {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let title = record.require(TITLE)?;
        let article = record.require(ARTICLE_TEXT)?;

        let images = header_images(&self.image_dir).await?;
        let header = choose(self.strategy.as_ref(), &images).ok_or_else(|| {
            ContentPipeError::config(format!("no .png header images in {}", self.image_dir.display()))
        })?;
        debug!(header = %header.display(), "selected header image");

        let post = Post::new(title, article, PostFormat::Markdown)
            .with_media(Media::LocalImage(header.clone()));
        let published = self.target.publish(&post).await?;

        let mut fields = Fields::new();
        fields.insert(POST_ID.into(), published.id.into());
        fields.insert(MEDIUM_URL.into(), published.url.unwrap_or_default().into());
        fields.insert(STATE_FIELD.into(), Stage::Published.into());
        Ok(Transition::Updated(fields))
    }
}

#[cfg(test)]
mod tests {
    use contentpipe_publish::FakeTarget;
    use contentpipe_shared::FirstChoice;
    use contentpipe_storage::MemoryStore;

    use super::*;
    use crate::jobs::testing::rec;
    use crate::runner::{Runner, SilentProgress};

    fn image_dir(files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cp_headers_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        for f in files {
            std::fs::write(dir.join(f), b"img").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn publishes_with_selected_header_and_marks_published() {
        let dir = image_dir(&["b.png", "a.png", "notes.txt"]);
        let target = Arc::new(FakeTarget::named("medium"));
        let store = Arc::new(MemoryStore::new(vec![
            rec(
                "rec1",
                &[("state", "READY_TO_PUBLISH"), ("title", "Tax tips"), ("article_text", "# Body")],
            ),
            rec(
                "rec2",
                &[
                    ("state", "READY_TO_PUBLISH"),
                    ("title", "Old"),
                    ("article_text", "x"),
                    ("post_id", "p0"),
                ],
            ),
        ]));

        let job = PublishMedium::new(target.clone(), &dir, Arc::new(FirstChoice));
        let summary = Runner::new(store.clone())
            .run(
                &PublishMedium::DEFINITION.default_filter().unwrap(),
                &job,
                PublishMedium::DEFINITION.persist,
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(summary.updated, 1);
        let rec1 = store.get("rec1").unwrap();
        assert_eq!(rec1.text("state"), "PUBLISHED");
        assert_eq!(rec1.text("post_id"), "medium-1");
        assert_eq!(rec1.text("medium_url"), "https://medium.example.com/p/medium-1");

        let posts = target.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].media, Some(Media::LocalImage(dir.join("a.png"))));
        assert_eq!(posts[0].format, PostFormat::Markdown);
    }

    #[tokio::test]
    async fn no_header_images_fails_without_publishing() {
        let dir = image_dir(&["readme.md"]);
        let target = Arc::new(FakeTarget::named("medium"));
        let job = PublishMedium::new(target.clone(), &dir, Arc::new(FirstChoice));
        let record = rec(
            "rec1",
            &[("state", "READY_TO_PUBLISH"), ("title", "t"), ("article_text", "b")],
        );
        let err = job.process(&record).await.unwrap_err();
        assert!(matches!(err, ContentPipeError::Config { .. }));
        assert!(target.posts().is_empty());
    }
}
