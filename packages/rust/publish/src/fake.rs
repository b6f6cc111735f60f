//! Recording target for testing jobs without a platform.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, Result};

use crate::{Post, PublishedPost, PublishingTarget};

/// Accepts every post (ids `"{name}-1"`, `"{name}-2"`, ...) unless told to fail.
#[derive(Debug)]
pub struct FakeTarget {
    name: String,
    fail_with: Option<String>,
    counter: AtomicUsize,
    posts: Mutex<Vec<Post>>,
}

impl FakeTarget {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_with: None,
            counter: AtomicUsize::new(0),
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Reject every post with a `Publish` error.
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PublishingTarget for FakeTarget {
    async fn publish(&self, post: &Post) -> Result<PublishedPost> {
        if let Ok(mut posts) = self.posts.lock() {
            posts.push(post.clone());
        }
        if let Some(message) = &self.fail_with {
            return Err(ContentPipeError::Publish(message.clone()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{n}", self.name);
        Ok(PublishedPost {
            url: Some(format!("https://{}.example.com/p/{id}", self.name)),
            id,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
