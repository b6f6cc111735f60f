//! In-memory record store that records every call made against it.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use contentpipe_formula::Formula;
use contentpipe_shared::{ContentPipeError, Fields, Record, RecordId, Result};

use crate::RecordSource;

/// One call observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    List(String),
    Update(RecordId, Fields),
    Create(Fields),
}

#[derive(Default)]
struct Inner {
    records: Vec<Record>,
    calls: Vec<StoreCall>,
    next_id: usize,
}

/// Ordered in-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_list: bool,
    fail_updates: HashSet<RecordId>,
    update_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: records.len(),
                records,
                calls: Vec::new(),
            }),
            ..Default::default()
        }
    }

    /// Make every `list` call fail as if the store were unreachable.
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Make `update` fail for the given record.
    pub fn failing_update(mut self, id: impl Into<RecordId>) -> Self {
        self.fail_updates.insert(id.into());
        self
    }

    /// Delay every `update` call.
    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-call.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of every call so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Update calls only.
    pub fn updates(&self) -> Vec<(RecordId, Fields)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Update(id, fields) => Some((id.clone(), fields.clone())),
                _ => None,
            })
            .collect()
    }

    /// Current state of a record.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.lock().records.iter().find(|r| r.id.as_str() == id).cloned()
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }
}

#[async_trait]
impl RecordSource for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, filter: &Formula) -> Result<Vec<Record>> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::List(filter.to_string()));
        if self.fail_list {
            return Err(ContentPipeError::Network("store unreachable".into()));
        }
        Ok(inner.records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn update(&self, id: &RecordId, fields: &Fields) -> Result<()> {
        self.lock().calls.push(StoreCall::Update(id.clone(), fields.clone()));

        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates.contains(id) {
            return Err(ContentPipeError::Storage(format!("write rejected for {id}")));
        }

        let mut inner = self.lock();
        let record = inner
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| ContentPipeError::Storage(format!("record {id} not found")))?;
        for (name, value) in fields {
            record.fields.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn create(&self, fields: &Fields) -> Result<RecordId> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Create(fields.clone()));
        inner.next_id += 1;
        let id = RecordId(format!("recMEM{}", inner.next_id));
        inner.records.push(Record::new(id.clone(), fields.clone()));
        Ok(id)
    }
}
