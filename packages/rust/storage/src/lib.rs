//! Record stores for contentpipe.
//!
//! Every job reads its batch from and writes its results to a [`RecordSource`].
//! Three implementations exist:
//! - [`AirtableStore`]: the Airtable REST API (the production store)
//! - [`LocalStore`]: a libSQL file database, for offline runs
//! - [`MemoryStore`]: an in-memory store that records every call, for tests

mod airtable;
mod local;
mod memory;
mod migrations;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use contentpipe_formula::Formula;
use contentpipe_shared::{Fields, Record, RecordId, Result, StoreBackend, StoreConfig};

pub use airtable::{AirtableSettings, AirtableStore};
pub use local::LocalStore;
pub use memory::{MemoryStore, StoreCall};

/// The external record store.
///
/// `list` returns one complete logical page: implementations follow any
/// pagination cursor themselves. The order of the returned records is the
/// store's order and is stable for a given store state.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// All records matching `filter`, in store order.
    async fn list(&self, filter: &Formula) -> Result<Vec<Record>>;

    /// Write `fields` onto record `id`. Fields not named are left untouched.
    async fn update(&self, id: &RecordId, fields: &Fields) -> Result<()>;

    /// Create a new record and return its id.
    async fn create(&self, fields: &Fields) -> Result<RecordId>;
}

/// Open the store selected by `[store]`, resolving credentials from the environment.
pub async fn open_store(
    config: &StoreConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn RecordSource>> {
    match config.backend {
        StoreBackend::Airtable => {
            let settings = AirtableSettings::from_config(config)?;
            Ok(Arc::new(AirtableStore::new(client, settings)?))
        }
        StoreBackend::Local => Ok(Arc::new(LocalStore::open(Path::new(&config.local_path)).await?)),
    }
}
