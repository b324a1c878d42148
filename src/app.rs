use serde::Serialize;

use crate::error::StruttureError;
use crate::fetch::{self, DatasetClient};
use crate::filter::{self, FilterSpec};
use crate::records::{self, Dataset, Group, Header};
use crate::sources::{self, PointerClient, SourceConfig};
use crate::store::{DatasetStore, REQUIRED_SHEET};
use crate::workbook;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Re-download even when the cached dataset is valid.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub action: String,
    pub url: String,
    pub url_updated: bool,
    pub dataset_path: String,
}

/// Presentation-layer contract: retained groups plus summary counts,
/// structured data only.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Header,
    pub groups: Vec<Group>,
    pub filtered_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<P: PointerClient, D: DatasetClient> {
    store: DatasetStore,
    pointers: P,
    datasets: D,
}

impl<P: PointerClient, D: DatasetClient> App<P, D> {
    pub fn new(store: DatasetStore, pointers: P, datasets: D) -> Self {
        Self {
            store,
            pointers,
            datasets,
        }
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Ensures a valid local dataset exists: pointer freshness check first,
    /// then download-and-commit when the cache is invalid or a re-download is
    /// forced. Offline with a valid cache this is a no-op.
    pub fn sync(
        &self,
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Result<SyncResult, StruttureError> {
        self.store.ensure_root()?;

        sink.event(ProgressEvent {
            message: "phase=Resolve; checking pointer endpoints".to_string(),
        });
        let mut config = SourceConfig::load(&self.store.source_config_path());
        let resolution = sources::resolve(&mut config, &self.pointers);
        if resolution.updated {
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; dataset url updated to {}", resolution.url),
            });
        }

        if !options.force && self.store.is_valid() {
            sink.event(ProgressEvent {
                message: "phase=Store; using cached dataset".to_string(),
            });
            return Ok(SyncResult {
                action: "cache".to_string(),
                url: resolution.url,
                url_updated: resolution.updated,
                dataset_path: self.store.dataset_path().to_string(),
            });
        }

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; downloading {}", resolution.url),
        });
        fetch::fetch_into(
            &self.datasets,
            &resolution.url,
            config.fallback_url(),
            &self.store,
        )?;
        sink.event(ProgressEvent {
            message: "phase=Store; dataset committed".to_string(),
        });

        Ok(SyncResult {
            action: "download".to_string(),
            url: resolution.url,
            url_updated: resolution.updated,
            dataset_path: self.store.dataset_path().to_string(),
        })
    }

    /// Reads the cached dataset sheet into memory.
    pub fn load(&self) -> Result<Dataset, StruttureError> {
        let path = self.store.dataset_path();
        let grid = workbook::read_sheet(path.as_std_path(), REQUIRED_SHEET)?;
        Ok(Dataset::from_grid(grid))
    }

    /// Groups the cached dataset and applies the filter spec.
    pub fn query(
        &self,
        spec: &FilterSpec,
        sink: &dyn ProgressSink,
    ) -> Result<QueryResult, StruttureError> {
        sink.event(ProgressEvent {
            message: "phase=Load; reading cached dataset".to_string(),
        });
        let dataset = self.load()?;
        let header = dataset.header.clone();
        let total_count = dataset.rows.iter().filter(|row| !row.is_blank()).count();

        let groups = records::group_rows(dataset.rows);
        let retained = filter::apply(&header, &groups, spec);
        let filtered_count = retained.iter().map(Group::len).sum();
        sink.event(ProgressEvent {
            message: format!("phase=Filter; retained {filtered_count} of {total_count} records"),
        });

        Ok(QueryResult {
            columns: header,
            groups: retained,
            filtered_count,
            total_count,
        })
    }
}
