mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use strutture::app::{App, SyncOptions};
use strutture::error::StruttureError;
use strutture::fetch::DatasetClient;
use strutture::filter::FilterSpec;
use strutture::output::JsonOutput;
use strutture::sources::{FALLBACK_URL, PointerClient, PointerDoc};
use strutture::store::{DatasetStore, REQUIRED_SHEET};

/// Always answers with the same pointer document; `None` simulates an
/// unreachable endpoint.
struct MockPointer(Option<String>);

impl PointerClient for MockPointer {
    fn fetch_pointer(&self, _url: &str) -> Result<PointerDoc, StruttureError> {
        match &self.0 {
            Some(url) => Ok(PointerDoc {
                excel_url: Some(url.clone()),
            }),
            None => Err(StruttureError::Http("pointer unreachable".to_string())),
        }
    }
}

#[derive(Clone)]
struct MockDataset {
    ok_urls: Vec<String>,
    payload: Vec<u8>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockDataset {
    fn new(ok_urls: &[&str], payload: Vec<u8>) -> Self {
        Self {
            ok_urls: ok_urls.iter().map(|url| url.to_string()).collect(),
            payload,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DatasetClient for MockDataset {
    fn download(&self, url: &str, destination: &Path) -> Result<(), StruttureError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.ok_urls.iter().any(|ok| ok == url) {
            std::fs::write(destination, &self.payload)
                .map_err(|err| StruttureError::Filesystem(err.to_string()))
        } else {
            Err(StruttureError::Http("unreachable".to_string()))
        }
    }
}

fn test_store() -> (tempfile::TempDir, DatasetStore) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().join("store")).unwrap();
    (dir, DatasetStore::new_with_root(root))
}

fn valid_payload() -> Vec<u8> {
    common::xlsx_bytes(
        REQUIRED_SHEET,
        &[
            &["LUOGO", "TEST o GARA", "CONSIDERAZIONE POST GARA o TEST"],
            &["Dobbiaco", "GARA", "PRIMA SCELTA"],
            &[],
            &["Livigno", "TEST", ""],
        ],
    )
}

#[test]
fn sync_downloads_then_prefers_the_cache() {
    let (_dir, store) = test_store();
    let datasets = MockDataset::new(&[FALLBACK_URL], valid_payload());
    let app = App::new(store, MockPointer(None), datasets.clone());

    let first = app.sync(SyncOptions::default(), &JsonOutput).unwrap();
    assert_eq!(first.action, "download");
    assert_eq!(first.url, FALLBACK_URL);
    assert!(!first.url_updated);

    let second = app.sync(SyncOptions::default(), &JsonOutput).unwrap();
    assert_eq!(second.action, "cache");
    assert_eq!(datasets.calls(), vec![FALLBACK_URL.to_string()]);
}

#[test]
fn force_sync_redownloads_over_a_valid_cache() {
    let (_dir, store) = test_store();
    let datasets = MockDataset::new(&[FALLBACK_URL], valid_payload());
    let app = App::new(store, MockPointer(None), datasets.clone());

    app.sync(SyncOptions::default(), &JsonOutput).unwrap();
    let forced = app.sync(SyncOptions { force: true }, &JsonOutput).unwrap();

    assert_eq!(forced.action, "download");
    assert_eq!(datasets.calls().len(), 2);
}

#[test]
fn pointer_url_is_persisted_and_fallback_covers_its_failure() {
    let (_dir, store) = test_store();
    let fresh = "https://fresh.test/STRUTTURE.xlsx";
    // Fresh URL is down, only the fixed fallback serves the file.
    let datasets = MockDataset::new(&[FALLBACK_URL], valid_payload());
    let app = App::new(
        store.clone(),
        MockPointer(Some(fresh.to_string())),
        datasets.clone(),
    );

    let result = app.sync(SyncOptions::default(), &JsonOutput).unwrap();
    assert_eq!(result.action, "download");
    assert!(result.url_updated);
    assert_eq!(
        datasets.calls(),
        vec![fresh.to_string(), FALLBACK_URL.to_string()]
    );

    let persisted = std::fs::read_to_string(store.source_config_path().as_std_path()).unwrap();
    assert!(persisted.contains(fresh));
}

#[test]
fn exhausted_sources_fail_without_leaving_temp_files() {
    let (_dir, store) = test_store();
    let datasets = MockDataset::new(&[], valid_payload());
    let app = App::new(
        store.clone(),
        MockPointer(Some("https://fresh.test/STRUTTURE.xlsx".to_string())),
        datasets,
    );

    assert_matches!(
        app.sync(SyncOptions::default(), &JsonOutput),
        Err(StruttureError::FetchExhausted { last_url }) if last_url == FALLBACK_URL
    );

    let leftovers: Vec<_> = std::fs::read_dir(store.root().as_std_path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    assert!(!store.dataset_path().as_std_path().exists());
}

#[test]
fn invalid_download_keeps_the_previous_dataset() {
    let (_dir, store) = test_store();
    let good = MockDataset::new(&[FALLBACK_URL], valid_payload());
    let app = App::new(store.clone(), MockPointer(None), good);
    app.sync(SyncOptions::default(), &JsonOutput).unwrap();

    // Both sources now serve a workbook without the required sheet.
    let bad_payload = common::xlsx_bytes("Altro", &[&["LUOGO"]]);
    let bad = MockDataset::new(&[FALLBACK_URL, "https://fresh.test/x.xlsx"], bad_payload);
    let app = App::new(store.clone(), MockPointer(None), bad);

    assert_matches!(
        app.sync(SyncOptions { force: true }, &JsonOutput),
        Err(StruttureError::FetchExhausted { .. })
    );
    assert!(store.is_valid());
}

#[test]
fn query_counts_and_filters_grouped_records() {
    let (_dir, store) = test_store();
    let datasets = MockDataset::new(&[FALLBACK_URL], valid_payload());
    let app = App::new(store, MockPointer(None), datasets);
    app.sync(SyncOptions::default(), &JsonOutput).unwrap();

    let all = app.query(&FilterSpec::default(), &JsonOutput).unwrap();
    assert_eq!(all.total_count, 2);
    assert_eq!(all.filtered_count, 2);
    assert_eq!(all.groups.len(), 2);

    let spec = FilterSpec {
        location: Some("dobbiaco".to_string()),
        ..FilterSpec::default()
    };
    let filtered = app.query(&spec, &JsonOutput).unwrap();
    assert_eq!(filtered.filtered_count, 1);
    assert_eq!(filtered.total_count, 2);
    assert_eq!(
        filtered.columns.value(&filtered.groups[0].rows()[0], "LUOGO"),
        "Dobbiaco"
    );
}
