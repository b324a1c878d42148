use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::StruttureError;
use crate::store::DatasetStore;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub trait DatasetClient: Send + Sync {
    fn download(&self, url: &str, destination: &Path) -> Result<(), StruttureError>;
}

#[derive(Clone)]
pub struct HttpDatasetClient {
    client: Client,
}

impl HttpDatasetClient {
    pub fn new() -> Result<Self, StruttureError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("strutture/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| StruttureError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| StruttureError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl DatasetClient for HttpDatasetClient {
    fn download(&self, url: &str, destination: &Path) -> Result<(), StruttureError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| StruttureError::Http(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "dataset request failed".to_string());
            return Err(StruttureError::Status { status, message });
        }
        // Streamed copy keeps memory bounded regardless of dataset size.
        let mut file =
            File::create(destination).map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Downloads `url` into the store, retrying once against the fallback URL.
///
/// The fallback attempt is skipped when the failing URL already is the
/// fallback. Both attempts failing is fatal for the caller and reported as
/// `FetchExhausted` with the last URL tried; no partial temp files are left
/// behind on any path.
pub fn fetch_into(
    client: &dyn DatasetClient,
    url: &str,
    fallback_url: &str,
    store: &DatasetStore,
) -> Result<(), StruttureError> {
    match fetch_once(client, url, store) {
        Ok(()) => Ok(()),
        Err(err) if url != fallback_url => {
            tracing::warn!("download from {url} failed ({err}), retrying fallback");
            fetch_once(client, fallback_url, store).map_err(|fallback_err| {
                tracing::error!("fallback download failed: {fallback_err}");
                StruttureError::FetchExhausted {
                    last_url: fallback_url.to_string(),
                }
            })
        }
        Err(err) => {
            tracing::error!("download from fallback {url} failed: {err}");
            Err(StruttureError::FetchExhausted {
                last_url: url.to_string(),
            })
        }
    }
}

fn fetch_once(
    client: &dyn DatasetClient,
    url: &str,
    store: &DatasetStore,
) -> Result<(), StruttureError> {
    store.ensure_root()?;
    // Dropping the temp path cleans up after a failed download; a successful
    // commit renames it away first.
    let temp = tempfile::Builder::new()
        .prefix("strutture-dl")
        .suffix(".tmp")
        .tempfile_in(store.root().as_std_path())
        .map_err(|err| StruttureError::Filesystem(err.to_string()))?
        .into_temp_path();
    client.download(url, &temp)?;
    store.commit(&temp)
}
