use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::StruttureError;

/// Fixed dataset location, always resolvable; never mutated.
pub const FALLBACK_URL: &str = "https://file.garden/Z-hU1H4Shk27aYus/STRUTTURE.xlsx";

/// Pointer endpoints advertising the current canonical dataset URL, in
/// priority order.
pub const POINTER_URLS: &[&str] = &[
    "https://raw.githubusercontent.com/mattygoi/strutture/main/latest.json",
    "https://file.garden/Z-hU1H4Shk27aYus/latest.json",
];

const POINTER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize, Serialize)]
struct PersistedSource {
    last_working_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

/// Durable source-selection state. Loaded once at startup, written back
/// through `save` after each mutation.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    path: Utf8PathBuf,
    preferred_url: String,
    fallback_url: String,
    pointer_urls: Vec<String>,
}

impl SourceConfig {
    /// Loads the persisted config; absence or corruption falls back to the
    /// default URL (re-persisted on first load, best effort).
    pub fn load(path: &Utf8Path) -> Self {
        let mut config = Self {
            path: path.to_owned(),
            preferred_url: FALLBACK_URL.to_string(),
            fallback_url: FALLBACK_URL.to_string(),
            pointer_urls: POINTER_URLS.iter().map(|url| url.to_string()).collect(),
        };

        match Self::read_persisted(path) {
            Ok(Some(persisted)) => config.preferred_url = persisted.last_working_url,
            Ok(None) => {
                if let Err(err) = config.save() {
                    tracing::warn!("could not persist initial source config: {err}");
                }
            }
            Err(err) => {
                tracing::warn!("unreadable source config, using fallback url: {err}");
            }
        }

        config
    }

    pub fn with_endpoints(
        path: &Utf8Path,
        fallback_url: &str,
        pointer_urls: Vec<String>,
    ) -> Self {
        let mut config = Self {
            path: path.to_owned(),
            preferred_url: fallback_url.to_string(),
            fallback_url: fallback_url.to_string(),
            pointer_urls,
        };
        if let Ok(Some(persisted)) = Self::read_persisted(path) {
            config.preferred_url = persisted.last_working_url;
        }
        config
    }

    fn read_persisted(path: &Utf8Path) -> Result<Option<PersistedSource>, StruttureError> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| StruttureError::ConfigRead(path.as_std_path().to_path_buf()))?;
        let persisted = serde_json::from_str(&content)
            .map_err(|err| StruttureError::ConfigParse(err.to_string()))?;
        Ok(Some(persisted))
    }

    pub fn preferred_url(&self) -> &str {
        &self.preferred_url
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub fn pointer_urls(&self) -> &[String] {
        &self.pointer_urls
    }

    pub fn set_preferred_url(&mut self, url: &str) -> Result<(), StruttureError> {
        self.preferred_url = url.to_string();
        self.save()
    }

    pub fn save(&self) -> Result<(), StruttureError> {
        let persisted = PersistedSource {
            last_working_url: self.preferred_url.clone(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        let content = serde_json::to_vec_pretty(&persisted)
            .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), self.path.as_std_path())
            .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Pointer-endpoint document; any other shape is treated as "no update".
#[derive(Debug, Default, Deserialize)]
pub struct PointerDoc {
    #[serde(default)]
    pub excel_url: Option<String>,
}

pub trait PointerClient: Send + Sync {
    fn fetch_pointer(&self, url: &str) -> Result<PointerDoc, StruttureError>;
}

#[derive(Clone)]
pub struct PointerHttpClient {
    client: Client,
}

impl PointerHttpClient {
    pub fn new() -> Result<Self, StruttureError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("strutture/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| StruttureError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(POINTER_TIMEOUT)
            .build()
            .map_err(|err| StruttureError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl PointerClient for PointerHttpClient {
    fn fetch_pointer(&self, url: &str) -> Result<PointerDoc, StruttureError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| StruttureError::Http(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "pointer request failed".to_string());
            return Err(StruttureError::Status { status, message });
        }
        response
            .json::<PointerDoc>()
            .map_err(|err| StruttureError::Http(err.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub url: String,
    pub updated: bool,
}

/// Best-effort freshness check over the pointer endpoints.
///
/// The first pointer that yields a document with an `excel_url` wins; the
/// preferred URL is updated and persisted only when it differs. Every pointer
/// failure is swallowed so the tool stays usable fully offline.
pub fn resolve(config: &mut SourceConfig, client: &dyn PointerClient) -> Resolution {
    for pointer_url in config.pointer_urls().to_vec() {
        let doc = match client.fetch_pointer(&pointer_url) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::debug!("pointer {pointer_url} failed: {err}");
                continue;
            }
        };
        let Some(excel_url) = doc.excel_url else {
            tracing::debug!("pointer {pointer_url} carried no excel_url, ignoring");
            continue;
        };
        if excel_url == config.preferred_url() {
            return Resolution {
                url: excel_url,
                updated: false,
            };
        }
        if let Err(err) = config.set_preferred_url(&excel_url) {
            tracing::warn!("could not persist updated source url: {err}");
        }
        return Resolution {
            url: excel_url,
            updated: true,
        };
    }

    Resolution {
        url: config.preferred_url().to_string(),
        updated: false,
    }
}
