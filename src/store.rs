use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::error::StruttureError;
use crate::workbook;

/// Sheet the dataset workbook must contain to be considered valid.
pub const REQUIRED_SHEET: &str = "Foglio1";

const DATASET_FILE: &str = "STRUTTURE.xlsx";
const SOURCE_CONFIG_FILE: &str = "app_config.json";

/// On-disk home of the cached dataset and the persisted source config.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: Utf8PathBuf,
}

impl DatasetStore {
    pub fn new() -> Result<Self, StruttureError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.data_dir().join("Strutture_XcSkiing")).ok()
            })
            .ok_or_else(|| {
                StruttureError::Filesystem("unable to resolve application data directory".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dataset_path(&self) -> Utf8PathBuf {
        self.root.join(DATASET_FILE)
    }

    pub fn source_config_path(&self) -> Utf8PathBuf {
        self.root.join(SOURCE_CONFIG_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), StruttureError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| StruttureError::Filesystem(err.to_string()))
    }

    /// Fails closed: absent, unreadable, or missing the required sheet is
    /// invalid. A present-but-broken file is deleted so the next sync
    /// re-downloads instead of tripping over it again.
    pub fn is_valid(&self) -> bool {
        let path = self.dataset_path();
        if !path.as_std_path().exists() {
            return false;
        }
        match workbook::has_sheet(path.as_std_path(), REQUIRED_SHEET) {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!("cached dataset is missing sheet {REQUIRED_SHEET:?}, discarding");
                self.invalidate();
                false
            }
            Err(err) => {
                tracing::warn!("cached dataset is unreadable ({err}), discarding");
                self.invalidate();
                false
            }
        }
    }

    /// Validates a freshly downloaded file and moves it into place.
    ///
    /// A failed validation deletes the temp file and leaves any previous
    /// cached copy untouched. The replace itself is delete-then-rename; the
    /// crash window in between loses only re-downloadable state.
    pub fn commit(&self, temp: &Path) -> Result<(), StruttureError> {
        if let Err(err) = self.validate_artifact(temp) {
            let _ = fs::remove_file(temp);
            return Err(err);
        }

        let dest = self.dataset_path();
        if dest.as_std_path().exists() {
            fs::remove_file(dest.as_std_path())
                .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        }
        fs::rename(temp, dest.as_std_path())
            .map_err(|err| StruttureError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Best-effort removal of the cached dataset.
    pub fn invalidate(&self) {
        let path = self.dataset_path();
        if let Err(err) = fs::remove_file(path.as_std_path()) {
            tracing::debug!("could not remove cached dataset: {err}");
        }
    }

    fn validate_artifact(&self, path: &Path) -> Result<(), StruttureError> {
        if workbook::has_sheet(path, REQUIRED_SHEET)? {
            Ok(())
        } else {
            Err(StruttureError::MissingSheet {
                path: path.to_path_buf(),
                sheet: REQUIRED_SHEET.to_string(),
            })
        }
    }
}
