use std::{path::PathBuf, time::Duration};

use reqwest::Url;

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings of the hosted store.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project URL; tables live under `<url>/rest/v1/`.
    pub url: Url,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Directory holding the local storage blob.
    pub data_dir: PathBuf,
    /// `None` runs the board local-only.
    pub remote: Option<RemoteConfig>,
}

impl BoardConfig {
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        BoardConfig {
            data_dir: data_dir.into(),
            remote: None,
        }
    }
}
