use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cdn::CdnOptions;
use crate::error::ClassifierLoadError;
use crate::http_client::ClientConfig;

pub const DEFAULT_CDN_SOURCE: &str =
    "https://raw.githubusercontent.com/projectdiscovery/cdncheck/main/sources_data.json";

/// Scan-wide settings. Every field may be supplied by a JSON config file;
/// CLI flags override whatever the file sets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub follow_redirects: bool,
    pub impersonate: String,
    pub proxy: Option<String>,
    pub cdn_cache_dir: Option<PathBuf>,
    pub cdn_cache_ttl_hours: u64,
    pub cdn_source_url: String,
    pub cdn_fetch_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            timeout_secs: 10,
            follow_redirects: false,
            impersonate: "chrome".to_string(),
            proxy: None,
            cdn_cache_dir: None,
            cdn_cache_ttl_hours: 24,
            cdn_source_url: DEFAULT_CDN_SOURCE.to_string(),
            cdn_fetch_timeout_secs: 15,
        }
    }
}

impl ScanConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            follow_redirects: self.follow_redirects,
            impersonate: self.impersonate.clone(),
            proxy: self.proxy.clone(),
        }
    }

    /// Classifier options, caching under the per-user config directory unless
    /// `cdn_cache_dir` is set.
    pub fn cdn_options(&self) -> Result<CdnOptions, ClassifierLoadError> {
        self.cdn_options_under(dirs::config_dir())
    }

    fn cdn_options_under(&self, config_dir: Option<PathBuf>) -> Result<CdnOptions, ClassifierLoadError> {
        let cache_dir = match (&self.cdn_cache_dir, config_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(base)) => base.join("webprobe"),
            (None, None) => return Err(ClassifierLoadError::NoCacheDir),
        };
        Ok(CdnOptions {
            cache_file: cache_dir.join("sources_data.json"),
            ttl: Duration::from_secs(self.cdn_cache_ttl_hours * 60 * 60),
            source_url: self.cdn_source_url.clone(),
            fetch_timeout: Duration::from_secs(self.cdn_fetch_timeout_secs),
        })
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ScanConfig> {
    let Some(path) = path else {
        return Ok(ScanConfig::default());
    };
    let data = std::fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    Ok(cfg)
}
