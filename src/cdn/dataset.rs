//! Remote CDN/WAF range dataset with an on-disk cache.
//!
//! The cache file holds the last fetched document verbatim; its mtime is the
//! age reference for the TTL. A failed refresh falls back to whatever is on
//! disk, however old.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::ClassifierLoadError;

#[derive(Debug, Clone)]
pub struct CdnOptions {
    pub cache_file: PathBuf,
    pub ttl: Duration,
    pub source_url: String,
    pub fetch_timeout: Duration,
}

/// `{category: {provider: [cidr, ...]}}`, provider order as in the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CdnDataset(Map<String, Value>);

impl CdnDataset {
    pub fn from_slice(data: &[u8]) -> Result<Self, ClassifierLoadError> {
        let value: Value = serde_json::from_slice(data)?;
        Ok(Self::from_value(value))
    }

    /// Anything other than a JSON object is an empty dataset.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => CdnDataset(map),
            _ => CdnDataset::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Providers of one category with their raw range strings. Non-string
    /// range entries are dropped here.
    pub fn providers<'a>(&'a self, category: &str) -> impl Iterator<Item = (&'a str, Vec<&'a str>)> + 'a {
        self.0
            .get(category)
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|providers| providers.iter())
            .map(|(name, ranges)| {
                let ranges = ranges
                    .as_array()
                    .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                    .unwrap_or_default();
                (name.as_str(), ranges)
            })
    }
}

/// True when the file exists and was modified within `ttl`.
pub async fn is_fresh(path: &Path, ttl: Duration) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age <= ttl,
        // mtime in the future; treat as just written
        Err(_) => true,
    }
}

pub async fn read_cache(path: &Path) -> Result<CdnDataset, ClassifierLoadError> {
    let data = tokio::fs::read(path).await?;
    CdnDataset::from_slice(&data)
}

/// Fetch the remote document, returning the raw bytes alongside the parsed dataset.
pub async fn fetch_remote(url: &str, timeout: Duration) -> Result<(Vec<u8>, CdnDataset), ClassifierLoadError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let resp = client.get(url).send().await?;
    let status = resp.status().as_u16();
    if status != 200 {
        return Err(ClassifierLoadError::Status(status));
    }
    let body = resp.bytes().await?.to_vec();
    let dataset = CdnDataset::from_slice(&body)?;
    Ok((body, dataset))
}

async fn write_cache(path: &Path, data: &[u8]) -> Result<(), ClassifierLoadError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, data).await?;
    Ok(())
}

/// Fresh cache, else remote (refreshing the cache), else stale cache, else empty.
pub async fn load_dataset(opts: &CdnOptions) -> CdnDataset {
    if is_fresh(&opts.cache_file, opts.ttl).await {
        match read_cache(&opts.cache_file).await {
            Ok(ds) => {
                tracing::debug!(path = %opts.cache_file.display(), "using cached cdn dataset");
                return ds;
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %opts.cache_file.display(), "cached cdn dataset unreadable, refetching");
            }
        }
    }

    match fetch_remote(&opts.source_url, opts.fetch_timeout).await {
        Ok((raw, ds)) => {
            if let Err(e) = write_cache(&opts.cache_file, &raw).await {
                tracing::warn!(error = %e, path = %opts.cache_file.display(), "failed to write cdn dataset cache");
            }
            tracing::info!(url = %opts.source_url, "refreshed cdn dataset");
            ds
        }
        Err(e) => {
            tracing::warn!(error = %e, url = %opts.source_url, "cdn dataset fetch failed, falling back to disk cache");
            match read_cache(&opts.cache_file).await {
                Ok(ds) => ds,
                Err(e) => {
                    tracing::warn!(error = %e, "no usable cdn dataset, classification disabled");
                    CdnDataset::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_keep_document_order() {
        let ds = CdnDataset::from_slice(br#"{"cdn": {"zeta": ["1.0.0.0/8"], "alpha": ["2.0.0.0/8", 5]}}"#).unwrap();
        let got: Vec<_> = ds.providers("cdn").collect();
        assert_eq!(got, vec![("zeta", vec!["1.0.0.0/8"]), ("alpha", vec!["2.0.0.0/8"])]);
        assert_eq!(ds.providers("waf").count(), 0);
    }

    #[test]
    fn non_object_is_empty() {
        assert!(CdnDataset::from_slice(b"[1,2,3]").unwrap().is_empty());
        assert!(CdnDataset::from_slice(b"not json").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_not_fresh() {
        let path = std::env::temp_dir().join("webprobe-does-not-exist").join("sources_data.json");
        assert!(!is_fresh(&path, Duration::from_secs(86_400)).await);
    }
}
