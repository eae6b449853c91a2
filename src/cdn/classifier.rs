use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::dataset::{load_dataset, CdnDataset, CdnOptions};
use crate::concurrent::ResultCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Waf,
    Cdn,
    Cloud,
}

impl Category {
    /// Categories in table load order.
    pub const ALL: [Category; 3] = [Category::Waf, Category::Cdn, Category::Cloud];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Waf => "waf",
            Category::Cdn => "cdn",
            Category::Cloud => "cloud",
        }
    }
}

/// Outcome of one lookup; both fields are `None` when unclassified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub provider: Option<String>,
    pub category: Option<Category>,
}

impl Classification {
    pub fn is_classified(&self) -> bool {
        self.provider.is_some()
    }
}

#[derive(Debug, Clone)]
struct NetworkEntry {
    net: IpNet,
    provider: Arc<str>,
    category: Category,
}

/// Ranges flattened out of a dataset: waf, then cdn, then cloud, providers
/// and ranges in document order. Built once; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    entries: Vec<NetworkEntry>,
}

impl NetworkTable {
    pub fn from_dataset(dataset: &CdnDataset) -> Self {
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for category in Category::ALL {
            for (provider, ranges) in dataset.providers(category.as_str()) {
                let provider: Arc<str> = Arc::from(provider);
                for range in ranges {
                    match parse_range(range) {
                        Some(net) => entries.push(NetworkEntry { net, provider: provider.clone(), category }),
                        None => skipped += 1,
                    }
                }
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "skipped unparseable cdn ranges");
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry in load order containing `ip`. Overlaps resolve by order,
    /// not by prefix length.
    fn first_match(&self, ip: IpAddr) -> Option<&NetworkEntry> {
        self.entries.iter().find(|e| e.net.contains(&ip))
    }
}

/// Bare addresses are accepted as single-host networks.
fn parse_range(range: &str) -> Option<IpNet> {
    let range = range.trim();
    range
        .parse::<IpNet>()
        .ok()
        .or_else(|| range.parse::<IpAddr>().ok().map(IpNet::from))
}

/// IP to CDN/WAF/cloud provider classifier.
///
/// Constructed once before a scan and shared read-only between workers; the
/// only mutable part is the memo of past lookups, which is append-only.
pub struct CdnClassifier {
    table: NetworkTable,
    cache: ResultCache<String, Classification>,
    scans: AtomicUsize,
}

impl CdnClassifier {
    /// Load the dataset (cache, remote, or stale cache) and build the table.
    pub async fn load(opts: &CdnOptions) -> Self {
        let dataset = load_dataset(opts).await;
        let classifier = Self::from_dataset(&dataset);
        tracing::info!(networks = classifier.table.len(), "cdn classifier ready");
        classifier
    }

    pub fn from_dataset(dataset: &CdnDataset) -> Self {
        Self::with_table(NetworkTable::from_dataset(dataset))
    }

    /// Classifier that never classifies anything.
    pub fn empty() -> Self {
        Self::with_table(NetworkTable::default())
    }

    fn with_table(table: NetworkTable) -> Self {
        Self { table, cache: ResultCache::new(), scans: AtomicUsize::new(0) }
    }

    pub fn networks(&self) -> usize {
        self.table.len()
    }

    /// Number of times the table was actually walked (cache misses).
    pub fn table_scans(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn check(&self, ip: &str) -> Classification {
        let ip = ip.trim();
        if ip.is_empty() || self.table.is_empty() {
            return Classification::default();
        }
        if let Some(hit) = self.cache.get(&ip.to_string()) {
            return hit;
        }

        let outcome = match ip.parse::<IpAddr>() {
            Ok(addr) => {
                self.scans.fetch_add(1, Ordering::Relaxed);
                self.table
                    .first_match(addr)
                    .map(|e| Classification { provider: Some(e.provider.to_string()), category: Some(e.category) })
                    .unwrap_or_default()
            }
            Err(_) => Classification::default(),
        };
        // two workers missing on the same ip both compute the same answer
        self.cache.insert(ip.to_string(), outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(json: &str) -> CdnDataset {
        CdnDataset::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn table_flattens_in_category_order() {
        let ds = dataset(r#"{"cloud": {"aws": ["3.0.0.0/8"]}, "waf": {"cloudflare": ["104.16.0.0/13", "bogus"]}, "other": {"x": ["5.0.0.0/8"]}}"#);
        let table = NetworkTable::from_dataset(&ds);
        assert_eq!(table.len(), 2);
        assert_eq!(table.entries[0].category, Category::Waf);
        assert_eq!(table.entries[1].category, Category::Cloud);
    }

    #[test]
    fn bare_address_is_single_host() {
        assert_eq!(parse_range("192.0.2.1"), Some("192.0.2.1/32".parse().unwrap()));
        assert_eq!(parse_range("2001:db8::/32"), Some("2001:db8::/32".parse().unwrap()));
        assert_eq!(parse_range("not-a-range"), None);
    }

    #[test]
    fn first_match_wins_over_more_specific() {
        let ds = dataset(r#"{"cdn": {"broad": ["10.0.0.0/8"], "narrow": ["10.1.2.0/24"]}}"#);
        let c = CdnClassifier::from_dataset(&ds);
        assert_eq!(c.check("10.1.2.3").provider.as_deref(), Some("broad"));
    }

    #[test]
    fn negative_results_are_cached() {
        let ds = dataset(r#"{"cdn": {"x": ["10.0.0.0/8"]}}"#);
        let c = CdnClassifier::from_dataset(&ds);
        assert!(!c.check("192.0.2.1").is_classified());
        assert!(!c.check("192.0.2.1").is_classified());
        assert_eq!(c.table_scans(), 1);
    }
}
