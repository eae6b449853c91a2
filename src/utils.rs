use ahash::AHashSet;
use std::path::Path;
use url::Url;

/// Prefix scheme-less targets with `http://`, the default a curl-style client applies.
pub fn normalize_target(target: &str) -> String {
    let target = target.trim();
    if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}", target)
    }
}

pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| u.host_str().map(|s| s.trim_matches(|c| c == '[' || c == ']').to_string()))
}

/// Trim, drop blanks, keep first occurrence of duplicates.
pub fn dedup_targets<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = AHashSet::new();
    let mut out = Vec::new();
    for t in raw {
        let t = t.as_ref().trim();
        if t.is_empty() {
            continue;
        }
        if seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}

pub fn read_targets(path: &Path) -> anyhow::Result<Vec<String>> {
    let data = std::fs::read_to_string(path)?;
    Ok(data.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
}
