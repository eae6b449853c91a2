//! Probe registry: a closed set of probe kinds, each turning a response into
//! a fragment of the per-target result.

pub mod dns;
pub mod favicon;
pub mod hash;
pub mod http_probe;

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::net::IpAddr;

use crate::cdn::CdnClassifier;
use crate::error::ProbeError;
use crate::http_client::{Client, Response};
use crate::utils::extract_host;
use dns::HostResolver;

/// Partial result one probe contributes.
pub type Fragment = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    StatusCode,
    ContentLength,
    ContentType,
    Location,
    Title,
    ResponseTime,
    Ip,
    Cdn,
    Favicon,
    /// Body digest with the named algorithm; unknown names produce null.
    Hash(String),
}

impl ProbeKind {
    /// `None` for names that are not probes. `hash:<algo>` selects the digest.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(algo) = name.strip_prefix("hash:").or_else(|| name.strip_prefix("hash=")) {
            return Some(ProbeKind::Hash(algo.to_string()));
        }
        let kind = match name {
            "status_code" => ProbeKind::StatusCode,
            "content_length" => ProbeKind::ContentLength,
            "content_type" => ProbeKind::ContentType,
            "location" => ProbeKind::Location,
            "title" => ProbeKind::Title,
            "response_time" => ProbeKind::ResponseTime,
            "ip" => ProbeKind::Ip,
            "cdn" => ProbeKind::Cdn,
            "favicon" => ProbeKind::Favicon,
            "hash" => ProbeKind::Hash(String::new()),
            _ => return None,
        };
        Some(kind)
    }

    /// Keys this probe writes.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            ProbeKind::StatusCode => &["status_code"],
            ProbeKind::ContentLength => &["content_length"],
            ProbeKind::ContentType => &["content_type"],
            ProbeKind::Location => &["location"],
            ProbeKind::Title => &["title"],
            ProbeKind::ResponseTime => &["response_time"],
            ProbeKind::Ip => &["ip"],
            ProbeKind::Cdn => &["cdn", "cdn_type"],
            ProbeKind::Favicon => &["favicon_hash"],
            ProbeKind::Hash(_) => &["body_hash"],
        }
    }

    fn null_fragment(&self) -> Fragment {
        self.keys().iter().map(|k| (k.to_string(), Value::Null)).collect()
    }

    fn needs_ip(&self) -> bool {
        matches!(self, ProbeKind::Ip | ProbeKind::Cdn)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Hash(algo) => write!(f, "hash:{}", algo),
            ProbeKind::Favicon => f.write_str("favicon"),
            other => f.write_str(other.keys()[0]),
        }
    }
}

/// Enabled probes, deduplicated, unknown names dropped.
#[derive(Debug, Clone, Default)]
pub struct ProbeSet {
    kinds: Vec<ProbeKind>,
}

impl ProbeSet {
    pub fn new(kinds: impl IntoIterator<Item = ProbeKind>) -> Self {
        let mut set = Self::default();
        for k in kinds {
            set.insert(k);
        }
        set
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for name in names {
            match ProbeKind::from_name(name.as_ref()) {
                Some(k) => set.insert(k),
                None => {
                    tracing::debug!(probe = name.as_ref(), "ignoring unknown probe");
                }
            }
        }
        set
    }

    pub fn insert(&mut self, kind: ProbeKind) {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    pub fn contains(&self, kind: &ProbeKind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeKind> {
        self.kinds.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Merged fragments for one target. Always carries `url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbeResult(Map<String, Value>);

impl ProbeResult {
    pub fn new(url: &str) -> Self {
        let mut map = Map::new();
        map.insert("url".to_string(), json!(url));
        Self(map)
    }

    pub fn merge(&mut self, fragment: Fragment) {
        self.0.extend(fragment);
    }

    pub fn url(&self) -> &str {
        self.0.get("url").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Runs enabled probes against one response. `client` is the worker's own
/// client, reused for the favicon fetch so it shares timeout, proxy and profile.
pub struct ProbeRunner<'a> {
    client: &'a Client,
    resolver: &'a dyn HostResolver,
    classifier: Option<&'a CdnClassifier>,
}

impl<'a> ProbeRunner<'a> {
    pub fn new(
        client: &'a Client,
        resolver: &'a dyn HostResolver,
        classifier: Option<&'a CdnClassifier>,
    ) -> Self {
        Self { client, resolver, classifier }
    }

    pub async fn run(&self, response: &Response, enabled: &ProbeSet) -> ProbeResult {
        let mut result = ProbeResult::new(&response.url);

        // ip and cdn share one lookup per target
        let resolved = if enabled.iter().any(ProbeKind::needs_ip) {
            Some(self.resolve(response).await)
        } else {
            None
        };

        for kind in enabled.iter() {
            let fragment = match self.run_one(kind, response, resolved.as_ref()).await {
                Ok(f) => f,
                Err(e) => {
                    tracing::debug!(url = %response.url, probe = %kind, error = %e, "probe failed");
                    kind.null_fragment()
                }
            };
            result.merge(fragment);
        }
        result
    }

    async fn resolve(&self, response: &Response) -> Result<IpAddr, ProbeError> {
        let host = extract_host(&response.url).ok_or_else(|| ProbeError::MissingHost(response.url.clone()))?;
        self.resolver.resolve(&host).await
    }

    async fn run_one(
        &self,
        kind: &ProbeKind,
        response: &Response,
        resolved: Option<&Result<IpAddr, ProbeError>>,
    ) -> Result<Fragment, ProbeError> {
        let fragment = match kind {
            ProbeKind::StatusCode => http_probe::status_code(response),
            ProbeKind::ContentLength => http_probe::content_length(response),
            ProbeKind::ContentType => http_probe::content_type(response),
            ProbeKind::Location => http_probe::location(response, self.client.config().follow_redirects),
            ProbeKind::Title => http_probe::title(response),
            ProbeKind::ResponseTime => http_probe::response_time(response),
            ProbeKind::Ip => {
                let ip = resolved_ip(resolved)?;
                single("ip", json!(ip.to_string()))
            }
            ProbeKind::Cdn => {
                let ip = resolved_ip(resolved)?;
                let hit = match self.classifier {
                    Some(c) => c.check(&ip.to_string()),
                    None => Default::default(),
                };
                let mut f = Fragment::new();
                f.insert("cdn".into(), json!(hit.provider));
                f.insert("cdn_type".into(), json!(hit.category.map(|c| c.as_str())));
                f
            }
            ProbeKind::Favicon => {
                let h = favicon::favicon_hash(self.client, response).await?;
                single("favicon_hash", json!(h))
            }
            ProbeKind::Hash(algo) => single("body_hash", json!(hash::body_hash(&response.body, algo)?)),
        };
        Ok(fragment)
    }
}

fn resolved_ip(resolved: Option<&Result<IpAddr, ProbeError>>) -> Result<IpAddr, ProbeError> {
    match resolved {
        Some(Ok(ip)) => Ok(*ip),
        Some(Err(e)) => Err(e.clone()),
        None => Err(ProbeError::Parse("address was not resolved".into())),
    }
}

fn single(key: &str, value: Value) -> Fragment {
    let mut f = Fragment::new();
    f.insert(key.to_string(), value);
    f
}
