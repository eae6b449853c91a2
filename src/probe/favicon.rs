use url::Url;

use super::hash::favicon_mmh3;
use crate::error::ProbeError;
use crate::http_client::{Client, Response};

/// `/favicon.ico` on the origin of the (final) response URL.
pub fn favicon_url(resp: &Response) -> Result<String, ProbeError> {
    let base = Url::parse(&resp.url).map_err(|e| ProbeError::Parse(e.to_string()))?;
    if base.host_str().is_none() {
        return Err(ProbeError::MissingHost(resp.url.clone()));
    }
    let icon = base.join("/favicon.ico").map_err(|e| ProbeError::Parse(e.to_string()))?;
    Ok(icon.to_string())
}

/// Fetch the favicon with the worker's client and hash it.
/// `None` on anything but a 200 with a body.
pub async fn favicon_hash(client: &Client, resp: &Response) -> Result<Option<i32>, ProbeError> {
    let url = favicon_url(resp)?;
    let icon = client.get(&url).await?;
    if icon.status_code != 200 || icon.body.is_empty() {
        tracing::debug!(url = %url, status = icon.status_code, "no favicon");
        return Ok(None);
    }
    favicon_mmh3(&icon.body).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn at(url: &str) -> Response {
        Response {
            url: url.into(),
            orig_url: url.into(),
            status_code: 200,
            headers: HeaderMap::new(),
            body: Vec::new(),
            response_time: 0.0,
        }
    }

    #[test]
    fn icon_on_origin() {
        assert_eq!(favicon_url(&at("https://a.example/deep/path?q=1")).unwrap(), "https://a.example/favicon.ico");
        assert_eq!(favicon_url(&at("http://a.example:8080")).unwrap(), "http://a.example:8080/favicon.ico");
    }

    #[test]
    fn hostless_url_rejected() {
        assert!(favicon_url(&at("data:text/plain,hi")).is_err());
    }
}
