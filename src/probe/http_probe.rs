//! Probes that only look at the response itself.

use once_cell::sync::Lazy;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use url::Url;

use super::Fragment;
use crate::http_client::Response;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("static selector"));

fn fragment(key: &str, value: Value) -> Fragment {
    let mut f = Fragment::new();
    f.insert(key.to_string(), value);
    f
}

pub fn status_code(resp: &Response) -> Fragment {
    fragment("status_code", json!(resp.status_code))
}

/// Header value when it parses, byte length of the body otherwise.
pub fn content_length(resp: &Response) -> Fragment {
    let len = resp
        .header(CONTENT_LENGTH.as_str())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(resp.body.len() as u64);
    fragment("content_length", json!(len))
}

pub fn content_type(resp: &Response) -> Fragment {
    let ct = resp
        .header(CONTENT_TYPE.as_str())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_string());
    fragment("content_type", json!(ct))
}

/// `Location` header, else the final URL when redirects were followed to somewhere new.
pub fn location(resp: &Response, follow_redirects: bool) -> Fragment {
    if let Some(loc) = resp.header(LOCATION.as_str()) {
        return fragment("location", json!(loc));
    }
    if follow_redirects && !same_url(&resp.url, &resp.orig_url) {
        return fragment("location", json!(resp.url));
    }
    fragment("location", Value::Null)
}

fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub fn extract_title(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let document = Html::parse_document(&text);
    document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

pub fn title(resp: &Response) -> Fragment {
    fragment("title", json!(extract_title(&resp.body)))
}

pub fn response_time(resp: &Response) -> Fragment {
    fragment("response_time", json!(resp.response_time))
}
