
use std::time::Duration;
use test_utils::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use webprobe::cdn::{load_dataset, Category, CdnClassifier, CdnDataset, CdnOptions};

const DATASET: &str = r#"{
    "waf": {"cloudflare": ["104.16.0.0/13", "2606:4700::/32"]},
    "cdn": {"fastly": ["151.101.0.0/16"], "akamai": ["23.0.0.0/12"]},
    "cloud": {"aws": ["3.0.0.0/8"]}
}"#;

// nothing listens on the discard port
const UNREACHABLE: &str = "http://127.0.0.1:9/sources_data.json";

fn options(dir: &TempDir, ttl: Duration) -> CdnOptions {
    CdnOptions {
        cache_file: dir.0.join("sources_data.json"),
        ttl,
        source_url: UNREACHABLE.to_string(),
        fetch_timeout: Duration::from_secs(2),
    }
}

const OLD_DATASET: &str = r#"{"cdn": {"old": ["10.0.0.0/8"]}}"#;

/// Answers every request with `status` and `body`, one connection at a time.
async fn serve_dataset(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else { break };
            let mut req = Vec::new();
            let mut buf = [0u8; 1024];
            while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                match sock.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => req.extend_from_slice(&buf[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(body.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });
    format!("http://{}/sources_data.json", addr)
}

fn expired_cache(dir: &TempDir, source_url: String) -> CdnOptions {
    let mut opts = options(dir, Duration::ZERO);
    opts.source_url = source_url;
    std::fs::write(&opts.cache_file, OLD_DATASET).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    opts
}

fn classifier() -> CdnClassifier {
    CdnClassifier::from_dataset(&CdnDataset::from_slice(DATASET.as_bytes()).unwrap())
}

#[test]
fn classifies_by_category() {
    let c = classifier();
    let cf = c.check("104.16.5.5");
    assert_eq!(cf.provider.as_deref(), Some("cloudflare"));
    assert_eq!(cf.category, Some(Category::Waf));

    let fastly = c.check("151.101.1.1");
    assert_eq!(fastly.provider.as_deref(), Some("fastly"));
    assert_eq!(fastly.category, Some(Category::Cdn));

    let aws = c.check("3.3.3.3");
    assert_eq!(aws.category, Some(Category::Cloud));

    assert_eq!(c.check("2606:4700::1111").provider.as_deref(), Some("cloudflare"));
    assert!(!c.check("192.0.2.1").is_classified());
}

#[test]
fn repeated_check_is_idempotent_and_cached() {
    let c = classifier();
    let first = c.check("151.101.1.1");
    let second = c.check("151.101.1.1");
    assert_eq!(first, second);
    assert_eq!(c.table_scans(), 1);
}

#[test]
fn malformed_input_is_unclassified() {
    let c = classifier();
    assert!(!c.check("").is_classified());
    assert!(!c.check("not-an-ip").is_classified());
    assert!(!c.check("999.1.1.1").is_classified());
    assert_eq!(c.table_scans(), 0);
}

#[test]
fn empty_table_classifies_nothing() {
    let c = CdnClassifier::empty();
    for ip in ["104.16.5.5", "garbage", ""] {
        let hit = c.check(ip);
        assert_eq!(hit.provider, None);
        assert_eq!(hit.category, None);
    }
    assert_eq!(c.networks(), 0);
}

#[test]
fn concurrent_checks_agree() {
    let c = std::sync::Arc::new(classifier());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = c.clone();
            std::thread::spawn(move || c.check("23.1.2.3"))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().provider.as_deref(), Some("akamai"));
    }
}

#[tokio::test]
async fn fresh_cache_is_used_without_fetch() {
    let dir = TempDir::new("fresh");
    let opts = options(&dir, Duration::from_secs(3600));
    std::fs::write(&opts.cache_file, DATASET).unwrap();

    let c = CdnClassifier::load(&opts).await;
    assert_eq!(c.networks(), 5);
    assert_eq!(c.check("151.101.1.1").provider.as_deref(), Some("fastly"));
}

#[tokio::test]
async fn stale_cache_survives_failed_fetch() {
    let dir = TempDir::new("stale");
    let opts = options(&dir, Duration::ZERO);
    std::fs::write(&opts.cache_file, DATASET).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let ds = load_dataset(&opts).await;
    assert!(!ds.is_empty());
    // fallback never rewrites the cache
    assert_eq!(std::fs::read_to_string(&opts.cache_file).unwrap(), DATASET);
}

#[tokio::test]
async fn no_cache_and_no_network_gives_empty_classifier() {
    let dir = TempDir::new("none");
    let opts = options(&dir, Duration::from_secs(3600));

    let c = CdnClassifier::load(&opts).await;
    assert_eq!(c.networks(), 0);
    assert!(!c.check("104.16.5.5").is_classified());
    assert!(!opts.cache_file.exists());
}

#[tokio::test]
async fn corrupt_cache_is_treated_as_missing() {
    let dir = TempDir::new("corrupt");
    let opts = options(&dir, Duration::from_secs(3600));
    std::fs::write(&opts.cache_file, b"{not json").unwrap();

    let c = CdnClassifier::load(&opts).await;
    assert_eq!(c.networks(), 0);
}

#[tokio::test]
async fn expired_cache_is_refetched_and_overwritten() {
    let dir = TempDir::new("refetch");
    let opts = expired_cache(&dir, serve_dataset(200, DATASET).await);

    let c = CdnClassifier::load(&opts).await;
    assert_eq!(c.networks(), 5);
    assert_eq!(c.check("104.16.5.5").provider.as_deref(), Some("cloudflare"));
    assert!(!c.check("10.1.1.1").is_classified());
    // written back byte for byte
    assert_eq!(std::fs::read_to_string(&opts.cache_file).unwrap(), DATASET);
}

#[tokio::test]
async fn missing_cache_is_fetched_into_new_directory() {
    let dir = TempDir::new("missing");
    let mut opts = options(&dir, Duration::from_secs(3600));
    opts.cache_file = dir.0.join("nested").join("sources_data.json");
    opts.source_url = serve_dataset(200, DATASET).await;

    let ds = load_dataset(&opts).await;
    assert!(!ds.is_empty());
    assert_eq!(std::fs::read_to_string(&opts.cache_file).unwrap(), DATASET);
}

#[tokio::test]
async fn server_error_falls_back_to_stale_cache() {
    let dir = TempDir::new("status");
    let opts = expired_cache(&dir, serve_dataset(500, "upstream down").await);

    let c = CdnClassifier::load(&opts).await;
    let hit = c.check("10.1.1.1");
    assert_eq!(hit.provider.as_deref(), Some("old"));
    assert_eq!(hit.category, Some(Category::Cdn));
    assert_eq!(std::fs::read_to_string(&opts.cache_file).unwrap(), OLD_DATASET);
}

#[tokio::test]
async fn invalid_remote_json_falls_back_to_stale_cache() {
    let dir = TempDir::new("badjson");
    let opts = expired_cache(&dir, serve_dataset(200, "{\"cdn\": [").await);

    let c = CdnClassifier::load(&opts).await;
    assert_eq!(c.check("10.1.1.1").provider.as_deref(), Some("old"));
    assert_eq!(std::fs::read_to_string(&opts.cache_file).unwrap(), OLD_DATASET);
}
