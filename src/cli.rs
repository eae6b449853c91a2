use clap::Parser;
use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[command(author, version, about = "Concurrent HTTP probing with CDN/WAF classification", long_about = None)]
pub struct Cli {
    /// Target host(s) or URL(s) to probe
    #[arg(short = 'u', long = "target")]
    pub targets: Vec<String>,

    /// File with newline-delimited targets
    #[arg(short = 'l', long = "list")]
    pub list: Option<PathBuf>,

    /// Display status code
    #[arg(long = "status-code", visible_alias = "sc", default_value_t = false)]
    pub status_code: bool,

    /// Display response content-length
    #[arg(long = "content-length", visible_alias = "cl", default_value_t = false)]
    pub content_length: bool,

    /// Display response content-type
    #[arg(long = "content-type", visible_alias = "ct", default_value_t = false)]
    pub content_type: bool,

    /// Display response redirect location
    #[arg(long, default_value_t = false)]
    pub location: bool,

    /// Display mmh3 hash of '/favicon.ico'
    #[arg(long, default_value_t = false)]
    pub favicon: bool,

    /// Display page title
    #[arg(long, default_value_t = false)]
    pub title: bool,

    /// Display response time
    #[arg(long = "response-time", visible_alias = "rt", default_value_t = false)]
    pub response_time: bool,

    /// Display host ip
    #[arg(long, default_value_t = false)]
    pub ip: bool,

    /// Display cdn/waf in use
    #[arg(long, default_value_t = false)]
    pub cdn: bool,

    /// Display body hash (mmh3, md5, sha1, sha256, sha512)
    #[arg(long, value_name = "ALGO")]
    pub hash: Option<String>,

    /// Number of concurrent workers (default: 50)
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Write results as JSON lines
    #[arg(short = 'j', long, default_value_t = false)]
    pub json: bool,

    /// Print only the URL of each result
    #[arg(long, default_value_t = false)]
    pub silent: bool,

    /// Follow redirects
    #[arg(long = "follow-redirects", visible_alias = "fhr", default_value_t = false)]
    pub follow_redirects: bool,

    /// Browser fingerprint profile to impersonate
    #[arg(long)]
    pub impersonate: Option<String>,

    /// Proxy URL (http, https or socks5)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Request timeout in seconds (default: 10)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for the cached CDN dataset
    #[arg(long)]
    pub cdn_cache_dir: Option<PathBuf>,

    /// Maximum age of the cached CDN dataset in hours (default: 24)
    #[arg(long)]
    pub cdn_ttl_hours: Option<u64>,

    /// Enable detailed debug logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Names of the probes switched on by flags.
    pub fn probe_names(&self) -> Vec<String> {
        let flags = [
            ("status_code", self.status_code),
            ("content_length", self.content_length),
            ("content_type", self.content_type),
            ("location", self.location),
            ("favicon", self.favicon),
            ("title", self.title),
            ("response_time", self.response_time),
            ("ip", self.ip),
            ("cdn", self.cdn),
        ];
        let mut names: Vec<String> = flags.iter().filter(|(_, on)| *on).map(|(n, _)| n.to_string()).collect();
        if let Some(algo) = &self.hash {
            names.push(format!("hash:{}", algo));
        }
        names
    }
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_probe_names() {
        let cli = Cli::parse_from(["webprobe", "-u", "a.example", "--sc", "--title", "--hash", "sha256"]);
        assert_eq!(cli.targets, vec!["a.example"]);
        assert_eq!(cli.probe_names(), vec!["status_code", "title", "hash:sha256"]);
    }
}
