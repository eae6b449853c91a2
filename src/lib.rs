pub mod cdn;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod http_client;
pub mod output;
pub mod probe;
pub mod utils;

pub use crate::cdn::{CdnClassifier, Classification};
pub use crate::concurrent::{ScanSummary, Scanner};
pub use crate::error::{ClassifierLoadError, ProbeError, RequestError};
pub use crate::http_client::{Client, ClientConfig, Response};
pub use crate::probe::{ProbeKind, ProbeResult, ProbeRunner, ProbeSet};
