// CDN / WAF / cloud range classification

pub mod classifier;
pub mod dataset;

pub use classifier::{CdnClassifier, Category, Classification, NetworkTable};
pub use dataset::{load_dataset, CdnDataset, CdnOptions};
