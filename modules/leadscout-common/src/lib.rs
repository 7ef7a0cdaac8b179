pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::AppConfig;
pub use error::LeadScoutError;
pub use file_config::{
    load_config, ClassifierConfig, CrawlConfig, ExcludedRegion, FileConfig, OutputConfig,
    SearchConfig, SessionConfig,
};
pub use types::*;
