pub mod config;
pub mod error;
pub mod mappings;
pub mod types;

pub use config::Config;
pub use error::RiskGraphError;
pub use mappings::Mappings;
pub use types::*;
