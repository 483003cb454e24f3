pub mod article;
pub mod common;
pub mod competitor;
pub mod error_log;
pub mod execution;
pub mod gap;
pub mod site_profile;
pub mod topic;
pub mod trend_pipeline;

pub use article::*;
pub use common::*;
pub use competitor::*;
pub use error_log::*;
pub use execution::*;
pub use gap::*;
pub use site_profile::*;
pub use topic::*;
pub use trend_pipeline::*;
