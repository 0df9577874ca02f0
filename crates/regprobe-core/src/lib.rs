pub mod config;
pub mod logging;

pub mod cache;
pub mod cargo_config;
pub mod checksum;
pub mod download;
pub mod error;
pub mod harness;
pub mod http;
pub mod metadata;
pub mod report;
pub mod routing;
pub mod smoke;
