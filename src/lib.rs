pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs_util;
pub mod loader;
pub mod manifest;
pub mod output;
pub mod report;
pub mod resolver;
pub mod shard;
pub mod throttle;
