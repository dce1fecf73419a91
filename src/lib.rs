//! Category catalog index
//!
//! Fetches a flat, parent-pointer list of categories, builds it into an
//! ordered forest, and serves it from a TTL cache that falls back to the last
//! good catalog when a refresh fails.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod refresh;
pub mod service;

pub use cache::{CacheStore, CatalogSnapshot};
pub use config::CatalogConfig;
pub use data::{
    build_tree, root_categories, CatalogClient, CatalogSource, CategoryId, CategoryRecord,
    CategoryTreeNode, FetchError, ParentRef,
};
pub use service::{CatalogService, CatalogStatus, CatalogView};
