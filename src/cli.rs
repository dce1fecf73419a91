//! Command-line interface parsing for catindex
//!
//! Maps clap arguments onto [`CatalogConfig`] and [`RefreshConfig`], and
//! renders the catalog as an indented outline or JSON.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

use crate::cache::{CatalogSnapshot, DiskCache};
use crate::config::{CatalogConfig, DEFAULT_CATALOG_URL};
use crate::data::{CategoryRecord, CategoryTreeNode};
use crate::refresh::RefreshConfig;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The endpoint is not an absolute http(s) URL
    #[error("Invalid endpoint: '{0}'. Expected an http:// or https:// URL")]
    InvalidEndpoint(String),

    /// A duration argument was zero where that makes no sense
    #[error("Invalid {0}: must be greater than zero")]
    ZeroDuration(&'static str),
}

/// catindex - fetch the category catalog and print it as a tree
#[derive(Parser, Debug)]
#[command(name = "catindex")]
#[command(about = "Fetch a flat category list and print it as a tree")]
#[command(version)]
pub struct Cli {
    /// Catalog URL returning a JSON array of categories
    #[arg(long, value_name = "URL", default_value = DEFAULT_CATALOG_URL)]
    pub endpoint: String,

    /// Seconds a fetched catalog stays fresh
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub ttl: u64,

    /// Seconds before a fetch attempt is abandoned
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout: u64,

    /// Extra fetch attempts after a failure
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,

    /// Directory for the on-disk catalog (defaults to the user cache dir)
    #[arg(long, value_name = "PATH", conflicts_with = "no_disk_cache")]
    pub cache_dir: Option<PathBuf>,

    /// Do not read or write the on-disk catalog
    #[arg(long)]
    pub no_disk_cache: bool,

    /// Print only the top-level categories
    #[arg(long)]
    pub roots: bool,

    /// Print JSON instead of an outline
    #[arg(long)]
    pub json: bool,

    /// Keep running and refetch every SECS seconds
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// What to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputMode {
    pub roots_only: bool,
    pub json: bool,
}

/// Configuration derived from CLI arguments for startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub catalog: CatalogConfig,
    pub output: OutputMode,
    /// Present when `--watch` was given
    pub watch: Option<RefreshConfig>,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if the endpoint or a duration is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let endpoint = parse_endpoint(&cli.endpoint)?;
        if cli.timeout == 0 {
            return Err(CliError::ZeroDuration("timeout"));
        }

        let mut catalog = CatalogConfig::default()
            .with_endpoint(endpoint)
            .with_ttl(Duration::from_secs(cli.ttl))
            .with_timeout(Duration::from_secs(cli.timeout));
        catalog.retries = cli.retries;

        catalog.disk_cache = if cli.no_disk_cache {
            None
        } else {
            cli.cache_dir
                .clone()
                .or_else(|| DiskCache::new().map(|cache| cache.dir().to_path_buf()))
        };

        let watch = match cli.watch {
            None => None,
            Some(0) => return Err(CliError::ZeroDuration("watch interval")),
            Some(secs) => Some(RefreshConfig {
                interval: Duration::from_secs(secs),
                enabled: true,
            }),
        };

        Ok(StartupConfig {
            catalog,
            output: OutputMode {
                roots_only: cli.roots,
                json: cli.json,
            },
            watch,
        })
    }
}

/// Checks that `s` is an absolute http(s) URL
pub fn parse_endpoint(s: &str) -> Result<String, CliError> {
    match Url::parse(s) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(s.to_string()),
        _ => Err(CliError::InvalidEndpoint(s.to_string())),
    }
}

/// Renders the snapshot for stdout
pub fn render(snapshot: &CatalogSnapshot, mode: OutputMode) -> Result<String, serde_json::Error> {
    match (mode.roots_only, mode.json) {
        (true, true) => to_json(&*snapshot.root_categories),
        (false, true) => to_json(&*snapshot.tree),
        (true, false) => Ok(render_roots(&snapshot.root_categories)),
        (false, false) => Ok(render_outline(&snapshot.tree)),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn line(record: &CategoryRecord) -> String {
    match &record.slug {
        Some(slug) if record.name.is_some() => format!("{} ({}) [{}]", record.label(), slug, record.id),
        _ => format!("{} [{}]", record.label(), record.id),
    }
}

/// One line per root category
pub fn render_roots(roots: &[CategoryRecord]) -> String {
    roots.iter().map(|record| line(record) + "\n").collect()
}

/// Indented outline of the forest, two spaces per level
pub fn render_outline(tree: &[CategoryTreeNode]) -> String {
    let mut out = String::new();
    let mut stack: Vec<(&CategoryTreeNode, usize)> = tree.iter().rev().map(|node| (node, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&line(&node.record));
        out.push('\n');
        stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot() -> CatalogSnapshot {
        let records = vec![
            CategoryRecord::root("1").with_name("Shoes").with_slug("shoes"),
            CategoryRecord::child_of("2", "1").with_name("Boots").with_slug("boots"),
            CategoryRecord::child_of("3", "2").with_name("Hiking"),
            CategoryRecord::root("4").with_slug("hats"),
        ];
        CatalogSnapshot::build(&records, Utc::now())
    }

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["catindex"]);
        assert_eq!(cli.endpoint, DEFAULT_CATALOG_URL);
        assert_eq!(cli.ttl, 300);
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.retries, 0);
        assert!(cli.watch.is_none());
        assert!(!cli.roots);
        assert!(!cli.json);
    }

    #[test]
    fn test_startup_config_maps_arguments() {
        let cli = Cli::parse_from([
            "catindex",
            "--endpoint",
            "https://shop.example/api/categories/",
            "--ttl",
            "60",
            "--timeout",
            "3",
            "--retries",
            "2",
            "--cache-dir",
            "/tmp/catindex-test",
            "--roots",
            "--json",
        ]);

        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.catalog.endpoint, "https://shop.example/api/categories/");
        assert_eq!(config.catalog.ttl, Duration::from_secs(60));
        assert_eq!(config.catalog.timeout, Duration::from_secs(3));
        assert_eq!(config.catalog.retries, 2);
        assert_eq!(
            config.catalog.disk_cache,
            Some(PathBuf::from("/tmp/catindex-test"))
        );
        assert_eq!(
            config.output,
            OutputMode {
                roots_only: true,
                json: true
            }
        );
        assert!(config.watch.is_none());
    }

    #[test]
    fn test_no_disk_cache_disables_disk() {
        let cli = Cli::parse_from(["catindex", "--no-disk-cache"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert!(config.catalog.disk_cache.is_none());
    }

    #[test]
    fn test_cache_dir_conflicts_with_no_disk_cache() {
        let result = Cli::try_parse_from(["catindex", "--no-disk-cache", "--cache-dir", "/tmp/x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_watch_sets_refresh_interval() {
        let cli = Cli::parse_from(["catindex", "--watch", "30"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        let watch = config.watch.expect("watch should be configured");
        assert_eq!(watch.interval, Duration::from_secs(30));
        assert!(watch.enabled);
    }

    #[test]
    fn test_zero_watch_is_rejected() {
        let cli = Cli::parse_from(["catindex", "--watch", "0"]);
        let err = StartupConfig::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("watch interval"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let cli = Cli::parse_from(["catindex", "--timeout", "0"]);
        assert!(StartupConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("http://localhost:8000/api/categories/").is_ok());
        assert!(parse_endpoint("https://shop.example/categories").is_ok());

        let err = parse_endpoint("ftp://shop.example/categories").unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint"));
        assert!(parse_endpoint("not a url").is_err());
    }

    #[test]
    fn test_render_outline_indents_children() {
        let out = render(&snapshot(), OutputMode::default()).unwrap();

        assert_eq!(
            out,
            "Shoes (shoes) [1]\n  Boots (boots) [2]\n    Hiking [3]\nhats [4]\n"
        );
    }

    #[test]
    fn test_render_roots_lists_top_level_only() {
        let mode = OutputMode {
            roots_only: true,
            json: false,
        };
        let out = render(&snapshot(), mode).unwrap();

        assert_eq!(out, "Shoes (shoes) [1]\nhats [4]\n");
    }

    #[test]
    fn test_render_json_tree() {
        let mode = OutputMode {
            roots_only: false,
            json: true,
        };
        let out = render(&snapshot(), mode).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value[0]["id"], "1");
        assert_eq!(value[0]["children"][0]["children"][0]["name"], "Hiking");
        assert_eq!(value[1]["slug"], "hats");
    }

    #[test]
    fn test_render_json_roots_have_no_children() {
        let mode = OutputMode {
            roots_only: true,
            json: true,
        };
        let out = render(&snapshot(), mode).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert!(value[0].get("children").is_none());
    }
}
