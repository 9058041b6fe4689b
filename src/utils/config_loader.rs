use crate::core::models::{RewriteOptions, SourceMapMode, TransformConfig};
use crate::utils::{Logger, Result, RnaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "rna.config.json";

/// Configuration file format (rna.config.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RnaConfig {
    /// Maximum number of files transformed at once (default: CPU count)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// "none", "external" or "inline" (default: "none")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<SourceMapMode>,

    /// Embed original sources in generated maps (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<bool>,

    /// Specifiers that stay runtime `require` calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,

    /// Leave `require` inside `try` blocks alone (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_try_catch: Option<bool>,

    /// Output directory (default: "dist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdir: Option<String>,
}

/// Flags given on the command line; `None` defers to the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub outdir: Option<String>,
    pub concurrency: Option<usize>,
    pub sourcemap: Option<SourceMapMode>,
    pub sources_content: Option<bool>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `rna.config.json` in `root`, if present
    pub fn load_from_file(root: &Path) -> Result<Option<RnaConfig>> {
        let config_path = root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            Logger::debug(&format!("No {} found, using defaults", CONFIG_FILE_NAME));
            return Ok(None);
        }

        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(&config_path)?;

        let config: RnaConfig = serde_json::from_str(&content).map_err(|e| {
            RnaError::config(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))
        })?;

        if config.concurrency == Some(0) {
            return Err(RnaError::config(format!(
                "{}: concurrency must be at least 1",
                CONFIG_FILE_NAME
            )));
        }

        Logger::debug("✅ Config file loaded successfully");
        Ok(Some(config))
    }

    /// Merge file config with CLI arguments (CLI > config file > defaults)
    pub fn merge_with_cli(
        file_config: Option<RnaConfig>,
        root: PathBuf,
        cli: CliOverrides,
    ) -> TransformConfig {
        let base = file_config.unwrap_or_default();
        let defaults = RewriteOptions::default();

        let outdir_str = cli
            .outdir
            .or(base.outdir)
            .unwrap_or_else(|| "dist".to_string());

        // Relative output directories live under the root
        let outdir = if Path::new(&outdir_str).is_absolute() {
            PathBuf::from(outdir_str)
        } else {
            root.join(outdir_str)
        };

        TransformConfig {
            root,
            outdir,
            concurrency: cli
                .concurrency
                .or(base.concurrency)
                .unwrap_or_else(num_cpus::get),
            rewrite: RewriteOptions {
                source: None,
                sourcemap: cli.sourcemap.or(base.sourcemap).unwrap_or(defaults.sourcemap),
                sources_content: cli
                    .sources_content
                    .or(base.sources_content)
                    .unwrap_or(defaults.sources_content),
                ignore: base.ignore.unwrap_or(defaults.ignore),
                ignore_try_catch: base.ignore_try_catch.unwrap_or(defaults.ignore_try_catch),
            },
        }
    }
}
