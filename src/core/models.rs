use crate::utils::{RnaError, SourceMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Outcome of the lexical module scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Classification {
    /// No CommonJS markers, leave the file alone
    NotCommonjs,
    /// CommonJS only; `exports` holds the statically named exports in
    /// first-appearance order
    PureCommonjs { exports: Vec<String> },
    /// CommonJS markers next to ES module syntax, or a bare `require` user
    MixedModule,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::NotCommonjs => "not-commonjs",
            Classification::PureCommonjs { .. } => "pure-commonjs",
            Classification::MixedModule => "mixed-module",
        }
    }

    pub fn export_names(&self) -> &[String] {
        match self {
            Classification::PureCommonjs { exports } => exports,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    #[default]
    None,
    /// Map returned next to the code, referenced by a trailing comment
    External,
    /// Map embedded as a base64 data URL
    Inline,
}

impl SourceMapMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SourceMapMode::None)
    }
}

impl FromStr for SourceMapMode {
    type Err = RnaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "none" | "false" | "off" => Ok(SourceMapMode::None),
            "external" | "true" | "on" => Ok(SourceMapMode::External),
            "inline" => Ok(SourceMapMode::Inline),
            other => Err(RnaError::config(format!(
                "unknown sourcemap mode '{}', expected none, external or inline",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Name of the original file, used for parse diagnostics and the map's `sources`
    pub source: Option<String>,
    pub sourcemap: SourceMapMode,
    /// Embed the original text as `sourcesContent`
    pub sources_content: bool,
    /// Specifiers that always stay runtime `require` calls
    pub ignore: Vec<String>,
    /// Leave `require` calls inside `try { }` blocks untouched
    pub ignore_try_catch: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            source: None,
            sourcemap: SourceMapMode::None,
            sources_content: false,
            ignore: Vec::new(),
            ignore_try_catch: true,
        }
    }
}

impl RewriteOptions {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_sourcemap(mut self, mode: SourceMapMode) -> Self {
        self.sourcemap = mode;
        self
    }
}

/// Rewritten module
#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub code: String,
    pub map: Option<SourceMap>,
    /// `require` specifiers hoisted into static imports, first appearance first
    pub specifiers: Vec<String>,
}

/// Opaque identity of one build configuration, issued by
/// [`DependencyRegistry::register`](crate::core::DependencyRegistry::register).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BuildHandle(pub(crate) u64);

impl BuildHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Resolved settings of a batch transform (config file merged with CLI flags)
#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub root: PathBuf,
    pub outdir: PathBuf,
    pub concurrency: usize,
    pub rewrite: RewriteOptions,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            outdir: PathBuf::from("dist"),
            concurrency: num_cpus::get(),
            rewrite: RewriteOptions::default(),
        }
    }
}

/// Entry point → input files it was built from. Duplicates are kept.
pub type DependencyMap = BTreeMap<PathBuf, Vec<PathBuf>>;

/// The subset of esbuild's metafile this crate reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metafile {
    #[serde(default)]
    pub inputs: BTreeMap<String, MetafileInput>,
    #[serde(default)]
    pub outputs: BTreeMap<String, MetafileOutput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetafileInput {
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub imports: Vec<MetafileImport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetafileImport {
    pub path: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutput {
    #[serde(default)]
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, MetafileOutputInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutputInput {
    #[serde(default)]
    pub bytes_in_output: u64,
}

impl Metafile {
    pub fn from_json(json: &str) -> crate::utils::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
