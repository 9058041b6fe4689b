use crate::core::{
    dependencies::{manifest_json, DependencyRegistry},
    models::{Classification, Metafile, SourceMapMode},
    services::{BatchReport, InteropService, TransformJob},
};
use crate::infrastructure::TokioFileSystemService;
use crate::utils::{CliOverrides, ConfigLoader, Logger, Result, RnaError};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rna")]
#[command(about = "rna - CommonJS to ESM interop and build dependency manifests")]
pub struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report how each file would be treated
    Classify {
        /// Files to classify
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print one JSON object per file
        #[arg(long)]
        json: bool,
    },
    /// Rewrite CommonJS files to ES modules
    Transform {
        /// Files to transform
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Root directory (location of rna.config.json)
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Output directory
        #[arg(short, long)]
        outdir: Option<String>,
        /// Source maps: none, external or inline
        #[arg(long)]
        sourcemap: Option<SourceMapMode>,
        /// Embed original sources in generated maps
        #[arg(long)]
        sources_content: bool,
        /// Maximum number of files in flight
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Write the collected dependency manifest to this file
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Turn an esbuild metafile into a dependency manifest
    Deps {
        /// Path to the metafile JSON
        #[arg(short, long)]
        metafile: PathBuf,
        /// Directory the metafile paths are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Write the manifest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show tool information
    Info,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        let cli = Cli::parse();
        Logger::init(cli.verbose);

        match cli.command {
            Commands::Classify { files, json } => {
                self.handle_classify_command(&files, json).await
            }
            Commands::Transform {
                files,
                root,
                outdir,
                sourcemap,
                sources_content,
                concurrency,
                manifest,
            } => {
                let overrides = CliOverrides {
                    outdir,
                    concurrency,
                    sourcemap,
                    sources_content: sources_content.then_some(true),
                };
                self.handle_transform_command(files, root, overrides, manifest).await
            }
            Commands::Deps { metafile, root, output } => {
                self.handle_deps_command(&metafile, &root, output.as_deref()).await
            }
            Commands::Info => {
                self.handle_info_command().await
            }
        }
    }

    async fn handle_classify_command(&self, files: &[PathBuf], json: bool) -> Result<()> {
        let service = InteropService::new(Arc::new(TokioFileSystemService), Default::default());

        for file in files {
            let classification = service.classify_file(file).await?;

            if json {
                let line = serde_json::json!({
                    "file": file.display().to_string(),
                    "classification": classification,
                });
                println!("{}", line);
                continue;
            }

            let label = match &classification {
                Classification::NotCommonjs => classification.label().bright_black(),
                Classification::PureCommonjs { .. } => classification.label().bright_green(),
                Classification::MixedModule => classification.label().bright_yellow(),
            };
            let exports = classification.export_names();
            if exports.is_empty() {
                println!("  {} {}", file.display().to_string().bright_cyan(), label);
            } else {
                println!(
                    "  {} {} {}",
                    file.display().to_string().bright_cyan(),
                    label,
                    format!("[{}]", exports.join(", ")).bright_black()
                );
            }
        }

        Ok(())
    }

    async fn handle_transform_command(
        &self,
        files: Vec<PathBuf>,
        root: PathBuf,
        overrides: CliOverrides,
        manifest: Option<PathBuf>,
    ) -> Result<()> {
        let file_config = ConfigLoader::load_from_file(&root)?;
        let config = ConfigLoader::merge_with_cli(file_config, root, overrides);
        if config.concurrency == 0 {
            return Err(RnaError::config("--concurrency must be at least 1".to_string()));
        }

        let jobs = files
            .into_iter()
            .map(|input| TransformJob::for_input(input, &config.root, &config.outdir))
            .collect();

        let service = InteropService::new(Arc::new(TokioFileSystemService), config.rewrite.clone());
        let mut registry = DependencyRegistry::new();
        let handle = registry.register();

        let report = service
            .transform_batch(jobs, config.concurrency, &mut registry, handle)
            .await?;
        self.print_report(&report);

        if let Some(manifest_path) = manifest {
            let dependencies = registry.flush(handle);
            tokio::fs::write(&manifest_path, manifest_json(&dependencies)?).await?;
            Logger::info(&format!("📝 Manifest written to {}", manifest_path.display()));
        }

        Ok(())
    }

    async fn handle_deps_command(&self, metafile_path: &Path, root: &Path, output: Option<&Path>) -> Result<()> {
        let content = tokio::fs::read_to_string(metafile_path).await?;
        let metafile = Metafile::from_json(&content)?;

        let mut registry = DependencyRegistry::new();
        let handle = registry.register();

        // Direct import edges between source files first, then each entry
        // point's full input list.
        for (input, details) in &metafile.inputs {
            let imports = details
                .imports
                .iter()
                .filter(|import| !import.external)
                .map(|import| crate::core::dependencies::resolve_path(root, &import.path));
            registry.collect(handle, crate::core::dependencies::resolve_path(root, input), imports);
        }
        let merged = registry.merge(handle, &metafile, root);

        let inputs: usize = merged.values().map(Vec::len).sum();
        Logger::dependencies_merged(merged.len(), inputs);

        let json = manifest_json(&registry.flush(handle))?;
        match output {
            Some(path) => tokio::fs::write(path, json).await?,
            None => println!("{}", json),
        }

        Ok(())
    }

    async fn handle_info_command(&self) -> Result<()> {
        tracing::info!("🔁 rna v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("══════════════════════════════════════");
        tracing::info!("CommonJS → ESM interop for bundler plugins");
        tracing::info!("");
        tracing::info!("🏗️  Pieces:");
        tracing::info!("  • Lexical module classifier (pure CommonJS / mixed / untouched)");
        tracing::info!("  • Rewriter with hoisted imports and v3 source maps");
        tracing::info!("  • oxc parser for syntax validation");
        tracing::info!("  • Bounded task queue with ordered results");
        tracing::info!("  • Per-build dependency manifests from esbuild metafiles");
        tracing::info!("");
        tracing::info!("⚙️  Defaults:");
        tracing::info!("  • Concurrency: {}", num_cpus::get());
        tracing::info!("  • Config file: {}", crate::utils::CONFIG_FILE_NAME);

        Ok(())
    }

    fn print_report(&self, report: &BatchReport) {
        println!();
        for outcome in &report.outcomes {
            println!(
                "  {} {} {}",
                outcome.input.display().to_string().bright_black(),
                "→".bright_black(),
                outcome.output.display().to_string().bright_cyan()
            );
        }
        println!();
        println!(
            "  {} {} rewritten, {} untouched",
            "✓".bright_green(),
            (report.stats.pure + report.stats.mixed).to_string().bright_cyan().bold(),
            report.stats.untouched.to_string().bright_white()
        );
        println!();
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}
