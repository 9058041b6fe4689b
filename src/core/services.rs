use crate::core::{
    dependencies::{normalize_path, DependencyRegistry},
    interfaces::{FileSystemService, SyntaxValidator},
    models::{BuildHandle, Classification, RewriteOptions, SourceMapMode},
    queue::TaskQueue,
};
use crate::infrastructure::{ModuleRewriter, OxcSyntaxValidator};
use crate::utils::{ClassificationCache, Logger, Result, Timer, TransformStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// One file to transform and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TransformJob {
    /// Mirrors `input`'s position under `root` into `outdir`, with an `.mjs`
    /// extension. Files outside `root` land directly in `outdir`.
    pub fn for_input(input: impl Into<PathBuf>, root: &Path, outdir: &Path) -> Self {
        let input = input.into();
        let relative = input
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| input.file_name().map(PathBuf::from).unwrap_or_default());

        Self {
            output: normalize_path(&outdir.join(relative).with_extension("mjs")),
            input,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub classification: Classification,
    /// Relative hoisted specifiers resolved against the importer's directory
    pub dependencies: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub stats: TransformStats,
}

/// Reads, classifies, rewrites and writes modules
#[derive(Clone)]
pub struct InteropService {
    fs_service: Arc<dyn FileSystemService>,
    validator: Arc<dyn SyntaxValidator>,
    cache: Arc<ClassificationCache>,
    options: RewriteOptions,
}

impl InteropService {
    pub fn new(fs_service: Arc<dyn FileSystemService>, options: RewriteOptions) -> Self {
        Self {
            fs_service,
            validator: Arc::new(OxcSyntaxValidator),
            cache: Arc::new(ClassificationCache::new()),
            options,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SyntaxValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ClassificationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    pub async fn classify_file(&self, path: &Path) -> Result<Classification> {
        let source = self.fs_service.read_file(path).await?;
        let classification = self.cache.classify(&source);
        Logger::classified(path, classification.label());
        Ok(classification)
    }

    /// Rewrites one file. Modules that are not CommonJS are copied as-is.
    pub async fn transform_file(&self, job: TransformJob) -> Result<FileOutcome> {
        let source = self.fs_service.read_file(&job.input).await?;
        let classification = self.cache.classify(&source);
        Logger::classified(&job.input, classification.label());

        let options = RewriteOptions {
            source: Some(job.input.display().to_string()),
            ..self.options.clone()
        };
        let output = ModuleRewriter::new(options)
            .with_validator(self.validator.clone())
            .rewrite(&source, &classification)?;

        let mut code = output.code;
        if let (SourceMapMode::External, Some(map)) = (self.options.sourcemap, output.map.as_ref()) {
            let map_path = map_path_for(&job.output);
            let map_name = map_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            self.fs_service.write_file(&map_path, &map.to_json()?).await?;
            code.push_str(&format!("//# sourceMappingURL={}\n", map_name));
        }
        self.fs_service.write_file(&job.output, &code).await?;

        Logger::rewrote(&job.input, &job.output, output.specifiers.len());

        let importer_dir = job.input.parent().unwrap_or_else(|| Path::new(""));
        let dependencies = output
            .specifiers
            .iter()
            .filter(|specifier| is_relative_specifier(specifier))
            .map(|specifier| normalize_path(&importer_dir.join(specifier)))
            .collect();

        Ok(FileOutcome {
            input: job.input,
            output: job.output,
            classification,
            dependencies,
        })
    }

    /// Transforms `jobs` through a [`TaskQueue`] with at most `concurrency`
    /// files in flight, then records each file's relative dependencies under
    /// `handle`.
    pub async fn transform_batch(
        &self,
        jobs: Vec<TransformJob>,
        concurrency: usize,
        registry: &mut DependencyRegistry,
        handle: BuildHandle,
    ) -> Result<BatchReport> {
        let _timer = Timer::start("Batch transform");
        let started = Instant::now();
        Logger::transform_start(jobs.len(), concurrency);

        let mut queue = TaskQueue::new();
        for job in jobs {
            let service = self.clone();
            queue.enqueue(move || async move { service.transform_file(job).await });
        }
        let outcomes = queue.run(concurrency).await?;

        let mut stats = TransformStats::default();
        for outcome in &outcomes {
            match outcome.classification {
                Classification::NotCommonjs => stats.untouched += 1,
                Classification::PureCommonjs { .. } => stats.pure += 1,
                Classification::MixedModule => stats.mixed += 1,
            }
            registry.collect(handle, outcome.input.clone(), outcome.dependencies.iter().cloned());
        }

        Logger::transform_complete(&stats, started.elapsed());
        Ok(BatchReport { outcomes, stats })
    }
}

fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// `out/a.mjs` → `out/a.mjs.map`
pub fn map_path_for(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".map");
    PathBuf::from(path)
}
