use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    /// Installs the global subscriber. `RUST_LOG` wins over the verbosity flag.
    pub fn init(verbose: bool) {
        let default_filter = if verbose { "rna=debug" } else { "rna=info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        // A second init (tests, embedding hosts) keeps the first subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn transform_start(files: usize, concurrency: usize) {
        info!("🔁 rna - CommonJS interop");
        info!("═══════════════════════════════════════");
        info!("📦 Files: {}", files);
        info!("⚙️  Concurrency: {}", concurrency);
    }

    pub fn classified(path: &Path, kind: &str) {
        debug!("🔍 {} → {}", path.display(), kind);
    }

    pub fn rewrote(path: &Path, output: &Path, hoisted: usize) {
        debug!(
            "⚡ Rewrote {} → {} ({} hoisted imports)",
            path.display(),
            output.display(),
            hoisted
        );
    }

    pub fn transform_complete(stats: &TransformStats, elapsed: Duration) {
        info!("");
        info!("📊 Transform Statistics:");
        info!("  • CommonJS modules rewritten: {}", stats.pure);
        info!("  • Mixed modules rewritten: {}", stats.mixed);
        info!("  • Untouched modules: {}", stats.untouched);
        info!("  • Time: {:.2?}", elapsed);
        info!("");
        info!("✅ Transform completed successfully!");
    }

    pub fn dependencies_merged(entries: usize, inputs: usize) {
        info!("🧩 Merged {} inputs across {} entry points", inputs, entries);
    }
}

/// Per-kind counters reported at the end of a batch transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub pure: usize,
    pub mixed: usize,
    pub untouched: usize,
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
