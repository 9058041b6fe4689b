// rna - CommonJS interop, build dependency aggregation and a bounded task queue

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod utils;

pub use crate::core::{
    BuildHandle, Classification, DependencyMap, DependencyRegistry, RewriteOptions, RewriteOutput,
    SourceMapMode, TaskQueue,
};
pub use crate::infrastructure::{classify, rewrite, transform, ModuleRewriter};
pub use crate::utils::{Result, RnaError};
