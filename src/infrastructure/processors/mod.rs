// Processors module
pub mod scanner;
pub mod classifier;
pub mod rewriter;

pub use classifier::*;
pub use rewriter::*;
