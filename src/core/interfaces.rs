use crate::utils::Result;
use async_trait::async_trait;
use std::path::Path;

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    fn file_exists(&self, path: &Path) -> bool;
}

/// Parse goal used when validating a source before it is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxGoal {
    /// CommonJS body as it runs once wrapped in a function inside an ES
    /// module: strict mode, `return` allowed
    FunctionBody,
    Module,
}

/// Parser collaborator. Implementations either accept the source or return
/// a `Parse` error carrying the diagnostic location.
pub trait SyntaxValidator: Send + Sync {
    fn validate(&self, source: &str, file_name: Option<&str>, goal: SyntaxGoal) -> Result<()>;
}
