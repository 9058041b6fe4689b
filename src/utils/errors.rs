use std::path::PathBuf;
use thiserror::Error;

/// Enhanced error with file location context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub code_snippet: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    /// 1-based line, 1-based column
    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.code_snippet = Some(snippet);
        self
    }

    /// Points the context at a byte offset of `source`, keeping the
    /// offending line as snippet.
    pub fn at_offset(self, source: &str, offset: usize) -> Self {
        let offset = floor_char_boundary(source, offset.min(source.len()));
        let prefix = &source[..offset];
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = prefix[line_start..].chars().count() + 1;
        let snippet = source[line_start..]
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();

        self.with_location(line, column).with_snippet(snippet)
    }
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    while index > 0 && !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[derive(Error, Debug)]
pub enum RnaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Task #{index} failed: {source}")]
    TaskFailure {
        index: usize,
        #[source]
        source: Box<RnaError>,
    },

    #[error("Task #{index} panicked or was aborted")]
    TaskPanicked { index: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RnaError {
    /// Create a parse error with context
    pub fn parse_with_context(message: String, context: ErrorContext) -> Self {
        Self::Parse {
            message,
            context: Some(context),
        }
    }

    /// Create a configuration error
    pub fn config(message: String) -> Self {
        Self::InvalidConfiguration(message)
    }

    pub fn task_failure(index: usize, source: RnaError) -> Self {
        Self::TaskFailure {
            index,
            source: Box::new(source),
        }
    }

    /// Location attached to a parse error, if any
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            RnaError::Parse { context, .. } => context.as_ref(),
            RnaError::TaskFailure { source, .. } => source.context(),
            _ => None,
        }
    }

    /// Format error with enhanced context display
    pub fn format_detailed(&self) -> String {
        match self {
            RnaError::Parse { message, context } => {
                self.format_error_with_context("Parse Error", message, context)
            }
            RnaError::TaskFailure { index, source } => {
                format!("❌ Task #{} failed\n{}", index, source.format_detailed())
            }
            _ => format!("❌ {}", self),
        }
    }

    fn format_error_with_context(
        &self,
        error_type: &str,
        message: &str,
        context: &Option<ErrorContext>,
    ) -> String {
        let mut output = format!("❌ {}: {}", error_type, message);

        if let Some(ctx) = context {
            if let Some(ref file_path) = ctx.file_path {
                output.push_str(&format!("\n📁 File: {}", file_path.display()));
            }

            if let (Some(line), Some(column)) = (ctx.line, ctx.column) {
                output.push_str(&format!("\n📍 Location: line {}, column {}", line, column));
            }

            if let Some(ref snippet) = ctx.code_snippet {
                output.push_str(&format!(
                    "\n📝 Code:\n{}",
                    self.format_code_snippet(snippet, ctx.line)
                ));
            }
        }

        output
    }

    fn format_code_snippet(&self, snippet: &str, error_line: Option<usize>) -> String {
        let mut output = String::new();
        let first_line = error_line.unwrap_or(1);

        for (i, line) in snippet.lines().enumerate() {
            let line_num = first_line + i;

            if error_line == Some(line_num) {
                output.push_str(&format!("→ {:3} │ {}\n", line_num, line));
                output.push_str(&format!("      │ {}\n", "^".repeat(line.trim_end().len().clamp(1, 80))));
            } else {
                output.push_str(&format!("  {:3} │ {}\n", line_num, line));
            }
        }

        output
    }
}

pub type Result<T> = std::result::Result<T, RnaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_at_offset() {
        let source = "const a = 1;\nconst b = ;\nconst c = 3;\n";
        let offset = source.find(" ;").unwrap() + 1;
        let ctx = ErrorContext::new().at_offset(source, offset);

        assert_eq!(ctx.line, Some(2));
        assert_eq!(ctx.column, Some(11));
        assert_eq!(ctx.code_snippet.as_deref(), Some("const b = ;"));
    }

    #[test]
    fn test_format_detailed_parse_error() {
        let source = "let x = (;\n";
        let ctx = ErrorContext::new()
            .with_file(PathBuf::from("broken.js"))
            .at_offset(source, 9);
        let err = RnaError::parse_with_context("Unexpected token".to_string(), ctx);

        let detailed = err.format_detailed();
        assert!(detailed.contains("Parse Error: Unexpected token"));
        assert!(detailed.contains("broken.js"));
        assert!(detailed.contains("line 1, column 10"));
        assert!(detailed.contains("→   1 │ let x = (;"));
    }

    #[test]
    fn test_task_failure_keeps_inner_context() {
        let ctx = ErrorContext::new().with_location(3, 4);
        let inner = RnaError::parse_with_context("bad".to_string(), ctx.clone());
        let err = RnaError::task_failure(7, inner);

        assert_eq!(err.context(), Some(&ctx));
        assert_eq!(err.to_string(), "Task #7 failed: Parse error: bad");
    }
}
