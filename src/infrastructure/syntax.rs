use crate::core::interfaces::{SyntaxGoal, SyntaxValidator};
use crate::utils::{ErrorContext, Result, RnaError};
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::path::PathBuf;

/// Enclosing function used to check a CommonJS body the way it runs once
/// wrapped inside an ES module.
const FUNCTION_BODY_OPEN: &str = "(function () {\n";
const FUNCTION_BODY_CLOSE: &str = "\n});";

/// Syntax check backed by the oxc parser
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcSyntaxValidator;

impl SyntaxValidator for OxcSyntaxValidator {
    fn validate(&self, source: &str, file_name: Option<&str>, goal: SyntaxGoal) -> Result<()> {
        let allocator = Allocator::default();
        let source_type = file_name
            .and_then(|name| SourceType::from_path(name).ok())
            .unwrap_or_default()
            .with_module(true);

        let (text, prefix) = match goal {
            SyntaxGoal::Module => (source.to_string(), 0),
            SyntaxGoal::FunctionBody => (
                format!("{}{}{}", FUNCTION_BODY_OPEN, source, FUNCTION_BODY_CLOSE),
                FUNCTION_BODY_OPEN.len(),
            ),
        };

        let result = Parser::new(&allocator, &text, source_type).parse();

        let Some(error) = result.errors.first() else {
            return Ok(());
        };

        // Offsets inside the synthetic wrapper clamp to the body
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset())
            .unwrap_or(prefix)
            .saturating_sub(prefix)
            .min(source.len());

        let mut context = ErrorContext::new().at_offset(source, offset);
        if let Some(name) = file_name {
            context = context.with_file(PathBuf::from(name));
        }

        Err(RnaError::parse_with_context(error.to_string(), context))
    }
}
