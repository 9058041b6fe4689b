use base64::{engine::general_purpose, Engine as _};
use rna::core::interfaces::{SyntaxGoal, SyntaxValidator};
use rna::core::models::{Classification, RewriteOptions, SourceMapMode};
use rna::core::services::{InteropService, TransformJob};
use rna::core::dependencies::DependencyRegistry;
use rna::infrastructure::{classify, transform, OxcSyntaxValidator, TokioFileSystemService};
use rna::utils::RnaError;
use std::path::PathBuf;
use std::sync::Arc;

const WRAPPER_OPEN: &str = "(function (module, exports, require) {";

fn assert_valid_module(code: &str) {
    if let Err(err) = OxcSyntaxValidator.validate(code, Some("out.mjs"), SyntaxGoal::Module) {
        panic!("generated code does not parse: {}\n{}", err.format_detailed(), code);
    }
}

/// Number of generated lines in front of the original body
fn header_lines(code: &str) -> u32 {
    code.lines()
        .position(|line| line == WRAPPER_OPEN)
        .map(|index| index as u32 + 1)
        .expect("wrapper present")
}

#[test]
fn test_classification_fixtures() {
    assert_eq!(classify("export const x = 1;"), Classification::NotCommonjs);
    assert_eq!(
        classify("module.exports = { a: 1 };"),
        Classification::PureCommonjs { exports: vec!["a".to_string()] }
    );
    assert_eq!(
        classify("const x = require('fs'); module.exports.y = x;"),
        Classification::PureCommonjs { exports: vec!["y".to_string()] }
    );
    assert_eq!(
        classify("import x from 'y'; module.exports = x;"),
        Classification::MixedModule
    );
}

#[test]
fn test_pure_commonjs_round_trip() {
    let source = "'use strict';\nconst fs = require('fs');\nconst path = require('path');\n\nfunction read(file) {\n  return fs.readFileSync(path.join(__dirname, file));\n}\n\nmodule.exports = { read, version: '1.0.0' };\n";

    let (classification, output) = transform(source, &RewriteOptions::default()).unwrap();
    assert_eq!(
        classification,
        Classification::PureCommonjs { exports: vec!["read".to_string(), "version".to_string()] }
    );

    assert_eq!(output.specifiers, vec!["fs".to_string(), "path".to_string()]);
    assert!(output.code.contains("import * as __cjs_import_0 from \"fs\";"));
    assert!(output.code.contains("import * as __cjs_import_1 from \"path\";"));
    assert!(output.code.contains("export const read = __cjs_exports.read;"));
    assert!(output.code.contains("export const version = __cjs_exports.version;"));
    assert!(output.code.contains("export default __cjs_exports;"));
    assert!(output.code.contains(source));
    assert!(output.map.is_none());

    assert_valid_module(&output.code);
}

#[test]
fn test_mixed_module_round_trip() {
    let source = "import x from 'y';\nconst helper = require('./helper');\nmodule.exports = x(helper);\n";

    let (classification, output) = transform(source, &RewriteOptions::default()).unwrap();
    assert_eq!(classification, Classification::MixedModule);

    assert!(output.code.contains("const helper = __cjs_default(__cjs_import_0);"));
    assert!(output.code.contains("var module = { exports: {} }; var exports = module.exports;"));
    assert!(output.code.trim_end().ends_with("export default module.exports;"));
    assert!(!output.code.contains("require('./helper')"));

    assert_valid_module(&output.code);
}

#[test]
fn test_not_commonjs_passthrough() {
    let source = "export const x = 1;\n";
    let (classification, output) = transform(
        source,
        &RewriteOptions::default().with_sourcemap(SourceMapMode::External),
    )
    .unwrap();

    assert_eq!(classification, Classification::NotCommonjs);
    assert_eq!(output.code, source);
    assert!(output.map.is_none());
}

#[test]
fn test_external_map_maps_every_body_line() {
    let source = "const a = require('a');\nconst b = 2;\n\nexports.sum = a + b;\n";
    let options = RewriteOptions {
        sources_content: true,
        ..RewriteOptions::default()
            .with_source("src/sum.js")
            .with_sourcemap(SourceMapMode::External)
    };

    let (_, output) = transform(source, &options).unwrap();
    let map = output.map.expect("map requested");
    assert_eq!(map.file.as_deref(), Some("sum.js"));
    assert_eq!(map.sources, vec!["src/sum.js".to_string()]);
    assert!(!output.code.contains("sourceMappingURL"));

    let decoded = sourcemap::SourceMap::from_slice(map.to_json().unwrap().as_bytes()).unwrap();
    assert_eq!(decoded.get_source_contents(0), Some(source));

    let offset = header_lines(&output.code);
    for original_line in [0u32, 1, 3] {
        let token = decoded
            .lookup_token(offset + original_line, 0)
            .expect("line is mapped");
        assert_eq!(token.get_src_line(), original_line);
        assert_eq!(token.get_source(), Some("src/sum.js"));
    }
}

#[test]
fn test_inline_map_carries_call_site_columns() {
    let source = "import z from 'z';\nconst a = require('a');\nexports.a = a;";
    let options = RewriteOptions::default()
        .with_source("mixed.js")
        .with_sourcemap(SourceMapMode::Inline);

    let (_, output) = transform(source, &options).unwrap();

    let prefix = "//# sourceMappingURL=data:application/json;charset=utf-8;base64,";
    let comment = output
        .code
        .lines()
        .find(|line| line.starts_with(prefix))
        .expect("inline map comment");
    let json = general_purpose::STANDARD
        .decode(&comment[prefix.len()..])
        .unwrap();
    let decoded = sourcemap::SourceMap::from_slice(&json).unwrap();

    let generated_line = output
        .code
        .lines()
        .position(|line| line == "const a = __cjs_default(__cjs_import_0);")
        .expect("call site rewritten") as u32;

    // The `;` after the rewritten call maps back to the `;` after `require('a')`
    let semicolon = "const a = __cjs_default(__cjs_import_0)".len() as u32;
    let token = decoded.lookup_token(generated_line, semicolon).unwrap();
    assert_eq!(token.get_src_line(), 1);
    assert_eq!(token.get_src_col(), "const a = require('a')".len() as u32);

    let start = decoded.lookup_token(generated_line, 0).unwrap();
    assert_eq!((start.get_src_line(), start.get_src_col()), (1, 0));
}

#[test]
fn test_strict_mode_violation_in_commonjs_body_is_a_parse_error() {
    let options = RewriteOptions::default().with_source("legacy.js");
    let err = transform("var x = 010;\nmodule.exports.x = x;\n", &options).unwrap_err();

    match &err {
        RnaError::Parse { context: Some(context), .. } => {
            assert_eq!(context.line, Some(1));
            assert_eq!(context.file_path, Some(PathBuf::from("legacy.js")));
        }
        other => panic!("expected located parse error, got {other:?}"),
    }
}

#[test]
fn test_hashbang_commonjs_still_validates() {
    let source = "#!/usr/bin/env node\nif (!module.parent) return;\nexports.main = 1;\n";
    let (_, output) = transform(source, &RewriteOptions::default()).unwrap();

    assert!(output.code.contains("///usr/bin/env node"));
    assert_valid_module(&output.code);
}

#[test]
fn test_export_named_like_a_prologue_binding_loads() {
    let source = "exports.__cjs_exports = 1;\nexports.__cjs_require = 2;\nexports.ok = 3;\n";
    let (classification, output) = transform(source, &RewriteOptions::default()).unwrap();

    assert_eq!(
        classification.export_names(),
        &["__cjs_exports".to_string(), "__cjs_require".to_string(), "ok".to_string()]
    );
    assert!(output.code.contains("export { __cjs_export_0 as __cjs_exports };"));
    assert_valid_module(&output.code);
}

#[test]
fn test_escaped_specifiers_are_decoded() {
    let source = "const fs = require('\\u0066s');\nconst p = require(\"pa\\x74h\");\nmodule.exports = { fs, p };\n";
    let (_, output) = transform(source, &RewriteOptions::default()).unwrap();

    assert_eq!(output.specifiers, vec!["fs".to_string(), "path".to_string()]);
    assert!(output.code.contains("import * as __cjs_import_0 from \"fs\";"));
    assert_valid_module(&output.code);
}

#[test]
fn test_parse_error_has_location_and_no_output() {
    let options = RewriteOptions::default().with_source("broken.js");
    let err = transform("exports.a = 1;\nexports.b = ;\n", &options).unwrap_err();

    match &err {
        RnaError::Parse { context: Some(context), .. } => {
            assert_eq!(context.file_path, Some(PathBuf::from("broken.js")));
            assert_eq!(context.line, Some(2));
            assert!(context.code_snippet.as_deref().unwrap_or("").contains("exports.b"));
        }
        other => panic!("expected located parse error, got {other:?}"),
    }
    assert!(err.format_detailed().contains("broken.js"));
}

#[tokio::test]
async fn test_batch_transform_writes_outputs_and_collects_dependencies() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let src = root.join("src");
    std::fs::create_dir_all(&src).unwrap();

    std::fs::write(src.join("a.js"), "const b = require('./b');\nexports.value = b.value + 1;\n").unwrap();
    std::fs::write(src.join("b.js"), "exports.value = 41;\n").unwrap();
    std::fs::write(src.join("c.js"), "export const c = 3;\n").unwrap();
    std::fs::write(
        src.join("d.js"),
        "import path from 'path';\nconst helper = require('../lib/helper');\nexport const d = helper(path);\n",
    )
    .unwrap();

    let outdir = root.join("dist");
    let jobs = ["a.js", "b.js", "c.js", "d.js"]
        .iter()
        .map(|name| TransformJob::for_input(src.join(name), root, &outdir))
        .collect::<Vec<_>>();

    let service = InteropService::new(
        Arc::new(TokioFileSystemService),
        RewriteOptions::default().with_sourcemap(SourceMapMode::External),
    );
    let mut registry = DependencyRegistry::new();
    let handle = registry.register();

    let report = service
        .transform_batch(jobs, 2, &mut registry, handle)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.outcomes[2].classification, Classification::NotCommonjs);
    assert_eq!(report.stats.pure, 2);
    assert_eq!(report.stats.mixed, 1);
    assert_eq!(report.stats.untouched, 1);

    let a_out = std::fs::read_to_string(outdir.join("src/a.mjs")).unwrap();
    assert!(a_out.contains("import * as __cjs_import_0 from \"./b\";"));
    assert!(a_out.trim_end().ends_with("//# sourceMappingURL=a.mjs.map"));
    assert!(outdir.join("src/a.mjs.map").exists());

    let c_out = std::fs::read_to_string(outdir.join("src/c.mjs")).unwrap();
    assert_eq!(c_out, "export const c = 3;\n");
    assert!(!outdir.join("src/c.mjs.map").exists());

    let dependencies = registry.flush(handle);
    assert_eq!(dependencies[&src.join("a.js")], vec![src.join("b")]);
    assert_eq!(dependencies[&src.join("d.js")], vec![root.join("lib/helper")]);
    assert!(dependencies[&src.join("b.js")].is_empty());

    assert_eq!(service.cache().stats().misses, 4);
}

#[tokio::test]
async fn test_batch_stops_on_parse_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    std::fs::write(root.join("bad.js"), "module.exports = {;\n").unwrap();

    let service = InteropService::new(Arc::new(TokioFileSystemService), RewriteOptions::default());
    let mut registry = DependencyRegistry::new();
    let handle = registry.register();

    let err = service
        .transform_batch(
            vec![TransformJob::for_input(root.join("bad.js"), root, &root.join("dist"))],
            1,
            &mut registry,
            handle,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RnaError::TaskFailure { index: 0, .. }));
    assert!(err.context().is_some());
    assert!(!root.join("dist/bad.mjs").exists());
    assert!(registry.dependencies(handle).is_none());
}
