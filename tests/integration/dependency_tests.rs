use rna::core::dependencies::{manifest_json, DependencyRegistry};
use rna::core::models::Metafile;
use std::path::{Path, PathBuf};

fn metafile(entry: &str, inputs: &[&str]) -> Metafile {
    let inputs = inputs
        .iter()
        .map(|input| format!(r#""{}": {{ "bytesInOutput": 1 }}"#, input))
        .collect::<Vec<_>>()
        .join(", ");
    let json = format!(
        r#"{{ "outputs": {{
            "dist/out.js": {{ "bytes": 1, "entryPoint": "{}", "inputs": {{ {} }} }},
            "dist/chunk.js": {{ "bytes": 1, "inputs": {{ "src/shared.js": {{ "bytesInOutput": 1 }} }} }}
        }} }}"#,
        entry, inputs
    );
    Metafile::from_json(&json).unwrap()
}

#[test]
fn test_flush_twice() {
    let mut registry = DependencyRegistry::new();
    let handle = registry.register();

    registry.collect(handle, "/p/a.js", ["/p/b.js", "/p/c.js"]);
    registry.collect(handle, "/p/a.js", ["/p/b.js"]);

    let first = registry.flush(handle);
    assert_eq!(
        first[Path::new("/p/a.js")],
        vec![
            PathBuf::from("/p/b.js"),
            PathBuf::from("/p/c.js"),
            PathBuf::from("/p/b.js")
        ]
    );

    assert!(registry.flush(handle).is_empty());
}

#[test]
fn test_merge_is_additive_and_non_destructive() {
    let mut registry = DependencyRegistry::new();
    let handle = registry.register();
    let root = Path::new("/project");

    registry.collect(handle, "/project/src/index.js", ["/project/src/polyfill.js"]);

    let merged = registry.merge(handle, &metafile("src/index.js", &["src/index.js", "src/util.js"]), root);
    assert_eq!(
        merged[Path::new("/project/src/index.js")],
        vec![
            PathBuf::from("/project/src/polyfill.js"),
            PathBuf::from("/project/src/index.js"),
            PathBuf::from("/project/src/util.js"),
        ]
    );
    // Outputs without an entry point contribute nothing
    assert_eq!(merged.len(), 1);

    // The returned map is a snapshot; the registry still holds the data
    let again = registry.merge(handle, &metafile("src/index.js", &["src/extra.js"]), root);
    assert_eq!(again[Path::new("/project/src/index.js")].len(), 4);

    let flushed = registry.flush(handle);
    assert_eq!(flushed, again);
}

#[test]
fn test_unknown_handle_yields_empty_maps() {
    let mut registry = DependencyRegistry::new();
    let handle = registry.register();

    assert!(registry.flush(handle).is_empty());
    assert!(registry
        .merge(handle, &metafile("src/a.js", &["src/a.js"]), Path::new("/p"))
        .is_empty());
    assert!(registry.dependencies(handle).is_none());
}

#[test]
fn test_handles_are_isolated() {
    let mut registry = DependencyRegistry::new();
    let a = registry.register();
    let b = registry.register();
    assert_ne!(a, b);

    registry.collect(a, "/p/a.js", ["/p/dep.js"]);
    registry.collect(b, "/p/b.js", Vec::<PathBuf>::new());

    let merged_b = registry.merge(b, &metafile("b.js", &["b.js", "x.js"]), Path::new("/p"));
    assert!(!merged_b.contains_key(Path::new("/p/a.js")));

    let flushed_a = registry.flush(a);
    assert_eq!(flushed_a.len(), 1);
    assert!(flushed_a.contains_key(Path::new("/p/a.js")));
    assert_eq!(registry.flush(b)[Path::new("/p/b.js")].len(), 2);
}

#[test]
fn test_merge_json_and_manifest() {
    let mut registry = DependencyRegistry::new();
    let handle = registry.register();
    registry.collect(handle, "/r/main.js", Vec::<PathBuf>::new());

    let json = r#"{ "outputs": { "out/main.js": { "bytes": 9, "entryPoint": "main.js",
        "inputs": { "lib/../main.js": { "bytesInOutput": 4 }, "/abs/vendor.js": { "bytesInOutput": 5 } } } } }"#;
    let merged = registry.merge_json(handle, json, Path::new("/r")).unwrap();

    let inputs = &merged[Path::new("/r/main.js")];
    assert!(inputs.contains(&PathBuf::from("/r/main.js")));
    assert!(inputs.contains(&PathBuf::from("/abs/vendor.js")));

    let manifest: serde_json::Value = serde_json::from_str(&manifest_json(&merged).unwrap()).unwrap();
    assert_eq!(manifest["/r/main.js"].as_array().unwrap().len(), 2);

    assert!(registry.merge_json(handle, "not json", Path::new("/r")).is_err());
}
