//! Validates JSON eject output for the fixture documents against the
//! formal projection schema at docs/eject-schema.json, and checks the
//! fixtures against the bundled SESSION schema.

use octave_core::{
    canonicalize, eject, parse, tokenize, EjectFormat, EjectMode, FileSystemSchemas,
    RepairConfig, SchemaSource, ValidationStatus,
};
use std::path::{Path, PathBuf};

fn root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(name: &str) -> String {
    let path = root().join("fixtures").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

fn collect_fixtures() -> Vec<PathBuf> {
    let mut paths: Vec<_> = std::fs::read_dir(root().join("fixtures"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.to_string_lossy().ends_with(".oct.md"))
        .collect();
    paths.sort();
    paths
}

#[test]
fn json_projection_matches_schema_for_every_fixture_and_mode() {
    let schema_path = root().join("docs/eject-schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    let validator = jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e));

    let schemas = FileSystemSchemas::new(root().join("schemas"));
    let session = schemas.load("SESSION").unwrap();

    let mut tested = 0usize;
    let mut failures = Vec::new();
    for path in collect_fixtures() {
        let src = std::fs::read_to_string(&path).unwrap();
        let ast = canonicalize(&src, &RepairConfig::default(), None).unwrap().ast;
        for mode in [
            EjectMode::Canonical,
            EjectMode::Authoring,
            EjectMode::Executive,
            EjectMode::Developer,
        ] {
            let out = eject(&ast, Some(&session), mode, EjectFormat::Json).unwrap();
            let instance: serde_json::Value = serde_json::from_str(&out.output).unwrap();
            if let Err(error) = validator.validate(&instance) {
                failures.push(format!("{} ({:?}): {}", path.display(), mode, error));
            }
            tested += 1;
        }
    }

    assert!(tested > 0, "No fixtures found -- check paths");
    assert!(
        failures.is_empty(),
        "Schema validation failed for {} of {} projections:\n{}",
        failures.len(),
        tested,
        failures.join("\n")
    );
}

#[test]
fn canonical_fixture_validates_with_routes() {
    let schema = FileSystemSchemas::new(root().join("schemas"))
        .load("SESSION")
        .unwrap();
    let src = fixture("session.oct.md");
    let out = canonicalize(&src, &RepairConfig::default(), Some(&schema)).unwrap();
    assert_eq!(out.validation_status, ValidationStatus::Validated, "{:?}", out.validation_errors);
    assert_eq!(out.canonical, src);
    assert!(out.repair_log.is_empty());

    let routes: Vec<(&str, &str)> = out
        .routes
        .iter()
        .map(|r| (r.path.as_str(), r.target.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("STATUS", "§INDEX"),
            ("CONTEXT.SUMMARY", "§ARCHIVE"),
            ("CONTEXT.TAGS", "§ARCHIVE"),
            ("CONTEXT.NEXT", "§DISPATCH"),
        ]
    );
}

#[test]
fn loose_fixture_needs_fix_to_validate() {
    let schema = FileSystemSchemas::new(root().join("schemas"))
        .load("SESSION")
        .unwrap();
    let src = fixture("session_loose.oct.md");

    let plain = canonicalize(&src, &RepairConfig::default(), Some(&schema)).unwrap();
    assert_eq!(plain.validation_status, ValidationStatus::Invalid);
    assert!(plain.canonical.starts_with("===SESSION===\n"));

    let fixed = canonicalize(&src, &RepairConfig::default().with_fix(true), Some(&schema)).unwrap();
    assert_eq!(fixed.validation_status, ValidationStatus::Validated, "{:?}", fixed.validation_errors);
    assert!(fixed.canonical.contains("STATUS::ACTIVE\n"));
    assert!(fixed.canonical.contains("PRIORITY::2\n"));
    assert!(fixed.canonical.contains("  NEXT::§PLANNER\n"));

    // the repaired text is already canonical and valid
    let ast = parse(tokenize(&fixed.canonical).unwrap().tokens).unwrap().ast;
    assert_eq!(ast, fixed.ast);
}
