//! Tests for `src/registry.rs`: candidate catalogs and import lists.

use std::sync::Arc;

use autoactivate::registry::{parse_import_list, ModuleRegistry, StaticRegistry};

#[test]
fn import_list_skips_comments_and_blanks() {
    let parsed = parse_import_list(
        "# header\n\napp.web.Server\n  app.core.Core  # trailing note\n#app.off.Disabled\n",
    );
    assert_eq!(parsed, vec!["app.web.Server", "app.core.Core"]);
}

#[test]
fn candidates_keep_discovery_order_and_duplicates() {
    let registry = StaticRegistry::new(["b", "a"]).with_imports("a\nc\n");
    assert_eq!(registry.load_candidates(), vec!["b", "a", "a", "c"]);
}

#[test]
fn candidates_and_available_modules_are_resolvable() {
    let registry = StaticRegistry::new(["a"]).with_available(["ext.Client"]);
    assert!(registry.is_resolvable("a"));
    assert!(registry.is_resolvable("ext.Client"));
    assert!(!registry.is_resolvable("missing"));
}

#[test]
fn import_file_is_appended() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("imports.list");
    std::fs::write(&path, "x\ny\n").expect("should write import list");
    let registry = match StaticRegistry::new(["w"]).with_import_file(&path) {
        Ok(registry) => registry,
        Err(err) => panic!("import list should load: {err}"),
    };
    assert_eq!(registry.load_candidates(), vec!["w", "x", "y"]);
}

#[test]
fn missing_import_file_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let result = StaticRegistry::default().with_import_file(&tmp.path().join("absent.list"));
    let err = match result {
        Ok(_) => panic!("missing import list should fail"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("absent.list"));
}

#[test]
fn shared_registry_delegates() {
    let registry: Arc<dyn ModuleRegistry> = Arc::new(StaticRegistry::new(["a"]));
    let shared = Arc::clone(&registry);
    assert_eq!(shared.load_candidates(), vec!["a"]);
    assert!(shared.is_resolvable("a"));
}
