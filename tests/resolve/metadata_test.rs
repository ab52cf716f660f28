//! Tests for `src/resolve/metadata.rs`: metadata index and loader cache.

use autoactivate::environment::MapEnvironment;
use autoactivate::resolve::metadata::NEUTRAL_PRIORITY;
use autoactivate::resolve::{MetadataLoader, MetadataSource, MetadataStore, ResolveError};

const INDEX: &str = r"
# generated index
app.web.Server.Priority=-10
app.web.Server.Before=app.web.Client, app.web.Proxy
app.web.Server.After=app.core.Core
app.web.Server.ConditionalOnProperty=server.enabled=true
! legacy comment style
app.core.Core.BeforeAll=true
app.tail.Tail.AfterAll=TRUE
";

#[test]
fn parses_ordering_attributes() {
    let store = MetadataStore::parse(INDEX).expect("valid index");
    let server = store.get("app.web.Server");
    assert_eq!(server.priority, -10);
    assert!(server.before.contains("app.web.Client"));
    assert!(server.before.contains("app.web.Proxy"));
    assert!(server.after.contains("app.core.Core"));
    assert!(store.get("app.core.Core").before_all);
    assert!(store.get("app.tail.Tail").after_all);
}

#[test]
fn keeps_condition_attributes_verbatim() {
    let store = MetadataStore::parse(INDEX).expect("valid index");
    assert_eq!(
        store.attribute("app.web.Server", "ConditionalOnProperty"),
        Some("server.enabled=true")
    );
    assert_eq!(store.attribute("app.web.Server", "Missing"), None);
}

#[test]
fn missing_module_gets_neutral_defaults() {
    let store = MetadataStore::parse(INDEX).expect("valid index");
    let unknown = store.get("not.indexed.Module");
    assert_eq!(unknown.priority, NEUTRAL_PRIORITY);
    assert!(unknown.before.is_empty());
    assert!(unknown.after.is_empty());
    assert!(!unknown.before_all);
    assert!(!unknown.after_all);
    assert!(!store.contains("not.indexed.Module"));
}

#[test]
fn non_integer_priority_is_rejected() {
    let err = MetadataStore::parse("a.Priority=high").expect_err("bad priority");
    assert!(matches!(err, ResolveError::Metadata { .. }));
}

#[test]
fn non_boolean_flag_is_rejected() {
    assert!(MetadataStore::parse("a.BeforeAll=yes").is_err());
}

#[test]
fn line_without_equals_is_rejected() {
    assert!(MetadataStore::parse("a.Priority").is_err());
}

#[test]
fn optional_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let loader = MetadataLoader::new(MetadataSource::File(dir.path().join("absent")), false);
    let store = loader.load(&MapEnvironment::empty()).expect("falls back");
    assert!(store.is_empty());
}

#[test]
fn required_missing_file_is_fatal() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let loader = MetadataLoader::new(MetadataSource::File(dir.path().join("absent")), true);
    let err = loader.load(&MapEnvironment::empty()).expect_err("required");
    assert!(matches!(err, ResolveError::Metadata { .. }));
}

#[test]
fn required_metadata_without_source_is_fatal() {
    let loader = MetadataLoader::new(MetadataSource::None, true);
    let err = loader.load(&MapEnvironment::empty()).expect_err("required");
    assert!(matches!(err, ResolveError::Metadata { .. }));
}

#[test]
fn optional_metadata_without_source_is_empty() {
    let loader = MetadataLoader::new(MetadataSource::None, false);
    let store = loader.load(&MapEnvironment::empty()).expect("defaults");
    assert!(store.is_empty());
}

#[test]
fn optional_malformed_source_falls_back_to_defaults() {
    let loader = MetadataLoader::new(MetadataSource::Inline("garbage".to_owned()), false);
    let store = loader.load(&MapEnvironment::empty()).expect("falls back");
    assert!(store.is_empty());
}

#[test]
fn loader_caches_per_environment_identity() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("index.properties");
    std::fs::write(&path, "a.Priority=1").expect("write");

    let loader = MetadataLoader::new(MetadataSource::File(path.clone()), true);
    let env = MapEnvironment::empty();
    assert_eq!(loader.load(&env).expect("loads").get("a").priority, 1);

    std::fs::write(&path, "a.Priority=2").expect("rewrite");
    assert_eq!(
        loader.load(&env).expect("cached").get("a").priority,
        1,
        "same environment should reuse the cached index"
    );

    let changed = env.clone().with("some.key", "value");
    assert_eq!(
        loader.load(&changed).expect("reloads").get("a").priority,
        2,
        "a new environment identity should reload the index"
    );
}

#[test]
fn prebuilt_store_is_served_for_any_environment() {
    let store = MetadataStore::parse("a.Priority=7").expect("valid index");
    let loader = MetadataLoader::from_store(store);
    assert_eq!(loader.load(&MapEnvironment::empty()).expect("loads").get("a").priority, 7);
    assert_eq!(loader.load(&MapEnvironment::empty()).expect("loads").get("a").priority, 7);
}
