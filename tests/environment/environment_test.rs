//! Tests for `src/environment.rs`: property sources and typed lookups.

use std::sync::Arc;

use autoactivate::environment::{
    parse_bool, Environment, LayeredEnvironment, MapEnvironment, SystemEnvironment,
};
use autoactivate::resolve::ResolveError;

#[test]
fn map_environment_answers_lookups() {
    let env = MapEnvironment::new([("a", "1"), ("b", "2")]);
    assert_eq!(env.property("a").as_deref(), Some("1"));
    assert_eq!(env.property("c"), None);
    assert_eq!(env.len(), 2);
    assert!(MapEnvironment::empty().is_empty());
}

#[test]
fn every_environment_has_a_distinct_identity() {
    let first = MapEnvironment::empty();
    let second = MapEnvironment::empty();
    assert_ne!(first.identity(), second.identity());
    assert_eq!(first.clone().identity(), first.identity());
}

#[test]
fn with_changes_identity() {
    let env = MapEnvironment::empty();
    let before = env.identity();
    let env = env.with("k", "v");
    assert_ne!(env.identity(), before);
    assert_eq!(env.property("k").as_deref(), Some("v"));
}

#[test]
fn bool_property_parses_case_insensitively() {
    let env = MapEnvironment::new([("on", "TRUE"), ("off", " false "), ("bad", "yes")]);
    assert_eq!(env.bool_property("on").expect("parses"), Some(true));
    assert_eq!(env.bool_property("off").expect("parses"), Some(false));
    assert_eq!(env.bool_property("unset").expect("parses"), None);
    assert!(matches!(
        env.bool_property("bad"),
        Err(ResolveError::InvalidProperty { ref key, .. }) if key == "bad"
    ));
}

#[test]
fn parse_bool_reports_key_and_value() {
    let err = parse_bool("some.key", "maybe").expect_err("not a bool");
    let message = err.to_string();
    assert!(message.contains("some.key"));
    assert!(message.contains("maybe"));
}

#[test]
fn list_property_splits_commas() {
    let env = MapEnvironment::new([("list", "a, b,,c ")]);
    assert_eq!(env.list_property("list"), vec!["a", "b", "c"]);
    assert!(env.list_property("unset").is_empty());
}

#[test]
fn layered_environment_prefers_earlier_layers() {
    let env = LayeredEnvironment::new()
        .layer(MapEnvironment::new([("shared", "top")]))
        .layer(MapEnvironment::new([("shared", "bottom"), ("low", "only")]));
    assert_eq!(env.property("shared").as_deref(), Some("top"));
    assert_eq!(env.property("low").as_deref(), Some("only"));
    assert_eq!(env.property("none"), None);
}

#[test]
fn shared_environment_delegates() {
    let env: Arc<dyn Environment> = Arc::new(MapEnvironment::new([("k", "v")]));
    let shared = Arc::clone(&env);
    assert_eq!(shared.property("k").as_deref(), Some("v"));
    assert_eq!(shared.identity(), env.identity());
}

#[test]
fn system_environment_maps_relaxed_names() {
    // PATH is set in every test environment; `path` maps to it.
    let env = SystemEnvironment::new();
    assert!(env.property("path").is_some());
    assert_eq!(env.property(""), None);
    assert_eq!(env.property("bad=key"), None);
}
