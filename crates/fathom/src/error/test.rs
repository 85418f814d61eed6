use crate::error::{ErrorKind, ErrorState};

#[test]
fn source_and_path_accumulate() {
    let mut error = ErrorState::precision("level out of range").with_source("a");

    assert_eq!(error.kind(), ErrorKind::Precision);
    assert_eq!(error.source_node(), Some("a"));
    assert!(error.propagation_path().is_empty());

    error.push_propagation("b");
    error.push_propagation("c");

    assert_eq!(error.propagation_path(), ["b", "c"]);
    assert!(error.path_contains("b"));
    assert!(!error.path_contains("a"));
    assert!(error.mentions("a"));
    assert!(error.mentions("c"));
    assert!(!error.mentions("d"));
}

#[test]
fn display_includes_kind_and_message() {
    let error = ErrorState::resource("pool is shut down");

    assert_eq!(error.to_string(), "resource error: pool is shut down");
}
