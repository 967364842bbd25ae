use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_use_before_init_fails() {
    assert!(!is_initialized());
    assert!(matches!(
        with_runtime(|interp| interp.call_depth()),
        Err(HostError::NotInitialized)
    ));
}

#[test]
fn test_init_twice_fails() {
    init(&HostConfig::default()).unwrap();
    assert!(matches!(
        init(&HostConfig::default()),
        Err(HostError::AlreadyInitialized)
    ));
    assert!(teardown().unwrap());
    assert!(!teardown().unwrap());
}

#[test]
fn test_reset_gives_fresh_runtime_with_same_symbols() {
    let config = HostConfig::default();
    init(&config).unwrap();
    let (before, classes) = with_runtime(|interp| {
        let decl = brook_eval::ClassDecl::new(interp.intern("Scratch"));
        interp.register_class(decl).unwrap();
        (interp.intern("scratch_marker"), interp.classes().len())
    })
    .unwrap();
    teardown().unwrap();

    init(&config).unwrap();
    let (after, fresh) = with_runtime(|interp| {
        (
            interp.intern("scratch_marker"),
            interp.class_named("Scratch").is_none(),
        )
    })
    .unwrap();
    assert_eq!(before, after);
    assert!(fresh);
    assert!(with_runtime(|interp| interp.classes().len()).unwrap() < classes);
    teardown().unwrap();
}

#[test]
fn test_nested_access_is_reentrant_error() {
    init(&HostConfig::default()).unwrap();
    let nested = with_runtime(|_| with_runtime(|interp| interp.call_depth())).unwrap();
    assert!(matches!(nested, Err(HostError::Reentrant)));
    teardown().unwrap();
}

#[test]
fn test_runtime_uses_config() {
    let config = HostConfig {
        max_call_depth: 8,
        trace: true,
        ..HostConfig::default()
    };
    init(&config).unwrap();
    let (depth, trace) =
        with_runtime(|interp| (interp.config().max_call_depth, interp.config().trace)).unwrap();
    assert_eq!(depth, 8);
    assert!(trace);
    teardown().unwrap();
}
