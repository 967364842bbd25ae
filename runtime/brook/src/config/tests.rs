use super::*;
use pretty_assertions::assert_eq;

fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |name: &str| {
        vars.iter()
            .find(|(var, _)| *var == name)
            .map(|(_, value)| (*value).to_string())
    }
}

#[test]
fn test_empty_environment_gives_defaults() {
    let config = HostConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config, HostConfig::default());
    assert_eq!(config.runtime_config(), RuntimeConfig::default());
}

#[test]
fn test_reads_every_variable() {
    let config = HostConfig::from_lookup(lookup(&[
        ("BROOK_MAX_CALL_DEPTH", "64"),
        ("BROOK_LOG", "brook_eval=debug"),
        ("BROOK_LOG_TREE", "1"),
        ("BROOK_TRACE", "true"),
    ]))
    .unwrap();
    assert_eq!(config.max_call_depth, 64);
    assert_eq!(config.log_filter.as_deref(), Some("brook_eval=debug"));
    assert!(config.log_tree);
    assert!(config.trace);

    let runtime = config.runtime_config();
    assert_eq!(runtime.max_call_depth, 64);
    assert!(runtime.trace);
}

#[test]
fn test_log_filter_falls_back_to_rust_log() {
    let config = HostConfig::from_lookup(lookup(&[("RUST_LOG", "warn")])).unwrap();
    assert_eq!(config.log_filter.as_deref(), Some("warn"));

    let config =
        HostConfig::from_lookup(lookup(&[("RUST_LOG", "warn"), ("BROOK_LOG", "trace")])).unwrap();
    assert_eq!(config.log_filter.as_deref(), Some("trace"));
}

#[test]
fn test_blank_log_filter_is_off() {
    let config = HostConfig::from_lookup(lookup(&[("BROOK_LOG", "  ")])).unwrap();
    assert_eq!(config.log_filter, None);
}

#[test]
fn test_invalid_depth() {
    for value in ["0", "-3", "deep"] {
        let err = HostConfig::from_lookup(lookup(&[("BROOK_MAX_CALL_DEPTH", value)])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidDepth {
                var: "BROOK_MAX_CALL_DEPTH",
                value: value.to_string(),
            }
        );
    }
}

#[test]
fn test_invalid_flag_message() {
    let err = HostConfig::from_lookup(lookup(&[("BROOK_TRACE", "maybe")])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "BROOK_TRACE must be 0 or 1 (or true/false), got `maybe`"
    );
}

#[test]
fn test_builder_applies_depth() {
    let config = HostConfig {
        max_call_depth: 16,
        ..HostConfig::default()
    };
    let interp = config.builder().build();
    assert_eq!(interp.config().max_call_depth, 16);
    assert!(interp.default_mind().is_some());
}
