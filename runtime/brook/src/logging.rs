//! Tracing subscriber setup.

use std::sync::Once;

use crate::HostConfig;

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber once per process.
///
/// Does nothing unless `config` carries a filter (`BROOK_LOG` or `RUST_LOG`),
/// so embedding hosts that install their own subscriber are left alone.
/// With `log_tree` set, spans are printed as an indented tree.
pub fn init_tracing(config: &HostConfig) {
    let Some(directives) = config.log_filter.clone() else {
        return;
    };
    let tree = config.log_tree;
    TRACING_INIT.call_once(move || {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::new(directives);
        let registry = tracing_subscriber::registry().with(filter);
        let installed = if tree {
            registry
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_indent_lines(true),
                )
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_level(true))
                .try_init()
        };
        if installed.is_err() {
            eprintln!("brook: a tracing subscriber is already installed");
        }
    });
}
