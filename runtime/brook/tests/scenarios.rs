// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end scenarios driven through the host runtime.
//!
//! Each test runs on its own thread, so each gets its own runtime from
//! `brook::init` while all of them share the process symbol table.

use brook::{
    expression, init, scenarios, teardown, with_runtime, ClassScript, FrameStatus, HostConfig,
    Instance, Interpreter,
};
use brook_ir::ExprBuilder;
use pretty_assertions::assert_eq;

fn int(interp: &Interpreter, obj: &Instance, name: &str) -> Option<i64> {
    interp.data_member(obj, name).and_then(|v| v.as_int())
}

/// Run `test` against a fresh host runtime built from `config`.
fn with_host<R>(config: &HostConfig, test: impl FnOnce(&mut Interpreter) -> R) -> R {
    init(config).unwrap();
    let result = with_runtime(test).unwrap();
    assert!(teardown().unwrap());
    result
}

/// `{ _wait(secs); value }`
fn wait_then(b: &mut ExprBuilder<'_>, secs: f64, value: i64) -> brook_ir::ExprId {
    let secs = b.real(secs);
    let wait = b.coroutine(None, "_wait", &[secs]);
    let value = b.int(value);
    b.block(&[wait, value])
}

#[test]
fn test_counter_scenario() {
    with_host(&HostConfig::default(), |interp| {
        let class = scenarios::counter(interp).unwrap();
        let counter = interp.new_instance(class, &[]).unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let returned = interp.invoke_method(&counter, "increment", &[]).unwrap();
            let slot = int(interp, &counter, "n").unwrap();
            assert_eq!(returned.as_int(), Some(slot));
            seen.push(slot);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    });
}

#[test]
fn test_wait_then_set_scenario() {
    with_host(&HostConfig::default(), |interp| {
        let classes = scenarios::delayed_set(interp).unwrap();
        let mind = interp.default_mind().unwrap();
        let flag = interp.new_instance(classes.flag, &[]).unwrap();
        let timer = interp.new_instance(classes.timer, &[]).unwrap();
        let is_set = |interp: &Interpreter| {
            interp
                .data_member(&flag, "is_set")
                .and_then(|v| v.as_bool())
                .unwrap()
        };

        let args = [flag.clone(), interp.real(2.0), interp.integer(9)];
        let handle = interp
            .invoke_coroutine(&timer, "wait_then_set", &args, mind)
            .unwrap();
        assert_eq!(handle.status(), FrameStatus::Suspended);

        interp.update(mind, 1.0);
        assert!(!is_set(interp));
        assert_eq!(handle.status(), FrameStatus::Suspended);

        interp.update(mind, 1.0);
        assert!(is_set(interp));
        assert_eq!(int(interp, &flag, "value"), Some(9));
        assert_eq!(handle.status(), FrameStatus::Completed);

        assert_eq!(interp.update(mind, 1.0), 0);
        assert_eq!(int(interp, &flag, "value"), Some(9));
        assert_eq!(interp.mind(mind).live_count(), 0);
    });
}

#[test]
fn test_first_tick_completion_is_observed_only_when_immediate() {
    with_host(&HostConfig::default(), |interp| {
        let symbols = interp.symbols().clone();
        let decl = ClassScript::new(&symbols, "Worker")
            .coroutine("now", |b| {
                let seven = b.int(7);
                (b.params(&[]), seven)
            })
            .coroutine("later", |b| {
                let body = wait_then(b, 1.0, 8);
                (b.params(&[]), body)
            })
            .coroutine("follow", |b| {
                let h = b.ident("h");
                let body = b.coroutine(None, "_wait_for", &[h]);
                (b.params(&[("h", Some("InvokedCoroutine"), None)]), body)
            })
            .finish();
        let class = interp.register_class(decl).unwrap();
        let mind = interp.default_mind().unwrap();
        let worker = interp.new_instance(class, &[]).unwrap();

        let quick = interp.invoke_coroutine(&worker, "now", &[], mind).unwrap();
        let arg = interp.handle_instance(&quick);
        let sees_quick = interp
            .invoke_coroutine(&worker, "follow", &[arg], mind)
            .unwrap();
        assert_eq!(sees_quick.status(), FrameStatus::Completed);
        assert_eq!(sees_quick.result().unwrap().as_int(), Some(7));

        let slow = interp.invoke_coroutine(&worker, "later", &[], mind).unwrap();
        let arg = interp.handle_instance(&slow);
        let sees_slow = interp
            .invoke_coroutine(&worker, "follow", &[arg], mind)
            .unwrap();
        assert_eq!(sees_slow.status(), FrameStatus::Suspended);

        interp.update(mind, 0.5);
        assert_eq!(sees_slow.status(), FrameStatus::Suspended);
        interp.update(mind, 0.5);
        assert_eq!(slow.status(), FrameStatus::Completed);
        assert_eq!(sees_slow.status(), FrameStatus::Completed);
        assert_eq!(sees_slow.result().unwrap().as_int(), Some(8));
    });
}

#[test]
fn test_stopping_group_stops_children_first() {
    let config = HostConfig {
        trace: true,
        ..HostConfig::default()
    };
    with_host(&config, |interp| {
        let class = scenarios::sentry(interp).unwrap();
        let mind = interp.default_mind().unwrap();
        let sentry = interp.new_instance(class, &[]).unwrap();
        let patrol = interp.invoke_coroutine(&sentry, "patrol", &[], mind).unwrap();
        interp.update(mind, 1.0);
        interp.take_history(mind);

        interp.stop(&patrol);
        let stopped: Vec<&str> = interp
            .take_history(mind)
            .iter()
            .filter(|event| event.status == FrameStatus::Stopped)
            .map(|event| interp.symbols().text_of(event.name))
            .collect();

        assert_eq!(
            stopped,
            vec!["_wait", "branch", "_wait", "branch", "sync", "patrol"]
        );
        assert_eq!(interp.mind(mind).live_count(), 0);
        assert_eq!(patrol.status(), FrameStatus::Stopped);
    });
}

#[test]
fn test_failed_coroutine_leaves_siblings_running() {
    with_host(&HostConfig::default(), |interp| {
        let symbols = interp.symbols().clone();
        let decl = ClassScript::new(&symbols, "Crew")
            .coroutine("steady", |b| {
                let body = wait_then(b, 2.0, 1);
                (b.params(&[]), body)
            })
            .coroutine("clumsy", |b| {
                let secs = b.real(1.0);
                let wait = b.coroutine(None, "_wait", &[secs]);
                let nil = b.nil();
                let boom = b.call(Some(nil), "explode", &[]);
                (b.params(&[]), b.block(&[wait, boom]))
            })
            .finish();
        let class = interp.register_class(decl).unwrap();
        let mind = interp.default_mind().unwrap();
        let crew = interp.new_instance(class, &[]).unwrap();

        let steady = interp.invoke_coroutine(&crew, "steady", &[], mind).unwrap();
        let clumsy = interp.invoke_coroutine(&crew, "clumsy", &[], mind).unwrap();

        interp.update(mind, 1.0);
        assert_eq!(clumsy.status(), FrameStatus::Failed);
        assert_eq!(steady.status(), FrameStatus::Suspended);

        let failures = interp.take_failures(mind);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "Crew.clumsy");
        assert_eq!(failures[0].error.message, "called `explode` on nil");
        let origin = failures[0].error.origin.as_ref().unwrap();
        assert_eq!(origin.class, "Crew");
        assert_eq!(origin.member, "clumsy");
        assert_eq!(origin.instance, interp.describe(&crew));

        interp.update(mind, 1.0);
        assert_eq!(steady.status(), FrameStatus::Completed);
    });
}

#[test]
fn test_branch_from_host_expression() {
    with_host(&HostConfig::default(), |interp| {
        let mind = interp.default_mind().unwrap();
        let (arena, root) = expression(interp.symbols(), |b| {
            let body = wait_then(b, 0.5, 3);
            b.branch(body)
        });
        let value = interp.evaluate(&arena, root).unwrap();
        let handle = value.as_handle().unwrap().clone();
        interp.update(mind, 0.5);
        assert_eq!(handle.result().unwrap().as_int(), Some(3));
    });
}
