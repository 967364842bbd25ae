//! Ready-made classes used by the demo binary and the end-to-end tests.

use brook_eval::{ClassId, EvalError, Interpreter};
use brook_ir::{BinaryOp, ConcurrencyPolicy, ExprBuilder, ExprId};

use crate::ClassScript;

/// `Counter { n: Integer; increment() { n = n + 1 } }`
pub fn counter(interp: &mut Interpreter) -> Result<ClassId, EvalError> {
    let symbols = interp.symbols().clone();
    let decl = ClassScript::new(&symbols, "Counter")
        .data("n", "Integer")
        .method("increment", |b| {
            let n = b.ident("n");
            let one = b.int(1);
            let sum = b.binary(BinaryOp::Add, n, one);
            (b.params(&[]), b.assign("n", sum))
        })
        .finish();
    interp.register_class(decl)
}

/// Classes for the delayed-assignment scenario.
#[derive(Clone, Copy, Debug)]
pub struct DelayedSet {
    /// `Flag { value: Integer; set(v: Integer) }`
    pub flag: ClassId,
    /// `Timer { wait_then_set(target, duration, value) }`
    pub timer: ClassId,
}

/// A timer that waits `duration` seconds and then sets a flag's value.
pub fn delayed_set(interp: &mut Interpreter) -> Result<DelayedSet, EvalError> {
    let symbols = interp.symbols().clone();
    let flag = ClassScript::new(&symbols, "Flag")
        .data("value", "Integer")
        .data("is_set", "Boolean")
        .method("set", |b| {
            let v = b.ident("v");
            let assign = b.assign("value", v);
            let t = b.bool(true);
            let mark = b.assign("is_set", t);
            (b.params(&[("v", Some("Integer"), None)]), b.block(&[assign, mark]))
        })
        .finish();
    let flag = interp.register_class(flag)?;

    let timer = ClassScript::new(&symbols, "Timer")
        .coroutine("wait_then_set", |b| {
            let duration = b.ident("duration");
            let wait = b.coroutine(None, "_wait", &[duration]);
            let target = b.ident("target");
            let value = b.ident("value");
            let set = b.call(Some(target), "set", &[value]);
            let params = b.params(&[
                ("target", Some("Flag"), None),
                ("duration", None, None),
                ("value", Some("Integer"), None),
            ]);
            (params, b.block(&[wait, set]))
        })
        .finish();
    let timer = interp.register_class(timer)?;
    Ok(DelayedSet { flag, timer })
}

/// `{ loop { _wait(secs); name = name + 1 } }`
fn tally_every(b: &mut ExprBuilder<'_>, secs: f64, name: &str) -> ExprId {
    let secs = b.real(secs);
    let wait = b.coroutine(None, "_wait", &[secs]);
    let current = b.ident(name);
    let one = b.int(1);
    let sum = b.binary(BinaryOp::Add, current, one);
    let bump = b.assign(name, sum);
    let body = b.block(&[wait, bump]);
    b.loop_(body)
}

/// `Sentry { fast: Integer; slow: Integer; patrol() }`
///
/// `patrol` runs two endless loops as a `sync` group: one counts a round
/// every second, the other every three seconds. It only ends when stopped.
pub fn sentry(interp: &mut Interpreter) -> Result<ClassId, EvalError> {
    let symbols = interp.symbols().clone();
    let decl = ClassScript::new(&symbols, "Sentry")
        .data("fast", "Integer")
        .data("slow", "Integer")
        .coroutine("patrol", |b| {
            let fast = tally_every(b, 1.0, "fast");
            let slow = tally_every(b, 3.0, "slow");
            let group = b.concurrent(ConcurrencyPolicy::Sync, &[fast, slow]);
            (b.params(&[]), group)
        })
        .finish();
    interp.register_class(decl)
}
