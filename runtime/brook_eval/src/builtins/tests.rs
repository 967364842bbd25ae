use crate::class::ClassId;
use crate::errors::{EvalErrorKind, EvalResult};
use crate::mind::FrameStatus;
use crate::testing::{coroutine, expr, int_field, method, register, Field};
use crate::Interpreter;
use brook_ir::{BinaryOp, CallableKind, ExprBuilder, ExprId, UnaryOp};
use pretty_assertions::assert_eq;

fn eval(interp: &mut Interpreter, build: impl FnOnce(&mut ExprBuilder<'_>) -> ExprId) -> EvalResult {
    let (arena, root) = expr(interp, build);
    interp.evaluate(&arena, root)
}

fn ints(interp: &mut Interpreter, op: BinaryOp, a: i64, c: i64) -> EvalResult {
    eval(interp, |b| {
        let a = b.int(a);
        let c = b.int(c);
        b.binary(op, a, c)
    })
}

#[test]
fn test_integer_arithmetic() {
    let mut interp = Interpreter::new();
    assert_eq!(ints(&mut interp, BinaryOp::Add, 2, 3).unwrap().as_int(), Some(5));
    assert_eq!(ints(&mut interp, BinaryOp::Sub, 2, 3).unwrap().as_int(), Some(-1));
    assert_eq!(ints(&mut interp, BinaryOp::Mul, 4, 3).unwrap().as_int(), Some(12));
    assert_eq!(ints(&mut interp, BinaryOp::Div, 7, 2).unwrap().as_int(), Some(3));
    assert_eq!(ints(&mut interp, BinaryOp::Rem, 7, 3).unwrap().as_int(), Some(1));
}

#[test]
fn test_integer_division_by_zero() {
    let mut interp = Interpreter::new();
    for op in [BinaryOp::Div, BinaryOp::Rem] {
        let err = ints(&mut interp, op, 1, 0).unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::DivisionByZero));
    }
}

#[test]
fn test_integer_overflow_is_error() {
    let mut interp = Interpreter::new();
    let err = ints(&mut interp, BinaryOp::Add, i64::MAX, 1).unwrap_err();
    assert_eq!(err.message, "integer overflow in addition");
    let err = eval(&mut interp, |b| {
        let min = b.int(i64::MIN);
        b.unary(UnaryOp::Neg, min)
    })
    .unwrap_err();
    assert_eq!(err.message, "integer overflow in negation");
}

#[test]
fn test_mixed_operands_promote_to_real() {
    let mut interp = Interpreter::new();
    let sum = eval(&mut interp, |b| {
        let one = b.int(1);
        let half = b.real(2.5);
        b.binary(BinaryOp::Add, one, half)
    })
    .unwrap();
    assert_eq!(sum.as_real(), Some(3.5));

    let quotient = eval(&mut interp, |b| {
        let one = b.real(1.0);
        let zero = b.real(0.0);
        b.binary(BinaryOp::Div, one, zero)
    })
    .unwrap();
    assert_eq!(quotient.as_real(), Some(f64::INFINITY));
}

#[test]
fn test_numeric_comparisons() {
    let mut interp = Interpreter::new();
    assert_eq!(ints(&mut interp, BinaryOp::Lt, 2, 3).unwrap().as_bool(), Some(true));
    assert_eq!(ints(&mut interp, BinaryOp::GtEq, 2, 3).unwrap().as_bool(), Some(false));
    assert_eq!(ints(&mut interp, BinaryOp::NotEq, 2, 3).unwrap().as_bool(), Some(true));

    let equal = eval(&mut interp, |b| {
        let one = b.int(1);
        let also_one = b.real(1.0);
        b.binary(BinaryOp::Eq, one, also_one)
    })
    .unwrap();
    assert_eq!(equal.as_bool(), Some(true));

    let unequal = eval(&mut interp, |b| {
        let one = b.int(1);
        let text = b.string("1");
        b.binary(BinaryOp::Eq, one, text)
    })
    .unwrap();
    assert_eq!(unequal.as_bool(), Some(false));

    let err = eval(&mut interp, |b| {
        let one = b.int(1);
        let text = b.string("1");
        b.binary(BinaryOp::Lt, one, text)
    })
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

#[test]
fn test_numeric_conversions() {
    let mut interp = Interpreter::new();
    let text = eval(&mut interp, |b| {
        let n = b.int(42);
        b.call(Some(n), "to_string", &[])
    })
    .unwrap();
    assert_eq!(text.as_str(), Some("42"));

    let truncated = eval(&mut interp, |b| {
        let r = b.real(-2.75);
        b.call(Some(r), "to_integer", &[])
    })
    .unwrap();
    assert_eq!(truncated.as_int(), Some(-2));

    let err = eval(&mut interp, |b| {
        let r = b.real(1e300);
        b.call(Some(r), "to_integer", &[])
    })
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Custom { .. }));
}

#[test]
fn test_boolean_not() {
    let mut interp = Interpreter::new();
    let value = eval(&mut interp, |b| {
        let t = b.bool(true);
        b.unary(UnaryOp::Not, t)
    })
    .unwrap();
    assert_eq!(value.as_bool(), Some(false));
}

#[test]
fn test_string_members() {
    let mut interp = Interpreter::new();
    let joined = eval(&mut interp, |b| {
        let a = b.string("ab");
        let c = b.string("cd");
        b.binary(BinaryOp::Add, a, c)
    })
    .unwrap();
    assert_eq!(joined.as_str(), Some("abcd"));

    let length = eval(&mut interp, |b| {
        let s = b.string("héllo");
        b.call(Some(s), "length", &[])
    })
    .unwrap();
    assert_eq!(length.as_int(), Some(5));

    let same = eval(&mut interp, |b| {
        let a = b.string("a");
        let also_a = b.string("a");
        b.binary(BinaryOp::Eq, a, also_a)
    })
    .unwrap();
    assert_eq!(same.as_bool(), Some(true));

    let symbol = eval(&mut interp, |b| {
        let s = b.string("ping");
        b.call(Some(s), "to_symbol", &[])
    })
    .unwrap();
    assert_eq!(symbol.as_symbol(), Some(interp.intern("ping")));
}

#[test]
fn test_object_reflection() {
    let mut interp = Interpreter::new();
    let name = eval(&mut interp, |b| {
        let n = b.int(1);
        b.call(Some(n), "class_name", &[])
    })
    .unwrap();
    assert_eq!(name.as_str(), Some("Integer"));

    let nil = eval(&mut interp, |b| {
        let n = b.nil();
        b.call(Some(n), "is_nil", &[])
    })
    .unwrap();
    assert_eq!(nil.as_bool(), Some(true));

    let subclass = eval(&mut interp, |b| {
        let n = b.int(1);
        let integer = b.call(Some(n), "class", &[]);
        let obj = b.instantiate("Object", &[]);
        let object = b.call(Some(obj), "class", &[]);
        b.call(Some(integer), "is_subclass", &[object])
    })
    .unwrap();
    assert_eq!(subclass.as_bool(), Some(true));
}

#[test]
fn test_list_access_and_bounds() {
    let mut interp = Interpreter::new();
    let integer = interp.class_named("Integer").unwrap();
    let items = vec![interp.integer(10), interp.integer(20)];
    let list = interp.list(integer, items).unwrap();

    let idx = interp.integer(1);
    let second = interp.invoke_method(&list, "at", &[idx]).unwrap();
    assert_eq!(second.as_int(), Some(20));

    let idx = interp.integer(2);
    let err = interp.invoke_method(&list, "at", &[idx]).unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::IndexOutOfRange { index: 2, len: 2 }
    ));

    let text = interp.string("x");
    let err = interp.invoke_method(&list, "append", &[text]).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));

    let thirty = interp.integer(30);
    interp.invoke_method(&list, "append", &[thirty]).unwrap();
    let len = interp.invoke_method(&list, "length", &[]).unwrap();
    assert_eq!(len.as_int(), Some(3));

    let idx = interp.integer(0);
    let removed = interp.invoke_method(&list, "remove_at", &[idx]).unwrap();
    assert_eq!(removed.as_int(), Some(10));
    let first = interp.invoke_method(&list, "first", &[]).unwrap();
    assert_eq!(first.as_int(), Some(20));

    interp.invoke_method(&list, "clear", &[]).unwrap();
    let last = interp.invoke_method(&list, "last", &[]).unwrap();
    assert!(interp.is_none(&last));
}

#[test]
fn test_list_literal_checks_item_class() {
    let mut interp = Interpreter::new();
    let err = eval(&mut interp, |b| {
        let one = b.int(1);
        let text = b.string("two");
        b.list("Integer", &[one, text])
    })
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

#[test]
fn test_each_walks_a_snapshot() {
    let mut interp = Interpreter::new();
    // { let l = List[Integer](1, 2); l.each(|x| l.append(x)); l.length() }
    let len = eval(&mut interp, |b| {
        let one = b.int(1);
        let two = b.int(2);
        let list = b.list("Integer", &[one, two]);
        let let_l = b.let_("l", list);

        let l = b.ident("l");
        let x = b.ident("x");
        let append = b.call(Some(l), "append", &[x]);
        let params = b.params(&[("x", None, None)]);
        let visit = b.closure(params, append, CallableKind::Method);
        let l = b.ident("l");
        let each = b.call(Some(l), "each", &[visit]);

        let l = b.ident("l");
        let length = b.call(Some(l), "length", &[]);
        b.block(&[let_l, each, length])
    })
    .unwrap();
    assert_eq!(len.as_int(), Some(4));
}

#[test]
fn test_live_each_sees_appended_items() {
    let mut interp = Interpreter::new();
    let class = register(&mut interp, "Walker", &[Field::Data("seen", "Integer")], |b| {
        let seen = b.ident("seen");
        let x = b.ident("x");
        let sum = b.binary(BinaryOp::Add, seen, x);
        let add = b.assign("seen", sum);
        let params = b.params(&[("x", None, None)]);
        let visit = b.closure(params, add, CallableKind::Method);
        let l = b.ident("l");
        let body = b.coroutine(Some(l), "_each", &[visit]);
        let walk_params = b.params(&[("l", Some("List"), None)]);
        vec![coroutine("walk", walk_params, body)]
    });
    let mind = interp.default_mind().unwrap();
    let walker = interp.new_instance(class, &[]).unwrap();
    let integer = interp.class_named("Integer").unwrap();
    let items = vec![interp.integer(1), interp.integer(2)];
    let list = interp.list(integer, items).unwrap();

    let handle = interp
        .invoke_coroutine(&walker, "walk", &[list.clone()], mind)
        .unwrap();
    assert_eq!(int_field(&interp, &walker, "seen"), Some(1));

    let three = interp.integer(3);
    interp.invoke_method(&list, "append", &[three]).unwrap();
    interp.update(mind, 0.1);
    interp.update(mind, 0.1);
    assert_eq!(int_field(&interp, &walker, "seen"), Some(6));
    assert_eq!(handle.status(), FrameStatus::Suspended);

    interp.update(mind, 0.1);
    assert_eq!(handle.status(), FrameStatus::Completed);
}

/// `Walker.walk(l)` adds every item `_each` visits to `seen`.
fn walker_class(interp: &mut Interpreter) -> ClassId {
    register(interp, "Walker", &[Field::Data("seen", "Integer")], |b| {
        let seen = b.ident("seen");
        let x = b.ident("x");
        let sum = b.binary(BinaryOp::Add, seen, x);
        let add = b.assign("seen", sum);
        let params = b.params(&[("x", None, None)]);
        let visit = b.closure(params, add, CallableKind::Method);
        let l = b.ident("l");
        let body = b.coroutine(Some(l), "_each", &[visit]);
        let walk_params = b.params(&[("l", Some("List"), None)]);
        vec![coroutine("walk", walk_params, body)]
    })
}

#[test]
fn test_live_each_follows_removals() {
    let mut interp = Interpreter::new();
    let class = walker_class(&mut interp);
    let mind = interp.default_mind().unwrap();
    let walker = interp.new_instance(class, &[]).unwrap();
    let integer = interp.class_named("Integer").unwrap();
    let items = (1..=4).map(|i| interp.integer(i)).collect();
    let list = interp.list(integer, items).unwrap();

    let handle = interp
        .invoke_coroutine(&walker, "walk", &[list.clone()], mind)
        .unwrap();
    assert_eq!(int_field(&interp, &walker, "seen"), Some(1));

    // Drop the visited 1: the walk goes on with 2, not 3.
    let first = interp.integer(0);
    interp.invoke_method(&list, "remove_at", &[first]).unwrap();
    interp.update(mind, 0.1);
    assert_eq!(int_field(&interp, &walker, "seen"), Some(3));

    // Drop the unvisited 3 from [2, 3, 4]: it is never seen.
    let second = interp.integer(1);
    interp.invoke_method(&list, "remove_at", &[second]).unwrap();
    interp.update(mind, 0.1);
    assert_eq!(int_field(&interp, &walker, "seen"), Some(7));

    interp.update(mind, 0.1);
    assert_eq!(handle.status(), FrameStatus::Completed);
    assert_eq!(int_field(&interp, &walker, "seen"), Some(7));
}

#[test]
fn test_live_each_ends_when_list_is_cleared() {
    let mut interp = Interpreter::new();
    let class = walker_class(&mut interp);
    let mind = interp.default_mind().unwrap();
    let walker = interp.new_instance(class, &[]).unwrap();
    let integer = interp.class_named("Integer").unwrap();
    let items = (1..=3).map(|i| interp.integer(i)).collect();
    let list = interp.list(integer, items).unwrap();

    let handle = interp
        .invoke_coroutine(&walker, "walk", &[list.clone()], mind)
        .unwrap();
    interp.update(mind, 0.1);
    assert_eq!(int_field(&interp, &walker, "seen"), Some(3));

    interp.invoke_method(&list, "clear", &[]).unwrap();
    interp.update(mind, 0.1);
    assert_eq!(handle.status(), FrameStatus::Completed);
    assert_eq!(int_field(&interp, &walker, "seen"), Some(3));
}

#[test]
fn test_wait_until_polls_condition() {
    let mut interp = Interpreter::new();
    let class = register(&mut interp, "Gate", &[Field::Data("ready", "Boolean")], |b| {
        let ready = b.ident("ready");
        let params = b.params(&[]);
        let condition = b.closure(params, ready, CallableKind::Method);
        let body = b.coroutine(None, "_wait_until", &[condition]);
        let pass_params = b.params(&[]);

        let t = b.bool(true);
        let open = b.assign("ready", t);
        let open_params = b.params(&[]);
        vec![
            coroutine("pass", pass_params, body),
            method("open", open_params, open),
        ]
    });
    let mind = interp.default_mind().unwrap();
    let gate = interp.new_instance(class, &[]).unwrap();

    let handle = interp.invoke_coroutine(&gate, "pass", &[], mind).unwrap();
    interp.update(mind, 1.0);
    assert_eq!(handle.status(), FrameStatus::Suspended);

    interp.invoke_method(&gate, "open", &[]).unwrap();
    interp.update(mind, 1.0);
    assert_eq!(handle.status(), FrameStatus::Completed);
}

#[test]
fn test_coroutine_handle_members() {
    let mut interp = Interpreter::new();
    let mind = interp.default_mind().unwrap();
    let object = interp.class_named("Object").unwrap();
    let obj = interp.new_instance(object, &[]).unwrap();
    let secs = interp.real(10.0);
    let handle = interp.invoke_coroutine(&obj, "_wait", &[secs], mind).unwrap();
    let observed = interp.handle_instance(&handle);

    let status = interp.invoke_method(&observed, "status", &[]).unwrap();
    assert_eq!(status.as_symbol(), Some(interp.intern("suspended")));
    let running = interp.invoke_method(&observed, "is_running", &[]).unwrap();
    assert_eq!(running.as_bool(), Some(true));

    interp.invoke_method(&observed, "stop", &[]).unwrap();
    assert_eq!(handle.status(), FrameStatus::Stopped);
    let completed = interp.invoke_method(&observed, "is_completed", &[]).unwrap();
    assert_eq!(completed.as_bool(), Some(false));
    let result = interp.invoke_method(&observed, "result", &[]).unwrap();
    assert!(interp.is_none(&result));
}
