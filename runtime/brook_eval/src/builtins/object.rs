//! `Object`, `None`, `Boolean`, `Closure` and `Class`.

use super::{coroutine, Members};
use crate::errors::{type_mismatch, EvalError, EvalResult};
use crate::{Instance, Interpreter};

pub(super) fn object_members(m: Members<'_>) -> Members<'_> {
    let m = m
        .method("equals", &["other"], identical)
        .method("not_equals", &["other"], not_identical)
        .method("to_string", &[], describe)
        .method("class_name", &[], class_name)
        .method("class", &[], class_of)
        .method("is_nil", &[], |interp, _, _| Ok(interp.boolean(false)));
    coroutine::wait_members(m)
}

pub(super) fn none_members(m: Members<'_>) -> Members<'_> {
    m.method("is_nil", &[], |interp, _, _| Ok(interp.boolean(true)))
        .method("to_string", &[], |interp, _, _| Ok(interp.string("nil")))
}

pub(super) fn boolean_members(m: Members<'_>) -> Members<'_> {
    m.method("equals", &["other"], |interp, this, args| {
        let same = this.as_bool().is_some() && this.as_bool() == args[0].as_bool();
        Ok(interp.boolean(same))
    })
    .method("not_equals", &["other"], |interp, this, args| {
        let same = this.as_bool().is_some() && this.as_bool() == args[0].as_bool();
        Ok(interp.boolean(!same))
    })
    .method("not", &[], |interp, this, _| {
        let b = bool_of(interp, this)?;
        Ok(interp.boolean(!b))
    })
    .method("to_string", &[], |interp, this, _| {
        let b = bool_of(interp, this)?;
        Ok(interp.string(b.to_string()))
    })
}

pub(super) fn closure_members(m: Members<'_>) -> Members<'_> {
    m.method("is_coroutine", &[], |interp, this, _| {
        let kind = this
            .as_closure()
            .map(crate::object::Closure::kind)
            .ok_or_else(|| type_mismatch("Closure", interp.class_name_of(this)))?;
        Ok(interp.boolean(kind == brook_ir::CallableKind::Coroutine))
    })
}

pub(super) fn class_members(m: Members<'_>) -> Members<'_> {
    m.method("name", &[], |interp, this, _| {
        let class = class_arg(interp, this)?;
        Ok(interp.string(interp.classes().display_name(class)))
    })
    .method("to_string", &[], |interp, this, _| {
        let class = class_arg(interp, this)?;
        Ok(interp.string(interp.classes().display_name(class)))
    })
    .method("is_subclass", &["other"], |interp, this, args| {
        let class = class_arg(interp, this)?;
        let other = class_arg(interp, &args[0])?;
        Ok(interp.boolean(interp.classes().is_subtype_of(class, other)))
    })
    .method("equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(this.as_class().is_some() && this.as_class() == args[0].as_class()))
    })
}

fn identical(interp: &mut Interpreter, this: &Instance, args: &[Instance]) -> EvalResult {
    Ok(interp.boolean(this.ptr_eq(&args[0])))
}

fn not_identical(interp: &mut Interpreter, this: &Instance, args: &[Instance]) -> EvalResult {
    Ok(interp.boolean(!this.ptr_eq(&args[0])))
}

fn describe(interp: &mut Interpreter, this: &Instance, _: &[Instance]) -> EvalResult {
    Ok(interp.string(interp.describe(this)))
}

fn class_name(interp: &mut Interpreter, this: &Instance, _: &[Instance]) -> EvalResult {
    Ok(interp.string(interp.class_name_of(this)))
}

fn class_of(interp: &mut Interpreter, this: &Instance, _: &[Instance]) -> EvalResult {
    Ok(interp.class_object(this.class()))
}

fn bool_of(interp: &Interpreter, this: &Instance) -> Result<bool, EvalError> {
    this.as_bool()
        .ok_or_else(|| type_mismatch("Boolean", interp.class_name_of(this)))
}

fn class_arg(interp: &Interpreter, value: &Instance) -> Result<crate::class::ClassId, EvalError> {
    value
        .as_class()
        .ok_or_else(|| type_mismatch("Class", interp.class_name_of(value)))
}
