//! `String` and `Symbol`.

use super::{str_arg, Members};
use crate::errors::{type_mismatch, EvalError};
use crate::{Instance, Interpreter};

pub(super) fn string_members(m: Members<'_>) -> Members<'_> {
    m.method("add", &["other"], |interp, this, args| {
        let joined = format!("{}{}", str_arg(interp, this)?, str_arg(interp, &args[0])?);
        Ok(interp.string(joined))
    })
    .method("length", &[], |interp, this, _| {
        let len = str_arg(interp, this)?.chars().count();
        Ok(interp.integer(i64::try_from(len).unwrap_or(i64::MAX)))
    })
    .method("is_empty", &[], |interp, this, _| {
        let s = str_arg(interp, this)?;
        Ok(interp.boolean(s.is_empty()))
    })
    .method("equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(this.as_str().is_some() && this.as_str() == args[0].as_str()))
    })
    .method("not_equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(!(this.as_str().is_some() && this.as_str() == args[0].as_str())))
    })
    .method("less", &["other"], |interp, this, args| {
        let less = str_arg(interp, this)? < str_arg(interp, &args[0])?;
        Ok(interp.boolean(less))
    })
    .method("greater", &["other"], |interp, this, args| {
        let greater = str_arg(interp, this)? > str_arg(interp, &args[0])?;
        Ok(interp.boolean(greater))
    })
    .method("to_string", &[], |interp, this, _| {
        str_arg(interp, this)?;
        Ok(this.clone())
    })
    .method("to_symbol", &[], |interp, this, _| {
        let sym = interp.intern(str_arg(interp, this)?);
        Ok(interp.symbol(sym))
    })
}

pub(super) fn symbol_members(m: Members<'_>) -> Members<'_> {
    m.method("equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(this.as_symbol().is_some() && this.as_symbol() == args[0].as_symbol()))
    })
    .method("not_equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(!(this.as_symbol().is_some() && this.as_symbol() == args[0].as_symbol())))
    })
    .method("to_string", &[], |interp, this, _| {
        let sym = symbol_of(interp, this)?;
        Ok(interp.string(interp.symbols().text_of(sym)))
    })
}

fn symbol_of(interp: &Interpreter, this: &Instance) -> Result<brook_ir::Symbol, EvalError> {
    this.as_symbol()
        .ok_or_else(|| type_mismatch("Symbol", interp.class_name_of(this)))
}
