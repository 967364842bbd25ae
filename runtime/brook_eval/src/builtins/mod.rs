//! Core classes and their native members.
//!
//! The core class set is fixed and registered before any user class, with
//! `Object` first so that it becomes the implicit root. Every core member is
//! an ordinary native member, dispatched through the same member tables as
//! scripted code; user classes may override any of them.

mod coroutine;
mod list;
mod numeric;
mod object;
mod text;

use brook_ir::{SymbolTable, Symbol};

use crate::class::{
    ClassDecl, ClassId, ClassRegistry, MemberDecl, NativeCoroutineFn, NativeMethodFn,
};
use crate::errors::{type_mismatch, EvalError};
use crate::names::ClassNames;
use crate::{Instance, Interpreter};

/// Ids of the core classes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CoreClasses {
    pub(crate) object: ClassId,
    pub(crate) none: ClassId,
    pub(crate) boolean: ClassId,
    pub(crate) integer: ClassId,
    pub(crate) real: ClassId,
    pub(crate) string: ClassId,
    pub(crate) symbol: ClassId,
    pub(crate) list: ClassId,
    pub(crate) closure: ClassId,
    pub(crate) class: ClassId,
    pub(crate) invoked_coroutine: ClassId,
}

/// Collects native member declarations for one class.
pub(crate) struct Members<'s> {
    symbols: &'s SymbolTable,
    decls: Vec<MemberDecl>,
}

impl<'s> Members<'s> {
    fn new(symbols: &'s SymbolTable) -> Self {
        Self {
            symbols,
            decls: Vec::new(),
        }
    }

    fn params(&self, params: &[&str]) -> Vec<Symbol> {
        params.iter().map(|p| self.symbols.intern(p)).collect()
    }

    pub(crate) fn method(mut self, name: &str, params: &[&str], func: NativeMethodFn) -> Self {
        let params = self.params(params);
        self.decls.push(MemberDecl::native_method(
            self.symbols.intern(name),
            params,
            func,
        ));
        self
    }

    pub(crate) fn coroutine(mut self, name: &str, params: &[&str], func: NativeCoroutineFn) -> Self {
        let params = self.params(params);
        self.decls.push(MemberDecl::native_coroutine(
            self.symbols.intern(name),
            params,
            func,
        ));
        self
    }

    fn into_decl(self, name: Symbol, supertype: Option<ClassId>, classes: &ClassRegistry) -> ClassDecl {
        let mut decl = ClassDecl::new(name);
        if let Some(supertype) = supertype {
            decl = decl.supertype(classes.name_of(supertype));
        }
        self.decls.into_iter().fold(decl, ClassDecl::member)
    }
}

fn register(
    classes: &mut ClassRegistry,
    symbols: &SymbolTable,
    name: Symbol,
    supertype: Option<ClassId>,
    members: fn(Members<'_>) -> Members<'_>,
) -> ClassId {
    let decl = members(Members::new(symbols)).into_decl(name, supertype, classes);
    classes
        .register(decl)
        .unwrap_or_else(|err| panic!("core class `{}`: {err}", symbols.text_of(name)))
}

/// Register the core classes in a fresh registry.
///
/// # Panics
/// Panics if `classes` already holds a conflicting class. That is a
/// construction bug, not a runtime condition.
pub(crate) fn register_core(
    classes: &mut ClassRegistry,
    symbols: &SymbolTable,
    names: &ClassNames,
) -> CoreClasses {
    let object = register(classes, symbols, names.object, None, object::object_members);
    let none = register(classes, symbols, names.none, Some(object), object::none_members);
    let boolean = register(classes, symbols, names.boolean, Some(object), object::boolean_members);
    let integer = register(classes, symbols, names.integer, Some(object), numeric::integer_members);
    let real = register(classes, symbols, names.real, Some(object), numeric::real_members);
    let string = register(classes, symbols, names.string, Some(object), text::string_members);
    let symbol = register(classes, symbols, names.symbol, Some(object), text::symbol_members);
    let list = register(classes, symbols, names.list, Some(object), list::list_members);
    let closure = register(classes, symbols, names.closure, Some(object), object::closure_members);
    let class = register(classes, symbols, names.class, Some(object), object::class_members);
    let invoked_coroutine = register(
        classes,
        symbols,
        names.invoked_coroutine,
        Some(object),
        coroutine::handle_members,
    );
    CoreClasses {
        object,
        none,
        boolean,
        integer,
        real,
        string,
        symbol,
        list,
        closure,
        class,
        invoked_coroutine,
    }
}

// Argument helpers

fn int_arg(interp: &Interpreter, value: &Instance) -> Result<i64, EvalError> {
    value
        .as_int()
        .ok_or_else(|| type_mismatch("Integer", interp.class_name_of(value)))
}

fn number_arg(interp: &Interpreter, value: &Instance) -> Result<f64, EvalError> {
    value
        .as_number()
        .ok_or_else(|| type_mismatch("Real", interp.class_name_of(value)))
}

fn str_arg<'a>(interp: &Interpreter, value: &'a Instance) -> Result<&'a str, EvalError> {
    value
        .as_str()
        .ok_or_else(|| type_mismatch("String", interp.class_name_of(value)))
}

#[cfg(test)]
mod tests;
