use super::*;
use crate::errors::{EvalErrorKind, EvalResult};
use crate::Interpreter;
use brook_ir::CallableKind;
use pretty_assertions::assert_eq;

fn answer(_: &mut Interpreter, this: &Instance, _: &[Instance]) -> EvalResult {
    Ok(this.clone())
}

struct Fixture {
    symbols: SharedSymbols,
    registry: ClassRegistry,
    object: ClassId,
}

impl Fixture {
    fn new() -> Self {
        let symbols = SharedSymbols::default();
        let mut registry = ClassRegistry::new(symbols.clone());
        let object = registry
            .register(ClassDecl::new(symbols.intern("Object")))
            .unwrap();
        Fixture {
            symbols,
            registry,
            object,
        }
    }

    fn sym(&self, text: &str) -> Symbol {
        self.symbols.intern(text)
    }

    fn class(&mut self, name: &str, supertypes: &[&str]) -> ClassId {
        let mut decl = ClassDecl::new(self.sym(name));
        for sup in supertypes {
            decl = decl.supertype(self.sym(sup));
        }
        self.registry.register(decl).unwrap()
    }

    fn class_with_method(&mut self, name: &str, supertypes: &[&str], method: &str) -> ClassId {
        let mut decl = ClassDecl::new(self.sym(name))
            .member(MemberDecl::native_method(self.sym(method), Vec::new(), answer));
        for sup in supertypes {
            decl = decl.supertype(self.sym(sup));
        }
        self.registry.register(decl).unwrap()
    }
}

#[test]
fn test_root_is_implicit_supertype() {
    let mut fx = Fixture::new();
    let thing = fx.class("Thing", &[]);
    assert_eq!(fx.registry.supertypes(thing), &[fx.object]);
    assert_eq!(fx.registry.subclasses(fx.object), &[thing]);
    assert!(fx.registry.supertypes(fx.object).is_empty());
}

#[test]
fn test_subtype_is_reflexive_and_transitive() {
    let mut fx = Fixture::new();
    let a = fx.class("A", &[]);
    let b = fx.class("B", &["A"]);
    let c = fx.class("C", &["B"]);

    assert!(fx.registry.is_subtype_of(c, c));
    assert!(fx.registry.is_subtype_of(c, b));
    assert!(fx.registry.is_subtype_of(c, a));
    assert!(fx.registry.is_subtype_of(c, fx.object));
    assert!(!fx.registry.is_subtype_of(a, c));
}

#[test]
fn test_duplicate_name_is_class_conflict() {
    let mut fx = Fixture::new();
    fx.class("A", &[]);
    let err = fx
        .registry
        .register(ClassDecl::new(fx.sym("A")))
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::ClassConflict {
            class: "A".to_string()
        }
    );
}

#[test]
fn test_redeclaring_with_descendant_supertype_is_cyclic() {
    let mut fx = Fixture::new();
    fx.class("A", &[]);
    fx.class("B", &["A"]);
    fx.class("C", &["B"]);

    let err = fx
        .registry
        .register(ClassDecl::new(fx.sym("A")).supertype(fx.sym("C")))
        .unwrap_err();
    assert_eq!(err.kind.name(), "CyclicHierarchy");
    // Nothing changed.
    assert_eq!(fx.registry.len(), 4);
}

#[test]
fn test_self_supertype_is_cyclic() {
    let mut fx = Fixture::new();
    let err = fx
        .registry
        .register(ClassDecl::new(fx.sym("Loop")).supertype(fx.sym("Loop")))
        .unwrap_err();
    assert_eq!(err.kind.name(), "CyclicHierarchy");
    assert_eq!(fx.registry.class_named(fx.sym("Loop")), None);
}

#[test]
fn test_unknown_supertype_and_data_class() {
    let mut fx = Fixture::new();
    let err = fx
        .registry
        .register(ClassDecl::new(fx.sym("A")).supertype(fx.sym("Missing")))
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::UnknownClass {
            name: "Missing".to_string()
        }
    );

    let err = fx
        .registry
        .register(ClassDecl::new(fx.sym("B")).data(fx.sym("x"), fx.sym("Nope")))
        .unwrap_err();
    assert_eq!(err.kind.name(), "UnknownClass");
}

#[test]
fn test_data_member_may_name_own_class() {
    let mut fx = Fixture::new();
    let node = fx
        .registry
        .register(ClassDecl::new(fx.sym("Node")).data(fx.sym("next"), fx.sym("Node")))
        .unwrap();
    assert_eq!(fx.registry.layout(node)[0].class, node);
}

#[test]
fn test_override_resolves_most_derived() {
    let mut fx = Fixture::new();
    let base = fx.class_with_method("Base", &[], "speak");
    let derived = fx.class_with_method("Derived", &["Base"], "speak");
    let speak = fx.sym("speak");

    let found = fx.registry.resolve_member(derived, speak, None).unwrap();
    assert_eq!(found.owner, derived);

    let qualified = fx
        .registry
        .resolve_member(derived, speak, Some(base))
        .unwrap();
    assert_eq!(qualified.owner, base);
}

#[test]
fn test_qualifier_must_be_ancestor() {
    let mut fx = Fixture::new();
    let a = fx.class_with_method("A", &[], "go");
    let b = fx.class_with_method("B", &[], "go");
    let err = fx
        .registry
        .resolve_member(a, fx.sym("go"), Some(b))
        .unwrap_err();
    assert_eq!(err.kind.name(), "MemberNotFound");
    assert_eq!(err.notes.len(), 1);
}

#[test]
fn test_missing_member_is_recoverable_error() {
    let mut fx = Fixture::new();
    let a = fx.class("A", &[]);
    let err = fx
        .registry
        .resolve_member(a, fx.sym("fly"), None)
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::MemberNotFound {
            member: "fly".to_string(),
            class: "A".to_string()
        }
    );
}

#[test]
fn test_diamond_linearization() {
    let mut fx = Fixture::new();
    let a = fx.class_with_method("A", &[], "who");
    let b = fx.class("B", &["A"]);
    let c = fx.class_with_method("C", &["A"], "who");
    let d = fx.class("D", &["B", "C"]);

    assert_eq!(fx.registry.ancestors(d), &[d, b, c, a, fx.object]);
    // C overrides A and is searched before A even though B comes first.
    let found = fx.registry.resolve_member(d, fx.sym("who"), None).unwrap();
    assert_eq!(found.owner, c);
}

#[test]
fn test_first_supertype_wins_between_siblings() {
    let mut fx = Fixture::new();
    let left = fx.class_with_method("Left", &[], "side");
    fx.class_with_method("Right", &[], "side");
    let both = fx.class("Both", &["Left", "Right"]);

    let found = fx
        .registry
        .resolve_member(both, fx.sym("side"), None)
        .unwrap();
    assert_eq!(found.owner, left);
}

#[test]
fn test_diamond_contributes_slots_once() {
    let mut fx = Fixture::new();
    let integer = fx.class("Integer", &[]);
    let a = fx
        .registry
        .register(ClassDecl::new(fx.sym("A")).data(fx.sym("x"), fx.sym("Integer")))
        .unwrap();
    fx.class("B", &["A"]);
    fx.class("C", &["A"]);
    let d = fx
        .registry
        .register(
            ClassDecl::new(fx.sym("D"))
                .supertype(fx.sym("B"))
                .supertype(fx.sym("C"))
                .data(fx.sym("y"), fx.sym("Integer")),
        )
        .unwrap();

    let layout = fx.registry.layout(d);
    assert_eq!(layout.len(), 2);
    assert_eq!(layout[0].owner, a);
    assert_eq!(layout[0].class, integer);
    assert_eq!(fx.registry.slot_index(d, fx.sym("y")), Some(1));
    assert_eq!(fx.registry.slot_index(d, fx.sym("x")), Some(0));
}

#[test]
fn test_incompatible_override_rejected() {
    let mut fx = Fixture::new();
    fx.class_with_method("Base", &[], "act");
    let act = fx.sym("act");
    let err = fx
        .registry
        .register(
            ClassDecl::new(fx.sym("Derived"))
                .supertype(fx.sym("Base"))
                .member(MemberDecl::native_coroutine(act, Vec::new(), |_| {
                    Ok(crate::mind::Poll::Pending(crate::mind::Wake::Tick))
                })),
        )
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::IncompatibleOverride {
            class: "Derived".to_string(),
            member: "act".to_string()
        }
    );
}

fn waits_forever(_: &mut crate::mind::CoroutineContext<'_>) -> Result<crate::mind::Poll, EvalError> {
    Ok(crate::mind::Poll::Pending(crate::mind::Wake::Tick))
}

#[test]
fn test_suspending_destructor_rejected() {
    let mut fx = Fixture::new();
    let before = fx.registry.len();
    let err = fx
        .registry
        .register(
            ClassDecl::new(fx.sym("Lingering"))
                .member(MemberDecl::native_coroutine(fx.sym("!!"), Vec::new(), waits_forever)),
        )
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::SuspendingLifecycle {
            class: "Lingering".to_string(),
            member: "!!".to_string()
        }
    );
    assert_eq!(fx.registry.len(), before);
    assert!(fx.registry.class_named(fx.sym("Lingering")).is_none());
}

#[test]
fn test_suspending_constructor_rejected_on_reload() {
    let mut fx = Fixture::new();
    let plain = fx.class("Plain", &[]);
    let ctor = MemberDecl::native_coroutine(fx.sym("!"), Vec::new(), waits_forever);
    let err = fx.registry.define_member(plain, ctor).unwrap_err();
    assert_eq!(err.kind.name(), "SuspendingLifecycle");
    assert!(fx.registry.find_member(plain, fx.sym("!")).is_none());
}

#[test]
fn test_define_member_invalidates_descendant_cache() {
    let mut fx = Fixture::new();
    let base = fx.class_with_method("Base", &[], "greet");
    let derived = fx.class("Derived", &["Base"]);
    let greet = fx.sym("greet");

    assert_eq!(
        fx.registry.resolve_member(derived, greet, None).unwrap().owner,
        base
    );

    fx.registry
        .define_member(derived, MemberDecl::native_method(greet, Vec::new(), answer))
        .unwrap();
    assert_eq!(
        fx.registry.resolve_member(derived, greet, None).unwrap().owner,
        derived
    );
}

#[test]
fn test_define_member_reaches_existing_subclasses() {
    let mut fx = Fixture::new();
    let base = fx.class("Base", &[]);
    let derived = fx.class("Derived", &["Base"]);
    let wave = fx.sym("wave");

    assert!(fx.registry.find_member(derived, wave).is_none());
    fx.registry
        .define_member(base, MemberDecl::native_method(wave, Vec::new(), answer))
        .unwrap();
    let found = fx.registry.find_member(derived, wave).unwrap();
    assert_eq!(found.owner, base);
    assert_eq!(found.kind, CallableKind::Method);
}

#[test]
fn test_destructor_flag_is_inherited() {
    let mut fx = Fixture::new();
    let with = fx.class_with_method("Resource", &[], "!!");
    let derived = fx.class("File", &["Resource"]);
    let plain = fx.class("Plain", &[]);
    assert!(fx.registry.has_destructor(with));
    assert!(fx.registry.has_destructor(derived));
    assert!(!fx.registry.has_destructor(plain));
}

#[test]
fn test_class_data_lookup_walks_ancestors() {
    let mut fx = Fixture::new();
    fx.class("Integer", &[]);
    let base = fx
        .registry
        .register(ClassDecl::new(fx.sym("Base")).class_data(fx.sym("count"), fx.sym("Integer")))
        .unwrap();
    let derived = fx.class("Derived", &["Base"]);

    assert_eq!(
        fx.registry.class_data_slot(derived, fx.sym("count")),
        Some((base, 0))
    );
    assert_eq!(fx.registry.class_data_slot(derived, fx.sym("other")), None);
    assert!(fx.registry.class_data(base, 0).is_none());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Every class built from earlier classes is a subtype of each of its
        // declared supertypes and their ancestors.
        #[test]
        fn prop_subtype_follows_declaration(parents in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..3), 1..12)) {
            let mut fx = Fixture::new();
            let mut ids = vec![fx.object];
            for (i, picks) in parents.iter().enumerate() {
                let name = format!("C{i}");
                let mut decl = ClassDecl::new(fx.sym(&name));
                let mut chosen = Vec::new();
                for pick in picks {
                    let sup = *pick.get(&ids);
                    chosen.push(sup);
                    decl = decl.supertype(fx.registry.name_of(sup));
                }
                let id = fx.registry.register(decl).unwrap();
                for sup in chosen {
                    prop_assert!(fx.registry.is_subtype_of(id, sup));
                    for ancestor in fx.registry.ancestors(sup).to_vec() {
                        prop_assert!(fx.registry.is_subtype_of(id, ancestor));
                    }
                }
                prop_assert!(!fx.registry.is_subtype_of(fx.object, id));
                ids.push(id);
            }
        }
    }
}
