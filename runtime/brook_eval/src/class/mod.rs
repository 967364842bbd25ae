//! Class system: registration, subtyping and member dispatch.
//!
//! Classes form an explicit DAG of `ClassRecord`s indexed by `ClassId`, each
//! with an ordered supertype list. Dispatch is data driven: a hash lookup per
//! class along a precomputed ancestor order, memoized per `(class, member)`.
//!
//! # Resolution order
//!
//! A class's ancestor order is computed once at registration: the class
//! itself, then each supertype's ancestor order in declaration order, depth
//! first. An ancestor reachable along several paths (the root `Object` in any
//! multiple-supertype class, or the top of a diamond) keeps only its last
//! position, so every class is searched before the classes it derives from.
//! With single supertypes this is plain depth-first order.

// Rc shares immutable member descriptors between records and the lookup cache.
#![expect(
    clippy::disallowed_types,
    reason = "Rc shares member descriptors with the dispatch cache"
)]

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

use brook_ir::{CallableKind, SharedSymbols, Symbol};

use crate::errors::{
    class_conflict, cyclic_hierarchy, incompatible_override, member_not_found,
    suspending_lifecycle, unknown_class, EvalError, EvalNote,
};
use crate::Instance;

mod member;

pub use member::{MemberBody, MemberDecl, MemberDescriptor, NativeCoroutineFn, NativeMethodFn};

/// Index of a registered class.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
#[repr(transparent)]
pub struct ClassId(u32);

impl ClassId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        ClassId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Declared data member: name plus the class its values must conform to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataMemberDecl {
    pub name: Symbol,
    pub class: Symbol,
}

/// Everything needed to register a class.
#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: Symbol,
    /// Ordered supertypes. Empty means the root class.
    pub supertypes: Vec<Symbol>,
    pub data: Vec<DataMemberDecl>,
    pub class_data: Vec<DataMemberDecl>,
    pub members: Vec<MemberDecl>,
}

impl ClassDecl {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            supertypes: Vec::new(),
            data: Vec::new(),
            class_data: Vec::new(),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn supertype(mut self, name: Symbol) -> Self {
        self.supertypes.push(name);
        self
    }

    #[must_use]
    pub fn data(mut self, name: Symbol, class: Symbol) -> Self {
        self.data.push(DataMemberDecl { name, class });
        self
    }

    #[must_use]
    pub fn class_data(mut self, name: Symbol, class: Symbol) -> Self {
        self.class_data.push(DataMemberDecl { name, class });
        self
    }

    #[must_use]
    pub fn member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }
}

/// One instance data slot in a class layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotInfo {
    pub name: Symbol,
    /// Class values stored in the slot must conform to.
    pub class: ClassId,
    /// Class that declared the slot.
    pub owner: ClassId,
}

struct ClassDataSlot {
    name: Symbol,
    class: ClassId,
    value: Option<Instance>,
}

struct ClassRecord {
    name: Symbol,
    supertypes: Vec<ClassId>,
    /// Direct subclasses, for cache invalidation and introspection.
    subclasses: Vec<ClassId>,
    /// This class followed by every ancestor in resolution order.
    linearization: Vec<ClassId>,
    layout: Vec<SlotInfo>,
    /// Name to layout index; later (more derived) slots shadow earlier ones.
    slot_index: FxHashMap<Symbol, usize>,
    members: FxHashMap<Symbol, Rc<MemberDescriptor>>,
    class_data: Vec<ClassDataSlot>,
    has_destructor: bool,
}

type DispatchCache = FxHashMap<(ClassId, Symbol), Option<Rc<MemberDescriptor>>>;

/// All registered classes of one runtime.
pub struct ClassRegistry {
    symbols: SharedSymbols,
    classes: Vec<ClassRecord>,
    by_name: FxHashMap<Symbol, ClassId>,
    cache: RefCell<DispatchCache>,
    root: Option<ClassId>,
    constructor: Symbol,
    destructor: Symbol,
}

impl ClassRegistry {
    pub fn new(symbols: SharedSymbols) -> Self {
        let constructor = symbols.intern("!");
        let destructor = symbols.intern("!!");
        Self {
            symbols,
            classes: Vec::new(),
            by_name: FxHashMap::default(),
            cache: RefCell::new(FxHashMap::default()),
            root: None,
            constructor,
            destructor,
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    #[inline]
    fn record(&self, class: ClassId) -> &ClassRecord {
        &self.classes[class.index()]
    }

    fn text(&self, symbol: Symbol) -> &'static str {
        self.symbols.text_of(symbol)
    }

    pub fn class_named(&self, name: Symbol) -> Option<ClassId> {
        self.by_name.get(&name).copied()
    }

    pub fn name_of(&self, class: ClassId) -> Symbol {
        self.record(class).name
    }

    /// Class name as text, for diagnostics.
    pub fn display_name(&self, class: ClassId) -> &'static str {
        self.text(self.name_of(class))
    }

    pub fn supertypes(&self, class: ClassId) -> &[ClassId] {
        &self.record(class).supertypes
    }

    pub fn subclasses(&self, class: ClassId) -> &[ClassId] {
        &self.record(class).subclasses
    }

    /// `class` and its ancestors in member resolution order.
    pub fn ancestors(&self, class: ClassId) -> &[ClassId] {
        &self.record(class).linearization
    }

    pub fn layout(&self, class: ClassId) -> &[SlotInfo] {
        &self.record(class).layout
    }

    pub fn slot_index(&self, class: ClassId, name: Symbol) -> Option<usize> {
        self.record(class).slot_index.get(&name).copied()
    }

    pub fn has_destructor(&self, class: ClassId) -> bool {
        self.record(class).has_destructor
    }

    /// Members declared directly on `class`.
    pub fn own_members(&self, class: ClassId) -> impl Iterator<Item = &MemberDescriptor> {
        self.record(class).members.values().map(AsRef::as_ref)
    }

    /// Reachability through the supertype graph. Every class is a subtype of itself.
    pub fn is_subtype_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        class == ancestor || self.record(class).linearization.contains(&ancestor)
    }

    /// Add a class.
    ///
    /// Structural checks run before anything is recorded: a supertype that
    /// already descends from the declared name is a `CyclicHierarchy`, a
    /// duplicate name a `ClassConflict`, and an unregistered supertype or data
    /// member class an `UnknownClass`.
    pub fn register(&mut self, decl: ClassDecl) -> Result<ClassId, EvalError> {
        let class_text = self.text(decl.name);

        if decl.supertypes.contains(&decl.name) {
            return Err(cyclic_hierarchy(class_text, class_text));
        }
        if let Some(existing) = self.class_named(decl.name) {
            for sup in &decl.supertypes {
                if let Some(sup_id) = self.class_named(*sup) {
                    if self.is_subtype_of(sup_id, existing) {
                        return Err(cyclic_hierarchy(class_text, self.text(*sup)));
                    }
                }
            }
            return Err(class_conflict(class_text));
        }

        let mut supertypes = Vec::with_capacity(decl.supertypes.len().max(1));
        for sup in &decl.supertypes {
            let id = self
                .class_named(*sup)
                .ok_or_else(|| unknown_class(self.text(*sup)))?;
            if !supertypes.contains(&id) {
                supertypes.push(id);
            }
        }
        if supertypes.is_empty() {
            if let Some(root) = self.root {
                supertypes.push(root);
            }
        }

        let id = ClassId::new(
            u32::try_from(self.classes.len()).map_err(|_| EvalError::new("too many classes"))?,
        );

        let data_class = |this: &Self, member: &DataMemberDecl| -> Result<ClassId, EvalError> {
            if member.class == decl.name {
                return Ok(id);
            }
            this.class_named(member.class)
                .ok_or_else(|| unknown_class(this.text(member.class)))
        };

        let mut own_slots = Vec::with_capacity(decl.data.len());
        for member in &decl.data {
            own_slots.push(SlotInfo {
                name: member.name,
                class: data_class(self, member)?,
                owner: id,
            });
        }
        let mut class_data = Vec::with_capacity(decl.class_data.len());
        for member in &decl.class_data {
            class_data.push((member.name, data_class(self, member)?));
        }

        for member in &decl.members {
            self.check_lifecycle(member, class_text)?;
            self.check_override(&supertypes, member, class_text)?;
        }

        let linearization = self.linearize(id, &supertypes);

        let mut layout: Vec<SlotInfo> = Vec::new();
        for sup in &supertypes {
            for slot in &self.record(*sup).layout {
                if !layout
                    .iter()
                    .any(|s| s.owner == slot.owner && s.name == slot.name)
                {
                    layout.push(*slot);
                }
            }
        }
        layout.extend(own_slots);
        let slot_index = layout
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.name, i))
            .collect();

        let has_destructor = decl.members.iter().any(|m| m.name == self.destructor)
            || supertypes.iter().any(|s| self.record(*s).has_destructor);

        let members = decl
            .members
            .into_iter()
            .map(|m| (m.name, Rc::new(MemberDescriptor::from_decl(m, id))))
            .collect();

        for sup in &supertypes {
            self.classes[sup.index()].subclasses.push(id);
        }
        self.classes.push(ClassRecord {
            name: decl.name,
            supertypes,
            subclasses: Vec::new(),
            linearization,
            layout,
            slot_index,
            members,
            // Values are filled in by the interpreter once the class exists.
            class_data: class_data
                .into_iter()
                .map(|(name, class)| ClassDataSlot {
                    name,
                    class,
                    value: None,
                })
                .collect(),
            has_destructor,
        });
        self.by_name.insert(decl.name, id);
        if self.root.is_none() {
            self.root = Some(id);
        }

        tracing::debug!(class = class_text, id = id.raw(), "registered class");
        Ok(id)
    }

    fn linearize(&self, id: ClassId, supertypes: &[ClassId]) -> Vec<ClassId> {
        let mut sequence = vec![id];
        for sup in supertypes {
            sequence.extend_from_slice(&self.record(*sup).linearization);
        }
        // Keep the last occurrence of every class.
        let mut seen = FxHashSet::default();
        let mut order: Vec<ClassId> = sequence
            .into_iter()
            .rev()
            .filter(|c| seen.insert(*c))
            .collect();
        order.reverse();
        order
    }

    /// Constructors and destructors run to completion.
    fn check_lifecycle(&self, member: &MemberDecl, class_text: &str) -> Result<(), EvalError> {
        let lifecycle = member.name == self.constructor || member.name == self.destructor;
        if lifecycle && member.kind == CallableKind::Coroutine {
            return Err(suspending_lifecycle(class_text, self.text(member.name)));
        }
        Ok(())
    }

    fn check_override(
        &self,
        supertypes: &[ClassId],
        member: &MemberDecl,
        class_text: &str,
    ) -> Result<(), EvalError> {
        for sup in supertypes {
            if let Some(inherited) = self.find_member(*sup, member.name) {
                if inherited.kind != member.kind {
                    return Err(incompatible_override(class_text, self.text(member.name)));
                }
            }
        }
        Ok(())
    }

    /// Look up `name` starting at `class`, without error reporting.
    pub fn find_member(&self, class: ClassId, name: Symbol) -> Option<Rc<MemberDescriptor>> {
        if let Some(hit) = self.cache.borrow().get(&(class, name)) {
            return hit.clone();
        }
        let found = self
            .record(class)
            .linearization
            .iter()
            .find_map(|c| self.record(*c).members.get(&name).cloned());
        self.cache.borrow_mut().insert((class, name), found.clone());
        found
    }

    /// Dispatch `name` on an instance of `class`.
    ///
    /// Without a qualifier the most derived definition wins. A qualifier
    /// names an ancestor at which the search starts, reaching definitions
    /// that `class` overrides.
    pub fn resolve_member(
        &self,
        class: ClassId,
        name: Symbol,
        qualifier: Option<ClassId>,
    ) -> Result<Rc<MemberDescriptor>, EvalError> {
        let start = match qualifier {
            Some(q) if !self.is_subtype_of(class, q) => {
                return Err(
                    member_not_found(self.text(name), self.display_name(class)).with_note(
                        EvalNote::new(format!(
                            "`{}` is not an ancestor of `{}`",
                            self.display_name(q),
                            self.display_name(class)
                        )),
                    ),
                );
            }
            Some(q) => q,
            None => class,
        };
        self.find_member(start, name)
            .ok_or_else(|| member_not_found(self.text(name), self.display_name(class)))
    }

    /// Add or replace a member on a registered class.
    ///
    /// Used for hot reload: the new body is visible to every subsequent
    /// dispatch on `class` and its descendants.
    pub fn define_member(&mut self, class: ClassId, decl: MemberDecl) -> Result<(), EvalError> {
        let class_text = self.display_name(class);
        let supertypes = self.record(class).supertypes.clone();
        self.check_lifecycle(&decl, class_text)?;
        self.check_override(&supertypes, &decl, class_text)?;
        if let Some(existing) = self.record(class).members.get(&decl.name) {
            if existing.kind != decl.kind {
                return Err(incompatible_override(class_text, self.text(decl.name)));
            }
        }

        let name = decl.name;
        let descriptor = Rc::new(MemberDescriptor::from_decl(decl, class));
        self.classes[class.index()].members.insert(name, descriptor);

        let affected = self.descendants(class);
        self.cache
            .borrow_mut()
            .retain(|(c, n), _| *n != name || !affected.contains(c));
        if name == self.destructor {
            for c in &affected {
                self.classes[c.index()].has_destructor = true;
            }
        }
        tracing::debug!(
            class = class_text,
            member = self.text(name),
            invalidated = affected.len(),
            "defined member"
        );
        Ok(())
    }

    /// `class` and everything deriving from it.
    fn descendants(&self, class: ClassId) -> FxHashSet<ClassId> {
        let mut found = FxHashSet::default();
        let mut stack = vec![class];
        while let Some(c) = stack.pop() {
            if found.insert(c) {
                stack.extend_from_slice(&self.record(c).subclasses);
            }
        }
        found
    }

    /// Find the class data slot `name` visible from `class`: own first, then ancestors.
    pub fn class_data_slot(&self, class: ClassId, name: Symbol) -> Option<(ClassId, usize)> {
        self.record(class).linearization.iter().find_map(|c| {
            self.record(*c)
                .class_data
                .iter()
                .position(|slot| slot.name == name)
                .map(|idx| (*c, idx))
        })
    }

    /// Declared `(name, class)` of every class data slot of `class`.
    pub fn class_data_decls(&self, class: ClassId) -> Vec<(Symbol, ClassId)> {
        self.record(class)
            .class_data
            .iter()
            .map(|slot| (slot.name, slot.class))
            .collect()
    }

    pub fn class_data(&self, class: ClassId, index: usize) -> Option<Instance> {
        self.record(class)
            .class_data
            .get(index)
            .and_then(|slot| slot.value.clone())
    }

    /// Replace a class data value, returning the previous one.
    pub fn set_class_data(
        &mut self,
        class: ClassId,
        index: usize,
        value: Instance,
    ) -> Option<Instance> {
        self.classes[class.index()]
            .class_data
            .get_mut(index)
            .and_then(|slot| slot.value.replace(value))
    }

    /// Drop every class data value. Used at teardown to break reference
    /// cycles through class data.
    pub(crate) fn clear_class_data(&mut self) -> Vec<Instance> {
        let mut released = Vec::new();
        for record in &mut self.classes {
            released.extend(record.class_data.iter_mut().filter_map(|slot| slot.value.take()));
        }
        released
    }
}

#[cfg(test)]
mod tests;
