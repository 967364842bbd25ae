//! Sharded symbol table.
//!
//! Text to `Symbol` is a bijection for the lifetime of the table: interning
//! the same text twice returns the same id, and `text_of` is its inverse.
//! Identifiers are never evicted.

// Arc is needed for SharedSymbols: one table can back several runtimes, each
// possibly loading scripts on its own thread.
#![expect(
    clippy::disallowed_types,
    reason = "Arc required for SharedSymbols thread-safety"
)]

use super::Symbol;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shard {
    ids: FxHashMap<&'static str, u32>,
    texts: Vec<&'static str>,
}

impl Shard {
    fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
            texts: Vec::with_capacity(128),
        }
    }

    fn with_empty() -> Self {
        let mut shard = Self::new();
        shard.ids.insert("", 0);
        shard.texts.push("");
        shard
    }
}

/// Error when interning a symbol fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// Shard exceeded its 28-bit local index space.
    ShardOverflow { shard_idx: usize, count: usize },
}

impl std::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolError::ShardOverflow { shard_idx, count } => write!(
                f,
                "symbol shard {shard_idx} is full: {count} symbols, max is {}",
                Symbol::MAX_LOCAL
            ),
        }
    }
}

impl std::error::Error for SymbolError {}

/// Sharded symbol table for concurrent interning.
///
/// # Thread Safety
/// Each shard sits behind its own `RwLock`; lookups of already interned text
/// only take a read lock. Wrap in [`SharedSymbols`] to share between threads.
pub struct SymbolTable {
    shards: [RwLock<Shard>; Symbol::NUM_SHARDS],
    total: AtomicUsize,
}

impl SymbolTable {
    /// Create a table with the runtime's core identifiers pre-interned.
    pub fn new() -> Self {
        let shards = std::array::from_fn(|i| {
            if i == 0 {
                RwLock::new(Shard::with_empty())
            } else {
                RwLock::new(Shard::new())
            }
        });
        let table = Self {
            shards,
            total: AtomicUsize::new(1),
        };
        table.pre_intern_core();
        table
    }

    #[inline]
    fn shard_for(text: &str) -> usize {
        // The empty string is pre-interned as `Symbol::EMPTY` in shard 0.
        if text.is_empty() {
            return 0;
        }
        let mut hasher = FxHasher::default();
        hasher.write(text.as_bytes());
        #[expect(
            clippy::cast_possible_truncation,
            reason = "modulo NUM_SHARDS always fits in usize"
        )]
        let idx = (hasher.finish() % Symbol::NUM_SHARDS as u64) as usize;
        idx
    }

    fn insert<S: AsRef<str> + Into<String>>(&self, text: S) -> Result<Symbol, SymbolError> {
        let shard_idx = Self::shard_for(text.as_ref());
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard_idx is bounded by NUM_SHARDS (16)"
        )]
        let shard_u32 = shard_idx as u32;
        let shard = &self.shards[shard_idx];

        if let Some(&local) = shard.read().ids.get(text.as_ref()) {
            return Ok(Symbol::new(shard_u32, local));
        }

        let mut guard = shard.write();
        // Another thread may have won the race between the two locks.
        if let Some(&local) = guard.ids.get(text.as_ref()) {
            return Ok(Symbol::new(shard_u32, local));
        }

        let count = guard.texts.len();
        let local = u32::try_from(count)
            .ok()
            .filter(|local| *local <= Symbol::MAX_LOCAL)
            .ok_or(SymbolError::ShardOverflow { shard_idx, count })?;

        let leaked: &'static str = Box::leak(text.into().into_boxed_str());
        guard.texts.push(leaked);
        guard.ids.insert(leaked, local);
        self.total.fetch_add(1, Ordering::Relaxed);

        Ok(Symbol::new(shard_u32, local))
    }

    /// Intern `text`, returning its symbol or an error on shard overflow.
    #[inline]
    pub fn try_intern(&self, text: &str) -> Result<Symbol, SymbolError> {
        self.insert(text)
    }

    /// Intern `text`.
    ///
    /// # Panics
    /// Panics if a shard overflows. Use `try_intern` to handle that case.
    #[inline]
    pub fn intern(&self, text: &str) -> Symbol {
        self.try_intern(text).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Intern an owned string without copying it again.
    pub fn try_intern_owned(&self, text: String) -> Result<Symbol, SymbolError> {
        self.insert(text)
    }

    /// Intern an owned string without copying it again.
    ///
    /// # Panics
    /// Panics if a shard overflows.
    pub fn intern_owned(&self, text: String) -> Symbol {
        self.try_intern_owned(text).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Text of an interned symbol, or `None` if the id was never issued.
    pub fn try_text_of(&self, symbol: Symbol) -> Option<&'static str> {
        self.shards
            .get(symbol.shard())
            .and_then(|shard| shard.read().texts.get(symbol.local()).copied())
    }

    /// Text of an interned symbol.
    ///
    /// # Panics
    /// Panics on an id this table never issued. That is a programmer error,
    /// not a recoverable condition.
    pub fn text_of(&self, symbol: Symbol) -> &'static str {
        self.try_text_of(symbol)
            .unwrap_or_else(|| panic!("invalid symbol id {:#x}", symbol.raw()))
    }

    /// Number of interned symbols, including the empty string.
    pub fn len(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// True when only the empty string has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn pre_intern_core(&self) {
        const CORE: &[&str] = &[
            // Core classes
            "Object",
            "None",
            "Boolean",
            "Integer",
            "Real",
            "String",
            "Symbol",
            "List",
            "Closure",
            "Class",
            "InvokedCoroutine",
            // Lifecycle members
            "!",
            "!!",
            // Operator methods
            "add",
            "subtract",
            "multiply",
            "divide",
            "remainder",
            "equals",
            "not_equals",
            "less",
            "less_or_equal",
            "greater",
            "greater_or_equal",
            "negated",
            "not",
            // Scheduler
            "_wait",
            "_wait_until",
            "_wait_event",
            "_wait_for",
            "branch",
            "sync",
            "race",
            "any",
        ];

        for text in CORE {
            self.intern(text);
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbol table shared between runtimes and loader threads.
#[derive(Clone)]
pub struct SharedSymbols(Arc<SymbolTable>);

impl SharedSymbols {
    pub fn new() -> Self {
        SharedSymbols(Arc::new(SymbolTable::new()))
    }

    /// True when both handles point at the same table.
    pub fn same_table(&self, other: &SharedSymbols) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for SharedSymbols {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for SharedSymbols {
    type Target = SymbolTable;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests;
