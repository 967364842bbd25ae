//! Expression IDs and ranges for flat expression trees.
//!
//! - `ExprId(u32)` instead of `Box<Expr>`
//! - `(start: u32, len: u16)` ranges for child lists, arguments, parameters
//!   and conditional clauses, each indexing its own side table in the arena

use std::fmt;
use std::hash::{Hash, Hasher};

/// Index into an [`ExprArena`](crate::ExprArena).
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    /// Invalid expression ID (sentinel value).
    pub const INVALID: ExprId = ExprId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        ExprId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Hash for ExprId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ExprId({})", self.0)
        } else {
            write!(f, "ExprId::INVALID")
        }
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::INVALID
    }
}

macro_rules! define_range {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
        pub struct $name {
            pub start: u32,
            pub len: u16,
        }

        impl $name {
            pub const EMPTY: $name = $name { start: 0, len: 0 };

            #[inline]
            pub const fn new(start: u32, len: u16) -> Self {
                $name { start, len }
            }

            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.len == 0
            }

            #[inline]
            pub const fn len(&self) -> usize {
                self.len as usize
            }

            #[inline]
            pub(crate) fn as_range(self) -> std::ops::Range<usize> {
                let start = self.start as usize;
                start..start + self.len as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..{})", stringify!($name), self.start, self.start + u32::from(self.len))
            }
        }
    };
}

define_range!(
    /// Range into the arena's flattened child expression list.
    ExprRange
);
define_range!(
    /// Range of call arguments.
    ArgRange
);
define_range!(
    /// Range of callable parameters.
    ParamRange
);
define_range!(
    /// Range of `(test, body)` clauses of a conditional.
    ClauseRange
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_id_sentinel() {
        assert!(!ExprId::INVALID.is_valid());
        assert!(ExprId::new(0).is_valid());
        assert_eq!(ExprId::default(), ExprId::INVALID);
        assert_eq!(format!("{:?}", ExprId::new(3)), "ExprId(3)");
    }

    #[test]
    fn test_range_bounds() {
        let range = ExprRange::new(4, 3);
        assert_eq!(range.len(), 3);
        assert_eq!(range.as_range(), 4..7);
        assert!(ArgRange::EMPTY.is_empty());
        assert_eq!(format!("{range:?}"), "ExprRange(4..7)");
    }
}
