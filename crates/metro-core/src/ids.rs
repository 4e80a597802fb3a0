//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  The inner integer is `pub` to allow
//! direct indexing into per-agent `Vec`s via `id.0 as usize`, but callers
//! should prefer the `.index()` helpers for clarity.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a train in the engine's per-agent tables.
    pub struct AgentId(u32);
}

typed_id! {
    /// Index of a physical track resource (crossing or segment) in the
    /// resource table.  Also the global lock-ordering key.
    pub struct ResourceId(u32);
}

impl AgentId {
    /// Single-letter display label: agent 0 is `'A'`, agent 25 is `'Z'`.
    ///
    /// Agents past `'Z'` render as `'?'`; the kernel targets a handful of
    /// trains, not dozens.
    pub fn label(self) -> char {
        if self.0 < 26 {
            char::from(b'A' + self.0 as u8)
        } else {
            '?'
        }
    }

    /// Inverse of [`label`](Self::label) for upper-case ASCII letters.
    pub fn from_label(c: char) -> Option<AgentId> {
        c.is_ascii_uppercase().then(|| AgentId(c as u32 - 'A' as u32))
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "train-{}", self.label())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}
