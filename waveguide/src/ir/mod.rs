//! The Waveguide intermediate representation.
//!
//! Lowered programs are held in a single [`Program`] arena that owns every
//! scope and value by index; scopes hold their commands inline. Parent
//! links, command callees, and proxy targets are all non-owning handles
//! into the arena, so the ownership graph is strictly parent-to-child and
//! cannot form cycles.

pub mod data_type;
pub mod program;
pub mod scope;
pub mod value;

pub use data_type::DataType;
pub use program::Program;
pub use scope::{Augmentation, AutoAdd, Command, Scope};
pub use value::{Storage, Value};

use serde::{Deserialize, Serialize};

/// Handle to a [`Scope`] in a [`Program`] arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ScopeId(pub(crate) u32);

/// Handle to a [`Value`] in a [`Program`] arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ValueId(pub(crate) u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
