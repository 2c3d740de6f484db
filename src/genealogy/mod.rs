//! Family tree relationship and layout core
//!
//! Holds the document of characters, partnerships and families, keeps the
//! per-family graphs and instance table consistent, and lays family trees out
//! on a 2-D canvas.

pub mod arrange;
pub mod calendar;
pub mod config;
pub mod document;
pub mod entities;
pub mod error;
pub mod events;
pub mod generate;
pub mod graph;
pub mod instances;
pub mod layout;
pub mod persistence;
pub mod registry;

#[cfg(test)]
mod scenarios;

use std::fmt;
use serde::{Serialize, Deserialize};

pub use arrange::{CanvasResult, Filters};
pub use config::{DisplayPolicy, IconMode, LayoutConfig, SpacingUpdate};
pub use document::Document;
pub use entities::{Character, CharacterAttributes, Family, FamilyKind, Kingdom, Partnership, Sex};
pub use error::{ErrorCode, GenealogyError, Result, Violation};
pub use events::DocumentEvent;
pub use graph::{FamilyGraph, NodePlacement, Relation, Side};
pub use layout::{BoundingBox, LayoutResult, Point, Segment};

// =============================================================================
// ID TYPES
// =============================================================================

/// Macro to generate newtype ID wrappers with common derives and Display.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(CharacterId);
define_id!(FamilyId);
define_id!(PartnershipId);
define_id!(KingdomId);

// =============================================================================
// ID GENERATOR
// =============================================================================

/// Monotonic ID generator for a specific ID type. Issued values are never
/// handed out again, even after the entity is deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Start from a specific value (useful when loading saves).
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Make sure the generator never issues anything at or below `floor - 1`.
    pub fn bump_to(&mut self, floor: u64) {
        self.next = self.next.max(floor);
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Collection of ID generators for all record types.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerators {
    pub character: IdGenerator,
    pub family: IdGenerator,
    pub partnership: IdGenerator,
    pub kingdom: IdGenerator,
}

impl IdGenerators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_character(&mut self) -> CharacterId { CharacterId(self.character.next_id()) }
    pub fn next_family(&mut self) -> FamilyId { FamilyId(self.family.next_id()) }
    pub fn next_partnership(&mut self) -> PartnershipId { PartnershipId(self.partnership.next_id()) }
    pub fn next_kingdom(&mut self) -> KingdomId { KingdomId(self.kingdom.next_id()) }
}

// =============================================================================
// ENTITY REFERENCE
// =============================================================================

/// A reference to any record in the document (for errors and events).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Character(CharacterId),
    Family(FamilyId),
    Partnership(PartnershipId),
    Kingdom(KingdomId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Character(id) => write!(f, "{}", id),
            EntityRef::Family(id) => write!(f, "{}", id),
            EntityRef::Partnership(id) => write!(f, "{}", id),
            EntityRef::Kingdom(id) => write!(f, "{}", id),
        }
    }
}

impl From<CharacterId> for EntityRef {
    fn from(id: CharacterId) -> Self { EntityRef::Character(id) }
}

impl From<FamilyId> for EntityRef {
    fn from(id: FamilyId) -> Self { EntityRef::Family(id) }
}

impl From<PartnershipId> for EntityRef {
    fn from(id: PartnershipId) -> Self { EntityRef::Partnership(id) }
}

impl From<KingdomId> for EntityRef {
    fn from(id: KingdomId) -> Self { EntityRef::Kingdom(id) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_is_monotonic() {
        let mut gens = IdGenerators::new();
        assert_eq!(gens.next_character(), CharacterId(0));
        assert_eq!(gens.next_character(), CharacterId(1));
        assert_eq!(gens.next_family(), FamilyId(0));
    }

    #[test]
    fn test_bump_never_goes_backwards() {
        let mut gen = IdGenerator::starting_at(10);
        gen.bump_to(4);
        assert_eq!(gen.next_id(), 10);
        gen.bump_to(20);
        assert_eq!(gen.next_id(), 20);
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::from(CharacterId(3)).to_string(), "CharacterId(3)");
    }
}
