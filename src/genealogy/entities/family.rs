//! Families: a named graph of related characters.

use serde::{Serialize, Deserialize};
use crate::genealogy::{CharacterId, FamilyId, PartnershipId};
use crate::genealogy::graph::FamilyGraph;
use crate::genealogy::layout::Point;

/// How a family came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FamilyKind {
    /// Offspring family of a partnership; its roots are clones of characters
    /// whose blood families live elsewhere.
    Subset,
    /// One remaining character that is still somebody's blood family.
    Singleton,
    /// Rooted at characters with no recorded ancestry.
    NullTerminated,
    /// Extended upward past its original first generation.
    Endpoint,
}

impl FamilyKind {
    pub fn name(&self) -> &'static str {
        match self {
            FamilyKind::Subset => "subset",
            FamilyKind::Singleton => "singleton",
            FamilyKind::NullTerminated => "null-terminated",
            FamilyKind::Endpoint => "endpoint",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub name: String,
    pub kind: FamilyKind,
    /// Set for partnership families.
    pub partnership: Option<PartnershipId>,
    pub graph: FamilyGraph,
    /// Where root-1 (or the root pair's midpoint) was last drawn.
    #[serde(skip)]
    pub anchor: Point,
}

impl Family {
    pub fn new(id: FamilyId, name: String, kind: FamilyKind, root: CharacterId) -> Self {
        Self {
            id,
            name,
            kind,
            partnership: None,
            graph: FamilyGraph::new(id, root),
            anchor: Point::default(),
        }
    }

    /// Number of distinct character nodes.
    pub fn size(&self) -> usize {
        self.graph.len()
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.graph.contains(id)
    }

    /// The one or two first-generation characters.
    pub fn first_generation(&self) -> Vec<CharacterId> {
        self.graph.roots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_creation() {
        let fam = Family::new(FamilyId(0), "House Ironhelm".to_string(), FamilyKind::NullTerminated, CharacterId(3));
        assert_eq!(fam.size(), 1);
        assert!(fam.contains(CharacterId(3)));
        assert_eq!(fam.first_generation(), vec![CharacterId(3)]);
        assert_eq!(fam.kind.name(), "null-terminated");
    }
}
