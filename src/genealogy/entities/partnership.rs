//! Partnerships between two characters.

use serde::{Serialize, Deserialize};
use crate::genealogy::{CharacterId, FamilyId, PartnershipId};

/// A symmetric relation between two characters. The first partner is the
/// one drawn as root-1 when the partnership gets its own family.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: PartnershipId,
    pub partners: [CharacterId; 2],
    /// The offspring family, once descendants exist.
    pub family: Option<FamilyId>,
}

impl Partnership {
    pub fn new(id: PartnershipId, a: CharacterId, b: CharacterId) -> Self {
        Self { id, partners: [a, b], family: None }
    }

    pub fn involves(&self, id: CharacterId) -> bool {
        self.partners.contains(&id)
    }

    /// True for the same two characters in either order.
    pub fn joins(&self, a: CharacterId, b: CharacterId) -> bool {
        (self.partners[0] == a && self.partners[1] == b) || (self.partners[0] == b && self.partners[1] == a)
    }
}
