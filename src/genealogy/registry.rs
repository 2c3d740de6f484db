//! Identifier and ownership registry.
//!
//! Record tables keyed by id, plus the id generators. The registry answers
//! "who owns what" questions; the rules that keep the tables consistent with
//! each other live in `Document`.

use std::collections::HashMap;

use super::{CharacterId, FamilyId, IdGenerators, KingdomId, PartnershipId};
use super::entities::{Character, Family, Kingdom, Partnership};
use super::error::{GenealogyError, Result};

#[derive(Clone, Debug, Default)]
pub struct Registry {
    pub characters: HashMap<CharacterId, Character>,
    pub families: HashMap<FamilyId, Family>,
    pub partnerships: HashMap<PartnershipId, Partnership>,
    pub kingdoms: HashMap<KingdomId, Kingdom>,

    pub id_generators: IdGenerators,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_character(&self, id: CharacterId) -> Result<&Character> {
        self.characters.get(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Result<&mut Character> {
        self.characters.get_mut(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn family(&self, id: FamilyId) -> Result<&Family> {
        self.families.get(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn family_mut(&mut self, id: FamilyId) -> Result<&mut Family> {
        self.families.get_mut(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn partnership(&self, id: PartnershipId) -> Result<&Partnership> {
        self.partnerships.get(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn partnership_mut(&mut self, id: PartnershipId) -> Result<&mut Partnership> {
        self.partnerships.get_mut(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn kingdom(&self, id: KingdomId) -> Result<&Kingdom> {
        self.kingdoms.get(&id).ok_or(GenealogyError::unknown(id))
    }

    pub fn blood_family(&self, id: CharacterId) -> Result<FamilyId> {
        Ok(self.lookup_character(id)?.blood_family)
    }

    /// The offspring family of a partnership, if it has one yet.
    pub fn partnership_family(&self, id: PartnershipId) -> Result<Option<FamilyId>> {
        Ok(self.partnership(id)?.family)
    }

    /// Partnership linking two characters, in either order.
    pub fn partnership_between(&self, a: CharacterId, b: CharacterId) -> Option<PartnershipId> {
        let character = self.characters.get(&a)?;
        character.partnerships.iter()
            .copied()
            .find(|pid| self.partnerships.get(pid).is_some_and(|p| p.joins(a, b)))
    }

    /// Characters whose recorded parent pair includes `id`.
    pub fn children_of(&self, id: CharacterId) -> Vec<CharacterId> {
        let mut children: Vec<CharacterId> = self.characters.values()
            .filter(|c| c.has_parent(id))
            .map(|c| c.id)
            .collect();
        children.sort();
        children
    }

    /// Characters whose blood family is `family`.
    pub fn blood_members(&self, family: FamilyId) -> Vec<CharacterId> {
        let mut members: Vec<CharacterId> = self.characters.values()
            .filter(|c| c.blood_family == family)
            .map(|c| c.id)
            .collect();
        members.sort();
        members
    }

    pub fn character_ids(&self) -> Vec<CharacterId> {
        let mut ids: Vec<CharacterId> = self.characters.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn family_ids(&self) -> Vec<FamilyId> {
        let mut ids: Vec<FamilyId> = self.families.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn partnership_ids(&self) -> Vec<PartnershipId> {
        let mut ids: Vec<PartnershipId> = self.partnerships.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn kingdom_ids(&self) -> Vec<KingdomId> {
        let mut ids: Vec<KingdomId> = self.kingdoms.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Advance every generator past the highest id in the tables.
    pub fn rebuild_id_generators(&mut self) {
        let next = |max: Option<u64>| max.map(|m| m + 1).unwrap_or(0);
        self.id_generators.character.bump_to(next(self.characters.keys().map(|id| id.0).max()));
        self.id_generators.family.bump_to(next(self.families.keys().map(|id| id.0).max()));
        self.id_generators.partnership.bump_to(next(self.partnerships.keys().map(|id| id.0).max()));
        self.id_generators.kingdom.bump_to(next(self.kingdoms.keys().map(|id| id.0).max()));
    }
}
