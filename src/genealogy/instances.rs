//! Character instance table.
//!
//! A character appears once per family it is drawn in. Each appearance keeps
//! its own coordinates and placement plus a copy of the fields the renderer
//! reads, refreshed whenever the canonical record changes.

use std::collections::HashMap;

use super::{CharacterId, EntityRef, FamilyId, KingdomId};
use super::entities::{Character, Sex};
use super::error::{GenealogyError, Result, Violation};
use super::graph::NodePlacement;
use super::layout::Point;

/// Renderer-facing copy of a character's structural fields.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterSnapshot {
    pub name: String,
    pub sex: Sex,
    pub ruler: bool,
    pub alive: bool,
    pub kingdom: Option<KingdomId>,
}

impl CharacterSnapshot {
    pub fn of(character: &Character) -> Self {
        Self {
            name: character.attributes.name.clone(),
            sex: character.attributes.sex,
            ruler: character.attributes.ruler,
            alive: character.is_alive(),
            kingdom: character.attributes.kingdom,
        }
    }
}

/// One (character, family) appearance.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub family: FamilyId,
    pub position: Point,
    pub placement: NodePlacement,
    pub snapshot: CharacterSnapshot,
}

/// What `remove_instance` left behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    Remaining(usize),
    /// That was the character's last instance.
    Last,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceTable {
    by_character: HashMap<CharacterId, Vec<Instance>>,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&mut self, character: &Character, family: FamilyId, placement: NodePlacement) -> Result<()> {
        let list = self.by_character.entry(character.id).or_default();
        if list.iter().any(|i| i.family == family) {
            return Err(Violation::AlreadyInFamily { character: character.id, family }.into());
        }
        list.push(Instance {
            family,
            position: Point::default(),
            placement,
            snapshot: CharacterSnapshot::of(character),
        });
        Ok(())
    }

    pub fn remove_instance(&mut self, character: CharacterId, family: FamilyId) -> Result<Binding> {
        let list = self.by_character.get_mut(&character)
            .ok_or(GenealogyError::UnknownId(EntityRef::Character(character)))?;
        let index = list.iter().position(|i| i.family == family)
            .ok_or(Violation::NotInFamily { character, family })?;
        list.remove(index);
        if list.is_empty() {
            self.by_character.remove(&character);
            Ok(Binding::Last)
        } else {
            Ok(Binding::Remaining(list.len()))
        }
    }

    /// Instances of a character in insertion order.
    pub fn instances(&self, character: CharacterId) -> &[Instance] {
        self.by_character.get(&character).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn instance(&self, character: CharacterId, family: FamilyId) -> Option<&Instance> {
        self.instances(character).iter().find(|i| i.family == family)
    }

    pub fn instance_mut(&mut self, character: CharacterId, family: FamilyId) -> Option<&mut Instance> {
        self.by_character.get_mut(&character)?.iter_mut().find(|i| i.family == family)
    }

    pub fn families_of(&self, character: CharacterId) -> Vec<FamilyId> {
        self.instances(character).iter().map(|i| i.family).collect()
    }

    /// Re-copy the canonical record into every instance.
    pub fn refresh(&mut self, character: &Character) {
        if let Some(list) = self.by_character.get_mut(&character.id) {
            let snapshot = CharacterSnapshot::of(character);
            for instance in list.iter_mut() {
                instance.snapshot = snapshot.clone();
            }
        }
    }

    /// Move an instance from one family to another, keeping its slot in the
    /// insertion order.
    pub fn rebind(&mut self, character: CharacterId, from: FamilyId, to: FamilyId) -> Result<()> {
        let instance = self.instance_mut(character, from)
            .ok_or(Violation::NotInFamily { character, family: from })?;
        instance.family = to;
        Ok(())
    }

    pub fn characters(&self) -> impl Iterator<Item = CharacterId> + '_ {
        self.by_character.keys().copied()
    }

    /// Total number of instances across all characters.
    pub fn count(&self) -> usize {
        self.by_character.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genealogy::entities::CharacterAttributes;

    fn character(id: u64) -> Character {
        Character::new(CharacterId(id), CharacterAttributes::new("Aldric"), FamilyId(0))
    }

    #[test]
    fn test_instances_keep_insertion_order() {
        let mut table = InstanceTable::new();
        let c = character(1);
        table.add_instance(&c, FamilyId(3), NodePlacement::default()).unwrap();
        table.add_instance(&c, FamilyId(1), NodePlacement::default()).unwrap();
        assert_eq!(table.families_of(c.id), vec![FamilyId(3), FamilyId(1)]);
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_duplicate_instance_is_refused() {
        let mut table = InstanceTable::new();
        let c = character(1);
        table.add_instance(&c, FamilyId(0), NodePlacement::default()).unwrap();
        assert!(table.add_instance(&c, FamilyId(0), NodePlacement::default()).is_err());
    }

    #[test]
    fn test_remove_reports_last_binding() {
        let mut table = InstanceTable::new();
        let c = character(1);
        table.add_instance(&c, FamilyId(0), NodePlacement::default()).unwrap();
        table.add_instance(&c, FamilyId(1), NodePlacement::default()).unwrap();
        assert_eq!(table.remove_instance(c.id, FamilyId(0)).unwrap(), Binding::Remaining(1));
        assert_eq!(table.remove_instance(c.id, FamilyId(1)).unwrap(), Binding::Last);
        assert!(table.instances(c.id).is_empty());
        assert!(table.remove_instance(c.id, FamilyId(1)).is_err());
    }

    #[test]
    fn test_refresh_updates_every_instance() {
        let mut table = InstanceTable::new();
        let mut c = character(1);
        table.add_instance(&c, FamilyId(0), NodePlacement::default()).unwrap();
        table.add_instance(&c, FamilyId(1), NodePlacement::default()).unwrap();
        c.attributes.name = "Aldric the Bold".to_string();
        c.attributes.ruler = true;
        table.refresh(&c);
        for instance in table.instances(c.id) {
            assert_eq!(instance.snapshot.name, "Aldric the Bold");
            assert!(instance.snapshot.ruler);
        }
    }
}
