//! Family and kingdom filters.
//!
//! Filters never touch the graphs; they only decide which characters and
//! families a layout pass leaves out.

use std::collections::{BTreeSet, HashSet};
use serde::{Serialize, Deserialize};

use crate::genealogy::{CharacterId, FamilyId, KingdomId};
use crate::genealogy::entities::{Character, Family};
use crate::genealogy::graph::Relation;
use crate::genealogy::registry::Registry;

/// `None` means "no restriction".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Families drawn on the canvas.
    pub families: Option<BTreeSet<FamilyId>>,
    /// Kingdoms whose members are drawn. Characters without a kingdom always pass.
    pub kingdoms: Option<BTreeSet<KingdomId>>,
}

impl Filters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn only_kingdoms(kingdoms: impl IntoIterator<Item = KingdomId>) -> Self {
        Self { families: None, kingdoms: Some(kingdoms.into_iter().collect()) }
    }

    pub fn only_families(families: impl IntoIterator<Item = FamilyId>) -> Self {
        Self { families: Some(families.into_iter().collect()), kingdoms: None }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.families.is_none() && self.kingdoms.is_none()
    }

    pub fn shows_family(&self, id: FamilyId) -> bool {
        self.families.as_ref().map_or(true, |set| set.contains(&id))
    }

    pub fn admits(&self, character: &Character) -> bool {
        match (&self.kingdoms, character.attributes.kingdom) {
            (Some(set), Some(kingdom)) => set.contains(&kingdom),
            _ => true,
        }
    }

    /// Forget a deleted kingdom. Returns true if the filter changed.
    pub fn prune_kingdom(&mut self, id: KingdomId) -> bool {
        self.kingdoms.as_mut().is_some_and(|set| set.remove(&id))
    }

    /// Forget a deleted family. Returns true if the filter changed.
    pub fn prune_family(&mut self, id: FamilyId) -> bool {
        self.families.as_mut().is_some_and(|set| set.remove(&id))
    }

    /// Characters of `family` left out of its layout: those failing the
    /// kingdom filter, plus every non-root whose in-family anchors (parents,
    /// or partners for a parentless in-law) are all hidden.
    pub fn hidden_in(&self, registry: &Registry, family: &Family) -> HashSet<CharacterId> {
        let graph = &family.graph;
        let mut hidden: HashSet<CharacterId> = graph.node_ids().iter()
            .copied()
            .filter(|id| registry.characters.get(id).is_some_and(|c| !self.admits(c)))
            .collect();

        let roots = graph.roots();
        let mut ordered: Vec<(u32, bool, CharacterId)> = graph.node_ids().iter()
            .filter(|id| !roots.contains(id))
            .map(|id| {
                let height = graph.placement(*id).map(|p| p.height).unwrap_or(0);
                let parentless = graph.relations(*id, Relation::Parent).map_or(true, |p| p.is_empty());
                (height, parentless, *id)
            })
            .collect();
        ordered.sort();

        for (_, parentless, id) in ordered {
            if hidden.contains(&id) {
                continue;
            }
            let relation = if parentless { Relation::Partner } else { Relation::Parent };
            let anchors = graph.relations(id, relation).unwrap_or_default();
            if !anchors.is_empty() && anchors.iter().all(|a| hidden.contains(a)) {
                hidden.insert(id);
            }
        }
        hidden
    }
}
