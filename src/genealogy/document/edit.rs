//! Creation and editing of characters, partnerships and kingdoms.

use tracing::debug;

use crate::genealogy::{CharacterId, FamilyId, KingdomId, PartnershipId};
use crate::genealogy::entities::{CharacterAttributes, FamilyKind, Kingdom, Partnership};
use crate::genealogy::error::{GenealogyError, Result, Violation};
use crate::genealogy::events::ChangeSet;
use crate::genealogy::graph::Relation;
use super::Document;

impl Document {
    /// Create a character. Without a family it founds a new null-terminated
    /// family; with one it joins that family's first generation as root-2.
    pub fn create_character(&mut self, attrs: CharacterAttributes, blood_family: Option<FamilyId>) -> Result<CharacterId> {
        self.transact(|doc, changes| {
            let Some(family) = blood_family else {
                // new_family issues the peeked id.
                let family = FamilyId(doc.registry.id_generators.family.peek());
                let id = doc.spawn_character(changes, attrs, family)?;
                doc.new_family(changes, FamilyKind::NullTerminated, id)?;
                debug!(character = %id, family = %family, "character created");
                return Ok(id);
            };

            let graph = &doc.registry.family(family)?.graph;
            let root = graph.root().ok_or(GenealogyError::unknown(family))?;
            if graph.second_root().is_some() {
                return Err(Violation::FirstGenerationFull(family).into());
            }
            let id = doc.spawn_character(changes, attrs, family)?;
            doc.attach(id, family, root, Relation::Partner)?;
            doc.record_partnership(changes, root, id)?;
            debug!(character = %id, family = %family, "character joined first generation");
            Ok(id)
        })
    }

    /// Create a child of a partnership. The first child materialises the
    /// partnership family: the partners' shared family if they are already
    /// drawn together, otherwise a new subset family with both as roots.
    pub fn add_child(&mut self, attrs: CharacterAttributes, partnership: PartnershipId) -> Result<CharacterId> {
        self.transact(|doc, changes| {
            let [a, b] = doc.registry.partnership(partnership)?.partners;
            let family = match doc.registry.partnership(partnership)?.family {
                Some(family) => family,
                None => {
                    let family = match doc.shared_family(a, b) {
                        Some(family) => family,
                        None => doc.subset_family(changes, partnership, a, b)?,
                    };
                    doc.registry.partnership_mut(partnership)?.family = Some(family);
                    family
                }
            };
            for parent in [a, b] {
                if !doc.registry.family(family)?.contains(parent) {
                    return Err(Violation::NotInFamily { character: parent, family }.into());
                }
            }

            let id = doc.spawn_character(changes, attrs, family)?;
            doc.registry.character_mut(id)?.parents = Some((a, b));
            doc.attach(id, family, a, Relation::Descendant)?;
            doc.registry.family_mut(family)?.graph.link_parent(id, b)?;
            doc.sync_placements(family)?;
            debug!(character = %id, family = %family, partnership = %partnership, "child added");
            Ok(id)
        })
    }

    /// Create a partner of `of` in `of`'s blood family.
    pub fn add_partner(&mut self, attrs: CharacterAttributes, of: CharacterId) -> Result<CharacterId> {
        self.transact(|doc, changes| {
            let family = doc.registry.blood_family(of)?;
            let id = doc.spawn_character(changes, attrs, family)?;
            doc.attach(id, family, of, Relation::Partner)?;
            doc.record_partnership(changes, of, id)?;
            debug!(character = %id, partner = %of, "partner added");
            Ok(id)
        })
    }

    /// Create an ancestor above root-1 of `of`'s blood family. The former
    /// first generation moves down one level and is re-homed into this
    /// family; their old single-member blood families are deleted.
    pub fn add_parent(&mut self, attrs: CharacterAttributes, of: CharacterId) -> Result<CharacterId> {
        self.transact(|doc, changes| {
            let family = doc.registry.blood_family(of)?;
            let roots = doc.registry.family(family)?.first_generation();
            let root = *roots.first().ok_or(GenealogyError::unknown(family))?;
            if doc.registry.lookup_character(root)?.parents.is_some() {
                return Err(Violation::AlreadyHasParents(root).into());
            }

            let id = doc.spawn_character(changes, attrs, family)?;
            doc.attach(id, family, root, Relation::Parent)?;
            doc.registry.family_mut(family)?.kind = FamilyKind::Endpoint;

            for former in roots {
                let old = doc.registry.blood_family(former)?;
                if old == family {
                    continue;
                }
                doc.registry.character_mut(former)?.blood_family = family;
                changes.character_updated(former);
                if doc.registry.family(old)?.size() == 1 {
                    doc.remove_family(changes, old)?;
                }
            }
            debug!(character = %id, family = %family, "parent added");
            Ok(id)
        })
    }

    /// Create a sibling of `of`, sharing its parents.
    pub fn add_sibling(&mut self, attrs: CharacterAttributes, of: CharacterId) -> Result<CharacterId> {
        self.transact(|doc, changes| {
            let family = doc.registry.blood_family(of)?;
            let parents = doc.registry.lookup_character(of)?.parents;
            let id = doc.spawn_character(changes, attrs, family)?;
            doc.registry.character_mut(id)?.parents = parents;
            doc.attach(id, family, of, Relation::Sibling)?;
            debug!(character = %id, sibling = %of, "sibling added");
            Ok(id)
        })
    }

    /// Record a partnership between two existing characters. If they are
    /// already drawn side by side in a family they become mates there too.
    pub fn partner(&mut self, a: CharacterId, b: CharacterId) -> Result<PartnershipId> {
        self.transact(|doc, changes| {
            if a == b {
                return Err(Violation::SelfPartnership(a).into());
            }
            doc.registry.lookup_character(a)?;
            doc.registry.lookup_character(b)?;
            if let Some(existing) = doc.registry.partnership_between(a, b) {
                return Err(GenealogyError::DuplicatePartnership { existing });
            }
            let pid = doc.record_partnership(changes, a, b)?;

            for family in doc.instances.families_of(a) {
                let graph = &doc.registry.family(family)?.graph;
                if graph.contains(b) && graph.height(a)? == graph.height(b)? {
                    doc.registry.family_mut(family)?.graph.add_mate(a, b)?;
                }
            }
            debug!(partnership = %pid, a = %a, b = %b, "partnership recorded");
            Ok(pid)
        })
    }

    /// Edit a character's attributes. The change is validated and copied to
    /// every instance, or not applied at all.
    pub fn update_character(&mut self, id: CharacterId, edit: impl FnOnce(&mut CharacterAttributes)) -> Result<()> {
        self.transact(|doc, changes| {
            let mut attrs = doc.registry.lookup_character(id)?.attributes.clone();
            edit(&mut attrs);
            doc.validate(id, &attrs)?;

            let character = doc.registry.character_mut(id)?;
            character.attributes = attrs;
            let character = doc.registry.lookup_character(id)?;
            doc.instances.refresh(character);
            for family in doc.instances.families_of(id) {
                doc.sync_placements(family)?;
            }
            changes.character_updated(id);
            Ok(())
        })
    }

    pub fn add_kingdom(&mut self, name: impl Into<String>) -> Result<KingdomId> {
        let name = name.into();
        self.transact(|doc, changes| {
            let id = doc.registry.id_generators.next_kingdom();
            doc.registry.kingdoms.insert(id, Kingdom::new(id, name));
            changes.kingdom_added(id);
            Ok(id)
        })
    }

    pub fn rename_kingdom(&mut self, id: KingdomId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.transact(|doc, _| {
            let kingdom = doc.registry.kingdoms.get_mut(&id).ok_or(GenealogyError::unknown(id))?;
            kingdom.name = name;
            Ok(())
        })
    }

    /// Delete a kingdom. Members lose their membership and active filters
    /// forget it.
    pub fn remove_kingdom(&mut self, id: KingdomId) -> Result<()> {
        self.transact(|doc, changes| {
            doc.registry.kingdoms.remove(&id).ok_or(GenealogyError::unknown(id))?;
            for cid in doc.registry.character_ids() {
                let character = doc.registry.character_mut(cid)?;
                if character.attributes.kingdom == Some(id) {
                    character.attributes.kingdom = None;
                    let character = doc.registry.lookup_character(cid)?;
                    doc.instances.refresh(character);
                    changes.character_updated(cid);
                }
            }
            if doc.filters.prune_kingdom(id) {
                changes.filters = Some(doc.filters.clone());
            }
            changes.kingdom_removed(id);
            Ok(())
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn record_partnership(&mut self, changes: &mut ChangeSet, a: CharacterId, b: CharacterId) -> Result<PartnershipId> {
        let pid = self.registry.id_generators.next_partnership();
        self.registry.partnerships.insert(pid, Partnership::new(pid, a, b));
        for id in [a, b] {
            self.registry.character_mut(id)?.add_partnership(pid);
            changes.character_updated(id);
        }
        Ok(pid)
    }

    /// A family where `a` and `b` are already mates, blood family of `a` first.
    fn shared_family(&self, a: CharacterId, b: CharacterId) -> Option<FamilyId> {
        let mut candidates = self.instances.families_of(a);
        let blood = self.registry.blood_family(a).ok()?;
        candidates.sort_by_key(|f| *f != blood);
        candidates.into_iter().find(|f| {
            self.registry.families.get(f).is_some_and(|family| {
                family.graph.relations(a, Relation::Partner).is_ok_and(|mates| mates.contains(&b))
            })
        })
    }

    /// Offspring family with clones of both partners as its roots.
    fn subset_family(&mut self, changes: &mut ChangeSet, partnership: PartnershipId, a: CharacterId, b: CharacterId) -> Result<FamilyId> {
        let family = self.new_family(changes, FamilyKind::Subset, a)?;
        self.attach(b, family, a, Relation::Partner)?;
        let name = format!(
            "{} & {}",
            self.registry.lookup_character(a)?.name(),
            self.registry.lookup_character(b)?.name()
        );
        let fam = self.registry.family_mut(family)?;
        fam.name = name;
        fam.partnership = Some(partnership);
        Ok(family)
    }
}
