//! Removals: dissolving partnerships, splitting first generations,
//! deleting characters, and merging families.

use tracing::debug;

use crate::genealogy::{CharacterId, EntityRef, FamilyId, PartnershipId};
use crate::genealogy::entities::FamilyKind;
use crate::genealogy::error::{GenealogyError, Result, Violation};
use crate::genealogy::events::ChangeSet;
use crate::genealogy::graph::{MateRemoval, Relation, Role};
use super::Document;

/// Which partner leaves a first generation when the root bond is cut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Leaving {
    /// Whoever is not root-1.
    Root2,
    /// This partner, who stays in the document.
    Split(CharacterId),
    /// This partner, who is being deleted.
    Deleted(CharacterId),
}

impl Document {
    /// Dissolve a partnership. If the partners were a family's first
    /// generation the family keeps root-1; children keep their recorded
    /// parents.
    pub fn remove_partnership(&mut self, partnership: PartnershipId) -> Result<()> {
        self.transact(|doc, changes| doc.dissolve_partnership(changes, partnership, Leaving::Root2))
    }

    /// Split a two-rooted family, removing `remove` from it. The root pair's
    /// partnership record is dissolved along the way.
    pub fn split_first_generation(&mut self, family: FamilyId, remove: CharacterId) -> Result<()> {
        self.transact(|doc, changes| {
            let roots = doc.registry.family(family)?.first_generation();
            if roots.len() != 2 || !roots.contains(&remove) {
                return Err(Violation::WrongRole { character: remove, family }.into());
            }
            match doc.registry.partnership_between(roots[0], roots[1]) {
                Some(pid) => doc.dissolve_partnership(changes, pid, Leaving::Split(remove)),
                None => doc.split_roots(changes, family, remove, true),
            }
        })
    }

    /// Delete a character with every instance and partnership.
    ///
    /// Refused while the character is a recorded parent of anyone, or has
    /// descendants in any family graph.
    pub fn remove_character(&mut self, id: CharacterId) -> Result<()> {
        self.transact(|doc, changes| {
            let partnerships = doc.registry.lookup_character(id)?.partnerships.clone();
            let children = doc.registry.children_of(id);
            if !children.is_empty() {
                return Err(Violation::RequiredParent { parent: id, children }.into());
            }
            for family in doc.instances.families_of(id) {
                let dependents = doc.registry.family(family)?.graph.relations(id, Relation::Descendant)?;
                if !dependents.is_empty() {
                    return Err(GenealogyError::HasDependents { entity: EntityRef::Character(id), dependents });
                }
            }

            for pid in partnerships {
                if doc.registry.partnerships.contains_key(&pid) {
                    doc.dissolve_partnership(changes, pid, Leaving::Deleted(id))?;
                }
            }

            for family in doc.instances.families_of(id) {
                let mates = doc.registry.family(family)?.graph.relations(id, Relation::Partner)?;
                for mate in mates {
                    doc.registry.family_mut(family)?.graph.remove_mate(id, mate)?;
                    if doc.is_unanchored(family, mate)? {
                        doc.detach_partner(changes, family, mate, true)?;
                    }
                }
                if doc.registry.family(family)?.contains(id) {
                    doc.detach(id, family)?;
                    doc.settle_family(changes, family)?;
                }
            }

            doc.registry.characters.remove(&id);
            changes.character_removed(id);
            debug!(character = %id, "character removed");
            Ok(())
        })
    }

    /// Administrative merge: graft `absorb` beside the partner `via` links
    /// into `keep`. `absorb` must be rooted at one partner and `keep` must
    /// hold the other; the partnership must not have its own family yet.
    pub fn merge_families(&mut self, keep: FamilyId, absorb: FamilyId, via: PartnershipId) -> Result<()> {
        self.transact(|doc, changes| {
            if keep == absorb {
                return Err(Violation::SameFamily(keep).into());
            }
            let keep_family = doc.registry.family(keep)?;
            let absorb_family = doc.registry.family(absorb)?;
            let partnership = doc.registry.partnership(via)?;
            if partnership.family.is_some() {
                return Err(Violation::PartnershipMismatch(via).into());
            }
            let [a, b] = partnership.partners;
            let at = if keep_family.contains(a) && absorb_family.graph.root() == Some(b) {
                a
            } else if keep_family.contains(b) && absorb_family.graph.root() == Some(a) {
                b
            } else {
                return Err(Violation::WrongRole { character: b, family: absorb }.into());
            };

            let absorbed = doc.registry.families.remove(&absorb).ok_or(GenealogyError::unknown(absorb))?;
            doc.registry.family_mut(keep)?.graph.graft(&absorbed.graph, at)?;
            for id in absorbed.graph.node_ids() {
                doc.instances.rebind(*id, absorb, keep)?;
            }
            for id in doc.registry.blood_members(absorb) {
                doc.registry.character_mut(id)?.blood_family = keep;
                changes.character_updated(id);
            }
            for p in doc.registry.partnerships.values_mut() {
                if p.family == Some(absorb) {
                    p.family = Some(keep);
                }
            }
            if doc.filters.prune_family(absorb) {
                changes.filters = Some(doc.filters.clone());
            }
            changes.family_removed(absorb);
            doc.sync_placements(keep)?;
            debug!(keep = %keep, absorb = %absorb, "families merged");
            Ok(())
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Drop the partnership record and undo its bond in every family where
    /// the partners are mates.
    fn dissolve_partnership(&mut self, changes: &mut ChangeSet, pid: PartnershipId, leaving: Leaving) -> Result<()> {
        let partnership = self.registry.partnerships.remove(&pid).ok_or(GenealogyError::unknown(pid))?;
        let [a, b] = partnership.partners;
        for id in [a, b] {
            if let Ok(character) = self.registry.character_mut(id) {
                character.remove_partnership(pid);
                changes.character_updated(id);
            }
        }

        let mut bonded = Vec::new();
        for family in self.instances.families_of(a) {
            let mated = self.registry.family(family)?
                .graph
                .relations(a, Relation::Partner)
                .is_ok_and(|mates| mates.contains(&b));
            if mated {
                bonded.push(family);
            }
        }

        for family in bonded {
            match self.registry.family_mut(family)?.graph.remove_mate(a, b)? {
                MateRemoval::SeveredRoots => {
                    let root = self.registry.family(family)?.graph.root();
                    let remove = match leaving {
                        Leaving::Split(id) | Leaving::Deleted(id) => id,
                        Leaving::Root2 if root == Some(a) => b,
                        Leaving::Root2 => a,
                    };
                    let rehome = !matches!(leaving, Leaving::Deleted(_));
                    self.split_roots(changes, family, remove, rehome)?;
                }
                MateRemoval::Interior => {
                    for id in [a, b] {
                        if leaving != Leaving::Deleted(id) && self.is_unanchored(family, id)? {
                            self.detach_partner(changes, family, id, true)?;
                        }
                    }
                }
            }
            if let Ok(fam) = self.registry.family_mut(family) {
                if fam.partnership == Some(pid) {
                    fam.partnership = None;
                }
            }
        }
        debug!(partnership = %pid, "partnership dissolved");
        Ok(())
    }

    /// Remove one root of a two-rooted family; the other becomes the sole
    /// root-1.
    fn split_roots(&mut self, changes: &mut ChangeSet, family: FamilyId, remove: CharacterId, rehome: bool) -> Result<()> {
        let fam = self.registry.family_mut(family)?;
        match fam.graph.role(remove) {
            Some(Role::Root1) if fam.graph.second_root().is_some() => fam.graph.swap_roots(),
            Some(Role::Root2) => {}
            _ => return Err(Violation::WrongRole { character: remove, family }.into()),
        }
        let keep = fam.graph.root().ok_or(GenealogyError::unknown(family))?;
        fam.graph.remove_mate(keep, remove)?;
        if fam.kind != FamilyKind::Endpoint {
            fam.kind = FamilyKind::NullTerminated;
        }

        let ring: Vec<CharacterId> = fam.graph.relations(remove, Relation::Partner)?;
        for mate in ring {
            self.registry.family_mut(family)?.graph.remove_mate(remove, mate)?;
            if self.is_unanchored(family, mate)? {
                self.detach_partner(changes, family, mate, true)?;
            }
        }
        self.detach_partner(changes, family, remove, rehome)?;
        debug!(family = %family, kept = %keep, removed = %remove, "first generation split");
        Ok(())
    }

    /// Take a partner out of a family. Their children there keep the other
    /// parent. A partner whose blood family this was gets a fresh one.
    fn detach_partner(&mut self, changes: &mut ChangeSet, family: FamilyId, id: CharacterId, rehome: bool) -> Result<()> {
        self.registry.family_mut(family)?.graph.release_children(id)?;
        let blood = self.registry.blood_family(id)?;
        self.detach(id, family)?;
        if rehome && blood == family {
            self.rehome_to_fresh(changes, id)?;
        }
        self.settle_family(changes, family)
    }

    /// A non-root node with neither in-family parents nor mates.
    fn is_unanchored(&self, family: FamilyId, id: CharacterId) -> Result<bool> {
        let graph = &self.registry.family(family)?.graph;
        if !graph.contains(id) || graph.role(id) != Some(Role::Interior) {
            return Ok(false);
        }
        Ok(graph.relations(id, Relation::Parent)?.is_empty() && graph.relations(id, Relation::Partner)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::genealogy::{Document, ErrorCode, GenealogyError, Violation};
    use crate::genealogy::entities::{CharacterAttributes, FamilyKind};
    use crate::genealogy::graph::Relation;

    fn attrs(name: &str) -> CharacterAttributes {
        CharacterAttributes::new(name)
    }

    #[test]
    fn test_remove_required_parent_is_refused() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let b = doc.create_character(attrs("Berra"), None).unwrap();
        let p = doc.partner(a, b).unwrap();
        let c = doc.add_child(attrs("Cade"), p).unwrap();
        let err = doc.remove_character(a).unwrap_err();
        assert_eq!(err, GenealogyError::InvariantViolation(Violation::RequiredParent { parent: a, children: vec![c] }));
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_ancestor_with_descendants() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let f = doc.add_parent(attrs("Fenn"), a).unwrap();
        let err = doc.remove_character(f).unwrap_err();
        assert_eq!(err.code(), ErrorCode::HasDependents);
    }

    #[test]
    fn test_remove_root_promotes_partner() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let b = doc.add_partner(attrs("Berra"), a).unwrap();
        let fam = doc.blood_family(a).unwrap();

        doc.remove_character(a).unwrap();
        assert!(doc.lookup_character(a).is_err());
        let family = doc.family(fam).unwrap();
        assert_eq!(family.first_generation(), vec![b]);
        assert_eq!(family.kind, FamilyKind::Singleton);
        assert!(doc.lookup_character(b).unwrap().partnerships.is_empty());
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_partnership_rehomes_detached_partner() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let b = doc.add_partner(attrs("Berra"), a).unwrap();
        let fam = doc.blood_family(a).unwrap();
        let p = doc.partnership_between(a, b).unwrap();

        doc.remove_partnership(p).unwrap();
        assert!(doc.partnership(p).is_err());
        assert_eq!(doc.family(fam).unwrap().first_generation(), vec![a]);
        let fresh = doc.blood_family(b).unwrap();
        assert_ne!(fresh, fam);
        assert_eq!(doc.family(fresh).unwrap().kind, FamilyKind::NullTerminated);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_split_first_generation_keeps_children() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let b = doc.add_partner(attrs("Berra"), a).unwrap();
        let p = doc.partnership_between(a, b).unwrap();
        let c = doc.add_child(attrs("Cade"), p).unwrap();
        let fam = doc.blood_family(a).unwrap();

        doc.split_first_generation(fam, a).unwrap();
        let family = doc.family(fam).unwrap();
        assert_eq!(family.first_generation(), vec![b]);
        assert_eq!(family.graph.relations(c, Relation::Parent).unwrap(), vec![b]);
        assert_eq!(doc.lookup_character(c).unwrap().parents, Some((a, b)));
        assert_ne!(doc.blood_family(a).unwrap(), fam);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_split_requires_two_roots() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let fam = doc.blood_family(a).unwrap();
        let err = doc.split_first_generation(fam, a).unwrap_err();
        assert_eq!(err, GenealogyError::InvariantViolation(Violation::WrongRole { character: a, family: fam }));
    }

    #[test]
    fn test_interior_partner_leaves_with_partnership() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let b = doc.add_partner(attrs("Berra"), a).unwrap();
        let p = doc.partnership_between(a, b).unwrap();
        let c = doc.add_child(attrs("Cade"), p).unwrap();
        let g = doc.add_partner(attrs("Gwen"), c).unwrap();
        let fam = doc.blood_family(c).unwrap();
        assert_eq!(doc.blood_family(g).unwrap(), fam);

        let pg = doc.partnership_between(c, g).unwrap();
        doc.remove_partnership(pg).unwrap();
        assert!(!doc.family(fam).unwrap().contains(g));
        assert_ne!(doc.blood_family(g).unwrap(), fam);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_families() {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric"), None).unwrap();
        let b = doc.add_partner(attrs("Berra"), a).unwrap();
        let p = doc.partnership_between(a, b).unwrap();
        let c = doc.add_child(attrs("Cade"), p).unwrap();
        let m = doc.create_character(attrs("Mott"), None).unwrap();
        let q = doc.add_partner(attrs("Quill"), m).unwrap();
        let pq = doc.partnership_between(m, q).unwrap();
        let n = doc.add_child(attrs("Nell"), pq).unwrap();

        let keep = doc.blood_family(c).unwrap();
        let absorb = doc.blood_family(m).unwrap();
        let via = doc.partner(c, m).unwrap();
        doc.merge_families(keep, absorb, via).unwrap();

        assert!(doc.family(absorb).is_err());
        assert_eq!(doc.blood_family(n).unwrap(), keep);
        let graph = &doc.family(keep).unwrap().graph;
        assert_eq!(graph.height(m).unwrap(), 1);
        assert_eq!(graph.height(n).unwrap(), 2);
        doc.check_invariants().unwrap();

        assert_eq!(
            doc.merge_families(keep, keep, via).unwrap_err(),
            GenealogyError::InvariantViolation(Violation::SameFamily(keep))
        );
    }
}
