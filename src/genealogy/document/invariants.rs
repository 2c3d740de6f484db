//! Whole-document consistency check.

use crate::genealogy::error::{GenealogyError, Result, Violation};
use super::Document;

impl Document {
    /// Verify every structural rule across registry, graphs and instances.
    /// Returns the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        let registry = &self.registry;

        for id in registry.character_ids() {
            let character = registry.lookup_character(id)?;
            let blood = registry.families.get(&character.blood_family)
                .ok_or(Violation::BloodFamilyMismatch(id))?;
            if !blood.contains(id) || self.instances.instance(id, blood.id).is_none() {
                return Err(Violation::BloodFamilyMismatch(id).into());
            }

            if let Some((p0, p1)) = character.parents {
                let parents_live = registry.partnership_between(p0, p1).is_some();
                let present = [p0, p1].iter().filter(|p| blood.contains(**p)).count();
                if (parents_live && present < 2) || present == 0 {
                    return Err(Violation::NotInFamily { character: p0, family: blood.id }.into());
                }
            }

            for (i, pid) in character.partnerships.iter().enumerate() {
                let partnership = registry.partnership(*pid)?;
                if !partnership.involves(id) || character.partnerships[i + 1..].contains(pid) {
                    return Err(Violation::PartnershipMismatch(*pid).into());
                }
            }
        }

        for pid in registry.partnership_ids() {
            let partnership = registry.partnership(pid)?;
            for partner in partnership.partners {
                let listed = registry.lookup_character(partner)?
                    .partnerships
                    .iter()
                    .filter(|p| **p == pid)
                    .count();
                if listed != 1 {
                    return Err(Violation::PartnershipMismatch(pid).into());
                }
            }
            if let Some(fid) = partnership.family {
                let graph = &registry.family(fid)?.graph;
                let [a, b] = partnership.partners;
                for partner in [a, b] {
                    if !graph.contains(partner) {
                        return Err(Violation::NotInFamily { character: partner, family: fid }.into());
                    }
                }
                if graph.height(a)? != graph.height(b)? {
                    return Err(Violation::HeightMismatch { character: b, family: fid }.into());
                }
            }
        }

        let mut nodes = 0;
        for fid in registry.family_ids() {
            let family = registry.family(fid)?;
            family.graph.verify()?;
            for id in family.graph.node_ids() {
                if !registry.characters.contains_key(id) {
                    return Err(GenealogyError::unknown(*id));
                }
                let instance = self.instances.instance(*id, fid)
                    .ok_or(Violation::InstanceMismatch { character: *id, family: fid })?;
                if Some(instance.placement.height) != family.graph.placement(*id).map(|p| p.height) {
                    return Err(Violation::HeightMismatch { character: *id, family: fid }.into());
                }
            }
            nodes += family.size();
        }

        if nodes != self.instances.count() {
            for id in self.instances.characters() {
                for instance in self.instances.instances(id) {
                    let bound = registry.families.get(&instance.family).is_some_and(|f| f.contains(id));
                    if !bound {
                        return Err(Violation::InstanceMismatch { character: id, family: instance.family }.into());
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::genealogy::{Document, FamilyId, GenealogyError, Violation};
    use crate::genealogy::entities::CharacterAttributes;
    use crate::genealogy::graph::NodePlacement;

    #[test]
    fn test_stray_instance_is_reported() {
        let mut doc = Document::new();
        let a = doc.create_character(CharacterAttributes::new("Aldric"), None).unwrap();
        doc.check_invariants().unwrap();

        let character = doc.registry.lookup_character(a).unwrap().clone();
        doc.instances.add_instance(&character, FamilyId(40), NodePlacement::default()).unwrap();
        assert_eq!(
            doc.check_invariants().unwrap_err(),
            GenealogyError::InvariantViolation(Violation::InstanceMismatch { character: a, family: FamilyId(40) })
        );
    }

    #[test]
    fn test_one_sided_partnership_is_reported() {
        let mut doc = Document::new();
        let a = doc.create_character(CharacterAttributes::new("Aldric"), None).unwrap();
        let b = doc.create_character(CharacterAttributes::new("Berra"), None).unwrap();
        let p = doc.partner(a, b).unwrap();
        doc.registry.character_mut(b).unwrap().remove_partnership(p);
        assert_eq!(
            doc.check_invariants().unwrap_err(),
            GenealogyError::InvariantViolation(Violation::PartnershipMismatch(p))
        );
    }
}
