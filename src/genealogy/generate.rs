//! Random documents for demos and consistency tests.
//!
//! Founding couples start lineages; each generation partners some of its
//! members (sometimes across lineages) and has children. Every step goes
//! through the public editing operations, so a generated document is as
//! consistent as one built by hand.

use rand::Rng;
use tracing::{debug, info};

use super::{CharacterId, KingdomId};
use super::calendar::{Date, Season};
use super::document::Document;
use super::entities::{CharacterAttributes, Sex};
use super::error::{GenealogyError, Result};

const ONSETS: &[&str] = &["b", "d", "g", "k", "l", "m", "n", "r", "s", "t", "th", "v", "br", "dr", "gr", "el"];
const VOWELS: &[&str] = &["a", "e", "i", "o", "u", "ae", "ia", "y"];
const CODAS: &[&str] = &["n", "r", "l", "s", "th", "d", "m", "ric", "wen"];
const PLACE_SUFFIXES: &[&str] = &["mere", "hold", "dale", "reach", "fell", "march"];
const RACES: &[&str] = &["Human", "Elf", "Dwarf"];

/// Knobs for [`generate_document`].
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Number of kingdoms to found.
    pub kingdoms: usize,
    /// Number of founding couples, each starting its own lineage.
    pub founders: usize,
    /// Generations below the founders.
    pub generations: u32,
    /// Upper bound on children per couple.
    pub max_children: usize,
    /// Chance that a grown child takes a partner.
    pub partner_chance: f64,
    /// Chance that a partner is drawn from another lineage instead of
    /// being created fresh.
    pub cross_lineage_chance: f64,
    /// Chance that a founder gets an ancestor added above them.
    pub ancestor_chance: f64,
    /// Birth year of the founders.
    pub start_year: i32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kingdoms: 3,
            founders: 3,
            generations: 3,
            max_children: 3,
            partner_chance: 0.7,
            cross_lineage_chance: 0.25,
            ancestor_chance: 0.2,
            start_year: 100,
        }
    }
}

/// A pronounceable personal name built from random syllables.
pub fn personal_name(rng: &mut impl Rng) -> String {
    let syllables = rng.gen_range(2..=3);
    let mut name = String::new();
    for i in 0..syllables {
        let onset = ONSETS[rng.gen_range(0..ONSETS.len())];
        if i == 0 {
            let mut chars = onset.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.extend(chars);
            }
        } else {
            name.push_str(onset);
        }
        name.push_str(VOWELS[rng.gen_range(0..VOWELS.len())]);
        let coda_chance = if i == syllables - 1 { 0.6 } else { 0.2 };
        if rng.gen_bool(coda_chance) {
            name.push_str(CODAS[rng.gen_range(0..CODAS.len())]);
        }
    }
    name
}

fn place_name(rng: &mut impl Rng) -> String {
    let base = personal_name(rng);
    format!("{}{}", base, PLACE_SUFFIXES[rng.gen_range(0..PLACE_SUFFIXES.len())])
}

struct Generator<'a, R: Rng> {
    config: &'a GeneratorConfig,
    rng: &'a mut R,
    kingdoms: Vec<KingdomId>,
}

impl<R: Rng> Generator<'_, R> {
    fn attributes(&mut self, birth_year: i32, kingdom: Option<KingdomId>) -> CharacterAttributes {
        let sex = if self.rng.gen_bool(0.5) { Sex::Male } else { Sex::Female };
        let season = match self.rng.gen_range(0..4) {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        };
        let mut attrs = CharacterAttributes::new(personal_name(self.rng))
            .with_sex(sex)
            .with_race(RACES[self.rng.gen_range(0..RACES.len())])
            .with_birth(Date::new(birth_year, season));
        if self.rng.gen_bool(0.5) {
            attrs = attrs.with_death(Date::year(birth_year + self.rng.gen_range(30..90)));
        }
        if let Some(kingdom) = kingdom {
            attrs = attrs.with_kingdom(kingdom);
        }
        attrs
    }

    fn random_kingdom(&mut self) -> Option<KingdomId> {
        if self.kingdoms.is_empty() || self.rng.gen_bool(0.2) {
            return None;
        }
        Some(self.kingdoms[self.rng.gen_range(0..self.kingdoms.len())])
    }

    fn run(&mut self, doc: &mut Document) -> Result<()> {
        for _ in 0..self.config.kingdoms {
            let name = place_name(self.rng);
            self.kingdoms.push(doc.add_kingdom(name)?);
        }

        // Couples of the current generation, with the year their children start.
        let mut couples = Vec::new();
        for _ in 0..self.config.founders {
            let kingdom = self.random_kingdom();
            let year = self.config.start_year + self.rng.gen_range(0..10);
            let mut attrs = self.attributes(year, kingdom);
            attrs.ruler = kingdom.is_some() && self.rng.gen_bool(0.5);
            let a = doc.create_character(attrs, None)?;
            let jitter = self.rng.gen_range(-3..4);
            let partner_attrs = self.attributes(year + jitter, kingdom);
            let b = doc.add_partner(partner_attrs, a)?;
            if self.rng.gen_bool(self.config.ancestor_chance) {
                let ancestor = self.attributes(year - 25, kingdom);
                doc.add_parent(ancestor, a)?;
            }
            let pid = doc.partnership_between(a, b).ok_or(GenealogyError::unknown(a))?;
            couples.push((pid, year + 20));
        }

        for generation in 0..self.config.generations {
            let mut grown: Vec<(CharacterId, i32)> = Vec::new();
            for (pid, year) in &couples {
                let count = self.rng.gen_range(0..=self.config.max_children);
                let kingdom = doc.partnership(*pid)
                    .ok()
                    .and_then(|p| doc.lookup_character(p.partners[0]).ok())
                    .and_then(|c| c.attributes.kingdom);
                for i in 0..count {
                    let birth = year + i as i32 * self.rng.gen_range(1..4);
                    let attrs = self.attributes(birth, kingdom);
                    grown.push((doc.add_child(attrs, *pid)?, birth));
                }
            }
            debug!(generation, born = grown.len(), "generation born");

            let mut next = Vec::new();
            let mut taken: Vec<CharacterId> = Vec::new();
            for (i, (child, birth)) in grown.iter().enumerate() {
                if taken.contains(child) || !self.rng.gen_bool(self.config.partner_chance) {
                    continue;
                }
                let cross = grown[i + 1..].iter()
                    .map(|(c, _)| *c)
                    .filter(|c| !taken.contains(c))
                    .filter(|c| doc.blood_family(*c).ok() != doc.blood_family(*child).ok())
                    .find(|c| doc.partnership_between(*child, *c).is_none());
                let pid = match cross {
                    Some(other) if self.rng.gen_bool(self.config.cross_lineage_chance) => {
                        taken.push(other);
                        doc.partner(*child, other)?
                    }
                    _ => {
                        let kingdom = self.random_kingdom();
                        let jitter = self.rng.gen_range(-3..4);
                        let attrs = self.attributes(*birth + jitter, kingdom);
                        let partner = doc.add_partner(attrs, *child)?;
                        doc.partnership_between(*child, partner)
                            .ok_or(GenealogyError::unknown(partner))?
                    }
                };
                taken.push(*child);
                next.push((pid, birth + 20));
            }
            couples = next;
        }
        Ok(())
    }
}

/// Build a random document. The same seed gives the same document.
pub fn generate_document(config: &GeneratorConfig, rng: &mut impl Rng) -> Result<Document> {
    let mut doc = Document::new();
    let mut generator = Generator { config, rng, kingdoms: Vec::new() };
    generator.run(&mut doc)?;
    let summary = doc.summary();
    info!(
        characters = summary.characters,
        families = summary.families,
        partnerships = summary.partnerships,
        "generated document"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_names_are_capitalised() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            let name = personal_name(&mut rng);
            assert!(name.len() >= 2);
            assert!(name.chars().next().is_some_and(|c| c.is_uppercase()), "{}", name);
        }
    }

    #[test]
    fn test_generation_is_seeded() {
        let config = GeneratorConfig::default();
        let a = generate_document(&config, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        let b = generate_document(&config, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(a.summary(), b.summary());
        assert_eq!(a.registry().character_ids(), b.registry().character_ids());
        for id in a.registry().character_ids() {
            assert_eq!(a.lookup_character(id).unwrap().name(), b.lookup_character(id).unwrap().name());
        }
    }

    #[test]
    fn test_generated_documents_are_consistent() {
        let config = GeneratorConfig { generations: 4, ..GeneratorConfig::default() };
        for seed in 0..20 {
            let doc = generate_document(&config, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            doc.check_invariants().unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
            assert!(doc.summary().characters >= config.founders * 2);
        }
    }
}
