//! The document: one explicit value holding every record, graph and
//! instance, plus layout settings and subscribers.
//!
//! Every write runs inside [`Document::transact`]: the registry, instance
//! table and filters are snapshotted first and restored if the write fails,
//! so callers never observe a half-applied change. Events go out only after
//! a write succeeded.

mod edit;
mod invariants;
mod split;

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use super::{CharacterId, FamilyId, KingdomId, PartnershipId};
use super::arrange::{Arranger, CanvasResult, Filters};
use super::config::{DisplayPolicy, LayoutConfig, SpacingUpdate};
use super::entities::{Character, CharacterAttributes, Family, FamilyKind, Kingdom, Partnership};
use super::error::{GenealogyError, Result, Violation};
use super::events::{ChangeSet, DocumentEvent, EventBus, SubscriptionId};
use super::graph::Relation;
use super::instances::{Binding, InstanceTable};
use super::layout::{LayoutEngine, LayoutResult, Point};
use super::registry::Registry;

#[derive(Debug, Default)]
pub struct Document {
    registry: Registry,
    instances: InstanceTable,
    config: LayoutConfig,
    filters: Filters,
    /// Free-form document properties (title, author, ...).
    pub metadata: BTreeMap<String, String>,
    events: EventBus,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Rebuild a document from stored tables. Instances are derived from
    /// the family graphs.
    pub(crate) fn from_parts(registry: Registry, config: LayoutConfig, filters: Filters) -> Result<Self> {
        let mut doc = Self { registry, config, filters, ..Self::default() };
        for fid in doc.registry.family_ids() {
            let family = doc.registry.family(fid)?;
            for id in family.graph.node_ids() {
                let character = doc.registry.lookup_character(*id)?;
                let placement = family.graph.placement(*id).unwrap_or_default();
                doc.instances.add_instance(character, fid, placement)?;
            }
        }
        doc.registry.rebuild_id_generators();
        Ok(doc)
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn lookup_character(&self, id: CharacterId) -> Result<&Character> {
        self.registry.lookup_character(id)
    }

    pub fn family(&self, id: FamilyId) -> Result<&Family> {
        self.registry.family(id)
    }

    pub fn partnership(&self, id: PartnershipId) -> Result<&Partnership> {
        self.registry.partnership(id)
    }

    pub fn kingdom(&self, id: KingdomId) -> Result<&Kingdom> {
        self.registry.kingdom(id)
    }

    pub fn blood_family(&self, id: CharacterId) -> Result<FamilyId> {
        self.registry.blood_family(id)
    }

    pub fn partnership_family(&self, id: PartnershipId) -> Result<Option<FamilyId>> {
        self.registry.partnership_family(id)
    }

    /// Partnership linking two characters, in either order.
    pub fn partnership_between(&self, a: CharacterId, b: CharacterId) -> Option<PartnershipId> {
        self.registry.partnership_between(a, b)
    }

    /// Families the character has an instance in, in insertion order.
    pub fn families_of(&self, id: CharacterId) -> Vec<FamilyId> {
        self.instances.families_of(id)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn subscribe(&mut self, handler: impl FnMut(&DocumentEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Run a write all-or-nothing. Id generators are never rolled back so
    /// ids handed out by a failed write are not reissued.
    pub(crate) fn transact<T>(&mut self, write: impl FnOnce(&mut Self, &mut ChangeSet) -> Result<T>) -> Result<T> {
        let registry = self.registry.clone();
        let instances = self.instances.clone();
        let filters = self.filters.clone();
        let mut changes = ChangeSet::default();

        match write(self, &mut changes) {
            Ok(value) => {
                self.events.publish(changes);
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "write rolled back");
                let generators = self.registry.id_generators.clone();
                self.registry = registry;
                self.registry.id_generators = generators;
                self.instances = instances;
                self.filters = filters;
                Err(err)
            }
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn configure(&mut self, update: &SpacingUpdate) {
        self.config.apply(update);
        debug!(?update, "spacing updated");
    }

    /// Replace the whole spacing configuration.
    pub fn set_config(&mut self, config: LayoutConfig) {
        self.config = config;
        debug!("spacing configuration replaced");
    }

    /// Replace the active filters. Unknown family or kingdom ids are refused.
    pub fn set_filters(&mut self, filters: Filters) -> Result<()> {
        self.transact(|doc, changes| {
            for fid in filters.families.iter().flatten() {
                doc.registry.family(*fid)?;
            }
            for kid in filters.kingdoms.iter().flatten() {
                doc.registry.kingdom(*kid)?;
            }
            doc.filters = filters.clone();
            changes.filters = Some(filters);
            Ok(())
        })
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Lay out one family with the active filters and store the positions
    /// on its instances.
    pub fn layout(&mut self, family: FamilyId, anchor: Point, policy: &DisplayPolicy) -> Result<LayoutResult> {
        let fam = self.registry.family(family)?;
        let hidden = self.filters.hidden_in(&self.registry, fam);
        let result = LayoutEngine::new(&self.config, policy, &self.registry)
            .with_hidden(hidden)
            .run(fam, anchor);
        match result {
            Ok(layout) => {
                self.store_layout(&layout);
                Ok(layout)
            }
            Err(GenealogyError::BudgetExceeded { limit, partial }) => {
                self.store_layout(&partial);
                Err(GenealogyError::BudgetExceeded { limit, partial })
            }
            Err(e) => Err(e),
        }
    }

    /// Compose every displayed family on one canvas.
    pub fn arrange_canvas(&mut self, policy: &DisplayPolicy, filters: &Filters) -> Result<CanvasResult> {
        let canvas = Arranger::new(&self.registry, &self.config, policy, filters).arrange()?;
        for placed in &canvas.families {
            self.store_layout(&placed.layout);
        }
        Ok(canvas)
    }

    fn store_layout(&mut self, layout: &LayoutResult) {
        let characters = &self.registry.characters;
        if let Some(family) = self.registry.families.get_mut(&layout.family) {
            family.anchor = layout.anchor;
            family.graph.derive_placements(|id| characters.get(&id).map(|c| c.birth_order_key()));
        }
        for (id, point) in &layout.positions {
            if let Some(instance) = self.instances.instance_mut(*id, layout.family) {
                instance.position = *point;
                if let Some(placement) = layout.placements.get(id) {
                    instance.placement = *placement;
                }
            }
        }
    }

    // =========================================================================
    // Internal helpers shared by the write operations
    // =========================================================================

    fn validate(&self, id: CharacterId, attrs: &CharacterAttributes) -> Result<()> {
        if attrs.name.trim().is_empty() {
            return Err(Violation::EmptyName(id).into());
        }
        if let (Some(birth), Some(death)) = (attrs.birth, attrs.death) {
            if death < birth {
                return Err(Violation::DiedBeforeBirth(id).into());
            }
        }
        if let Some(kingdom) = attrs.kingdom {
            self.registry.kingdom(kingdom)?;
        }
        Ok(())
    }

    /// Insert a validated character record.
    fn spawn_character(&mut self, changes: &mut ChangeSet, attrs: CharacterAttributes, blood_family: FamilyId) -> Result<CharacterId> {
        let id = self.registry.id_generators.next_character();
        self.validate(id, &attrs)?;
        self.registry.characters.insert(id, Character::new(id, attrs, blood_family));
        changes.character_added(id);
        Ok(id)
    }

    /// New family rooted at an existing character, with its instance.
    fn new_family(&mut self, changes: &mut ChangeSet, kind: FamilyKind, root: CharacterId) -> Result<FamilyId> {
        let id = self.registry.id_generators.next_family();
        let name = format!("House of {}", self.registry.lookup_character(root)?.name());
        let family = Family::new(id, name, kind, root);
        self.registry.families.insert(id, family);
        let character = self.registry.lookup_character(root)?;
        self.instances.add_instance(character, id, Default::default())?;
        changes.family_added(id);
        debug!(family = %id, kind = kind.name(), root = %root, "family created");
        Ok(id)
    }

    /// Add `id` to a family graph next to `target`, with its instance.
    fn attach(&mut self, id: CharacterId, family: FamilyId, target: CharacterId, relation: Relation) -> Result<()> {
        self.registry.family_mut(family)?.graph.add_node(id, target, relation)?;
        let placement = self.registry.family(family)?.graph.placement(id).unwrap_or_default();
        let character = self.registry.lookup_character(id)?;
        self.instances.add_instance(character, family, placement)?;
        self.sync_placements(family)
    }

    /// Remove `id` from a family graph along with its instance.
    fn detach(&mut self, id: CharacterId, family: FamilyId) -> Result<Binding> {
        self.registry.family_mut(family)?.graph.remove_node(id)?;
        let binding = self.instances.remove_instance(id, family)?;
        self.sync_placements(family)?;
        Ok(binding)
    }

    /// Re-derive sibling order and copy graph placements onto instances.
    fn sync_placements(&mut self, family: FamilyId) -> Result<()> {
        let registry = &mut self.registry;
        let characters = &registry.characters;
        let fam = registry.families.get_mut(&family).ok_or(GenealogyError::unknown(family))?;
        fam.graph.derive_placements(|id| characters.get(&id).map(|c| c.birth_order_key()));
        for id in fam.graph.node_ids() {
            if let (Some(placement), Some(instance)) = (fam.graph.placement(*id), self.instances.instance_mut(*id, family)) {
                instance.placement = placement;
            }
        }
        Ok(())
    }

    /// Delete a family and every instance bound to it.
    fn remove_family(&mut self, changes: &mut ChangeSet, family: FamilyId) -> Result<()> {
        let fam = self.registry.families.remove(&family).ok_or(GenealogyError::unknown(family))?;
        for id in fam.graph.node_ids() {
            self.instances.remove_instance(*id, family)?;
        }
        for partnership in self.registry.partnerships.values_mut() {
            if partnership.family == Some(family) {
                partnership.family = None;
            }
        }
        if self.filters.prune_family(family) {
            changes.filters = Some(self.filters.clone());
        }
        changes.family_removed(family);
        debug!(family = %family, "family removed");
        Ok(())
    }

    /// Tidy a family that just lost members: an empty family goes, and a
    /// lone survivor keeps it only as its blood family.
    fn settle_family(&mut self, changes: &mut ChangeSet, family: FamilyId) -> Result<()> {
        let Some(fam) = self.registry.families.get(&family) else {
            return Ok(());
        };
        match fam.size() {
            0 => self.remove_family(changes, family),
            1 => {
                if self.registry.blood_members(family).is_empty() {
                    self.remove_family(changes, family)
                } else {
                    self.registry.family_mut(family)?.kind = FamilyKind::Singleton;
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Give a character that lost its blood family a fresh one.
    fn rehome_to_fresh(&mut self, changes: &mut ChangeSet, id: CharacterId) -> Result<FamilyId> {
        let family = self.new_family(changes, FamilyKind::NullTerminated, id)?;
        let character = self.registry.character_mut(id)?;
        character.blood_family = family;
        changes.character_updated(id);
        Ok(family)
    }

    // =========================================================================
    // Summary
    // =========================================================================

    pub fn summary(&self) -> DocumentSummary {
        let characters = self.registry.characters.len();
        let living = self.registry.characters.values().filter(|c| c.is_alive()).count();
        let rulers = self.registry.characters.values().filter(|c| c.attributes.ruler).count();
        let mut by_kind = BTreeMap::new();
        for family in self.registry.families.values() {
            *by_kind.entry(family.kind.name()).or_insert(0) += 1;
        }
        let generations = self.registry.families.values()
            .map(|f| f.graph.depth() + 1)
            .max()
            .unwrap_or(0);
        let clones: HashSet<CharacterId> = self.instances.characters()
            .filter(|c| self.instances.instances(*c).len() > 1)
            .collect();
        DocumentSummary {
            characters,
            living,
            rulers,
            families: self.registry.families.len(),
            families_by_kind: by_kind,
            partnerships: self.registry.partnerships.len(),
            kingdoms: self.registry.kingdoms.len(),
            instances: self.instances.count(),
            multi_family_characters: clones.len(),
            deepest_family: generations,
        }
    }
}

/// Counts for a quick overview of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSummary {
    pub characters: usize,
    pub living: usize,
    pub rulers: usize,
    pub families: usize,
    pub families_by_kind: BTreeMap<&'static str, usize>,
    pub partnerships: usize,
    pub kingdoms: usize,
    pub instances: usize,
    pub multi_family_characters: usize,
    pub deepest_family: u32,
}

impl fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Document ===")?;
        writeln!(f, "Characters: {} ({} living, {} rulers)", self.characters, self.living, self.rulers)?;
        write!(f, "Families: {}", self.families)?;
        if !self.families_by_kind.is_empty() {
            let kinds: Vec<String> = self.families_by_kind.iter().map(|(k, n)| format!("{} {}", n, k)).collect();
            write!(f, " ({})", kinds.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f, "Partnerships: {}, Kingdoms: {}", self.partnerships, self.kingdoms)?;
        writeln!(f, "Instances: {} ({} characters drawn in several families)", self.instances, self.multi_family_characters)?;
        writeln!(f, "Deepest family: {} generations", self.deepest_family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_failed_write_leaves_document_unchanged() {
        let mut doc = Document::new();
        let a = doc.create_character(CharacterAttributes::new("Aldric"), None).unwrap();
        let before_chars = doc.registry().characters.clone();
        let before_instances = doc.instances().count();

        let err = doc.add_partner(CharacterAttributes::new("   "), a).unwrap_err();
        assert!(matches!(err, GenealogyError::InvariantViolation(Violation::EmptyName(_))));
        assert_eq!(doc.registry().characters, before_chars);
        assert_eq!(doc.instances().count(), before_instances);

        // The failed id is not reissued.
        let b = doc.create_character(CharacterAttributes::new("Berra"), None).unwrap();
        assert_eq!(b, CharacterId(2));
    }

    #[test]
    fn test_events_only_after_success() {
        let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut doc = Document::new();
        doc.subscribe(move |e| sink.borrow_mut().push(e.name()));

        let a = doc.create_character(CharacterAttributes::new("Aldric"), None).unwrap();
        assert_eq!(*seen.borrow(), vec!["characters-added", "families-added"]);

        seen.borrow_mut().clear();
        assert!(doc.remove_character(CharacterId(99)).is_err());
        assert!(seen.borrow().is_empty());

        doc.remove_character(a).unwrap();
        assert_eq!(*seen.borrow(), vec!["characters-removed", "families-removed"]);
    }

    #[test]
    fn test_unknown_filter_ids_are_refused() {
        let mut doc = Document::new();
        let err = doc.set_filters(Filters::only_kingdoms([KingdomId(3)])).unwrap_err();
        assert_eq!(err, GenealogyError::unknown(KingdomId(3)));
        assert!(doc.filters().is_unrestricted());
    }

    #[test]
    fn test_layout_stores_positions_on_instances() {
        let mut doc = Document::new();
        let a = doc.create_character(CharacterAttributes::new("Aldric"), None).unwrap();
        let fam = doc.blood_family(a).unwrap();
        doc.layout(fam, Point::new(40.0, 10.0), &DisplayPolicy::default()).unwrap();
        assert_eq!(doc.instances().instance(a, fam).unwrap().position, Point::new(40.0, 10.0));
        assert_eq!(doc.family(fam).unwrap().anchor, Point::new(40.0, 10.0));
    }

    #[test]
    fn test_spacing_changes_apply_to_next_layout() {
        let config = LayoutConfig { partner_spacing: 300.0, ..LayoutConfig::default() };
        let mut doc = Document::with_config(config);
        let a = doc.create_character(CharacterAttributes::new("Aldric"), None).unwrap();
        let b = doc.add_partner(CharacterAttributes::new("Berra"), a).unwrap();
        let fam = doc.blood_family(a).unwrap();
        let policy = DisplayPolicy::default();

        let layout = doc.layout(fam, Point::default(), &policy).unwrap();
        assert_eq!(layout.position(b), Some(Point::new(150.0, 0.0)));

        doc.configure(&SpacingUpdate { partner_spacing: Some(100.0), ..SpacingUpdate::default() });
        assert_eq!(doc.config().generation_spacing, 300.0, "untouched fields keep their values");
        let layout = doc.layout(fam, Point::default(), &policy).unwrap();
        assert_eq!(layout.position(a), Some(Point::new(-50.0, 0.0)));
    }

    #[test]
    fn test_summary_display() {
        let mut doc = Document::new();
        let a = doc.create_character(CharacterAttributes::new("Aldric").ruler(), None).unwrap();
        doc.add_partner(CharacterAttributes::new("Berra"), a).unwrap();
        let summary = doc.summary();
        assert_eq!(summary.characters, 2);
        assert_eq!(summary.rulers, 1);
        assert_eq!(summary.families, 1);
        assert!(summary.to_string().contains("Characters: 2"));
    }
}
