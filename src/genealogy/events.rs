//! Change notifications published after each successful write.

use std::fmt;

use super::{CharacterId, FamilyId, KingdomId};
use super::arrange::Filters;

/// Event delivered to subscribers. Within one change set events arrive in
/// declaration order.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    CharactersAdded(Vec<CharacterId>),
    CharactersUpdated(Vec<CharacterId>),
    CharactersRemoved(Vec<CharacterId>),
    FamiliesAdded(Vec<FamilyId>),
    FamiliesRemoved(Vec<FamilyId>),
    KingdomsAdded(Vec<KingdomId>),
    KingdomsRemoved(Vec<KingdomId>),
    FilterChangeRequested(Filters),
}

impl DocumentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentEvent::CharactersAdded(_) => "characters-added",
            DocumentEvent::CharactersUpdated(_) => "characters-updated",
            DocumentEvent::CharactersRemoved(_) => "characters-removed",
            DocumentEvent::FamiliesAdded(_) => "families-added",
            DocumentEvent::FamiliesRemoved(_) => "families-removed",
            DocumentEvent::KingdomsAdded(_) => "kingdoms-added",
            DocumentEvent::KingdomsRemoved(_) => "kingdoms-removed",
            DocumentEvent::FilterChangeRequested(_) => "filter-change-requested",
        }
    }
}

/// Everything one write touched. Collected while the write runs and turned
/// into events only once it succeeded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub characters_added: Vec<CharacterId>,
    pub characters_updated: Vec<CharacterId>,
    pub characters_removed: Vec<CharacterId>,
    pub families_added: Vec<FamilyId>,
    pub families_removed: Vec<FamilyId>,
    pub kingdoms_added: Vec<KingdomId>,
    pub kingdoms_removed: Vec<KingdomId>,
    pub filters: Option<Filters>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Drop ids that were both created and destroyed in the same write.
fn cancel<T: PartialEq + Copy>(added: &mut Vec<T>, removed: &mut Vec<T>) {
    let transient: Vec<T> = added.iter().copied().filter(|id| removed.contains(id)).collect();
    added.retain(|id| !transient.contains(id));
    removed.retain(|id| !transient.contains(id));
}

impl ChangeSet {
    pub fn character_added(&mut self, id: CharacterId) {
        push_unique(&mut self.characters_added, id);
    }

    pub fn character_updated(&mut self, id: CharacterId) {
        push_unique(&mut self.characters_updated, id);
    }

    pub fn character_removed(&mut self, id: CharacterId) {
        push_unique(&mut self.characters_removed, id);
    }

    pub fn family_added(&mut self, id: FamilyId) {
        push_unique(&mut self.families_added, id);
    }

    pub fn family_removed(&mut self, id: FamilyId) {
        push_unique(&mut self.families_removed, id);
    }

    pub fn kingdom_added(&mut self, id: KingdomId) {
        push_unique(&mut self.kingdoms_added, id);
    }

    pub fn kingdom_removed(&mut self, id: KingdomId) {
        push_unique(&mut self.kingdoms_removed, id);
    }

    pub fn is_empty(&self) -> bool {
        self.clone().into_events().is_empty()
    }

    pub fn into_events(mut self) -> Vec<DocumentEvent> {
        cancel(&mut self.characters_added, &mut self.characters_removed);
        cancel(&mut self.families_added, &mut self.families_removed);
        cancel(&mut self.kingdoms_added, &mut self.kingdoms_removed);
        let added = self.characters_added.clone();
        let removed = self.characters_removed.clone();
        self.characters_updated.retain(|id| !added.contains(id) && !removed.contains(id));

        let mut events = Vec::new();
        if !self.characters_added.is_empty() {
            events.push(DocumentEvent::CharactersAdded(self.characters_added));
        }
        if !self.characters_updated.is_empty() {
            events.push(DocumentEvent::CharactersUpdated(self.characters_updated));
        }
        if !self.characters_removed.is_empty() {
            events.push(DocumentEvent::CharactersRemoved(self.characters_removed));
        }
        if !self.families_added.is_empty() {
            events.push(DocumentEvent::FamiliesAdded(self.families_added));
        }
        if !self.families_removed.is_empty() {
            events.push(DocumentEvent::FamiliesRemoved(self.families_removed));
        }
        if !self.kingdoms_added.is_empty() {
            events.push(DocumentEvent::KingdomsAdded(self.kingdoms_added));
        }
        if !self.kingdoms_removed.is_empty() {
            events.push(DocumentEvent::KingdomsRemoved(self.kingdoms_removed));
        }
        if let Some(filters) = self.filters {
            events.push(DocumentEvent::FilterChangeRequested(filters));
        }
        events
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&DocumentEvent)>;

/// Subscribers of a document. Each handler sees each event once.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(SubscriptionId, Handler)>,
    next: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&DocumentEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next);
        self.next += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _)| *sid != id);
        self.handlers.len() != before
    }

    pub fn publish(&mut self, changes: ChangeSet) {
        for event in changes.into_events() {
            tracing::trace!(event = event.name(), "publishing");
            for (_, handler) in self.handlers.iter_mut() {
                handler(&event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("handlers", &self.handlers.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_events_come_in_fixed_order() {
        let mut changes = ChangeSet::default();
        changes.kingdom_removed(KingdomId(1));
        changes.family_added(FamilyId(2));
        changes.character_added(CharacterId(3));
        changes.filters = Some(Filters::default());
        let names: Vec<&str> = changes.into_events().iter().map(DocumentEvent::name).collect();
        assert_eq!(names, vec!["characters-added", "families-added", "kingdoms-removed", "filter-change-requested"]);
    }

    #[test]
    fn test_transient_records_cancel_out() {
        let mut changes = ChangeSet::default();
        changes.family_added(FamilyId(2));
        changes.family_removed(FamilyId(2));
        changes.character_added(CharacterId(1));
        changes.character_updated(CharacterId(1));
        let events = changes.into_events();
        assert_eq!(events, vec![DocumentEvent::CharactersAdded(vec![CharacterId(1)])]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let seen = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = Rc::clone(&seen);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);

        let mut changes = ChangeSet::default();
        changes.character_added(CharacterId(0));
        bus.publish(changes.clone());
        assert_eq!(*seen.borrow(), 1);

        assert!(bus.unsubscribe(id));
        bus.publish(changes);
        assert_eq!(*seen.borrow(), 1);
        assert!(bus.is_empty());
    }
}
