//! Per-family relationship graph.
//!
//! A directed labelled multigraph keyed by character id. Every edge is stored
//! on both endpoints: `parent`/`descendant` are each other's reverse,
//! `sibling` and `partner` are symmetric. Node `n` holding edge
//! `(Parent, p)` reads "p is n's parent".

use std::collections::{BTreeMap, HashMap, HashSet};
use serde::{Serialize, Deserialize};

use super::{CharacterId, EntityRef, FamilyId};
use super::error::{GenealogyError, Result, Violation};

/// Edge label. Declaration order is traversal priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    Partner,
    Sibling,
    Parent,
    Descendant,
}

impl Relation {
    pub fn priority(self) -> u8 {
        match self {
            Relation::Partner => 0,
            Relation::Sibling => 1,
            Relation::Parent => 2,
            Relation::Descendant => 3,
        }
    }

    pub fn reverse(self) -> Relation {
        match self {
            Relation::Parent => Relation::Descendant,
            Relation::Descendant => Relation::Parent,
            other => other,
        }
    }
}

/// Which side of its parents a child hangs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    #[default]
    Middle,
    Right,
}

impl Side {
    /// Side of the k-th of n siblings.
    pub fn of(position: usize, count: usize) -> Side {
        let twice = 2 * position;
        let mid = count.saturating_sub(1);
        if twice < mid {
            Side::Left
        } else if twice > mid {
            Side::Right
        } else {
            Side::Middle
        }
    }
}

/// Derived triple `(position-among-siblings, side-of-parent, generation-height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePlacement {
    pub position: usize,
    pub side: Side,
    pub height: u32,
}

/// Role of a node in the family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Root1,
    Root2,
    Interior,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub relation: Relation,
    pub other: CharacterId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct GraphNode {
    placement: NodePlacement,
    edges: Vec<Edge>,
}

impl GraphNode {
    fn new(height: u32) -> Self {
        Self {
            placement: NodePlacement { position: 0, side: Side::Middle, height },
            edges: Vec::new(),
        }
    }

    fn related(&self, relation: Relation) -> impl Iterator<Item = CharacterId> + '_ {
        self.edges.iter().filter(move |e| e.relation == relation).map(|e| e.other)
    }

    fn has_edge(&self, relation: Relation, other: CharacterId) -> bool {
        self.edges.iter().any(|e| e.relation == relation && e.other == other)
    }
}

/// What `remove_mate` did to the first generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MateRemoval {
    Interior,
    /// The root-1/root-2 bond was cut; the caller decides how to split.
    SeveredRoots,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FamilyGraph {
    family: FamilyId,
    nodes: BTreeMap<CharacterId, GraphNode>,
    /// Insertion order of nodes.
    order: Vec<CharacterId>,
    root: Option<CharacterId>,
    second_root: Option<CharacterId>,
}

impl FamilyGraph {
    pub fn new(family: FamilyId, root: CharacterId) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(root, GraphNode::new(0));
        Self {
            family,
            nodes,
            order: vec![root],
            root: Some(root),
            second_root: None,
        }
    }

    pub fn family(&self) -> FamilyId {
        self.family
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> &[CharacterId] {
        &self.order
    }

    pub fn root(&self) -> Option<CharacterId> {
        self.root
    }

    pub fn second_root(&self) -> Option<CharacterId> {
        self.second_root
    }

    pub fn roots(&self) -> Vec<CharacterId> {
        self.root.into_iter().chain(self.second_root).collect()
    }

    pub fn role(&self, id: CharacterId) -> Option<Role> {
        if !self.contains(id) {
            None
        } else if self.root == Some(id) {
            Some(Role::Root1)
        } else if self.second_root == Some(id) {
            Some(Role::Root2)
        } else {
            Some(Role::Interior)
        }
    }

    pub fn placement(&self, id: CharacterId) -> Option<NodePlacement> {
        self.nodes.get(&id).map(|n| n.placement)
    }

    pub fn height(&self, id: CharacterId) -> Result<u32> {
        Ok(self.node(id)?.placement.height)
    }

    pub fn edges(&self, id: CharacterId) -> Result<&[Edge]> {
        Ok(&self.node(id)?.edges)
    }

    /// Deepest generation height in the family.
    pub fn depth(&self) -> u32 {
        self.nodes.values().map(|n| n.placement.height).max().unwrap_or(0)
    }

    fn node(&self, id: CharacterId) -> Result<&GraphNode> {
        self.nodes.get(&id).ok_or(GenealogyError::UnknownId(EntityRef::Character(id)))
    }

    fn node_mut(&mut self, id: CharacterId) -> Result<&mut GraphNode> {
        self.nodes.get_mut(&id).ok_or(GenealogyError::UnknownId(EntityRef::Character(id)))
    }

    fn insert_node(&mut self, id: CharacterId, height: u32) -> Result<()> {
        if self.contains(id) {
            return Err(Violation::AlreadyInFamily { character: id, family: self.family }.into());
        }
        self.nodes.insert(id, GraphNode::new(height));
        self.order.push(id);
        Ok(())
    }

    /// Store `other` as `id`'s `relation` and the reverse on `other`.
    fn link(&mut self, id: CharacterId, relation: Relation, other: CharacterId) -> Result<()> {
        if !self.node(id)?.has_edge(relation, other) {
            self.node_mut(id)?.edges.push(Edge { relation, other });
        }
        let reverse = relation.reverse();
        if !self.node(other)?.has_edge(reverse, id) {
            self.node_mut(other)?.edges.push(Edge { relation: reverse, other: id });
        }
        Ok(())
    }

    fn unlink(&mut self, id: CharacterId, relation: Relation, other: CharacterId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.edges.retain(|e| !(e.relation == relation && e.other == other));
        }
        let reverse = relation.reverse();
        if let Some(node) = self.nodes.get_mut(&other) {
            node.edges.retain(|e| !(e.relation == reverse && e.other == id));
        }
    }

    /// Attach a new character to `target`. `relation` is what the new node
    /// becomes to the target.
    pub fn add_node(&mut self, id: CharacterId, target: CharacterId, relation: Relation) -> Result<()> {
        let target_placement = self.node(target)?.placement;
        if self.contains(id) {
            return Err(Violation::AlreadyInFamily { character: id, family: self.family }.into());
        }

        match relation {
            Relation::Parent => self.add_parent(id, target),
            Relation::Descendant => {
                self.insert_node(id, target_placement.height + 1)?;
                let existing: Vec<CharacterId> = self.node(target)?.related(Relation::Descendant).collect();
                self.node_mut(id)?.placement.position = existing.len();
                self.link(id, Relation::Parent, target)?;
                for sibling in existing {
                    self.link(id, Relation::Sibling, sibling)?;
                }
                Ok(())
            }
            Relation::Sibling => {
                let parents: Vec<CharacterId> = self.node(target)?.related(Relation::Parent).collect();
                if parents.is_empty() {
                    return Err(Violation::Parentless(id).into());
                }
                let siblings: Vec<CharacterId> = self.node(target)?.related(Relation::Sibling).collect();
                self.insert_node(id, target_placement.height)?;
                self.node_mut(id)?.placement.position = siblings.len() + 1;
                for parent in parents {
                    self.link(id, Relation::Parent, parent)?;
                }
                self.link(id, Relation::Sibling, target)?;
                for sibling in siblings {
                    self.link(id, Relation::Sibling, sibling)?;
                }
                Ok(())
            }
            Relation::Partner => {
                self.insert_node(id, target_placement.height)?;
                if self.root == Some(target) && self.second_root.is_none() {
                    self.second_root = Some(id);
                    self.node_mut(id)?.placement.position = 1;
                } else {
                    let placement = self.node_mut(id)?;
                    placement.placement.position = target_placement.position;
                    placement.placement.side = target_placement.side;
                }
                self.link(id, Relation::Partner, target)
            }
        }
    }

    /// Insert a new generation above root-1.
    fn add_parent(&mut self, id: CharacterId, target: CharacterId) -> Result<()> {
        if self.root != Some(target) {
            let has_parents = self.node(target)?.related(Relation::Parent).next().is_some();
            return Err(if has_parents {
                Violation::AlreadyHasParents(target)
            } else {
                Violation::WrongRole { character: target, family: self.family }
            }
            .into());
        }

        for node in self.nodes.values_mut() {
            node.placement.height += 1;
        }
        self.insert_node(id, 0)?;
        self.node_mut(target)?.placement = NodePlacement { position: 0, side: Side::Middle, height: 1 };
        if let Some(second) = self.second_root.take() {
            // Former root-2 stays beside the former root-1 as an interior partner.
            self.node_mut(second)?.placement = NodePlacement { position: 0, side: Side::Middle, height: 1 };
        }
        self.root = Some(id);
        self.link(target, Relation::Parent, id)
    }

    /// Give an existing child a further in-family parent.
    pub fn link_parent(&mut self, child: CharacterId, parent: CharacterId) -> Result<()> {
        let child_height = self.height(child)?;
        let parent_height = self.height(parent)?;
        if child_height != parent_height + 1 {
            return Err(Violation::HeightMismatch { character: child, family: self.family }.into());
        }
        let siblings: Vec<CharacterId> = self.node(parent)?
            .related(Relation::Descendant)
            .filter(|s| *s != child)
            .collect();
        self.link(child, Relation::Parent, parent)?;
        for sibling in siblings {
            self.link(child, Relation::Sibling, sibling)?;
        }
        Ok(())
    }

    /// Partner edge between two nodes already in the graph. Re-adding is a no-op.
    pub fn add_mate(&mut self, a: CharacterId, b: CharacterId) -> Result<()> {
        if a == b {
            return Err(Violation::SelfPartnership(a).into());
        }
        if self.height(a)? != self.height(b)? {
            return Err(Violation::HeightMismatch { character: b, family: self.family }.into());
        }
        self.link(a, Relation::Partner, b)
    }

    /// Drop the partner edge pair between `a` and `b`.
    pub fn remove_mate(&mut self, a: CharacterId, b: CharacterId) -> Result<MateRemoval> {
        self.node(a)?;
        self.node(b)?;
        self.unlink(a, Relation::Partner, b);
        let roots = self.roots();
        if roots.len() == 2 && roots.contains(&a) && roots.contains(&b) {
            Ok(MateRemoval::SeveredRoots)
        } else {
            Ok(MateRemoval::Interior)
        }
    }

    /// Remove a node with no descendants. Root-2 is promoted when root-1 goes.
    pub fn remove_node(&mut self, id: CharacterId) -> Result<()> {
        let node = self.node(id)?;
        let dependents: Vec<CharacterId> = node.related(Relation::Descendant).collect();
        if !dependents.is_empty() {
            return Err(GenealogyError::HasDependents { entity: EntityRef::Character(id), dependents });
        }

        if self.root == Some(id) {
            match self.second_root {
                Some(second) => {
                    self.root = Some(second);
                    self.second_root = None;
                    if let Some(n) = self.nodes.get_mut(&second) {
                        n.placement.position = 0;
                    }
                }
                None => {
                    if let Some(other) = self.order.iter().find(|o| **o != id) {
                        return Err(Violation::Parentless(*other).into());
                    }
                    self.root = None;
                }
            }
        } else if self.second_root == Some(id) {
            self.second_root = None;
        }

        let edges = self.node(id)?.edges.clone();
        for edge in edges {
            self.unlink(id, edge.relation, edge.other);
        }
        self.nodes.remove(&id);
        self.order.retain(|o| *o != id);
        Ok(())
    }

    /// Drop `parent`'s descendant edges to children that keep another
    /// in-family parent. Fails if a child would be left parentless.
    pub fn release_children(&mut self, parent: CharacterId) -> Result<()> {
        let children: Vec<CharacterId> = self.node(parent)?.related(Relation::Descendant).collect();
        for child in &children {
            let other_parents = self.node(*child)?
                .related(Relation::Parent)
                .filter(|p| *p != parent)
                .count();
            if other_parents == 0 {
                return Err(GenealogyError::HasDependents {
                    entity: EntityRef::Character(parent),
                    dependents: vec![*child],
                });
            }
        }
        for child in children {
            self.unlink(parent, Relation::Descendant, child);
        }
        Ok(())
    }

    /// Make root-2 the new root-1 and the old root-1 root-2.
    pub fn swap_roots(&mut self) {
        if let (Some(first), Some(second)) = (self.root, self.second_root) {
            self.root = Some(second);
            self.second_root = Some(first);
            if let Some(n) = self.nodes.get_mut(&second) {
                n.placement.position = 0;
            }
            if let Some(n) = self.nodes.get_mut(&first) {
                n.placement.position = 1;
            }
        }
    }

    /// Related ids. Descendants are ordered by position among siblings, then
    /// id; other relations keep insertion order.
    pub fn relations(&self, id: CharacterId, relation: Relation) -> Result<Vec<CharacterId>> {
        let node = self.node(id)?;
        let mut related: Vec<CharacterId> = node.related(relation).collect();
        if relation == Relation::Descendant {
            related.sort_by_key(|c| {
                let position = self.nodes.get(c).map(|n| n.placement.position).unwrap_or(usize::MAX);
                (position, *c)
            });
        }
        Ok(related)
    }

    /// Post-order walk over descendant edges starting at `root`.
    pub fn subtree(&self, root: CharacterId) -> Result<Vec<CharacterId>> {
        self.node(root)?;
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        // (node, children expanded?)
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.relations(id, Relation::Descendant)?.into_iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        Ok(out)
    }

    /// Re-derive `position` and `side` of every node from a canonical order.
    /// Children sharing the same in-family parents form one sibling group.
    pub fn derive_placements<K: Ord>(&mut self, key: impl Fn(CharacterId) -> K) {
        let mut groups: BTreeMap<Vec<CharacterId>, Vec<CharacterId>> = BTreeMap::new();
        for (id, node) in &self.nodes {
            let mut parents: Vec<CharacterId> = node.related(Relation::Parent).collect();
            if parents.is_empty() {
                continue;
            }
            parents.sort();
            groups.entry(parents).or_default().push(*id);
        }

        let mut assigned: HashMap<CharacterId, (usize, Side)> = HashMap::new();
        for members in groups.values_mut() {
            members.sort_by_key(|id| key(*id));
            let count = members.len();
            for (position, id) in members.iter().enumerate() {
                assigned.insert(*id, (position, Side::of(position, count)));
            }
        }

        // Partners without in-family parents take their anchor's slot.
        let partner_slots: Vec<(CharacterId, (usize, Side))> = self.nodes.iter()
            .filter(|(id, _)| !assigned.contains_key(id) && Some(**id) != self.root && Some(**id) != self.second_root)
            .filter_map(|(id, node)| {
                node.related(Relation::Partner)
                    .find_map(|p| assigned.get(&p).copied())
                    .map(|slot| (*id, slot))
            })
            .collect();
        assigned.extend(partner_slots);

        for (id, node) in self.nodes.iter_mut() {
            if let Some((position, side)) = assigned.get(id) {
                node.placement.position = *position;
                node.placement.side = *side;
            } else if Some(*id) == self.root {
                node.placement.position = 0;
                node.placement.side = Side::Middle;
            } else if Some(*id) == self.second_root {
                node.placement.position = 1;
                node.placement.side = Side::Middle;
            }
        }
    }

    /// Copy every node of `other` into this graph below-or-beside `at`:
    /// `other`'s root-1 becomes `at`'s partner and heights shift to match.
    pub fn graft(&mut self, other: &FamilyGraph, at: CharacterId) -> Result<()> {
        let base = self.height(at)?;
        let other_root = other.root.ok_or(GenealogyError::UnknownId(EntityRef::Family(other.family)))?;
        if let Some(clash) = other.order.iter().find(|id| self.contains(**id)) {
            return Err(Violation::AlreadyInFamily { character: *clash, family: self.family }.into());
        }
        for id in &other.order {
            let mut node = other.nodes[id].clone();
            node.placement.height += base;
            self.nodes.insert(*id, node);
            self.order.push(*id);
        }
        self.link(other_root, Relation::Partner, at)
    }

    /// Check reciprocity of every edge and consistency of heights.
    pub fn verify(&self) -> Result<()> {
        let anchored = self.anchored();
        for (id, node) in &self.nodes {
            for edge in &node.edges {
                let other = self.nodes.get(&edge.other).ok_or(Violation::NotInFamily {
                    character: edge.other,
                    family: self.family,
                })?;
                if !other.has_edge(edge.relation.reverse(), *id) {
                    let (parent, child) = match edge.relation {
                        Relation::Parent => (edge.other, *id),
                        _ => (*id, edge.other),
                    };
                    return Err(Violation::MissingReciprocalEdge { parent, child }.into());
                }
                let consistent = match edge.relation {
                    Relation::Parent => node.placement.height == other.placement.height + 1,
                    Relation::Descendant => node.placement.height + 1 == other.placement.height,
                    Relation::Sibling | Relation::Partner => node.placement.height == other.placement.height,
                };
                if !consistent {
                    return Err(Violation::HeightMismatch { character: *id, family: self.family }.into());
                }
            }

            let is_root = self.root == Some(*id) || self.second_root == Some(*id);
            if is_root {
                if node.placement.height != 0 {
                    return Err(Violation::HeightMismatch { character: *id, family: self.family }.into());
                }
                continue;
            }
            if !anchored.contains(id) {
                return Err(Violation::Parentless(*id).into());
            }
        }
        Ok(())
    }

    /// Roots, nodes with an in-family parent, and anyone reachable from
    /// those through partner edges.
    fn anchored(&self) -> HashSet<CharacterId> {
        let mut anchored: HashSet<CharacterId> = self.nodes.iter()
            .filter(|(id, node)| {
                self.root == Some(**id)
                    || self.second_root == Some(**id)
                    || node.related(Relation::Parent).next().is_some()
            })
            .map(|(id, _)| *id)
            .collect();
        let mut frontier: Vec<CharacterId> = anchored.iter().copied().collect();
        while let Some(id) = frontier.pop() {
            let Some(node) = self.nodes.get(&id) else { continue };
            for mate in node.related(Relation::Partner) {
                if anchored.insert(mate) {
                    frontier.push(mate);
                }
            }
        }
        anchored
    }

    #[cfg(test)]
    pub(crate) fn insert_raw_edge(&mut self, id: CharacterId, relation: Relation, other: CharacterId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.edges.push(Edge { relation, other });
        }
    }
}
