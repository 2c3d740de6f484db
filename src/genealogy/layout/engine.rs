//! Single-family layout engine.
//!
//! Walks the family graph from root-1 in priority order (partners, then
//! siblings, parents, descendants), placing each sibling group as a whole
//! around its parents. A post-order pass then pushes colliding sibling
//! subtrees apart and re-centres them on their parents, and a final sweep
//! derives the fork waypoints and connector segments from the settled
//! positions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::genealogy::CharacterId;
use crate::genealogy::config::{DisplayPolicy, LayoutConfig};
use crate::genealogy::entities::{BirthOrderKey, Family};
use crate::genealogy::error::{GenealogyError, Result, Violation};
use crate::genealogy::graph::{FamilyGraph, Relation};
use crate::genealogy::registry::Registry;
use super::geometry::{BoundingBox, LayoutResult, Point, Segment, SegmentKind};

const EPSILON: f64 = 1e-9;

/// Read-only view of canonical character data the engine needs.
pub trait LineageSource {
    fn birth_order_key(&self, id: CharacterId) -> BirthOrderKey;
    fn is_ruler(&self, id: CharacterId) -> bool;
}

impl LineageSource for Registry {
    fn birth_order_key(&self, id: CharacterId) -> BirthOrderKey {
        self.characters.get(&id)
            .map(|c| c.birth_order_key())
            .unwrap_or_else(|| BirthOrderKey::from_id(id))
    }

    fn is_ruler(&self, id: CharacterId) -> bool {
        self.characters.get(&id).is_some_and(|c| c.attributes.ruler)
    }
}

/// Orders siblings by id alone; nobody is a ruler.
pub struct IdOrder;

impl LineageSource for IdOrder {
    fn birth_order_key(&self, id: CharacterId) -> BirthOrderKey {
        BirthOrderKey::from_id(id)
    }

    fn is_ruler(&self, _id: CharacterId) -> bool {
        false
    }
}

/// Edge waiting in the traversal queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct QueuedEdge {
    priority: u8,
    seq: u64,
    from: CharacterId,
    relation: Relation,
    to: CharacterId,
}

impl Ord for QueuedEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (priority, seq)
        other.priority.cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Children sharing one set of in-family parents.
#[derive(Debug, Clone)]
struct ChildGroup {
    parents: Vec<CharacterId>,
    children: Vec<CharacterId>,
    bus_y: f64,
}

/// Mutable state of one pass.
struct Pass {
    graph: FamilyGraph,
    positions: HashMap<CharacterId, Point>,
    order: Vec<CharacterId>,
    /// Placement tree: who caused each node to be placed.
    placed_by: HashMap<CharacterId, Vec<CharacterId>>,
    groups: Vec<ChildGroup>,
    heap: BinaryHeap<QueuedEdge>,
    seq: u64,
    overflow: bool,
}

impl Pass {
    fn new(graph: FamilyGraph) -> Self {
        Self {
            graph,
            positions: HashMap::new(),
            order: Vec::new(),
            placed_by: HashMap::new(),
            groups: Vec::new(),
            heap: BinaryHeap::new(),
            seq: 0,
            overflow: false,
        }
    }

    fn is_placed(&self, id: CharacterId) -> bool {
        self.positions.contains_key(&id)
    }

    fn pos(&self, id: CharacterId) -> Point {
        self.positions.get(&id).copied().unwrap_or_default()
    }

    fn height(&self, id: CharacterId) -> u32 {
        self.graph.placement(id).map(|p| p.height).unwrap_or(0)
    }

    fn enqueue_edges(&mut self, id: CharacterId) -> Result<()> {
        let edges = self.graph.edges(id)?.to_vec();
        for edge in edges {
            self.seq += 1;
            self.heap.push(QueuedEdge {
                priority: edge.relation.priority(),
                seq: self.seq,
                from: id,
                relation: edge.relation,
                to: edge.other,
            });
        }
        Ok(())
    }

    /// Nodes in the placement subtree of `id`, `id` first.
    fn placement_subtree(&self, id: CharacterId) -> Vec<CharacterId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(kids) = self.placed_by.get(&n) {
                stack.extend(kids.iter().rev());
            }
        }
        out
    }

    /// Horizontal extent per generation height of a set of nodes.
    fn contour(&self, nodes: &[CharacterId]) -> BTreeMap<u32, (f64, f64)> {
        let mut contour: BTreeMap<u32, (f64, f64)> = BTreeMap::new();
        for id in nodes {
            let x = self.pos(*id).x;
            let entry = contour.entry(self.height(*id)).or_insert((x, x));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.max(x);
        }
        contour
    }

    fn shift(&mut self, nodes: &[CharacterId], dx: f64) {
        for id in nodes {
            if let Some(p) = self.positions.get_mut(id) {
                p.x += dx;
            }
        }
    }
}

/// Lays out one family at a time.
pub struct LayoutEngine<'a, S: LineageSource> {
    config: &'a LayoutConfig,
    policy: &'a DisplayPolicy,
    source: &'a S,
    hidden: HashSet<CharacterId>,
}

impl<'a, S: LineageSource> LayoutEngine<'a, S> {
    pub fn new(config: &'a LayoutConfig, policy: &'a DisplayPolicy, source: &'a S) -> Self {
        Self { config, policy, source, hidden: HashSet::new() }
    }

    /// Characters left out of the output, e.g. by filters.
    pub fn with_hidden(mut self, hidden: HashSet<CharacterId>) -> Self {
        self.hidden = hidden;
        self
    }

    /// Lay out `family` with its first generation centred on `anchor`.
    pub fn run(&self, family: &Family, anchor: Point) -> Result<LayoutResult> {
        let mut graph = family.graph.clone();
        graph.derive_placements(|id| self.source.birth_order_key(id));

        let mut excluded = self.hidden.clone();
        if !self.policy.include_root_partners {
            excluded.extend(graph.second_root());
        }

        let mut pass = Pass::new(graph);
        let mut result = LayoutResult::empty(family.id, anchor);

        let Some(root) = pass.graph.root() else {
            return Ok(self.finish(&pass, result));
        };
        let second = pass.graph.second_root().filter(|r| !excluded.contains(r));
        let half = self.config.partner_spacing / 2.0;
        match (!excluded.contains(&root), second) {
            (true, Some(r2)) => {
                self.place(&mut pass, root, Point::new(anchor.x - half, anchor.y), None);
                self.place(&mut pass, r2, Point::new(anchor.x + half, anchor.y), Some(root));
            }
            (true, None) => self.place(&mut pass, root, anchor, None),
            (false, Some(r2)) => self.place(&mut pass, r2, anchor, None),
            (false, None) => return Ok(self.finish(&pass, result)),
        }
        for id in pass.order.clone() {
            pass.enqueue_edges(id)?;
        }

        while let Some(edge) = pass.heap.pop() {
            if pass.overflow {
                break;
            }
            if excluded.contains(&edge.to) || pass.is_placed(edge.to) {
                continue;
            }
            let before = pass.order.len();
            match edge.relation {
                Relation::Descendant => {
                    let reciprocal = pass.graph.edges(edge.to)?
                        .iter()
                        .any(|e| e.relation == Relation::Parent && e.other == edge.from);
                    if !reciprocal {
                        return Err(Violation::MissingReciprocalEdge { parent: edge.from, child: edge.to }.into());
                    }
                    self.place_group(&mut pass, edge.to, edge.from, &excluded)?;
                }
                Relation::Partner => {
                    let ring = pass.placed_by.get(&edge.from)
                        .map(|kids| kids.iter().filter(|k| pass.height(**k) == pass.height(edge.from)).count())
                        .unwrap_or(0);
                    let from = pass.pos(edge.from);
                    let x = from.x + self.config.partner_spacing * (ring as f64 + 1.0);
                    self.place(&mut pass, edge.to, Point::new(x, from.y), Some(edge.from));
                }
                Relation::Parent => {
                    let child = pass.pos(edge.from);
                    let p = Point::new(child.x, child.y - self.config.generation_spacing);
                    self.place(&mut pass, edge.to, p, Some(edge.from));
                }
                // Siblings arrive with their whole group.
                Relation::Sibling => {}
            }
            for id in pass.order[before..].to_vec() {
                pass.enqueue_edges(id)?;
            }
        }

        self.propagate_offsets(&mut pass);

        result = self.finish(&pass, result);
        if pass.overflow {
            let limit = self.config.max_nodes.unwrap_or(0);
            warn!(family = %family.id, limit, placed = result.positions.len(), "layout budget exceeded");
            return Err(GenealogyError::BudgetExceeded { limit, partial: Box::new(result) });
        }
        debug!(family = %family.id, nodes = result.positions.len(), segments = result.segments.len(), "family laid out");
        Ok(result)
    }

    fn place(&self, pass: &mut Pass, id: CharacterId, at: Point, placer: Option<CharacterId>) {
        if let Some(limit) = self.config.max_nodes {
            if pass.positions.len() >= limit {
                pass.overflow = true;
                return;
            }
        }
        pass.positions.insert(id, at);
        pass.order.push(id);
        if let Some(placer) = placer {
            pass.placed_by.entry(placer).or_default().push(id);
        }
    }

    /// Place every visible child sharing `child`'s in-family parents.
    fn place_group(&self, pass: &mut Pass, child: CharacterId, placer: CharacterId, excluded: &HashSet<CharacterId>) -> Result<()> {
        let mut key = pass.graph.relations(child, Relation::Parent)?;
        key.sort();

        let mut members = Vec::new();
        for candidate in pass.graph.relations(placer, Relation::Descendant)? {
            if excluded.contains(&candidate) || pass.is_placed(candidate) {
                continue;
            }
            let mut parents = pass.graph.relations(candidate, Relation::Parent)?;
            parents.sort();
            if parents == key {
                members.push(candidate);
            }
        }

        let mut parents: Vec<CharacterId> = key.into_iter().filter(|p| pass.is_placed(*p)).collect();
        parents.sort_by(|a, b| pass.pos(*a).x.total_cmp(&pass.pos(*b).x).then(a.cmp(b)));
        let center = parents.iter().map(|p| pass.pos(*p).x).sum::<f64>() / parents.len().max(1) as f64;
        let parent_y = pass.pos(placer).y;

        let n = members.len();
        let spread = self.config.children_spread(pass.height(child));
        let y = parent_y + self.config.generation_spacing;
        for (k, member) in members.iter().enumerate() {
            let x = center + (k as f64 - (n as f64 - 1.0) / 2.0) * spread;
            self.place(pass, *member, Point::new(x, y), Some(placer));
        }
        let placed: Vec<CharacterId> = members.into_iter().filter(|m| pass.is_placed(*m)).collect();
        if !placed.is_empty() {
            pass.groups.push(ChildGroup {
                parents,
                children: placed,
                bus_y: parent_y + self.config.descendant_dropdown,
            });
        }
        Ok(())
    }

    /// Push neighbouring sibling subtrees apart where their contours come
    /// closer than the minimum gap, then re-centre the group.
    fn propagate_offsets(&self, pass: &mut Pass) {
        let groups = pass.groups.clone();
        for group in groups.iter().rev() {
            let n = group.children.len();
            if n < 2 {
                continue;
            }
            let subtrees: Vec<Vec<CharacterId>> = group.children.iter().map(|c| pass.placement_subtree(*c)).collect();
            let contours: Vec<BTreeMap<u32, (f64, f64)>> = subtrees.iter().map(|s| pass.contour(s)).collect();

            let mut pushes = vec![0.0; n];
            let mut left = contours[0].clone();
            for k in 1..n {
                let mut push = pushes[k - 1];
                for (height, (lo, _)) in &contours[k] {
                    if let Some((_, hi)) = left.get(height) {
                        let needed = hi + self.config.min_gap(*height) - lo;
                        if needed > push + EPSILON {
                            push = needed;
                        }
                    }
                }
                pushes[k] = push;
                for (height, (lo, hi)) in &contours[k] {
                    let entry = left.entry(*height).or_insert((lo + push, hi + push));
                    entry.0 = entry.0.min(lo + push);
                    entry.1 = entry.1.max(hi + push);
                }
            }

            let correction = (pushes[0] + pushes[n - 1]) / 2.0;
            for (k, subtree) in subtrees.iter().enumerate() {
                let dx = pushes[k] - correction;
                if dx.abs() > EPSILON {
                    pass.shift(subtree, dx);
                }
            }
        }
    }

    /// Derive forks, segments, crowns and the bounding box from the
    /// settled positions.
    fn finish(&self, pass: &Pass, mut result: LayoutResult) -> LayoutResult {
        let mut segments = Vec::new();
        let mut forks = Vec::new();
        let mut bonded: HashSet<(CharacterId, CharacterId)> = HashSet::new();

        for group in &pass.groups {
            let parent_points: Vec<Point> = group.parents.iter().map(|p| pass.pos(*p)).collect();
            let mid_x = parent_points.iter().map(|p| p.x).sum::<f64>() / parent_points.len().max(1) as f64;
            let group_fork = Point::new(mid_x, group.bus_y);
            forks.push(group_fork);
            // Each parent drops to its own fork on the bus line, which then
            // joins the midpoint fork.
            for p in &parent_points {
                let descent_fork = Point::new(p.x, group.bus_y);
                segments.push(Segment::new(*p, descent_fork, SegmentKind::Descent));
                segments.push(Segment::new(descent_fork, group_fork, SegmentKind::Bus));
                if descent_fork != group_fork {
                    forks.push(descent_fork);
                }
            }
            for a in &group.parents {
                for b in &group.parents {
                    if a < b {
                        bonded.insert((*a, *b));
                    }
                }
            }

            let mut children = group.children.clone();
            children.sort_by(|a, b| pass.pos(*a).x.total_cmp(&pass.pos(*b).x).then(a.cmp(b)));
            let sibling_forks: Vec<Point> = children.iter().map(|c| Point::new(pass.pos(*c).x, group.bus_y)).collect();
            for pair in sibling_forks.windows(2) {
                segments.push(Segment::new(pair[0], pair[1], SegmentKind::Bus));
            }
            if let Some(middle) = sibling_forks.get(sibling_forks.len() / 2) {
                segments.push(Segment::new(group_fork, *middle, SegmentKind::Bus));
            }
            for (fork, child) in sibling_forks.iter().zip(&children) {
                segments.push(Segment::new(*fork, pass.pos(*child), SegmentKind::Drop));
            }
            forks.extend(sibling_forks);
        }

        let mut drawn: HashSet<(CharacterId, CharacterId)> = HashSet::new();
        for id in &pass.order {
            let Ok(edges) = pass.graph.edges(*id) else { continue };
            for edge in edges.iter().filter(|e| e.relation == Relation::Partner) {
                let pair = if *id < edge.other { (*id, edge.other) } else { (edge.other, *id) };
                if !pass.is_placed(edge.other) || bonded.contains(&pair) || !drawn.insert(pair) {
                    continue;
                }
                segments.push(Segment::new(pass.pos(*id), pass.pos(edge.other), SegmentKind::Partner));
            }
        }
        segments.retain(|s| !s.is_degenerate());

        for id in &pass.order {
            let p = pass.pos(*id);
            result.positions.insert(*id, p);
            if let Some(placement) = pass.graph.placement(*id) {
                result.placements.insert(*id, placement);
            }
            if self.policy.show_rulers && self.source.is_ruler(*id) {
                result.crowns.insert(*id, Point::new(p.x, p.y - self.config.crown_size));
            }
        }

        let mut bbox = BoundingBox::around(result.positions.values().copied().chain(forks.iter().copied()))
            .unwrap_or_else(|| BoundingBox::at(result.anchor));
        if bbox.height() < self.config.descendant_dropdown {
            bbox.max.y = bbox.min.y + self.config.descendant_dropdown;
        }
        result.bbox = bbox;
        result.segments = segments;
        result.forks = forks;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genealogy::{FamilyId};
    use crate::genealogy::entities::FamilyKind;

    fn c(n: u64) -> CharacterId {
        CharacterId(n)
    }

    fn family_with(graph: impl FnOnce(&mut FamilyGraph)) -> Family {
        let mut family = Family::new(FamilyId(0), "Test".to_string(), FamilyKind::NullTerminated, c(0));
        graph(&mut family.graph);
        family
    }

    fn run(family: &Family) -> LayoutResult {
        let config = LayoutConfig::default();
        let policy = DisplayPolicy::default();
        LayoutEngine::new(&config, &policy, &IdOrder).run(family, Point::default()).unwrap()
    }

    #[test]
    fn test_single_node_bbox() {
        let family = family_with(|_| {});
        let result = run(&family);
        assert_eq!(result.position(c(0)), Some(Point::default()));
        assert_eq!(result.bbox.height(), 125.0);
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_two_roots_without_children() {
        let family = family_with(|g| g.add_node(c(1), c(0), Relation::Partner).unwrap());
        let result = run(&family);
        let a = result.position(c(0)).unwrap();
        let b = result.position(c(1)).unwrap();
        assert_eq!(b.x - a.x, 200.0);
        assert!(result.forks.is_empty(), "no midpoint fork without children");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].kind, SegmentKind::Partner);
    }

    #[test]
    fn test_even_children_straddle_midpoint() {
        let family = family_with(|g| {
            g.add_node(c(1), c(0), Relation::Descendant).unwrap();
            g.add_node(c(2), c(0), Relation::Descendant).unwrap();
        });
        let result = run(&family);
        assert_eq!(result.position(c(1)).unwrap().x, -50.0);
        assert_eq!(result.position(c(2)).unwrap().x, 50.0);
        assert_eq!(result.position(c(1)).unwrap().y, 300.0);
    }

    #[test]
    fn test_balanced_binary_tree_centres_parents() {
        let family = family_with(|g| {
            g.add_node(c(1), c(0), Relation::Descendant).unwrap();
            g.add_node(c(2), c(0), Relation::Descendant).unwrap();
            for (parent, kids) in [(1, [3, 4]), (2, [5, 6])] {
                for kid in kids {
                    g.add_node(c(kid), c(parent), Relation::Descendant).unwrap();
                }
            }
        });
        let result = run(&family);
        let x = |n| result.position(c(n)).unwrap().x;
        assert!((x(1) - (x(3) + x(4)) / 2.0).abs() < 1e-6);
        assert!((x(2) - (x(5) + x(6)) / 2.0).abs() < 1e-6);
        assert!((x(0) - (x(1) + x(2)) / 2.0).abs() < 1e-6);
        // Cousins keep the minimum gap.
        assert!(x(5) - x(4) >= LayoutConfig::default().min_gap(2) - 1e-6);
    }

    #[test]
    fn test_ring_partner_is_placed_right() {
        let family = family_with(|g| {
            g.add_node(c(1), c(0), Relation::Descendant).unwrap();
            g.add_node(c(2), c(1), Relation::Partner).unwrap();
        });
        let result = run(&family);
        let child = result.position(c(1)).unwrap();
        assert_eq!(result.position(c(2)).unwrap(), child.offset(200.0, 0.0));
    }

    #[test]
    fn test_missing_reciprocal_edge_fails() {
        let mut family = family_with(|g| {
            g.add_node(c(1), c(0), Relation::Descendant).unwrap();
            g.add_node(c(2), c(1), Relation::Descendant).unwrap();
        });
        family.graph.insert_raw_edge(c(0), Relation::Descendant, c(2));
        let config = LayoutConfig::default();
        let policy = DisplayPolicy::default();
        let err = LayoutEngine::new(&config, &policy, &IdOrder).run(&family, Point::default()).unwrap_err();
        assert_eq!(
            err,
            GenealogyError::InvariantViolation(Violation::MissingReciprocalEdge { parent: c(0), child: c(2) })
        );
    }

    #[test]
    fn test_budget_returns_partial_layout() {
        let family = family_with(|g| {
            for kid in 1..6 {
                g.add_node(c(kid), c(0), Relation::Descendant).unwrap();
            }
        });
        let config = LayoutConfig { max_nodes: Some(3), ..LayoutConfig::default() };
        let policy = DisplayPolicy::default();
        match LayoutEngine::new(&config, &policy, &IdOrder).run(&family, Point::default()) {
            Err(GenealogyError::BudgetExceeded { limit, partial }) => {
                assert_eq!(limit, 3);
                assert_eq!(partial.positions.len(), 3);
            }
            other => panic!("expected budget error, got {:?}", other),
        }
    }

    #[test]
    fn test_hidden_nodes_are_skipped() {
        let family = family_with(|g| {
            g.add_node(c(1), c(0), Relation::Descendant).unwrap();
            g.add_node(c(2), c(0), Relation::Descendant).unwrap();
        });
        let config = LayoutConfig::default();
        let policy = DisplayPolicy::default();
        let result = LayoutEngine::new(&config, &policy, &IdOrder)
            .with_hidden([c(1)].into_iter().collect())
            .run(&family, Point::default())
            .unwrap();
        assert!(result.position(c(1)).is_none());
        assert_eq!(result.position(c(2)).unwrap().x, 0.0);
    }
}
