//! Multi-family canvas arranger.
//!
//! Lays every displayed family out at the origin, then spreads them across
//! one canvas widest-first, alternating right and left of the centre, and
//! finally bridges partners who live in different families.

pub mod filters;

pub use filters::Filters;

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use super::{CharacterId, FamilyId};
use super::config::{DisplayPolicy, LayoutConfig};
use super::entities::{Family, FamilyKind};
use super::error::{GenealogyError, Result};
use super::graph::Relation;
use super::layout::{BoundingBox, LayoutEngine, LayoutResult, Point, Segment, SegmentKind};
use super::registry::Registry;

/// One family placed on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasFamily {
    pub family: FamilyId,
    pub name: String,
    pub layout: LayoutResult,
    /// Where the family name is drawn, if requested.
    pub label: Option<Point>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasResult {
    /// Families in placement order (widest first).
    pub families: Vec<CanvasFamily>,
    /// Partner connectors between families.
    pub bridges: Vec<Segment>,
    /// Connectors from partnership-family clones to their blood instances.
    pub links: Vec<Segment>,
    /// Families left out as redundant.
    pub hidden_families: Vec<FamilyId>,
    /// Families cut short by the node budget.
    pub truncated: Vec<FamilyId>,
    pub bbox: BoundingBox,
}

impl CanvasResult {
    pub fn family(&self, id: FamilyId) -> Option<&CanvasFamily> {
        self.families.iter().find(|f| f.family == id)
    }

    /// First drawn position of a character, blood family preferred.
    pub fn position_of(&self, registry: &Registry, id: CharacterId) -> Option<(FamilyId, Point)> {
        let blood = registry.characters.get(&id).map(|c| c.blood_family);
        let in_family = |f: &CanvasFamily| f.layout.position(id).map(|p| (f.family, p));
        self.families.iter()
            .filter(|f| Some(f.family) == blood)
            .find_map(in_family)
            .or_else(|| self.families.iter().find_map(in_family))
    }
}

/// Centre-to-centre step between neighbours on one side, as a multiple of
/// the inner family's width: twice its two-thirds width.
const PLACEMENT_STEP: f64 = 2.0 * (2.0 / 3.0);

const ALIGN_EPSILON: f64 = 1e-6;

pub struct Arranger<'a> {
    registry: &'a Registry,
    config: &'a LayoutConfig,
    policy: &'a DisplayPolicy,
    filters: &'a Filters,
}

impl<'a> Arranger<'a> {
    pub fn new(registry: &'a Registry, config: &'a LayoutConfig, policy: &'a DisplayPolicy, filters: &'a Filters) -> Self {
        Self { registry, config, policy, filters }
    }

    pub fn arrange(&self) -> Result<CanvasResult> {
        let mut canvas = CanvasResult::default();

        let mut displayed: Vec<FamilyId> = self.registry.family_ids()
            .into_iter()
            .filter(|f| self.filters.shows_family(*f))
            .collect();
        if self.policy.connect_partners && !self.policy.explode {
            for id in displayed.clone() {
                let others: Vec<&Family> = displayed.iter()
                    .filter(|f| **f != id)
                    .filter_map(|f| self.registry.families.get(f))
                    .collect();
                let family = self.registry.family(id)?;
                if is_redundant(family, &others) {
                    displayed.retain(|f| *f != id);
                    canvas.hidden_families.push(id);
                }
            }
        }

        let mut laid_out = Vec::new();
        for id in displayed {
            let family = self.registry.family(id)?;
            let hidden = self.filters.hidden_in(self.registry, family);
            let engine = LayoutEngine::new(self.config, self.policy, self.registry).with_hidden(hidden);
            let layout = match engine.run(family, Point::default()) {
                Ok(layout) => layout,
                Err(GenealogyError::BudgetExceeded { limit, partial }) => {
                    warn!(family = %id, limit, "family truncated on canvas");
                    canvas.truncated.push(id);
                    *partial
                }
                Err(e) => return Err(e),
            };
            if layout.positions.is_empty() {
                continue;
            }
            let width = layout.bbox.width() + self.config.node_extent(self.policy.icon_mode).0;
            laid_out.push((width, family, layout));
        }
        laid_out.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

        // Side cursors hold (centre, width) of the outermost family on each side.
        let mut right: Option<(f64, f64)> = None;
        let mut left: Option<(f64, f64)> = None;
        for (i, (width, family, mut layout)) in laid_out.into_iter().enumerate() {
            let centre = match (i, i % 2) {
                (0, _) => 0.0,
                (_, 1) => right.map_or(0.0, |(c, w)| c + PLACEMENT_STEP * w),
                _ => left.map_or(0.0, |(c, w)| c - PLACEMENT_STEP * w),
            };
            if i == 0 {
                right = Some((centre, width));
                left = Some((centre, width));
            } else if i % 2 == 1 {
                right = Some((centre, width));
            } else {
                left = Some((centre, width));
            }

            layout.translate(centre - layout.bbox.center().x, -layout.bbox.min.y);
            canvas.families.push(CanvasFamily {
                family: family.id,
                name: family.name.clone(),
                layout,
                label: None,
            });
        }

        if self.policy.connect_partners {
            self.bridge_partners(&mut canvas);
            self.link_clones(&mut canvas);
        }

        for placed in canvas.families.iter_mut() {
            if self.policy.show_family_names {
                let bbox = placed.layout.bbox;
                let lift = self.config.node_extent(self.policy.icon_mode).1 / 2.0 + self.config.crown_size;
                placed.label = Some(Point::new(bbox.center().x, bbox.min.y - lift));
            }
        }

        canvas.bbox = canvas.families.iter()
            .map(|f| f.layout.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        debug!(families = canvas.families.len(), bridges = canvas.bridges.len(), "canvas arranged");
        Ok(canvas)
    }

    /// Align partners from different families vertically and connect them.
    ///
    /// Bridged families form groups that move together, so an earlier
    /// alignment is never undone. The group holding the later-placed family
    /// moves. A partnership whose families already share a group at
    /// different heights gets no bridge.
    fn bridge_partners(&self, canvas: &mut CanvasResult) {
        // group[i] is the lowest placement index of family i's group.
        let mut group: Vec<usize> = (0..canvas.families.len()).collect();
        let mut bridged: Vec<(usize, CharacterId, usize, CharacterId)> = Vec::new();
        for pid in self.registry.partnership_ids() {
            let Some(partnership) = self.registry.partnerships.get(&pid) else { continue };
            let [a, b] = partnership.partners;
            let shared = canvas.families.iter().any(|f| f.layout.position(a).is_some() && f.layout.position(b).is_some());
            if shared {
                continue;
            }
            let (Some((fa, _)), Some((fb, _))) = (canvas.position_of(self.registry, a), canvas.position_of(self.registry, b)) else {
                continue;
            };
            let index = |f: FamilyId| canvas.families.iter().position(|c| c.family == f);
            let (Some(ia), Some(ib)) = (index(fa), index(fb)) else { continue };
            let (Some(pa), Some(pb)) = (canvas.families[ia].layout.position(a), canvas.families[ib].layout.position(b)) else {
                continue;
            };

            let (ga, gb) = (group[ia], group[ib]);
            if ga == gb {
                if (pa.y - pb.y).abs() > ALIGN_EPSILON {
                    warn!(partnership = %pid, "partners pinned at different heights, bridge skipped");
                    continue;
                }
            } else {
                let (moving, staying, dy) = if gb > ga { (gb, ga, pa.y - pb.y) } else { (ga, gb, pb.y - pa.y) };
                for (i, placed) in canvas.families.iter_mut().enumerate() {
                    if group[i] == moving {
                        placed.layout.translate(0.0, dy);
                        group[i] = staying;
                    }
                }
            }
            bridged.push((ia, a, ib, b));
        }

        canvas.bridges = bridged.into_iter()
            .filter_map(|(ia, a, ib, b)| {
                let pa = canvas.families[ia].layout.position(a)?;
                let pb = canvas.families[ib].layout.position(b)?;
                Some(Segment::new(pa, pb, SegmentKind::Bridge))
            })
            .collect();
    }

    /// Link root clones of partnership families to their blood instances.
    fn link_clones(&self, canvas: &mut CanvasResult) {
        let mut links = Vec::new();
        for placed in &canvas.families {
            let Some(family) = self.registry.families.get(&placed.family) else { continue };
            if family.kind != FamilyKind::Subset {
                continue;
            }
            for root in family.first_generation() {
                let Some(blood) = self.registry.characters.get(&root).map(|c| c.blood_family) else { continue };
                if blood == family.id {
                    continue;
                }
                let from = placed.layout.position(root);
                let to = canvas.family(blood).and_then(|f| f.layout.position(root));
                if let (Some(from), Some(to)) = (from, to) {
                    links.push(Segment::new(from, to, SegmentKind::Link));
                }
            }
        }
        canvas.links = links;
    }
}

/// A founder-only family whose members are all drawn elsewhere adds nothing.
fn is_redundant(family: &Family, others: &[&Family]) -> bool {
    if !matches!(family.kind, FamilyKind::NullTerminated | FamilyKind::Singleton) {
        return false;
    }
    let has_descendants = family.graph.node_ids().iter()
        .any(|id| family.graph.relations(*id, Relation::Descendant).is_ok_and(|d| !d.is_empty()));
    if has_descendants {
        return false;
    }
    family.graph.node_ids().iter().all(|id| others.iter().any(|o| o.contains(*id)))
}
