//! Plane geometry shared by the layout engine and the arranger.
//!
//! x grows to the right, y grows downward.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::genealogy::{CharacterId, FamilyId};
use crate::genealogy::graph::NodePlacement;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    pub fn midpoint(self, other: Point) -> Self {
        Self { x: (self.x + other.x) / 2.0, y: (self.y + other.y) / 2.0 }
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Degenerate box at a single point.
    pub fn at(p: Point) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box around `points`, or `None` if there are none.
    pub fn around(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::at(first);
        for p in iter {
            bbox.include(p);
        }
        Some(bbox)
    }

    pub fn include(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        out.include(other.min);
        out.include(other.max);
        out
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(self.max)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.min = self.min.offset(dx, dy);
        self.max = self.max.offset(dx, dy);
    }
}

/// What a connector segment represents, for styling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Two partners joined directly.
    Partner,
    /// Parent down to its descent fork on the bus line.
    Descent,
    /// Horizontal run along the sibling bus.
    Bus,
    /// Sibling fork down to the child.
    Drop,
    /// Partners living in different families.
    Bridge,
    /// Clone of a character to its blood-family instance.
    Link,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn new(from: Point, to: Point, kind: SegmentKind) -> Self {
        Self { from, to, kind }
    }

    pub fn length(&self) -> f64 {
        self.from.distance(self.to)
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() < 1e-9
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.from = self.from.offset(dx, dy);
        self.to = self.to.offset(dx, dy);
    }
}

/// Output of one family layout pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub family: FamilyId,
    pub anchor: Point,
    pub bbox: BoundingBox,
    pub positions: BTreeMap<CharacterId, Point>,
    pub placements: BTreeMap<CharacterId, NodePlacement>,
    pub segments: Vec<Segment>,
    pub forks: Vec<Point>,
    /// Crown positions above rulers, when requested.
    pub crowns: BTreeMap<CharacterId, Point>,
}

impl LayoutResult {
    pub fn empty(family: FamilyId, anchor: Point) -> Self {
        Self {
            family,
            anchor,
            bbox: BoundingBox::at(anchor),
            positions: BTreeMap::new(),
            placements: BTreeMap::new(),
            segments: Vec::new(),
            forks: Vec::new(),
            crowns: BTreeMap::new(),
        }
    }

    pub fn position(&self, id: CharacterId) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    /// Shift everything by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.anchor = self.anchor.offset(dx, dy);
        self.bbox.translate(dx, dy);
        for p in self.positions.values_mut() {
            *p = p.offset(dx, dy);
        }
        for s in self.segments.iter_mut() {
            s.translate(dx, dy);
        }
        for f in self.forks.iter_mut() {
            *f = f.offset(dx, dy);
        }
        for c in self.crowns.values_mut() {
            *c = c.offset(dx, dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_around_points() {
        let bbox = BoundingBox::around([Point::new(-1.0, 2.0), Point::new(3.0, -4.0)]).unwrap();
        assert_eq!(bbox.min, Point::new(-1.0, -4.0));
        assert_eq!(bbox.max, Point::new(3.0, 2.0));
        assert_eq!(bbox.width(), 4.0);
        assert!(BoundingBox::around(Vec::new()).is_none());
    }

    #[test]
    fn test_translate_moves_everything() {
        let mut result = LayoutResult::empty(FamilyId(0), Point::default());
        result.positions.insert(CharacterId(1), Point::new(1.0, 1.0));
        result.segments.push(Segment::new(Point::default(), Point::new(0.0, 5.0), SegmentKind::Drop));
        result.translate(10.0, -1.0);
        assert_eq!(result.position(CharacterId(1)), Some(Point::new(11.0, 0.0)));
        assert_eq!(result.segments[0].to, Point::new(10.0, 4.0));
        assert_eq!(result.anchor, Point::new(10.0, -1.0));
    }

    #[test]
    fn test_degenerate_segment() {
        let s = Segment::new(Point::new(2.0, 2.0), Point::new(2.0, 2.0), SegmentKind::Bus);
        assert!(s.is_degenerate());
    }
}
