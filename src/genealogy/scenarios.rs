//! End-to-end behaviour across documents, layouts and the canvas.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{CharacterId, FamilyId, KingdomId, PartnershipId};
use super::arrange::Filters;
use super::config::DisplayPolicy;
use super::document::Document;
use super::entities::{CharacterAttributes, FamilyKind, Sex};
use super::generate::{generate_document, GeneratorConfig};
use super::graph::{Relation, Role};
use super::layout::{LayoutResult, Point, SegmentKind};
use super::persistence::DocumentFile;
use super::IdGenerators;

const EPS: f64 = 1e-9;

fn attrs(name: &str) -> CharacterAttributes {
    CharacterAttributes::new(name)
}

fn in_kingdom(name: &str, kingdom: KingdomId) -> CharacterAttributes {
    CharacterAttributes::new(name).with_kingdom(kingdom)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

/// A, B and their children Cade, Dara, Evan.
struct Nuclear {
    doc: Document,
    a: CharacterId,
    b: CharacterId,
    p: PartnershipId,
    children: Vec<CharacterId>,
}

impl Nuclear {
    fn build(order: &[&str]) -> Self {
        let mut doc = Document::new();
        let a = doc.create_character(attrs("Aldric").with_sex(Sex::Male), None).unwrap();
        let b = doc.create_character(attrs("Berra").with_sex(Sex::Female), None).unwrap();
        let p = doc.partner(a, b).unwrap();
        let children = order.iter().map(|name| doc.add_child(attrs(name), p).unwrap()).collect();
        Self { doc, a, b, p, children }
    }

    fn new() -> Self {
        Self::build(&["Cade", "Dara", "Evan"])
    }

    fn family(&self) -> FamilyId {
        self.doc.partnership_family(self.p).unwrap().unwrap()
    }

    fn layout(&mut self) -> LayoutResult {
        let family = self.family();
        self.doc.layout(family, Point::default(), &DisplayPolicy::default()).unwrap()
    }
}

/// Structural state with id allocation left out.
fn structure(doc: &Document) -> DocumentFile {
    let mut file = DocumentFile::from_document(doc);
    file.id_generators = IdGenerators::new();
    file
}

#[test]
fn test_nuclear_family_layout() {
    let mut n = Nuclear::new();
    let layout = n.layout();
    let [c, d, e] = [n.children[0], n.children[1], n.children[2]];

    assert_eq!(layout.position(n.a), Some(Point::new(-100.0, 0.0)));
    assert_eq!(layout.position(n.b), Some(Point::new(100.0, 0.0)));
    assert!(layout.forks.contains(&Point::new(0.0, 125.0)), "midpoint fork under the couple");
    assert!(layout.forks.contains(&Point::new(-100.0, 125.0)), "A's descent fork");
    assert!(layout.forks.contains(&Point::new(100.0, 125.0)), "B's descent fork");
    for s in &layout.segments {
        assert!(close(s.from.x, s.to.x) || close(s.from.y, s.to.y), "diagonal connector {:?}", s);
    }
    assert!(layout.segments.iter().any(|s| s.kind == SegmentKind::Descent
        && s.from == Point::new(-100.0, 0.0) && s.to == Point::new(-100.0, 125.0)));
    assert!(layout.segments.iter().any(|s| s.kind == SegmentKind::Bus
        && s.from == Point::new(100.0, 125.0) && s.to == Point::new(0.0, 125.0)));

    let spread = n.doc.config().sibling_spacing * n.doc.config().expand_factor / 2.0;
    assert!(close(layout.position(c).unwrap().x, -spread));
    assert!(close(layout.position(d).unwrap().x, 0.0));
    assert!(close(layout.position(e).unwrap().x, spread));
    for child in &n.children {
        assert!(close(layout.position(*child).unwrap().y, 300.0));
    }
    n.doc.check_invariants().unwrap();
}

#[test]
fn test_add_parent_rehomes_first_generation() {
    let mut n = Nuclear::new();
    let c = n.children[0];
    let f = n.doc.add_parent(attrs("Fenwick"), c).unwrap();

    let family_id = n.doc.blood_family(c).unwrap();
    let family = n.doc.family(family_id).unwrap();
    assert_eq!(family.graph.root(), Some(f));
    assert_eq!(family.kind, FamilyKind::Endpoint);
    assert_eq!(family.graph.role(n.a), Some(Role::Interior));
    assert_eq!(family.graph.role(n.b), Some(Role::Interior));
    assert_eq!(family.graph.height(n.a).unwrap(), 1);
    assert_eq!(family.graph.height(n.b).unwrap(), 1);
    assert_eq!(family.graph.height(c).unwrap(), 2);

    assert_eq!(n.doc.blood_family(n.a).unwrap(), family_id);
    assert_eq!(n.doc.blood_family(n.b).unwrap(), family_id);
    assert_eq!(n.doc.registry().families.len(), 1, "old founder families are gone");
    n.doc.check_invariants().unwrap();

    let layout = n.layout();
    assert!(layout.position(f).unwrap().y < layout.position(n.a).unwrap().y);
}

#[test]
fn test_partnership_split_keeps_offspring() {
    let mut n = Nuclear::new();
    let c = n.children[0];
    let g = n.doc.add_partner(attrs("Gwyn"), c).unwrap();
    let pcg = n.doc.partnership_between(c, g).unwrap();
    let grandchildren: Vec<CharacterId> = ["Hale", "Ione"].iter()
        .map(|name| n.doc.add_child(attrs(name), pcg).unwrap())
        .collect();
    let family_id = n.family();
    let b_blood = n.doc.blood_family(n.b).unwrap();

    n.doc.remove_partnership(n.p).unwrap();

    let family = n.doc.family(family_id).unwrap();
    assert_eq!(family.kind, FamilyKind::NullTerminated);
    assert_eq!(family.graph.root(), Some(n.a));
    assert_eq!(family.graph.second_root(), None);
    assert!(!family.contains(n.b));
    assert!(n.doc.family(b_blood).unwrap().contains(n.b), "B keeps its own family");
    assert_ne!(n.a, n.b);

    assert_eq!(family.graph.relations(n.a, Relation::Descendant).unwrap().len(), 3);
    let mut under_c = family.graph.relations(c, Relation::Descendant).unwrap();
    under_c.sort();
    assert_eq!(under_c, grandchildren);
    for gc in &grandchildren {
        assert_eq!(family.graph.height(*gc).unwrap(), 2);
        assert_eq!(n.doc.lookup_character(*gc).unwrap().parents, Some((c, g)));
    }
    assert_eq!(n.doc.lookup_character(c).unwrap().parents, Some((n.a, n.b)));
    n.doc.check_invariants().unwrap();
}

#[test]
fn test_cross_family_bridge() {
    let mut doc = Document::new();
    let a = doc.create_character(attrs("Aldric"), None).unwrap();
    let b = doc.add_partner(attrs("Berra"), a).unwrap();
    let pab = doc.partnership_between(a, b).unwrap();
    let c = doc.add_child(attrs("Cade"), pab).unwrap();
    let m = doc.create_character(attrs("Morwen"), None).unwrap();
    let n = doc.add_partner(attrs("Nils"), m).unwrap();
    doc.partner(c, n).unwrap();
    let f1 = doc.blood_family(a).unwrap();
    let f2 = doc.blood_family(m).unwrap();

    let canvas = doc.arrange_canvas(&DisplayPolicy::default(), &Filters::none()).unwrap();
    let (fc, pc) = canvas.position_of(doc.registry(), c).unwrap();
    let (fn_, pn) = canvas.position_of(doc.registry(), n).unwrap();
    assert_eq!((fc, fn_), (f1, f2));
    assert!(close(pc.y, pn.y), "C and N drawn side by side");
    assert!(canvas.bridges.iter().any(|s| s.from == pc && s.to == pn));

    let placed = canvas.family(f2).unwrap();
    assert!(close(placed.layout.bbox.min.y, pc.y), "F2 moved down to C's generation");
    assert!(close(canvas.family(f1).unwrap().layout.bbox.min.y, 0.0));

    let unbridged = DisplayPolicy { connect_partners: false, ..DisplayPolicy::default() };
    let canvas = doc.arrange_canvas(&unbridged, &Filters::none()).unwrap();
    assert!(canvas.bridges.is_empty());
    assert!(close(canvas.family(f2).unwrap().layout.bbox.min.y, 0.0));
}

#[test]
fn test_chained_bridges_share_one_height() {
    let mut doc = Document::new();
    let a = doc.create_character(attrs("Aldric"), None).unwrap();
    let b = doc.add_partner(attrs("Berra"), a).unwrap();
    let pab = doc.partnership_between(a, b).unwrap();
    let c = doc.add_child(attrs("Cade"), pab).unwrap();
    for name in ["Dara", "Evan", "Fion"] {
        doc.add_child(attrs(name), pab).unwrap();
    }
    let m = doc.create_character(attrs("Morwen"), None).unwrap();
    let o = doc.add_partner(attrs("Osric"), m).unwrap();
    let pmo = doc.partnership_between(m, o).unwrap();
    let y = doc.add_child(attrs("Yara"), pmo).unwrap();
    let w = doc.add_partner(attrs("Wren"), y).unwrap();
    let pyw = doc.partnership_between(y, w).unwrap();
    let z = doc.add_child(attrs("Zed"), pyw).unwrap();
    let n = doc.create_character(attrs("Nils"), None).unwrap();
    doc.partner(c, n).unwrap();
    doc.partner(n, z).unwrap();
    doc.check_invariants().unwrap();

    let canvas = doc.arrange_canvas(&DisplayPolicy::default(), &Filters::none()).unwrap();
    assert_eq!(canvas.bridges.len(), 2);
    for bridge in &canvas.bridges {
        assert!(close(bridge.from.y, bridge.to.y), "bridge drawn across heights: {:?}", bridge);
    }
    let y_of = |id| canvas.position_of(doc.registry(), id).unwrap().1.y;
    assert!(close(y_of(c), y_of(n)));
    assert!(close(y_of(n), y_of(z)));
    assert!(close(canvas.family(doc.blood_family(a).unwrap()).unwrap().layout.bbox.min.y, 0.0));
}

#[test]
fn test_kingdom_filter_hides_subtree() {
    let mut n = Nuclear::new();
    let north = n.doc.add_kingdom("Vhalmere").unwrap();
    let south = n.doc.add_kingdom("Dornreach").unwrap();
    let [c, d] = [n.children[0], n.children[1]];
    n.doc.update_character(c, |a| a.kingdom = Some(north)).unwrap();
    n.doc.update_character(d, |a| a.kingdom = Some(south)).unwrap();

    let g = n.doc.add_partner(in_kingdom("Gwyn", north), c).unwrap();
    let pcg = n.doc.partnership_between(c, g).unwrap();
    let under_c: Vec<CharacterId> = ["Hale", "Ione"].iter()
        .map(|name| n.doc.add_child(attrs(name), pcg).unwrap())
        .collect();
    let h = n.doc.add_partner(in_kingdom("Hesk", south), d).unwrap();
    let pdh = n.doc.partnership_between(d, h).unwrap();
    let under_d: Vec<CharacterId> = ["Jory", "Kell"].iter()
        .map(|name| n.doc.add_child(attrs(name), pdh).unwrap())
        .collect();

    let before = n.layout();
    n.doc.set_filters(Filters::only_kingdoms([south])).unwrap();
    let after = n.layout();

    for gone in [c, g].iter().chain(&under_c) {
        assert!(before.position(*gone).is_some());
        assert!(after.position(*gone).is_none(), "{} should be hidden", gone);
    }
    let d_before = before.position(d).unwrap();
    let d_after = after.position(d).unwrap();
    for kept in [h].iter().chain(&under_d) {
        let (pb, pa) = (before.position(*kept).unwrap(), after.position(*kept).unwrap());
        assert!(close(pb.x - d_before.x, pa.x - d_after.x), "{} moved within D's subtree", kept);
        assert!(close(pb.y, pa.y));
    }
    assert!(after.bbox.width() < before.bbox.width());
    n.doc.check_invariants().unwrap();
}

#[test]
fn test_layout_ignores_insertion_order() {
    let mut first = Nuclear::build(&["Cade", "Dara", "Evan"]);
    let mut second = Nuclear::build(&["Evan", "Cade", "Dara"]);
    let (l1, l2) = (first.layout(), second.layout());

    for id in first.doc.registry().character_ids() {
        let name = first.doc.lookup_character(id).unwrap().name().to_string();
        let twin = second.doc.registry().characters.values().find(|c| c.name() == name).unwrap().id;
        assert_eq!(l1.position(id), l2.position(twin), "{} placed differently", name);
    }
    let segments = |l: &LayoutResult| {
        let mut s: Vec<String> = l.segments.iter().map(|s| format!("{:?}", s)).collect();
        s.sort();
        s
    };
    assert_eq!(segments(&l1), segments(&l2));
    assert_eq!(l1.bbox, l2.bbox);
}

#[test]
fn test_layout_is_repeatable() {
    let mut n = Nuclear::new();
    assert_eq!(n.layout(), n.layout());
}

#[test]
fn test_create_then_remove_restores_structure() {
    let mut n = Nuclear::new();
    let before = structure(&n.doc);
    let x = n.doc.create_character(attrs("Xan"), None).unwrap();
    n.doc.remove_character(x).unwrap();
    assert_eq!(structure(&n.doc), before);

    let y = n.doc.create_character(attrs("Yew"), None).unwrap();
    assert!(y.0 > x.0, "ids are never reused");
}

#[test]
fn test_partner_then_dissolve_restores_structure() {
    let mut n = Nuclear::new();
    let c = n.children[0];
    let stranger = n.doc.create_character(attrs("Ulla"), None).unwrap();
    let before = structure(&n.doc);

    let p = n.doc.partner(c, stranger).unwrap();
    assert_eq!(n.doc.lookup_character(c).unwrap().partnerships, vec![p]);
    n.doc.remove_partnership(p).unwrap();
    assert_eq!(structure(&n.doc), before);
}

#[test]
fn test_removing_root1_promotes_root2() {
    let mut doc = Document::new();
    let a = doc.create_character(attrs("Aldric"), None).unwrap();
    let b = doc.add_partner(attrs("Berra"), a).unwrap();
    let family = doc.blood_family(a).unwrap();
    let policy = DisplayPolicy::default();
    let before = doc.layout(family, Point::default(), &policy).unwrap();

    doc.remove_character(a).unwrap();
    assert_eq!(doc.family(family).unwrap().graph.root(), Some(b));
    let after = doc.layout(family, Point::default(), &policy).unwrap();
    assert!(after.bbox.width() <= before.bbox.width());
    assert!(after.bbox.height() <= before.bbox.height());
    assert_eq!(after.position(b), Some(Point::default()));
    doc.check_invariants().unwrap();
}

#[test]
fn test_invariants_survive_random_edits() {
    let config = GeneratorConfig { generations: 3, ..GeneratorConfig::default() };
    for seed in 0..8 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut doc = generate_document(&config, &mut rng).unwrap();

        for step in 0..40 {
            let ids = doc.registry().character_ids();
            let partnerships = doc.registry().partnership_ids();
            if ids.is_empty() {
                break;
            }
            let target = ids[rng.gen_range(0..ids.len())];
            let before = structure(&doc);
            let outcome = match rng.gen_range(0..5) {
                0 => doc.remove_character(target),
                1 if !partnerships.is_empty() => {
                    doc.remove_partnership(partnerships[rng.gen_range(0..partnerships.len())])
                }
                2 => doc.add_sibling(attrs("Sib"), target).map(|_| ()),
                3 => doc.add_partner(attrs("Mate"), target).map(|_| ()),
                _ => doc.update_character(target, |a| a.name.clear()),
            };
            match outcome {
                Ok(()) => doc.check_invariants()
                    .unwrap_or_else(|e| panic!("seed {} step {}: {}", seed, step, e)),
                Err(_) => assert_eq!(structure(&doc), before, "seed {} step {}: failed edit leaked", seed, step),
            }
        }
    }
}

#[test]
fn test_canvas_covers_every_displayed_family() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut doc = generate_document(&GeneratorConfig::default(), &mut rng).unwrap();
    let exploded = DisplayPolicy { explode: true, ..DisplayPolicy::default() };
    let canvas = doc.arrange_canvas(&exploded, &Filters::none()).unwrap();

    assert_eq!(canvas.families.len(), doc.registry().families.len());
    for placed in &canvas.families {
        assert!(canvas.bbox.min.x <= placed.layout.bbox.min.x + EPS);
        assert!(canvas.bbox.max.x >= placed.layout.bbox.max.x - EPS);
    }
    for id in doc.registry().character_ids() {
        assert!(canvas.position_of(doc.registry(), id).is_some(), "{} missing from canvas", id);
    }
}
