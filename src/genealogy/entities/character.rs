//! Characters of the fiction: canonical records shared by every instance.

use serde::{Serialize, Deserialize};
use crate::genealogy::{CharacterId, FamilyId, KingdomId, PartnershipId};
use crate::genealogy::calendar::Date;

/// Sex label of a character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unspecified,
}

/// The editable, non-structural fields of a character.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterAttributes {
    pub name: String,
    pub sex: Sex,
    pub race: String,
    pub ruler: bool,
    pub birth: Option<Date>,
    pub death: Option<Date>,
    pub kingdom: Option<KingdomId>,

    // Presentation only; the layout never reads these.
    pub portrait: Option<String>,
    pub crown: Option<String>,
}

impl CharacterAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = sex;
        self
    }

    pub fn with_race(mut self, race: impl Into<String>) -> Self {
        self.race = race.into();
        self
    }

    pub fn with_birth(mut self, birth: Date) -> Self {
        self.birth = Some(birth);
        self
    }

    pub fn with_death(mut self, death: Date) -> Self {
        self.death = Some(death);
        self
    }

    pub fn with_kingdom(mut self, kingdom: KingdomId) -> Self {
        self.kingdom = Some(kingdom);
        self
    }

    pub fn ruler(mut self) -> Self {
        self.ruler = true;
        self
    }
}

/// A logical person in the fiction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub attributes: CharacterAttributes,

    // Structure
    pub blood_family: FamilyId,
    /// Both parents or none. `None` means the character heads its lineage.
    pub parents: Option<(CharacterId, CharacterId)>,
    pub partnerships: Vec<PartnershipId>,
}

impl Character {
    pub fn new(id: CharacterId, attributes: CharacterAttributes, blood_family: FamilyId) -> Self {
        Self {
            id,
            attributes,
            blood_family,
            parents: None,
            partnerships: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    pub fn is_alive(&self) -> bool {
        self.attributes.death.is_none()
    }

    pub fn has_parent(&self, id: CharacterId) -> bool {
        matches!(self.parents, Some((a, b)) if a == id || b == id)
    }

    /// Record a partnership once.
    pub fn add_partnership(&mut self, partnership: PartnershipId) {
        if !self.partnerships.contains(&partnership) {
            self.partnerships.push(partnership);
        }
    }

    pub fn remove_partnership(&mut self, partnership: PartnershipId) {
        self.partnerships.retain(|p| *p != partnership);
    }

    /// Ordering key used to derive sibling positions: birth date, then
    /// name, then id. Undated characters sort after dated ones.
    pub fn birth_order_key(&self) -> BirthOrderKey {
        BirthOrderKey {
            undated: self.attributes.birth.is_none(),
            birth: self.attributes.birth,
            name: self.attributes.name.clone(),
            id: self.id,
        }
    }
}

/// Canonical birth order of siblings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BirthOrderKey {
    undated: bool,
    birth: Option<Date>,
    name: String,
    id: CharacterId,
}

impl BirthOrderKey {
    /// Key for a character known only by id.
    pub fn from_id(id: CharacterId) -> Self {
        Self { undated: true, birth: None, name: String::new(), id }
    }
}
