//! Kingdoms characters can belong to.

use serde::{Serialize, Deserialize};
use crate::genealogy::KingdomId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kingdom {
    pub id: KingdomId,
    pub name: String,
}

impl Kingdom {
    pub fn new(id: KingdomId, name: String) -> Self {
        Self { id, name }
    }
}
