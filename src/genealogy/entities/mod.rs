//! Record types: characters, families, partnerships and kingdoms.

pub mod character;
pub mod family;
pub mod kingdom;
pub mod partnership;

pub use character::{BirthOrderKey, Character, CharacterAttributes, Sex};
pub use family::{Family, FamilyKind};
pub use kingdom::Kingdom;
pub use partnership::Partnership;
