//! Error taxonomy of the genealogy core.

use std::fmt;

use super::{CharacterId, EntityRef, FamilyId, PartnershipId};
use super::layout::LayoutResult;

/// Stable error codes exposed to collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownId,
    InvariantViolation,
    HasDependents,
    DuplicatePartnership,
    BudgetExceeded,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownId => "UNKNOWN-ID",
            ErrorCode::InvariantViolation => "INVARIANT-VIOLATION",
            ErrorCode::HasDependents => "HAS-DEPENDENTS",
            ErrorCode::DuplicatePartnership => "DUPLICATE-PARTNERSHIP",
            ErrorCode::BudgetExceeded => "BUDGET-EXCEEDED",
        }
    }
}

/// Which document rule an operation would break.
#[derive(Clone, Debug, PartialEq)]
pub enum Violation {
    /// A non-root character would be left without an in-family parent.
    Parentless(CharacterId),
    /// The character is a recorded parent of living children.
    RequiredParent { parent: CharacterId, children: Vec<CharacterId> },
    /// `add_parent` on a lineage that already has a parent pair.
    AlreadyHasParents(CharacterId),
    /// A descendant edge without the reciprocal parent edge.
    MissingReciprocalEdge { parent: CharacterId, child: CharacterId },
    /// Partnership records disagree between the two partners.
    PartnershipMismatch(PartnershipId),
    /// A character cannot partner itself.
    SelfPartnership(CharacterId),
    /// The character has no node in the family graph.
    NotInFamily { character: CharacterId, family: FamilyId },
    /// The character already has a node in the family graph.
    AlreadyInFamily { character: CharacterId, family: FamilyId },
    /// The family already has both first-generation slots filled.
    FirstGenerationFull(FamilyId),
    /// The operation needs a root but got an interior node (or the reverse).
    WrongRole { character: CharacterId, family: FamilyId },
    /// Blood family, instance table and graph disagree.
    BloodFamilyMismatch(CharacterId),
    /// Instance table and family graph disagree.
    InstanceMismatch { character: CharacterId, family: FamilyId },
    /// Generation heights are inconsistent with the edges.
    HeightMismatch { character: CharacterId, family: FamilyId },
    /// Character name must not be empty.
    EmptyName(CharacterId),
    /// Death date precedes birth date.
    DiedBeforeBirth(CharacterId),
    /// Both families are the same.
    SameFamily(FamilyId),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Parentless(c) => write!(f, "{} would be left without a parent", c),
            Violation::RequiredParent { parent, children } => {
                write!(f, "{} is a required parent of {} children", parent, children.len())
            }
            Violation::AlreadyHasParents(c) => write!(f, "{} already has parents", c),
            Violation::MissingReciprocalEdge { parent, child } => {
                write!(f, "{} lists {} as descendant without a parent edge back", parent, child)
            }
            Violation::PartnershipMismatch(p) => write!(f, "{} is recorded inconsistently", p),
            Violation::SelfPartnership(c) => write!(f, "{} cannot partner itself", c),
            Violation::NotInFamily { character, family } => write!(f, "{} is not in {}", character, family),
            Violation::AlreadyInFamily { character, family } => write!(f, "{} is already in {}", character, family),
            Violation::FirstGenerationFull(fam) => write!(f, "{} already has two roots", fam),
            Violation::WrongRole { character, family } => {
                write!(f, "{} has the wrong role in {}", character, family)
            }
            Violation::BloodFamilyMismatch(c) => write!(f, "blood family of {} is inconsistent", c),
            Violation::InstanceMismatch { character, family } => {
                write!(f, "instance of {} in {} does not match the graph", character, family)
            }
            Violation::HeightMismatch { character, family } => {
                write!(f, "height of {} in {} is inconsistent", character, family)
            }
            Violation::EmptyName(c) => write!(f, "{} has an empty name", c),
            Violation::DiedBeforeBirth(c) => write!(f, "{} dies before being born", c),
            Violation::SameFamily(fam) => write!(f, "{} cannot be merged into itself", fam),
        }
    }
}

/// Errors returned by every public operation of the core.
#[derive(Clone, Debug, PartialEq)]
pub enum GenealogyError {
    UnknownId(EntityRef),
    InvariantViolation(Violation),
    HasDependents { entity: EntityRef, dependents: Vec<CharacterId> },
    DuplicatePartnership { existing: PartnershipId },
    /// The layout hit its node cap; the partial layout is attached.
    BudgetExceeded { limit: usize, partial: Box<LayoutResult> },
}

impl GenealogyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GenealogyError::UnknownId(_) => ErrorCode::UnknownId,
            GenealogyError::InvariantViolation(_) => ErrorCode::InvariantViolation,
            GenealogyError::HasDependents { .. } => ErrorCode::HasDependents,
            GenealogyError::DuplicatePartnership { .. } => ErrorCode::DuplicatePartnership,
            GenealogyError::BudgetExceeded { .. } => ErrorCode::BudgetExceeded,
        }
    }

    pub fn unknown(id: impl Into<EntityRef>) -> Self {
        GenealogyError::UnknownId(id.into())
    }
}

impl fmt::Display for GenealogyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenealogyError::UnknownId(id) => write!(f, "{}: {}", self.code().as_str(), id),
            GenealogyError::InvariantViolation(v) => write!(f, "{}: {}", self.code().as_str(), v),
            GenealogyError::HasDependents { entity, dependents } => {
                write!(f, "{}: {} has {} dependents", self.code().as_str(), entity, dependents.len())
            }
            GenealogyError::DuplicatePartnership { existing } => {
                write!(f, "{}: already recorded as {}", self.code().as_str(), existing)
            }
            GenealogyError::BudgetExceeded { limit, partial } => write!(
                f,
                "{}: more than {} nodes, {} placed",
                self.code().as_str(),
                limit,
                partial.positions.len()
            ),
        }
    }
}

impl std::error::Error for GenealogyError {}

impl From<Violation> for GenealogyError {
    fn from(v: Violation) -> Self {
        GenealogyError::InvariantViolation(v)
    }
}

pub type Result<T> = std::result::Result<T, GenealogyError>;
