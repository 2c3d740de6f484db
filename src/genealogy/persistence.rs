//! Document save/load.
//!
//! The stored form is the record tables plus settings and id generator
//! state. Instances and coordinates are derived and never stored; they are
//! rebuilt from the family graphs on load.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::info;

use super::IdGenerators;
use super::arrange::Filters;
use super::config::LayoutConfig;
use super::document::Document;
use super::entities::{Character, Family, Kingdom, Partnership};
use super::error::GenealogyError;
use super::registry::Registry;

const FORMAT_VERSION: u32 = 1;

/// Serialized form of a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    /// Format version for forward compatibility
    pub version: u32,
    pub characters: Vec<Character>,
    pub families: Vec<Family>,
    pub partnerships: Vec<Partnership>,
    pub kingdoms: Vec<Kingdom>,
    /// Saved so ids are never reissued after reload
    pub id_generators: IdGenerators,
    pub config: LayoutConfig,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, String>,
}

impl DocumentFile {
    /// Snapshot a document. Records are listed in id order so equal
    /// documents serialize identically.
    pub fn from_document(doc: &Document) -> Self {
        let registry = doc.registry();
        let mut characters: Vec<Character> = registry.characters.values().cloned().collect();
        characters.sort_by_key(|c| c.id);
        let mut families: Vec<Family> = registry.families.values().cloned().collect();
        families.sort_by_key(|f| f.id);
        let mut partnerships: Vec<Partnership> = registry.partnerships.values().cloned().collect();
        partnerships.sort_by_key(|p| p.id);
        let mut kingdoms: Vec<Kingdom> = registry.kingdoms.values().cloned().collect();
        kingdoms.sort_by_key(|k| k.id);

        Self {
            version: FORMAT_VERSION,
            characters,
            families,
            partnerships,
            kingdoms,
            id_generators: registry.id_generators.clone(),
            config: doc.config().clone(),
            filters: doc.filters().clone(),
            metadata: doc.metadata.clone(),
        }
    }

    /// Rebuild a document and check it is consistent.
    pub fn into_document(self) -> Result<Document, StoreError> {
        if self.version > FORMAT_VERSION {
            return Err(StoreError::Version { found: self.version, supported: FORMAT_VERSION });
        }
        let mut registry = Registry::new();
        registry.characters = self.characters.into_iter().map(|c| (c.id, c)).collect();
        registry.families = self.families.into_iter().map(|f| (f.id, f)).collect();
        registry.partnerships = self.partnerships.into_iter().map(|p| (p.id, p)).collect();
        registry.kingdoms = self.kingdoms.into_iter().map(|k| (k.id, k)).collect();
        registry.id_generators = self.id_generators;

        let mut doc = Document::from_parts(registry, self.config, self.filters)?;
        doc.metadata = self.metadata;
        doc.check_invariants()?;
        Ok(doc)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serialization(String),
    Deserialization(String),
    /// Stored by a newer version of the format.
    Version { found: u32, supported: u32 },
    /// Read fine but the records break a document rule.
    Invalid(GenealogyError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization failed: {}", e),
            StoreError::Deserialization(e) => write!(f, "Deserialization failed: {}", e),
            StoreError::Version { found, supported } => write!(
                f,
                "Document format version {} is newer than supported version {}",
                found, supported
            ),
            StoreError::Invalid(e) => write!(f, "Inconsistent document: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<GenealogyError> for StoreError {
    fn from(e: GenealogyError) -> Self {
        StoreError::Invalid(e)
    }
}

// =============================================================================
// STORES
// =============================================================================

/// Where a document's tables live.
pub trait DocumentStore {
    fn read(&self) -> Result<DocumentFile, StoreError>;
    fn write(&mut self, file: &DocumentFile) -> Result<(), StoreError>;
}

/// Pretty-printed JSON on disk.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn read(&self) -> Result<DocumentFile, StoreError> {
        let text = fs::read_to_string(&self.path)?;
        serde_json::from_str(&text).map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    fn write(&mut self, file: &DocumentFile) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(file).map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Keeps the serialized JSON in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    contents: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self) -> Result<DocumentFile, StoreError> {
        let text = self.contents.as_deref()
            .ok_or_else(|| StoreError::Io(io::Error::new(io::ErrorKind::NotFound, "nothing stored")))?;
        serde_json::from_str(text).map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    fn write(&mut self, file: &DocumentFile) -> Result<(), StoreError> {
        let text = serde_json::to_string(file).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.contents = Some(text);
        Ok(())
    }
}

/// Save a document to a store.
pub fn save_document(doc: &Document, store: &mut impl DocumentStore) -> Result<(), StoreError> {
    let file = DocumentFile::from_document(doc);
    store.write(&file)?;
    info!(characters = file.characters.len(), families = file.families.len(), "document saved");
    Ok(())
}

/// Load a document from a store. Instances are rebuilt and id generators
/// resume after the highest id ever issued.
pub fn load_document(store: &impl DocumentStore) -> Result<Document, StoreError> {
    let file = store.read()?;
    let doc = file.into_document()?;
    info!(characters = doc.registry().characters.len(), families = doc.registry().families.len(), "document loaded");
    Ok(doc)
}
