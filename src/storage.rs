//! The storage module loads and saves the listings document, a single JSON
//! array rewritten as a whole on every run.

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::listing::Listing;

/// Storage provides access to the listings document.
pub struct Storage {
    /// Location of the listings document
    path: PathBuf,
    /// Indicates whether the document did not exist when storage was opened
    pub new: bool,
}

impl Storage {
    /// Creates a new Storage instance for the document at the specified path.
    /// The document itself is created on the first [`Storage::save`].
    pub fn new(listings_path: impl AsRef<Path>) -> Self {
        let path = listings_path.as_ref().to_path_buf();
        let new = !path.exists();

        Self { path, new }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the listings document as raw JSON values, for schema checks.
    /// A missing document is an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or is not a JSON array
    pub fn load_documents(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            debug!("No listings at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read listings: {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Listings at {} are not a JSON array", self.path.display()))
    }

    /// Reads the listings document. A missing document is an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or a listing lacks
    /// one of its identity fields (id, company, title, url)
    pub fn load(&self) -> Result<Vec<Listing>> {
        Ok(self.load_snapshot()?.listings)
    }

    /// Reads the listings for an update. Saving the snapshot later rewrites
    /// only what changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or a listing lacks
    /// one of its identity fields (id, company, title, url)
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let documents = self.load_documents()?;
        let listings = documents
            .iter()
            .map(|document| {
                serde_json::from_value(document.clone())
                    .with_context(|| format!("Malformed listing in {}", self.path.display()))
            })
            .collect::<Result<Vec<Listing>>>()?;

        Ok(Snapshot {
            documents,
            listings,
        })
    }

    /// Writes the snapshot back. Listings that were not modified keep their
    /// stored document as is, including fields the record does not model
    /// and required fields it lacks; modified ones get only their changed
    /// fields patched.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let documents = snapshot
            .listings
            .iter()
            .enumerate()
            .map(|(index, listing)| match snapshot.documents.get(index) {
                Some(stored) => patch_document(stored, listing),
                None => Ok(serde_json::to_value(listing)?),
            })
            .collect::<Result<Vec<Value>>>()?;

        self.write(&documents)
    }

    /// Replaces the listings document with `listings`, pretty-printed.
    ///
    /// The collection is written to a sibling temporary file first and then
    /// renamed over the document, so readers never see a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails
    pub fn save(&self, listings: &[Listing]) -> Result<()> {
        let documents = listings
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<Value>>>()?;

        self.write(&documents)
    }

    fn write(&self, documents: &[Value]) -> Result<()> {
        let mut content = serde_json::to_string_pretty(documents)?;
        content.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, content)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved {} listings to {}", documents.len(), self.path.display());
        Ok(())
    }
}

/// Listings read for an update, with the documents they were read from.
///
/// Handlers only modify listings in place or append new ones, so the
/// listing at an index always stems from the document at that index.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    documents: Vec<Value>,
    pub listings: Vec<Listing>,
}

/// Applies the fields of `listing` that differ from what `stored` read as.
fn patch_document(stored: &Value, listing: &Listing) -> Result<Value> {
    let Some(stored_fields) = stored.as_object() else {
        return Ok(serde_json::to_value(listing)?);
    };

    let read_as: Listing = serde_json::from_value(stored.clone())?;
    let before = serde_json::to_value(read_as)?;
    let after = serde_json::to_value(listing)?;
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return Ok(stored.clone());
    };

    let mut patched = stored_fields.clone();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            patched.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys().filter(|key| !after.contains_key(*key)) {
        patched.shift_remove(key);
    }

    Ok(Value::Object(patched))
}
