//! Sidecar File
//!
//! Raw access to a project's `.codeaskdata` document. Every edit is a
//! read-modify-write of the whole JSON object so keys this crate does not
//! know about survive untouched. Writes land in a temp file in the same
//! directory and are renamed into place.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::sidecar::{empty_sidecar_document, SidecarSection};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::sidecar_path;

/// Handle to one project's sidecar document
#[derive(Debug, Clone)]
pub struct SidecarFile {
    path: PathBuf,
}

impl SidecarFile {
    pub fn for_project(project_root: &Path) -> Self {
        Self {
            path: sidecar_path(project_root),
        }
    }

    /// Read the document. A missing file reads as an empty document.
    pub fn read(&self) -> AppResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(empty_sidecar_document());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AppError::persistence(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            AppError::persistence(format!("malformed {}: {}", self.path.display(), e))
        })?;

        match value {
            Value::Object(doc) => Ok(doc),
            _ => Err(AppError::persistence(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
        }
    }

    /// Read the document, creating it on disk if absent.
    ///
    /// Known sections missing from an existing document are added; nothing
    /// else is changed. A known section that is not an object is an error
    /// and the file is left as it is.
    pub fn load_or_create(&self) -> AppResult<Map<String, Value>> {
        let existed = self.path.exists();
        let mut doc = self.read()?;

        let mut changed = !existed;
        for section in SidecarSection::ALL {
            if !self.check_section(&doc, section)? {
                doc.insert(section.key().to_string(), Value::Object(Map::new()));
                changed = true;
            }
        }

        if changed {
            self.write(&doc)?;
        }
        Ok(doc)
    }

    /// Write the whole document atomically
    pub fn write(&self, doc: &Map<String, Value>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(doc)?;
        let tmp = self.temp_path();

        let result = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::persistence(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(path = %self.path.display(), "sidecar written");
        Ok(())
    }

    /// Entries of one section, or an empty map if the section is absent
    pub fn section(&self, section: SidecarSection) -> AppResult<Map<String, Value>> {
        let doc = self.read()?;
        self.check_section(&doc, section)?;
        Ok(match doc.get(section.key()) {
            Some(Value::Object(entries)) => entries.clone(),
            _ => Map::new(),
        })
    }

    /// Replace `section[key]`, leaving every other key as it was on disk
    pub fn upsert_entry(&self, section: SidecarSection, key: &str, value: Value) -> AppResult<()> {
        let mut doc = self.read()?;
        self.section_mut(&mut doc, section)?.insert(key.to_string(), value);
        self.write(&doc)
    }

    /// Remove `section[key]`. Returns whether an entry was removed.
    pub fn remove_entry(&self, section: SidecarSection, key: &str) -> AppResult<bool> {
        let mut doc = self.read()?;
        let removed = self.section_mut(&mut doc, section)?.remove(key).is_some();
        if removed {
            self.write(&doc)?;
        }
        Ok(removed)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.path.with_file_name(format!("{}.tmp", name))
    }

    /// Whether `section` is present. Present but not an object is an error.
    fn check_section(&self, doc: &Map<String, Value>, section: SidecarSection) -> AppResult<bool> {
        match doc.get(section.key()) {
            None => Ok(false),
            Some(Value::Object(_)) => Ok(true),
            Some(_) => Err(AppError::persistence(format!(
                "{}: section {} is not a JSON object",
                self.path.display(),
                section
            ))),
        }
    }

    fn section_mut<'a>(
        &self,
        doc: &'a mut Map<String, Value>,
        section: SidecarSection,
    ) -> AppResult<&'a mut Map<String, Value>> {
        let key = section.key();
        if !self.check_section(doc, section)? {
            doc.insert(key.to_string(), Value::Object(Map::new()));
        }
        doc.get_mut(key)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| AppError::internal(format!("sidecar section {} unavailable", key)))
    }
}
