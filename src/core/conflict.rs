//! Name-collision handling for copying a match list into one target folder.

use super::error::CoreError;
use super::operations::ensure_writable_dir;
use super::MatchRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Overwrite,
    Skip,
    /// Copy under the contained file name instead.
    Rename(String),
}

#[derive(Debug, Clone)]
pub struct ConflictEntry {
    pub record: MatchRecord,
    /// The name is taken in the target folder or by an earlier record of the batch.
    pub collides: bool,
    /// `None` until the user decides; treated as overwrite when the batch runs.
    pub disposition: Option<Disposition>,
}

/// One file to copy and the name it gets in the target folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJob {
    pub source: PathBuf,
    pub target_name: String,
}

/// Result of [`ConflictResolver::finish`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedCopy {
    pub jobs: Vec<CopyJob>,
    pub skipped: Vec<MatchRecord>,
}

pub struct ConflictResolver {
    target_dir: PathBuf,
    entries: Vec<ConflictEntry>,
    /// Every name some record of this batch will occupy in the target folder.
    reserved: HashSet<String>,
}

impl ConflictResolver {
    /// Checks the target folder and flags every record whose name is taken.
    pub fn new(target_dir: &Path, records: &[MatchRecord]) -> Result<Self, CoreError> {
        if records.is_empty() {
            return Err(CoreError::EmptySelection("copy"));
        }
        ensure_writable_dir(target_dir)?;

        let exists: Vec<bool> = records
            .par_iter()
            .map(|record| target_dir.join(&record.name).exists())
            .collect();

        let mut reserved = HashSet::new();
        let entries = records
            .iter()
            .zip(exists)
            .map(|(record, exists)| {
                let duplicate = !reserved.insert(record.name.clone());
                ConflictEntry {
                    record: record.clone(),
                    collides: exists || duplicate,
                    disposition: None,
                }
            })
            .collect();

        Ok(Self {
            target_dir: target_dir.to_path_buf(),
            entries,
            reserved,
        })
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.iter().any(|entry| entry.collides)
    }

    pub fn conflict_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.collides).count()
    }

    /// Returns `false` if `index` is out of range.
    pub fn overwrite(&mut self, index: usize) -> bool {
        self.set(index, Disposition::Overwrite)
    }

    pub fn skip(&mut self, index: usize) -> bool {
        self.set(index, Disposition::Skip)
    }

    /// Gives the record a fresh `base_N.ext` name, or keeps the one it
    /// already has.
    pub fn rename(&mut self, index: usize) -> Option<String> {
        let entry = self.entries.get(index)?;
        if let Some(Disposition::Rename(name)) = &entry.disposition {
            return Some(name.clone());
        }
        let original = entry.record.name.clone();
        let name = self.unique_name(&original);
        self.entries[index].disposition = Some(Disposition::Rename(name.clone()));
        Some(name)
    }

    pub fn overwrite_all(&mut self) {
        for entry in &mut self.entries {
            entry.disposition = Some(Disposition::Overwrite);
        }
    }

    pub fn auto_rename_all(&mut self) {
        for index in 0..self.entries.len() {
            if self.entries[index].collides {
                self.rename(index);
            }
        }
    }

    /// Turns the decisions into copy jobs. Undecided records keep their own
    /// name and overwrite.
    pub fn finish(self) -> ResolvedCopy {
        let mut resolved = ResolvedCopy::default();
        for entry in self.entries {
            let target_name = match entry.disposition {
                Some(Disposition::Skip) => {
                    resolved.skipped.push(entry.record);
                    continue;
                }
                Some(Disposition::Rename(name)) => name,
                Some(Disposition::Overwrite) | None => entry.record.name.clone(),
            };
            resolved.jobs.push(CopyJob {
                source: entry.record.path,
                target_name,
            });
        }
        resolved
    }

    fn set(&mut self, index: usize, disposition: Disposition) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.disposition = Some(disposition);
                true
            }
            None => false,
        }
    }

    /// Tries `base_1.ext`, `base_2.ext`, ... against both the target folder
    /// and the names already claimed by this batch.
    fn unique_name(&mut self, name: &str) -> String {
        let path = Path::new(name);
        let base = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1;
        loop {
            let candidate = format!("{base}_{counter}{extension}");
            if !self.reserved.contains(&candidate) && !self.target_dir.join(&candidate).exists() {
                self.reserved.insert(candidate.clone());
                return candidate;
            }
            counter += 1;
        }
    }
}
