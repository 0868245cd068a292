//! Combines the per-file predicates of a [`QueryConfig`] into one decision.

use super::extract::ContentExtractor;
use super::query::Query;
use super::{QueryConfig, SearchTarget};
use crate::utils::file_types::extension_of;
use chrono::{DateTime, Local};
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// The stat-level facts the filter needs about one file.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl FileMeta {
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> io::Result<Self> {
        let modified = metadata.modified()?;
        Ok(Self {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            modified: DateTime::<Local>::from(modified),
        })
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        Self::from_metadata(path, &fs::metadata(path)?)
    }
}

/// Why a file was turned away. Checks run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unreadable,
    Size,
    Date,
    Extension,
    Keyword,
}

pub struct FileFilter<'a> {
    config: &'a QueryConfig,
    query: Query,
    extractor: &'a ContentExtractor,
}

impl<'a> FileFilter<'a> {
    pub fn new(config: &'a QueryConfig, extractor: &'a ContentExtractor) -> Self {
        Self {
            config,
            query: Query::parse(&config.expression),
            extractor,
        }
    }

    pub fn accept(&self, meta: &FileMeta) -> bool {
        self.evaluate(meta).is_ok()
    }

    /// Runs the checks cheapest first and stops at the first rejection.
    pub fn evaluate(&self, meta: &FileMeta) -> Result<(), Rejection> {
        if File::open(&meta.path).is_err() {
            return Err(Rejection::Unreadable);
        }

        if !self.config.size.contains(meta.size) {
            return Err(Rejection::Size);
        }

        if self.config.modified.is_bounded()
            && !self.config.modified.contains(meta.modified.date_naive())
        {
            return Err(Rejection::Date);
        }

        let extension = extension_of(&meta.path).unwrap_or_default();
        if !self.config.file_types.allows(&extension) {
            return Err(Rejection::Extension);
        }

        if self.keyword_matches(meta) {
            Ok(())
        } else {
            Err(Rejection::Keyword)
        }
    }

    fn keyword_matches(&self, meta: &FileMeta) -> bool {
        if self.query.is_empty() {
            return true;
        }
        match self.config.target {
            SearchTarget::NameOnly => self.query.matches(&meta.name),
            SearchTarget::ContentOnly => self.content_matches(&meta.path),
            // Content is only read when the name did not already match.
            SearchTarget::Both => {
                self.query.matches(&meta.name) || self.content_matches(&meta.path)
            }
        }
    }

    fn content_matches(&self, path: &Path) -> bool {
        self.extractor
            .extract(path)
            .is_some_and(|text| self.query.matches(&text))
    }
}
