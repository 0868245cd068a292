pub mod settings;

use crate::core::extract::{ContentExtractor, DEFAULT_CONTENT_BUDGET, DEFAULT_ENCODINGS};
use crate::core::{
    CoreError, DateRange, FileTypeFilter, QueryConfig, SearchTarget, SizeRange,
};
use crate::utils::file_types::{parse_extension_list, FileTypeClass};
use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePreset {
    #[default]
    Any,
    UnderOneMb,
    OneToTenMb,
    OverTenMb,
}

impl SizePreset {
    pub fn range(&self) -> SizeRange {
        match self {
            SizePreset::Any => SizeRange { min: 0, max: None },
            SizePreset::UnderOneMb => SizeRange { min: 0, max: Some(MIB) },
            SizePreset::OneToTenMb => SizeRange { min: MIB, max: Some(10 * MIB) },
            SizePreset::OverTenMb => SizeRange { min: 10 * MIB, max: None },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DatePreset {
    #[default]
    Any,
    Today,
    LastSevenDays,
    LastThirtyDays,
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl DatePreset {
    /// Resolves the preset relative to `today`.
    pub fn range(&self, today: NaiveDate) -> DateRange {
        match *self {
            DatePreset::Any => DateRange::default(),
            DatePreset::Today => DateRange { start: Some(today), end: Some(today) },
            DatePreset::LastSevenDays => DateRange {
                start: Some(today - Duration::days(7)),
                end: Some(today),
            },
            DatePreset::LastThirtyDays => DateRange {
                start: Some(today - Duration::days(30)),
                end: Some(today),
            },
            DatePreset::Custom { start, end } => DateRange { start, end },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub search_folders: Vec<PathBuf>,
    pub include_subfolders: bool,
    pub search_mode: SearchTarget,
    pub file_type_class: FileTypeClass,
    /// `;`-separated extensions used when `file_type_class` is `Custom`.
    pub custom_extensions: String,
    pub size_preset: SizePreset,
    pub date_preset: DatePreset,
    pub last_target_folder: Option<PathBuf>,
    pub content_budget: usize,
    pub text_encodings: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }

    pub fn file_type_filter(&self) -> FileTypeFilter {
        match self.file_type_class {
            FileTypeClass::Custom => {
                FileTypeFilter::from_extensions(parse_extension_list(&self.custom_extensions))
            }
            class => FileTypeFilter::from_extensions(class.extensions()),
        }
    }

    pub fn content_extractor(&self) -> ContentExtractor {
        ContentExtractor::new(self.content_budget).with_encodings(&self.text_encodings)
    }

    /// Builds the validated per-scan query for `expression` from the presets.
    pub fn query_config(&self, expression: &str) -> Result<QueryConfig, CoreError> {
        let config = QueryConfig {
            expression: expression.to_string(),
            target: self.search_mode,
            file_types: self.file_type_filter(),
            size: self.size_preset.range(),
            modified: self.date_preset.range(Local::now().date_naive()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_folders: Vec::new(),
            include_subfolders: true,
            search_mode: SearchTarget::NameOnly,
            file_type_class: FileTypeClass::All,
            custom_extensions: String::new(),
            size_preset: SizePreset::Any,
            date_preset: DatePreset::Any,
            last_target_folder: dirs::desktop_dir(),
            content_budget: DEFAULT_CONTENT_BUDGET,
            text_encodings: DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
