use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use file_gather::config::{AppConfig, DatePreset, SizePreset};
use file_gather::core::{CoreError, QueryConfig, SearchTarget};
use file_gather::utils::file_types::FileTypeClass;
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "file-gather", version)]
#[command(about = "Find files by name, content, type, size and date, then copy or delete them in bulk", long_about = None)]
pub struct Cli {
    /// Folders to search
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Descend into subfolders
    #[arg(short, long)]
    pub recursive: bool,

    /// Keyword expression: "exact phrase", +required, -excluded, a|b
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    pub keyword: String,

    /// What the keyword is matched against
    #[arg(short, long, value_enum, default_value_t = ModeArg::Name)]
    pub mode: ModeArg,

    /// File type preset
    #[arg(short = 't', long = "types", value_enum, default_value_t = TypeArg::All)]
    pub types: TypeArg,

    /// Custom extensions separated by ';' (e.g. ".py;.rs"). Implies --types custom
    #[arg(long)]
    pub ext: Option<String>,

    /// Size preset
    #[arg(long, value_enum, default_value_t = SizeArg::Any)]
    pub size: SizeArg,

    /// Minimum size in bytes, overrides --size
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Maximum size in bytes, overrides --size
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Modification date preset
    #[arg(long, value_enum, default_value_t = DateArg::Any)]
    pub date: DateArg,

    /// Earliest modification date (YYYY-MM-DD), overrides --date
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Latest modification date (YYYY-MM-DD), overrides --date
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Copy every match into this folder
    #[arg(long)]
    pub copy_to: Option<PathBuf>,

    /// What to do when a name already exists in the target folder
    #[arg(long, value_enum, default_value_t = ConflictArg::Rename)]
    pub on_conflict: ConflictArg,

    /// Delete every match after the scan (and after copying, if requested)
    #[arg(long)]
    pub delete: bool,

    /// Do not ask before deleting
    #[arg(short, long)]
    pub yes: bool,

    /// Print the operation log when done
    #[arg(long)]
    pub show_log: bool,

    /// Write the operation log to this JSON file when done
    #[arg(long)]
    pub log_json: Option<PathBuf>,

    /// Use this config file instead of the platform default
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Name,
    Content,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    All,
    Documents,
    Images,
    Video,
    Audio,
    Executables,
    Archives,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SizeArg {
    Any,
    /// Up to 1 MB
    Small,
    /// 1 MB to 10 MB
    Medium,
    /// 10 MB and more
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DateArg {
    Any,
    Today,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictArg {
    Overwrite,
    Skip,
    Rename,
}

impl From<ModeArg> for SearchTarget {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Name => SearchTarget::NameOnly,
            ModeArg::Content => SearchTarget::ContentOnly,
            ModeArg::Both => SearchTarget::Both,
        }
    }
}

impl From<TypeArg> for FileTypeClass {
    fn from(types: TypeArg) -> Self {
        match types {
            TypeArg::All => FileTypeClass::All,
            TypeArg::Documents => FileTypeClass::Documents,
            TypeArg::Images => FileTypeClass::Images,
            TypeArg::Video => FileTypeClass::Video,
            TypeArg::Audio => FileTypeClass::Audio,
            TypeArg::Executables => FileTypeClass::Executables,
            TypeArg::Archives => FileTypeClass::Archives,
            TypeArg::Custom => FileTypeClass::Custom,
        }
    }
}

impl From<SizeArg> for SizePreset {
    fn from(size: SizeArg) -> Self {
        match size {
            SizeArg::Any => SizePreset::Any,
            SizeArg::Small => SizePreset::UnderOneMb,
            SizeArg::Medium => SizePreset::OneToTenMb,
            SizeArg::Large => SizePreset::OverTenMb,
        }
    }
}

impl Cli {
    /// Copies the search settings given on the command line into `config`.
    pub fn apply_to(&self, config: &mut AppConfig) {
        config.include_subfolders = self.recursive;
        config.search_mode = self.mode.into();
        config.file_type_class = self.types.into();
        if let Some(ext) = &self.ext {
            config.file_type_class = FileTypeClass::Custom;
            config.custom_extensions = ext.clone();
        }
        config.size_preset = self.size.into();
        config.date_preset = if self.since.is_some() || self.until.is_some() {
            DatePreset::Custom {
                start: self.since,
                end: self.until,
            }
        } else {
            match self.date {
                DateArg::Any => DatePreset::Any,
                DateArg::Today => DatePreset::Today,
                DateArg::Week => DatePreset::LastSevenDays,
                DateArg::Month => DatePreset::LastThirtyDays,
            }
        };
    }

    /// Builds the scan query, letting explicit byte bounds override the size preset.
    pub fn query_config(&self, config: &AppConfig) -> Result<QueryConfig, CoreError> {
        let mut query = config.query_config(&self.keyword)?;
        if let Some(min) = self.min_size {
            query.size.min = min;
        }
        if let Some(max) = self.max_size {
            query.size.max = Some(max);
        }
        query.validate()?;
        Ok(query)
    }
}

/// The stored config to write back after a run, if anything worth keeping
/// changed. Search flags are per run; only the target folder is remembered.
pub fn remembered_config(stored: &AppConfig, session: &AppConfig) -> Option<AppConfig> {
    if session.last_target_folder == stored.last_target_folder {
        return None;
    }
    Some(AppConfig {
        last_target_folder: session.last_target_folder.clone(),
        ..stored.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_feed_the_config() {
        let cli = Cli::parse_from([
            "file-gather",
            "/data",
            "-r",
            "--mode",
            "both",
            "--ext",
            ".py;.rs",
            "--since",
            "2024-01-01",
        ]);
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert!(config.include_subfolders);
        assert_eq!(config.search_mode, SearchTarget::Both);
        assert_eq!(config.file_type_class, FileTypeClass::Custom);
        assert!(config.file_type_filter().allows(".rs"));
        assert_eq!(
            config.date_preset,
            DatePreset::Custom {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: None
            }
        );
    }

    #[test]
    fn test_explicit_sizes_are_validated() {
        let cli = Cli::parse_from(["file-gather", "/data", "--min-size", "10", "--max-size", "5"]);
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);
        assert!(matches!(cli.query_config(&config), Err(CoreError::InvalidQuery(_))));
    }

    #[test]
    fn test_keyword_may_start_with_minus() {
        let cli = Cli::parse_from(["file-gather", "/data", "--keyword", "-draft"]);
        assert_eq!(cli.keyword, "-draft");
    }

    #[test]
    fn test_only_the_target_folder_is_remembered() {
        let stored = AppConfig {
            last_target_folder: None,
            ..Default::default()
        };
        let cli = Cli::parse_from([
            "file-gather",
            "/data",
            "-r",
            "--mode",
            "content",
            "--copy-to",
            "/out",
        ]);
        let mut session = stored.clone();
        cli.apply_to(&mut session);

        assert_eq!(remembered_config(&stored, &session), None);

        session.last_target_folder = Some(PathBuf::from("/out"));
        let saved = remembered_config(&stored, &session).unwrap();
        assert_eq!(saved.last_target_folder, Some(PathBuf::from("/out")));
        assert_eq!(saved.include_subfolders, stored.include_subfolders);
        assert_eq!(saved.search_mode, stored.search_mode);
    }
}
