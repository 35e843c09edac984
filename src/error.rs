use std::path::PathBuf;

/// Everything that can stop the pipeline. Per-record parse problems are not
/// errors; they are collected as [`crate::normalize::ParseWarning`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("schema error: missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("source has no header row at line {line}")]
    MissingHeader { line: usize },

    #[error("unsupported source format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("workbook has no sheets")]
    EmptyWorkbook,

    #[error("no input file configured (use --input or [source].path)")]
    NoInput,

    #[error("unknown view '{0}'")]
    UnknownView(String),

    #[error("invalid grouping: {0}")]
    InvalidGrouping(String),

    #[error("invalid quarter '{0}' (expected e.g. 2023 Q1)")]
    InvalidQuarter(String),

    #[error("invalid asset type '{0}'")]
    InvalidAssetType(String),

    #[error("dataset already loaded")]
    AlreadyLoaded,

    #[error("no dataset loaded")]
    NotLoaded,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Workbook(#[from] calamine::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
