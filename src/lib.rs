//! Project-spreadsheet analytics: load a real-estate project sheet once,
//! clean it, and answer a fixed catalog of grouped/pivoted views over it.
//!
//! Loader → Normalizer → Filter → Aggregate, wired together by
//! [`dataset::Dataset::query`].
pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod types;
pub mod util;
pub mod views;

pub use aggregate::{aggregate, Axis, Dimension, KeyValue, LongTable, Measure, PivotTable, Reducer};
pub use config::Config;
pub use dataset::Dataset;
pub use error::{PipelineError, Result};
pub use filter::{filter, Predicate, QuarterRange};
pub use normalize::{LoadReport, Normalizer, ParseWarning, WarningKind};
pub use types::{AssetType, Field, Record, YearQuarter};
pub use views::{ViewBody, ViewFilters, ViewOutput};
