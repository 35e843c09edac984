//! The loaded, normalized dataset and its process-wide snapshot.
//!
//! The snapshot is installed once and only read afterwards, so queries from
//! any thread share it without locking.
use crate::config::{Config, PipelineSettings};
use crate::error::{PipelineError, Result};
use crate::filter::{filter, Predicate};
use crate::loader;
use crate::normalize::{LoadReport, Normalizer};
use crate::types::{RawRecord, Record, YearQuarter};
use crate::views::{self, ViewFilters, ViewOutput};
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;

static DATASET: OnceCell<Dataset> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    report: LoadReport,
    settings: PipelineSettings,
}

impl Dataset {
    /// Load the configured source and normalize it.
    pub fn load(config: &Config) -> Result<Dataset> {
        let path = config.source.path.as_deref().ok_or(PipelineError::NoInput)?;
        let raw = loader::load_path(path, &config.source)?;
        Ok(Dataset::from_raw(&raw, config.pipeline.clone()))
    }

    pub fn from_raw(raw: &[RawRecord], settings: PipelineSettings) -> Dataset {
        let normalizer = Normalizer::with_synonyms(&settings.asset_synonyms);
        let (records, report) = normalizer.normalize(raw);
        Dataset {
            records,
            report,
            settings,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Records past the launch cutoff; the base every view starts from.
    pub fn in_scope(&self) -> Vec<&Record> {
        let predicates: Vec<Predicate> = self
            .settings
            .launch_after
            .map(Predicate::LaunchAfter)
            .into_iter()
            .collect();
        filter(&self.records, &predicates)
    }

    /// Launch quarters present after the cutoff, oldest first.
    pub fn quarters(&self) -> Vec<YearQuarter> {
        self.in_scope()
            .iter()
            .filter_map(|r| r.year_quarter)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn areas(&self) -> Vec<String> {
        self.in_scope()
            .iter()
            .map(|r| r.area.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn developers(&self) -> Vec<String> {
        self.in_scope()
            .iter()
            .filter_map(|r| r.developer_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Compute one named view. Never cached.
    pub fn query(&self, view_id: &str, filters: &ViewFilters) -> Result<ViewOutput> {
        let spec = views::find(view_id)?;
        views::run(
            spec,
            &self.records,
            self.settings.launch_after,
            self.settings.top_n,
            filters,
        )
    }
}

/// Install the process-wide dataset. Fails if one is already installed.
pub fn init(dataset: Dataset) -> Result<&'static Dataset> {
    DATASET
        .set(dataset)
        .map_err(|_| PipelineError::AlreadyLoaded)?;
    get()
}

pub fn get() -> Result<&'static Dataset> {
    DATASET.get().ok_or(PipelineError::NotLoaded)
}

pub fn is_loaded() -> bool {
    DATASET.get().is_some()
}
