//! The catalog of named views. Each view is data, not code: grouping keys,
//! a measure and reducer, and the reshaping steps to apply.
use crate::aggregate::{aggregate, Axis, Dimension, LongTable, Measure, PivotTable, Reducer};
use crate::error::{PipelineError, Result};
use crate::filter::{filter, Predicate, QuarterRange};
use crate::types::{AssetType, Record, ViewCatalogRow};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

pub const NO_DATA_MESSAGE: &str = "No data available for the selected filters.";

const REGIONS: [&str; 4] = ["North", "East", "South", "West"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shape {
    Long,
    Pivot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub id: String,
    pub title: String,
    pub group_by: Vec<Dimension>,
    pub measure: Measure,
    pub reducer: Reducer,
    pub shape: Shape,
    pub cumulative: bool,
    pub percentage: Option<Axis>,
    /// Keep only the largest groups (top-N from the pipeline settings).
    pub ranked: bool,
    pub area: Option<String>,
    pub asset_type: Option<AssetType>,
}

impl ViewSpec {
    fn new(id: impl Into<String>, title: impl Into<String>, group_by: &[Dimension], measure: Measure, reducer: Reducer) -> Self {
        let shape = if group_by.len() == 2 { Shape::Pivot } else { Shape::Long };
        ViewSpec {
            id: id.into(),
            title: title.into(),
            group_by: group_by.to_vec(),
            measure,
            reducer,
            shape,
            cumulative: false,
            percentage: None,
            ranked: false,
            area: None,
            asset_type: None,
        }
    }

    fn long(mut self) -> Self {
        self.shape = Shape::Long;
        self
    }

    fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    fn percentage(mut self, axis: Axis) -> Self {
        self.percentage = Some(axis);
        self
    }

    fn ranked(mut self) -> Self {
        self.ranked = true;
        self
    }

    fn in_area(mut self, area: &str) -> Self {
        self.area = Some(area.to_string());
        self
    }

    fn of_asset(mut self, asset: AssetType) -> Self {
        self.asset_type = Some(asset);
        self
    }

    /// Predicates fixed by the view itself.
    fn scope(&self) -> Vec<Predicate> {
        let mut preds = Vec::new();
        if let Some(area) = &self.area {
            preds.push(Predicate::area_in([area]));
        }
        if let Some(asset) = self.asset_type {
            preds.push(Predicate::AssetTypeIn(vec![asset]));
        }
        preds
    }
}

static CATALOG: Lazy<Vec<ViewSpec>> = Lazy::new(build_catalog);

fn build_catalog() -> Vec<ViewSpec> {
    use Dimension::{Area, Configuration, Developer, HandoverQuarter, LaunchQuarter, LaunchYear};
    use Measure::*;
    use Reducer::*;

    let mut views = vec![
        ViewSpec::new("handover_area", "Handover by Area Over Time", &[HandoverQuarter, Area], Projects, Count),
        ViewSpec::new("new_launches_area", "New Launches by Area Over Time", &[LaunchQuarter, Area], Projects, Count),
        ViewSpec::new("total_project_size", "Total Project Size Over Time", &[LaunchQuarter], ProjectAreaAcres, Sum),
        ViewSpec::new("asset_type_distribution", "Asset Type Distribution Over Time", &[LaunchQuarter, Dimension::AssetType], Projects, Count),
        ViewSpec::new(
            "projects_area_cumulative",
            "Number of Projects by Area Over Time (Cumulative)",
            &[LaunchQuarter, Area],
            Projects,
            Count,
        )
        .cumulative(),
        ViewSpec::new("developer_unit_volume", "Developer Dominance in Unit Volume", &[Developer], TotalUnits, Sum).ranked(),
        ViewSpec::new(
            "handover_time_developer",
            "Time to Handover by Developer and Asset Type (Median)",
            &[Developer, Dimension::AssetType],
            HandoverMonths,
            Median,
        ),
        ViewSpec::new("total_units_area", "Total Number of Units by Area Over Time", &[LaunchQuarter, Area], TotalUnits, Sum),
    ];

    for region in REGIONS {
        let slug = region.to_ascii_lowercase();
        views.push(
            ViewSpec::new(
                format!("asset_type_{slug}_units"),
                format!("Asset Type by Area Over Time (Units) - {region}"),
                &[LaunchQuarter, Dimension::AssetType],
                TotalUnits,
                Sum,
            )
            .in_area(region),
        );
    }
    for region in REGIONS {
        let slug = region.to_ascii_lowercase();
        views.push(
            ViewSpec::new(
                format!("asset_type_{slug}_projects"),
                format!("Asset Type by Area Over Time (Projects) - {region}"),
                &[LaunchQuarter, Dimension::AssetType],
                Projects,
                Count,
            )
            .in_area(region),
        );
    }
    for asset in [AssetType::Apartment, AssetType::Plot, AssetType::Villa] {
        views.push(
            ViewSpec::new(
                format!("developer_dominance_{}", asset.as_str().to_ascii_lowercase()),
                format!("Developer Dominance (Total Units) - {asset}"),
                &[Developer],
                TotalUnits,
                Sum,
            )
            .ranked()
            .of_asset(asset),
        );
    }
    for region in REGIONS {
        let slug = region.to_ascii_lowercase();
        views.push(
            ViewSpec::new(
                format!("config_{slug}_apartment"),
                format!("Apartment Configuration by Area Over Time - {region}"),
                &[LaunchQuarter, Configuration],
                Projects,
                Count,
            )
            .in_area(region)
            .of_asset(AssetType::Apartment),
        );
    }

    views.extend([
        ViewSpec::new("quarterly_units", "Total Units by Quarter", &[LaunchQuarter], TotalUnits, Sum),
        ViewSpec::new("developer_quarterly", "Developer-wise Quarterly Launches", &[LaunchQuarter, Developer], TotalUnits, Sum).long(),
        ViewSpec::new("area_quarterly", "Units Launched in Area by Quarter", &[LaunchQuarter, Area], TotalUnits, Sum).long(),
        ViewSpec::new("asset_yearly", "Asset Type Launched Year-wise", &[LaunchYear, Dimension::AssetType], TotalUnits, Sum).long(),
        ViewSpec::new("asset_mix_area", "Asset Type Mix by Area (% of Units)", &[Area, Dimension::AssetType], TotalUnits, Sum)
            .percentage(Axis::Row),
    ]);
    views
}

pub fn catalog() -> &'static [ViewSpec] {
    &CATALOG
}

pub fn find(id: &str) -> Result<&'static ViewSpec> {
    CATALOG
        .iter()
        .find(|v| v.id == id)
        .ok_or_else(|| PipelineError::UnknownView(id.to_string()))
}

pub fn catalog_rows() -> Vec<ViewCatalogRow> {
    CATALOG
        .iter()
        .enumerate()
        .map(|(i, v)| ViewCatalogRow {
            number: i + 1,
            id: v.id.clone(),
            title: v.title.clone(),
        })
        .collect()
}

/// Caller-chosen filters. Empty selections do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilters {
    pub areas: Vec<String>,
    pub developers: Vec<String>,
    pub asset_types: Vec<AssetType>,
    pub quarters: QuarterRange,
}

impl ViewFilters {
    pub fn predicates(&self) -> Vec<Predicate> {
        vec![
            Predicate::area_in(&self.areas),
            Predicate::developer_in(&self.developers),
            Predicate::AssetTypeIn(self.asset_types.clone()),
            Predicate::QuarterRange(self.quarters),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewBody {
    Long(LongTable),
    Pivot(PivotTable),
    NoData { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutput {
    pub id: String,
    pub title: String,
    pub body: ViewBody,
}

impl ViewOutput {
    pub fn is_empty(&self) -> bool {
        matches!(self.body, ViewBody::NoData { .. })
    }
}

/// Run one view over `records`: dataset cutoff, then the view's own scope,
/// then the caller's filters; aggregate; reshape.
pub fn run(
    spec: &ViewSpec,
    records: &[Record],
    launch_after: Option<NaiveDate>,
    top_n: usize,
    filters: &ViewFilters,
) -> Result<ViewOutput> {
    let mut predicates: Vec<Predicate> = launch_after.map(Predicate::LaunchAfter).into_iter().collect();
    predicates.extend(spec.scope());
    predicates.extend(filters.predicates());

    let subset = filter(records, &predicates);
    debug!(view = %spec.id, records = subset.len(), "filtered");

    let no_data = || ViewOutput {
        id: spec.id.clone(),
        title: spec.title.clone(),
        body: ViewBody::NoData {
            message: NO_DATA_MESSAGE.to_string(),
        },
    };
    if subset.is_empty() {
        return Ok(no_data());
    }

    let mut table = aggregate(subset, &spec.group_by, spec.measure, spec.reducer)?;
    if table.is_empty() {
        return Ok(no_data());
    }
    if spec.ranked {
        table = table.top_n(top_n);
    }

    let body = match spec.shape {
        Shape::Long => {
            if spec.cumulative {
                table = table.cumulative()?;
            }
            ViewBody::Long(table)
        }
        Shape::Pivot => {
            let mut pivot = table.pivot()?;
            if spec.cumulative {
                pivot = pivot.cumulative()?;
            }
            if let Some(axis) = spec.percentage {
                pivot = pivot.percentages(axis);
            }
            ViewBody::Pivot(pivot)
        }
    };
    Ok(ViewOutput {
        id: spec.id.clone(),
        title: spec.title.clone(),
        body,
    })
}
