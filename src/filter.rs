use crate::types::{AssetType, Field, Record, YearQuarter};
use crate::util::title_case;
use chrono::NaiveDate;

/// Inclusive launch-quarter bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuarterRange {
    pub from: Option<YearQuarter>,
    pub to: Option<YearQuarter>,
}

impl QuarterRange {
    /// Range between two positions of a sorted quarter list, the way a range
    /// slider over the available quarters selects them. Positions are clamped.
    pub fn from_indices(quarters: &[YearQuarter], lo: usize, hi: usize) -> Self {
        if quarters.is_empty() {
            return QuarterRange::default();
        }
        let last = quarters.len() - 1;
        let (lo, hi) = (lo.min(last), hi.min(last));
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        QuarterRange {
            from: Some(quarters[lo]),
            to: Some(quarters[hi]),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, q: YearQuarter) -> bool {
        self.from.map_or(true, |f| q >= f) && self.to.map_or(true, |t| q <= t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `launch_date > threshold`; records without a launch date fail.
    LaunchAfter(NaiveDate),
    QuarterRange(QuarterRange),
    /// Values compared against title-cased fields; build with [`Predicate::area_in`].
    AreaIn(Vec<String>),
    DeveloperIn(Vec<String>),
    AssetTypeIn(Vec<AssetType>),
    Present(Field),
}

impl Predicate {
    pub fn area_in<I, S>(areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Predicate::AreaIn(normalized(areas))
    }

    pub fn developer_in<I, S>(developers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Predicate::DeveloperIn(normalized(developers))
    }

    /// An empty selection matches everything.
    pub fn matches(&self, r: &Record) -> bool {
        match self {
            Predicate::LaunchAfter(threshold) => r.launch_date.map_or(false, |d| d > *threshold),
            Predicate::QuarterRange(range) => {
                range.is_unbounded() || r.year_quarter.map_or(false, |q| range.contains(q))
            }
            Predicate::AreaIn(areas) => areas.is_empty() || areas.iter().any(|a| *a == r.area),
            Predicate::DeveloperIn(devs) => {
                devs.is_empty()
                    || r
                        .developer_name
                        .as_ref()
                        .map_or(false, |d| devs.iter().any(|s| s == d))
            }
            Predicate::AssetTypeIn(types) => {
                types.is_empty() || r.asset_type.map_or(false, |a| types.contains(&a))
            }
            Predicate::Present(field) => r.has(*field),
        }
    }
}

fn normalized<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| title_case(v.as_ref().trim()))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Records passing every predicate, in input order.
pub fn filter<'a, I>(records: I, predicates: &[Predicate]) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r)))
        .collect()
}
