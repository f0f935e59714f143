//! Billing domain types shared by the aggregation and rendering pipeline

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::{CostReportError, Result};

/// Date format used for every date exchanged with the billing API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Half-open date range `[start, end)` queried from the billing API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl BillingPeriod {
    /// Create a period, rejecting empty or reversed ranges
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(CostReportError::InvalidPeriod(format!(
                "start {} must be before end {}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// One-day period beginning at `start`
    pub fn single_day(start: NaiveDate) -> Result<Self> {
        let end = start
            .checked_add_days(Days::new(1))
            .ok_or_else(|| CostReportError::InvalidPeriod(format!("{} has no next day", start)))?;
        Self::new(start, end)
    }

    /// The day before `today`
    pub fn yesterday(today: NaiveDate) -> Result<Self> {
        let start = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| {
                CostReportError::InvalidPeriod(format!("{} has no previous day", today))
            })?;
        Self::single_day(start)
    }

    /// Resolve an optional start/end override. Start defaults to the day
    /// before `today`, end defaults to start + 1 day.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self> {
        let period = match start {
            Some(start) => Self::single_day(start)?,
            None => Self::yesterday(today)?,
        };
        match end {
            Some(end) => Self::new(period.start, end),
            None => Ok(period),
        }
    }

    /// Start date as `YYYY-MM-DD`
    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// End date as `YYYY-MM-DD`
    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_str(), self.end_str())
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| CostReportError::InvalidPeriod(format!("'{}': {}", value, e)))
}

/// How costs are grouped, and which metric backs each grouping.
///
/// Account grouping requests the amortized metric, which spreads reserved
/// capacity and Savings Plan fees across their usage period. Service grouping
/// requests the unblended metric, which books a charge on its payment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupingPolicy {
    Account,
    Service,
}

impl GroupingPolicy {
    /// Cost Explorer `GroupBy` dimension key
    pub fn dimension(&self) -> &'static str {
        match self {
            Self::Account => "LINKED_ACCOUNT",
            Self::Service => "SERVICE",
        }
    }

    /// Cost Explorer metric name
    pub fn metric(&self) -> &'static str {
        match self {
            Self::Account => "AmortizedCost",
            Self::Service => "UnblendedCost",
        }
    }

    /// Fixed section title shown above the per-entity fields
    pub fn section_title(&self) -> &'static str {
        match self {
            Self::Account => "Breakdown by account",
            Self::Service => "Breakdown by service",
        }
    }

    /// Whether display names come from the dimension attributes
    pub fn uses_attribute_names(&self) -> bool {
        matches!(self, Self::Account)
    }
}

impl fmt::Display for GroupingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => f.write_str("account"),
            Self::Service => f.write_str("service"),
        }
    }
}

/// One validated grouped record from the billing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGroup {
    pub dimension_key: String,
    /// Base-10 decimal string as returned by the API
    pub amount: String,
    pub unit: String,
}

/// Dimension key to human-readable name. An empty lookup resolves every key
/// to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameLookup {
    names: HashMap<String, String>,
}

impl NameLookup {
    /// Lookup that maps every key to itself
    pub fn identity() -> Self {
        Self::default()
    }

    /// Display name for `key`, falling back to the key itself
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.names.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One aggregated, named cost
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCost {
    pub id: String,
    pub display_name: String,
    pub cost: f64,
}

/// Ranked costs for one billing period
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub period: BillingPeriod,
    /// Sorted descending by cost, below-threshold entities removed
    pub entities: Vec<EntityCost>,
    /// Sum of `entities` only
    pub total: f64,
}

/// One `label: value` field of a rendered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageLine {
    pub label: String,
    pub value: String,
}

/// Rendered notification for one billing period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub title: String,
    pub lines: Vec<MessageLine>,
    pub summary: String,
}
