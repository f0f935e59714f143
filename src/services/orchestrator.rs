//! Runs one billing query and dispatches one message per returned period

use tracing::{debug, info, warn};

use super::aggregator::{Aggregator, DEFAULT_THRESHOLD};
use super::cost_source::{CostQuery, CostSource};
use super::renderer::Renderer;
use super::reporter::Reporter;
use crate::types::{
    parse_date, BillingPeriod, CostReportError, GroupingPolicy, Message, NameLookup, Result,
    ResultByTime,
};

/// Per-run settings, built once at process start
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub period: BillingPeriod,
    pub policy: GroupingPolicy,
    pub threshold: f64,
    /// Skip a period whose records are malformed instead of aborting the run
    pub skip_malformed: bool,
}

impl ReportConfig {
    pub fn new(period: BillingPeriod, policy: GroupingPolicy) -> Self {
        Self {
            period,
            policy,
            threshold: DEFAULT_THRESHOLD,
            skip_malformed: false,
        }
    }

    /// Set the noise threshold; must be finite and non-negative
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CostReportError::Config(format!(
                "threshold must be a non-negative number, got {}",
                threshold
            )));
        }
        self.threshold = threshold;
        Ok(self)
    }

    pub fn with_skip_malformed(mut self, skip: bool) -> Self {
        self.skip_malformed = skip;
        self
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Periods returned by the billing source
    pub periods: usize,
    /// Messages handed to the reporter
    pub sent: usize,
    /// Periods dropped because their records were malformed
    pub skipped: usize,
}

/// Wires a billing source to a reporter
pub struct CostReportService {
    source: Box<dyn CostSource>,
    reporter: Box<dyn Reporter>,
}

impl CostReportService {
    pub fn new(source: Box<dyn CostSource>, reporter: Box<dyn Reporter>) -> Self {
        Self { source, reporter }
    }

    /// Query the billing source once, then aggregate, render and report each
    /// returned period in order.
    pub async fn run(&self, config: &ReportConfig) -> Result<RunSummary> {
        let query = CostQuery::new(config.period, config.policy);
        info!(
            source = self.source.name(),
            reporter = self.reporter.name(),
            period = %config.period,
            policy = %config.policy,
            "Starting cost report"
        );

        let response = self.source.fetch(&query).await?;
        let results = response
            .results_by_time
            .as_ref()
            .ok_or_else(|| CostReportError::MalformedRecord("missing ResultsByTime".into()))?;
        let lookup = Aggregator::name_lookup(&response, config.policy);

        let mut summary = RunSummary {
            periods: results.len(),
            ..RunSummary::default()
        };

        for (index, result) in results.iter().enumerate() {
            let message = match build_message(result, &lookup, config) {
                Ok(message) => message,
                Err(e) if config.skip_malformed && is_record_error(&e) => {
                    warn!(period = index, error = %e, "Skipping malformed period");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.reporter.report(&message).await?;
            summary.sent += 1;
        }

        info!(
            periods = summary.periods,
            sent = summary.sent,
            skipped = summary.skipped,
            "Cost report finished"
        );
        Ok(summary)
    }
}

/// Aggregate and render one period of the response
pub fn build_message(
    result: &ResultByTime,
    lookup: &NameLookup,
    config: &ReportConfig,
) -> Result<Message> {
    let period = result_period(result, config.period)?;
    if result.estimated {
        debug!(period = %period, "Period contains estimated costs");
    }

    let groups = Aggregator::parse_groups(result, config.policy.metric())?;
    let report = Aggregator::aggregate(period, &groups, lookup, config.threshold)?;
    debug!(
        period = %period,
        groups = groups.len(),
        reported = report.entities.len(),
        "Aggregated period"
    );

    Ok(Renderer::render(&report, config.policy.section_title()))
}

/// The period reported by the API, or the queried one when absent
fn result_period(result: &ResultByTime, queried: BillingPeriod) -> Result<BillingPeriod> {
    match &result.time_period {
        Some(interval) => {
            let start = parse_date(&interval.start)
                .map_err(|e| CostReportError::MalformedRecord(format!("TimePeriod: {}", e)))?;
            let end = parse_date(&interval.end)
                .map_err(|e| CostReportError::MalformedRecord(format!("TimePeriod: {}", e)))?;
            BillingPeriod::new(start, end)
                .map_err(|e| CostReportError::MalformedRecord(format!("TimePeriod: {}", e)))
        }
        None => Ok(queried),
    }
}

fn is_record_error(err: &CostReportError) -> bool {
    matches!(
        err,
        CostReportError::MalformedRecord(_) | CostReportError::MixedCurrency { .. }
    )
}
