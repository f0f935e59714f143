use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::services::aggregator::DEFAULT_THRESHOLD;
use crate::services::{
    CostExplorerSource, CostReportService, CostSource, ReportConfig, Reporter, ResponseFileSource,
    SlackReporter, StdoutReporter,
};
use crate::types::{parse_date, BillingPeriod, CostReportError, GroupingPolicy, Result};

/// Post a daily AWS cost breakdown to Slack
#[derive(Parser, Debug)]
#[command(name = "awscost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Slack channel to post to (defaults to the webhook's channel)
    #[arg(value_name = "CHANNEL", env = "SLACK_CHANNEL")]
    channel: Option<String>,

    /// Slack incoming webhook URL
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,

    /// First day to report, YYYY-MM-DD (default: yesterday)
    #[arg(short, long, value_parser = parse_date_arg)]
    start: Option<NaiveDate>,

    /// Day after the last day to report, YYYY-MM-DD (default: start + 1 day)
    #[arg(short, long, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,

    /// Group costs by linked account (amortized) or by service (unblended)
    #[arg(long, value_enum, default_value_t = GroupingPolicy::Account)]
    group_by: GroupingPolicy,

    /// Hide entries cheaper than this amount
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Read a saved `aws ce get-cost-and-usage` JSON response instead of calling the API
    #[arg(long, value_name = "PATH")]
    response_file: Option<PathBuf>,

    /// Skip periods with malformed records instead of aborting
    #[arg(long)]
    skip_malformed: bool,

    /// Print the Slack payloads instead of sending them
    #[arg(long)]
    dry_run: bool,
}

fn parse_date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.report_config(Local::now().date_naive())?;
        let reporter = self.reporter()?;
        let source: Box<dyn CostSource> = match &self.response_file {
            Some(path) => Box::new(ResponseFileSource::new(path)),
            None => Box::new(CostExplorerSource::from_env().await),
        };

        let summary = CostReportService::new(source, reporter)
            .run(&config)
            .await?;

        match self.completion_line() {
            Some(line) => println!("{}", line),
            None => info!(messages = summary.sent, "Dry run finished"),
        }
        Ok(())
    }

    /// Confirmation printed after delivery. Dry runs keep stdout for the
    /// payloads and report through the log instead.
    fn completion_line(&self) -> Option<String> {
        if self.dry_run {
            return None;
        }
        Some(format!(
            "daily cost was sent to channel '{}'.",
            self.channel.as_deref().unwrap_or("(webhook default)")
        ))
    }

    /// Resolve the reporting window against `today` and collect run settings
    fn report_config(&self, today: NaiveDate) -> Result<ReportConfig> {
        let period = BillingPeriod::resolve(self.start, self.end, today)?;
        Ok(ReportConfig::new(period, self.group_by)
            .with_threshold(self.threshold)?
            .with_skip_malformed(self.skip_malformed))
    }

    fn reporter(&self) -> Result<Box<dyn Reporter>> {
        if self.dry_run {
            return Ok(Box::new(StdoutReporter::new(self.channel.clone())));
        }

        let webhook_url = self.webhook_url.clone().ok_or_else(|| {
            CostReportError::Config(
                "Your webhook URL must be set via --webhook-url or 'SLACK_WEBHOOK_URL'".into(),
            )
        })?;
        Ok(Box::new(SlackReporter::new(webhook_url, self.channel.clone())))
    }
}
