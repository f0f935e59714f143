//! Billing sources for Cost Explorer `GetCostAndUsage` responses
//!
//! The live source calls the AWS API; the file source replays a response
//! saved with `aws ce get-cost-and-usage --output json`.

use async_trait::async_trait;
use aws_sdk_costexplorer::error::DisplayErrorContext;
use aws_sdk_costexplorer::types as ce;
use aws_sdk_costexplorer::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::types::{
    BillingPeriod, CostAndUsageResponse, CostReportError, DateInterval, DimensionValueAttributes,
    Group, GroupDefinition, GroupingPolicy, MetricValue, Result, ResultByTime,
};

/// Cost Explorer is only served from us-east-1
const COST_EXPLORER_REGION: &str = "us-east-1";

/// Upper bound on followed `NextPageToken`s
const MAX_PAGES: usize = 100;

/// One `GetCostAndUsage` request: DAILY granularity, one metric, grouped by
/// one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostQuery {
    pub period: BillingPeriod,
    pub policy: GroupingPolicy,
}

impl CostQuery {
    pub fn new(period: BillingPeriod, policy: GroupingPolicy) -> Self {
        Self { period, policy }
    }

    pub fn metric(&self) -> &'static str {
        self.policy.metric()
    }

    pub fn dimension(&self) -> &'static str {
        self.policy.dimension()
    }

    pub fn granularity(&self) -> &'static str {
        "DAILY"
    }
}

/// Trait for fetching grouped cost data
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Source name (e.g., "cost-explorer")
    fn name(&self) -> &'static str;

    /// Run one query and return the full (all pages) response
    async fn fetch(&self, query: &CostQuery) -> Result<CostAndUsageResponse>;
}

/// Live AWS Cost Explorer source
pub struct CostExplorerSource {
    client: Client,
}

impl CostExplorerSource {
    /// Create a source using default AWS credentials in the Cost Explorer region
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(COST_EXPLORER_REGION))
            .load()
            .await;
        Self {
            client: Client::new(&config),
        }
    }

    async fn fetch_page(
        &self,
        query: &CostQuery,
        page_token: Option<String>,
    ) -> Result<CostAndUsageResponse> {
        let time_period = ce::DateInterval::builder()
            .start(query.period.start_str())
            .end(query.period.end_str())
            .build()
            .map_err(|e| CostReportError::Billing(format!("invalid time period: {}", e)))?;

        let output = self
            .client
            .get_cost_and_usage()
            .time_period(time_period)
            .granularity(ce::Granularity::from(query.granularity()))
            .metrics(query.metric())
            .group_by(
                ce::GroupDefinition::builder()
                    .r#type(ce::GroupDefinitionType::Dimension)
                    .key(query.dimension())
                    .build(),
            )
            .set_next_page_token(page_token)
            .send()
            .await
            .map_err(|e| {
                CostReportError::Billing(format!(
                    "GetCostAndUsage failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(CostAndUsageResponse {
            next_page_token: output.next_page_token().map(String::from),
            group_definitions: Some(
                output
                    .group_definitions()
                    .iter()
                    .map(|def| GroupDefinition {
                        kind: def.r#type().map(|t| t.as_str().to_string()),
                        key: def.key().map(String::from),
                    })
                    .collect(),
            ),
            results_by_time: output
                .results_by_time
                .as_ref()
                .map(|results| results.iter().map(convert_result).collect()),
            dimension_value_attributes: Some(
                output
                    .dimension_value_attributes()
                    .iter()
                    .map(|attr| DimensionValueAttributes {
                        value: attr.value().map(String::from),
                        attributes: attr.attributes().cloned(),
                    })
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl CostSource for CostExplorerSource {
    fn name(&self) -> &'static str {
        "cost-explorer"
    }

    async fn fetch(&self, query: &CostQuery) -> Result<CostAndUsageResponse> {
        info!(
            period = %query.period,
            metric = query.metric(),
            dimension = query.dimension(),
            "Querying Cost Explorer"
        );

        let mut response = CostAndUsageResponse::default();
        let mut page_token = None;

        for page_number in 1..=MAX_PAGES {
            let page = self.fetch_page(query, page_token).await?;
            page_token = page.next_page_token.clone();
            debug!(page = page_number, more = page_token.is_some(), "Fetched page");
            response.merge_page(page);

            if page_token.is_none() {
                return Ok(response);
            }
        }

        Err(CostReportError::Billing(format!(
            "gave up after {} pages",
            MAX_PAGES
        )))
    }
}

fn convert_result(result: &ce::ResultByTime) -> ResultByTime {
    ResultByTime {
        time_period: result.time_period().map(|tp| DateInterval {
            start: tp.start().to_string(),
            end: tp.end().to_string(),
        }),
        total: result.total().map(convert_metrics),
        // absent lists stay None so validation can reject them
        groups: result.groups.as_ref().map(|groups| {
            groups
                .iter()
                .map(|group| Group {
                    keys: group.keys.clone(),
                    metrics: group.metrics().map(convert_metrics),
                })
                .collect()
        }),
        estimated: result.estimated(),
    }
}

fn convert_metrics(metrics: &HashMap<String, ce::MetricValue>) -> HashMap<String, MetricValue> {
    metrics
        .iter()
        .map(|(name, value)| {
            (
                name.clone(),
                MetricValue {
                    amount: value.amount().map(String::from),
                    unit: value.unit().map(String::from),
                },
            )
        })
        .collect()
}

/// Source replaying a saved `GetCostAndUsage` JSON document
pub struct ResponseFileSource {
    path: PathBuf,
}

impl ResponseFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CostSource for ResponseFileSource {
    fn name(&self) -> &'static str {
        "response-file"
    }

    async fn fetch(&self, query: &CostQuery) -> Result<CostAndUsageResponse> {
        info!(path = %self.path.display(), "Reading saved cost response");

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CostReportError::Billing(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let response: CostAndUsageResponse = serde_json::from_str(&content)
            .map_err(|e| CostReportError::Parse(format!("{}: {}", self.path.display(), e)))?;

        let grouped_by = response
            .group_definitions
            .iter()
            .flatten()
            .filter_map(|def| def.key.as_deref())
            .next();
        if let Some(key) = grouped_by {
            if key != query.dimension() {
                warn!(
                    expected = query.dimension(),
                    found = key,
                    "Saved response is grouped by a different dimension"
                );
            }
        }

        Ok(response)
    }
}
