//! Cost Explorer `GetCostAndUsage` response shape
//!
//! Mirrors the JSON document returned by the API (and by
//! `aws ce get-cost-and-usage`). Every field is optional here; required
//! fields are validated once by the aggregator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostAndUsageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_definitions: Option<Vec<GroupDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_by_time: Option<Vec<ResultByTime>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_value_attributes: Option<Vec<DimensionValueAttributes>>,
}

impl CostAndUsageResponse {
    /// Append a follow-up page. A period split across the page boundary is
    /// merged into a single result.
    pub fn merge_page(&mut self, page: CostAndUsageResponse) {
        self.next_page_token = page.next_page_token;
        if self.group_definitions.is_none() {
            self.group_definitions = page.group_definitions;
        }

        if let Some(incoming) = page.results_by_time {
            let results = self.results_by_time.get_or_insert_with(Vec::new);
            for result in incoming {
                match results.last_mut() {
                    Some(last)
                        if last.time_period.is_some() && last.time_period == result.time_period =>
                    {
                        if let Some(groups) = result.groups {
                            last.groups.get_or_insert_with(Vec::new).extend(groups);
                        }
                    }
                    _ => results.push(result),
                }
            }
        }

        if let Some(attributes) = page.dimension_value_attributes {
            self.dimension_value_attributes
                .get_or_insert_with(Vec::new)
                .extend(attributes);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupDefinition {
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_period: Option<DateInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<HashMap<String, MetricValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Group>>,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HashMap<String, MetricValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimensionValueAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, String>>,
}
