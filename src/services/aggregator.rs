//! Aggregator service for ranking per-period costs

use crate::types::{
    BillingPeriod, CostAndUsageResponse, CostReportError, EntityCost, GroupingPolicy, NameLookup,
    RawGroup, Report, Result, ResultByTime,
};

/// Minimum cost (in the feed's currency) for an entity to be reported
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Attribute carrying the account name in `DimensionValueAttributes`
const DESCRIPTION_ATTRIBUTE: &str = "description";

/// Aggregator for turning one period's grouped records into a ranked report
pub struct Aggregator;

impl Aggregator {
    /// Validate one period's groups against the requested metric.
    ///
    /// Fails on a missing group list, a group without keys or metrics, or a
    /// metric without amount or unit.
    pub fn parse_groups(result: &ResultByTime, metric: &str) -> Result<Vec<RawGroup>> {
        let groups = result
            .groups
            .as_ref()
            .ok_or_else(|| CostReportError::MalformedRecord("missing Groups".into()))?;

        groups
            .iter()
            .enumerate()
            .map(|(index, group)| {
                let dimension_key = group
                    .keys
                    .as_ref()
                    .and_then(|keys| keys.first())
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        CostReportError::MalformedRecord(format!("group {}: missing Keys", index))
                    })?;

                let metrics = group.metrics.as_ref().ok_or_else(|| {
                    CostReportError::MalformedRecord(format!(
                        "group {} ({}): missing Metrics",
                        index, dimension_key
                    ))
                })?;

                let value = metrics.get(metric).ok_or_else(|| {
                    CostReportError::MalformedRecord(format!(
                        "group {} ({}): missing metric {}",
                        index, dimension_key, metric
                    ))
                })?;

                let amount = value.amount.as_deref().filter(|a| !a.is_empty());
                let unit = value.unit.as_deref().filter(|u| !u.is_empty());
                match (amount, unit) {
                    (Some(amount), Some(unit)) => Ok(RawGroup {
                        dimension_key: dimension_key.clone(),
                        amount: amount.to_string(),
                        unit: unit.to_string(),
                    }),
                    _ => Err(CostReportError::MalformedRecord(format!(
                        "group {} ({}): incomplete {} (Amount/Unit)",
                        index, dimension_key, metric
                    ))),
                }
            })
            .collect()
    }

    /// Build the key-to-name lookup for a grouping policy (identity for
    /// service grouping)
    pub fn name_lookup(response: &CostAndUsageResponse, policy: GroupingPolicy) -> NameLookup {
        if !policy.uses_attribute_names() {
            return NameLookup::identity();
        }

        response
            .dimension_value_attributes
            .iter()
            .flatten()
            .filter_map(|attr| {
                let key = attr.value.as_ref()?;
                let name = attr.attributes.as_ref()?.get(DESCRIPTION_ATTRIBUTE)?;
                Some((key.clone(), name.clone()))
            })
            .collect()
    }

    /// Aggregate validated records into a report: name, filter below
    /// `threshold`, sort descending (stable), and total the survivors.
    pub fn aggregate(
        period: BillingPeriod,
        groups: &[RawGroup],
        lookup: &NameLookup,
        threshold: f64,
    ) -> Result<Report> {
        let mut currency: Option<&str> = None;
        let mut entities = Vec::with_capacity(groups.len());

        for group in groups {
            match currency {
                None => currency = Some(group.unit.as_str()),
                Some(expected) if expected != group.unit => {
                    return Err(CostReportError::MixedCurrency {
                        expected: expected.to_string(),
                        found: group.unit.clone(),
                    });
                }
                Some(_) => {}
            }

            let cost = parse_amount(group)?;
            if cost < threshold {
                continue;
            }

            entities.push(EntityCost {
                id: group.dimension_key.clone(),
                display_name: lookup.resolve(&group.dimension_key).to_string(),
                cost,
            });
        }

        // sort_by is stable: equal costs keep input order
        entities.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        let total = entities.iter().map(|e| e.cost).sum();

        Ok(Report {
            period,
            entities,
            total,
        })
    }
}

fn parse_amount(group: &RawGroup) -> Result<f64> {
    let amount = group.amount.trim();
    match amount.parse::<f64>() {
        Ok(cost) if cost.is_finite() => Ok(cost),
        _ => Err(CostReportError::MalformedRecord(format!(
            "{}: unparseable amount '{}'",
            group.dimension_key, group.amount
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn period() -> BillingPeriod {
        BillingPeriod::single_day(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()).unwrap()
    }

    fn raw(key: &str, amount: &str) -> RawGroup {
        RawGroup {
            dimension_key: key.to_string(),
            amount: amount.to_string(),
            unit: "USD".to_string(),
        }
    }

    fn result_from(value: serde_json::Value) -> ResultByTime {
        serde_json::from_value(value).unwrap()
    }

    fn account_group(key: &str, amount: &str) -> serde_json::Value {
        json!({"Keys": [key], "Metrics": {"AmortizedCost": {"Amount": amount, "Unit": "USD"}}})
    }

    fn account_response() -> CostAndUsageResponse {
        serde_json::from_value(json!({
            "GroupDefinitions": [{"Type": "DIMENSION", "Key": "LINKED_ACCOUNT"}],
            "ResultsByTime": [{
                "TimePeriod": {"Start": "2020-01-02", "End": "2020-01-03"},
                "Total": {},
                "Groups": [
                    account_group("123456789123", "95.0012729986"),
                    account_group("456789123456", "159.4033492869"),
                    account_group("789123456789", "0.060")
                ],
                "Estimated": false
            }],
            "DimensionValueAttributes": [
                {"Value": "123456789123", "Attributes": {"description": "Account A"}},
                {"Value": "456789123456", "Attributes": {"description": "Account B"}},
                {"Value": "789123456789", "Attributes": {"description": "Account C"}}
            ]
        }))
        .unwrap()
    }

    // ========== parse_groups() tests ==========

    #[test]
    fn test_parse_groups_valid() {
        let response = account_response();
        let result = &response.results_by_time.as_ref().unwrap()[0];

        let groups = Aggregator::parse_groups(result, "AmortizedCost").unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0], raw("123456789123", "95.0012729986"));
    }

    #[test]
    fn test_parse_groups_missing_group_list() {
        let result =
            result_from(json!({"TimePeriod": {"Start": "2020-01-02", "End": "2020-01-03"}}));

        let err = Aggregator::parse_groups(&result, "UnblendedCost").unwrap_err();

        assert!(matches!(err, CostReportError::MalformedRecord(_)));
    }

    #[test]
    fn test_parse_groups_empty_group_list_is_valid() {
        let result = result_from(json!({"Groups": []}));

        let groups = Aggregator::parse_groups(&result, "UnblendedCost").unwrap();

        assert!(groups.is_empty());
    }

    #[test]
    fn test_parse_groups_missing_metrics() {
        let result = result_from(json!({"Groups": [
            {
                "Keys": ["Amazon EC2"],
                "Metrics": {"UnblendedCost": {"Amount": "1.0", "Unit": "USD"}}
            },
            {"Keys": ["Amazon S3"]}
        ]}));

        let err = Aggregator::parse_groups(&result, "UnblendedCost").unwrap_err();

        match err {
            CostReportError::MalformedRecord(msg) => assert!(msg.contains("Amazon S3")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_groups_missing_keys() {
        let result = result_from(json!({"Groups": [
            {"Metrics": {"UnblendedCost": {"Amount": "1.0", "Unit": "USD"}}}
        ]}));

        assert!(Aggregator::parse_groups(&result, "UnblendedCost").is_err());
    }

    #[test]
    fn test_parse_groups_wrong_metric_name() {
        let result = result_from(json!({"Groups": [
            {"Keys": ["Amazon EC2"], "Metrics": {"UnblendedCost": {"Amount": "1.0", "Unit": "USD"}}}
        ]}));

        assert!(Aggregator::parse_groups(&result, "AmortizedCost").is_err());
    }

    #[test]
    fn test_parse_groups_missing_unit() {
        let result = result_from(json!({"Groups": [
            {"Keys": ["Amazon EC2"], "Metrics": {"UnblendedCost": {"Amount": "1.0"}}}
        ]}));

        assert!(Aggregator::parse_groups(&result, "UnblendedCost").is_err());
    }

    #[test]
    fn test_parse_groups_empty_amount() {
        let result = result_from(json!({"Groups": [
            {"Keys": ["Amazon EC2"], "Metrics": {"UnblendedCost": {"Amount": "", "Unit": "USD"}}}
        ]}));

        assert!(Aggregator::parse_groups(&result, "UnblendedCost").is_err());
    }

    // ========== name_lookup() tests ==========

    #[test]
    fn test_name_lookup_account() {
        let lookup = Aggregator::name_lookup(&account_response(), GroupingPolicy::Account);

        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup.resolve("456789123456"), "Account B");
    }

    #[test]
    fn test_name_lookup_service_is_identity() {
        let lookup = Aggregator::name_lookup(&account_response(), GroupingPolicy::Service);

        assert!(lookup.is_empty());
        assert_eq!(lookup.resolve("123456789123"), "123456789123");
    }

    #[test]
    fn test_name_lookup_skips_entries_without_description() {
        let response: CostAndUsageResponse = serde_json::from_value(json!({
            "DimensionValueAttributes": [
                {"Value": "111111111111", "Attributes": {}},
                {"Attributes": {"description": "orphan"}}
            ]
        }))
        .unwrap();

        let lookup = Aggregator::name_lookup(&response, GroupingPolicy::Account);

        assert!(lookup.is_empty());
    }

    // ========== aggregate() tests ==========

    #[test]
    fn test_aggregate_accounts_ranked() {
        let response = account_response();
        let result = &response.results_by_time.as_ref().unwrap()[0];
        let groups = Aggregator::parse_groups(result, "AmortizedCost").unwrap();
        let lookup = Aggregator::name_lookup(&response, GroupingPolicy::Account);

        let report = Aggregator::aggregate(period(), &groups, &lookup, DEFAULT_THRESHOLD).unwrap();

        let names: Vec<&str> = report
            .entities
            .iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Account B", "Account A", "Account C"]);
        assert_eq!(report.entities[0].id, "456789123456");
        assert!((report.entities[2].cost - 0.06).abs() < f64::EPSILON);
        assert!((report.total - 254.4646222855).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_filters_below_threshold() {
        let groups = vec![raw("Amazon S3", "0.03"), raw("Amazon EC2", "5.00")];

        let report =
            Aggregator::aggregate(period(), &groups, &NameLookup::identity(), DEFAULT_THRESHOLD)
                .unwrap();

        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].id, "Amazon EC2");
        assert!((report.total - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_threshold_is_inclusive() {
        let groups = vec![raw("Amazon SNS", "0.05")];

        let report =
            Aggregator::aggregate(period(), &groups, &NameLookup::identity(), DEFAULT_THRESHOLD)
                .unwrap();

        assert_eq!(report.entities.len(), 1);
    }

    #[test]
    fn test_aggregate_total_matches_displayed_entities() {
        let groups = vec![
            raw("a", "0.1"),
            raw("b", "0.2"),
            raw("c", "0.04"),
            raw("d", "0.3"),
            raw("e", "12.345"),
        ];

        let report =
            Aggregator::aggregate(period(), &groups, &NameLookup::identity(), DEFAULT_THRESHOLD)
                .unwrap();

        assert!(report.entities.iter().all(|e| e.cost >= DEFAULT_THRESHOLD));
        let sum: f64 = report.entities.iter().map(|e| e.cost).sum();
        assert_eq!(report.total, sum);
    }

    #[test]
    fn test_aggregate_sort_is_stable_on_ties() {
        let groups = vec![
            raw("first", "1.00"),
            raw("big", "9.00"),
            raw("second", "1.0"),
            raw("third", "1"),
        ];

        let report =
            Aggregator::aggregate(period(), &groups, &NameLookup::identity(), DEFAULT_THRESHOLD)
                .unwrap();

        let ids: Vec<&str> = report.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["big", "first", "second", "third"]);
        for pair in report.entities.windows(2) {
            assert!(pair[0].cost >= pair[1].cost);
        }
    }

    #[test]
    fn test_aggregate_name_fallback_to_id() {
        let groups = vec![raw("000000000000", "3.0")];
        let lookup: NameLookup = [("123456789123", "Account A")].into_iter().collect();

        let report = Aggregator::aggregate(period(), &groups, &lookup, DEFAULT_THRESHOLD).unwrap();

        assert_eq!(report.entities[0].display_name, report.entities[0].id);
    }

    #[test]
    fn test_aggregate_empty_input() {
        let report =
            Aggregator::aggregate(period(), &[], &NameLookup::identity(), DEFAULT_THRESHOLD)
                .unwrap();

        assert!(report.entities.is_empty());
        assert_eq!(report.total, 0.0);
    }

    #[test]
    fn test_aggregate_all_below_threshold() {
        let groups = vec![raw("a", "0.01"), raw("b", "0.0")];

        let report =
            Aggregator::aggregate(period(), &groups, &NameLookup::identity(), DEFAULT_THRESHOLD)
                .unwrap();

        assert!(report.entities.is_empty());
        assert_eq!(report.total, 0.0);
    }

    #[test]
    fn test_aggregate_unparseable_amount_fails() {
        let groups = vec![raw("a", "1.0"), raw("b", "twelve")];

        let err = Aggregator::aggregate(period(), &groups, &NameLookup::identity(), 0.0)
            .unwrap_err();

        assert!(matches!(err, CostReportError::MalformedRecord(_)));
    }

    #[test]
    fn test_aggregate_non_finite_amount_fails() {
        for amount in ["NaN", "inf", "-infinity"] {
            let groups = vec![raw("a", amount)];
            let result = Aggregator::aggregate(period(), &groups, &NameLookup::identity(), 0.0);
            assert!(result.is_err(), "{amount} should be rejected");
        }
    }

    #[test]
    fn test_aggregate_mixed_currency_fails() {
        let mut yen = raw("b", "100");
        yen.unit = "JPY".to_string();
        // the below-threshold record still counts towards the currency check
        let groups = vec![raw("a", "0.01"), yen];

        let err = Aggregator::aggregate(period(), &groups, &NameLookup::identity(), 1.0)
            .unwrap_err();

        match err {
            CostReportError::MixedCurrency { expected, found } => {
                assert_eq!(expected, "USD");
                assert_eq!(found, "JPY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_aggregate_negative_amount_is_not_rejected() {
        let groups = vec![raw("credit", "-2.5"), raw("a", "1.0")];

        let report = Aggregator::aggregate(period(), &groups, &NameLookup::identity(), -10.0)
            .unwrap();

        assert_eq!(report.entities.len(), 2);
        assert_eq!(report.entities[1].id, "credit");
        assert!((report.total + 1.5).abs() < f64::EPSILON);
    }
}
