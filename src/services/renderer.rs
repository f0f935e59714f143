//! Renderer service for turning a report into notification text

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::types::{EntityCost, Message, MessageLine, Report};

/// Fractional digits shown for every amount
pub const COST_FRACTION_DIGITS: u32 = 3;

/// Renderer for cost reports
pub struct Renderer;

impl Renderer {
    /// Render a report under a fixed section title.
    ///
    /// The summary total is rounded once from the unrounded sum, so it never
    /// drifts from the per-line values by accumulated rounding.
    pub fn render(report: &Report, section_title: &str) -> Message {
        let lines = report
            .entities
            .iter()
            .map(|entity| MessageLine {
                label: entity_label(entity),
                value: format_amount(entity.cost),
            })
            .collect();

        let summary = format!(
            "AWS cost for *{}* is *{}*",
            report.period.start_str(),
            format_amount(report.total)
        );

        Message {
            title: section_title.to_string(),
            lines,
            summary,
        }
    }
}

/// `"Name (id)"` when the name differs from the key, otherwise the key alone
fn entity_label(entity: &EntityCost) -> String {
    if entity.display_name == entity.id {
        entity.display_name.clone()
    } else {
        format!("{} ({})", entity.display_name, entity.id)
    }
}

/// `"$ 95.001"`
pub fn format_amount(cost: f64) -> String {
    format!("$ {}", format_cost(cost))
}

/// Format a cost with exactly three fractional digits, rounding half away
/// from zero.
///
/// Rounding applies to the shortest decimal that round-trips to `cost`
/// (`0.0625` becomes `0.063`, `2.0005` becomes `2.001`). Values outside the
/// decimal range fall back to the standard fixed-point formatter.
///
/// # Examples
/// ```
/// use awscost::services::renderer::format_cost;
///
/// assert_eq!(format_cost(95.0012729986), "95.001");
/// assert_eq!(format_cost(0.06), "0.060");
/// ```
pub fn format_cost(cost: f64) -> String {
    // f64 Display never uses exponent notation and prints the shortest repr
    let Ok(value) = Decimal::from_str(&cost.to_string()) else {
        return format!("{:.*}", COST_FRACTION_DIGITS as usize, cost);
    };

    let mut rounded =
        value.round_dp_with_strategy(COST_FRACTION_DIGITS, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        // drop the sign of -0.000
        rounded = Decimal::ZERO;
    }
    rounded.rescale(COST_FRACTION_DIGITS);
    rounded.to_string()
}
