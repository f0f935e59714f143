//! Daily AWS cost breakdown posted to Slack
//!
//! Queries Cost Explorer for one window, ranks the grouped costs per period,
//! and renders one Slack message per period.

pub mod cli;
pub mod services;
pub mod types;
