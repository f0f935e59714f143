//! Services for cost aggregation, rendering and delivery

pub mod aggregator;
pub mod cost_source;
pub mod orchestrator;
pub mod renderer;
pub mod reporter;

pub use aggregator::Aggregator;
pub use cost_source::{CostExplorerSource, CostQuery, CostSource, ResponseFileSource};
pub use orchestrator::{CostReportService, ReportConfig, RunSummary};
pub use renderer::{format_cost, Renderer};
pub use reporter::{Reporter, SlackReporter, StdoutReporter};
