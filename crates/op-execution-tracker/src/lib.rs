//! OP Execution Tracker - Job orchestration over the tool runner
//!
//! Layers, outermost first:
//! - `AnalysisExecutionService`: synchronous and asynchronous entry points
//! - `JobExecutionService`: job records and the PENDING/RUNNING/terminal state machine
//! - `PluginExecutionService`: thin seam over `op_tools::ToolRunner`

pub mod analysis;
pub mod job;
pub mod job_service;
pub mod metrics;
pub mod plugin_service;

pub use analysis::AnalysisExecutionService;
pub use job::JobRecord;
pub use job_service::{JobEvent, JobExecutionService};
pub use metrics::JobMetrics;
pub use plugin_service::PluginExecutionService;
