pub mod args;
pub mod controller;
pub mod report;
pub mod status;

pub use args::{parse_runtime_args, RuntimeArgs};
pub use controller::{RunController, Stage, StageFailure};
pub use report::{ContractValue, FailureRecord, RunReport, StageRecord, StageStatus};
pub use status::{config_summary, emit_run_config_status, render_config_explanation};
