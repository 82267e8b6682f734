//! Atomic readiness checks. Each one takes its own [`PollPolicy`](crate::utils::retry::PollPolicy)
//! so the controller can give process, network, application and log conditions separate
//! budgets.

pub mod host;
pub mod http;
pub mod logs;
pub mod port;

pub use host::{wait_for_unit_active, Host, SystemdHost, UnitState};
pub use http::{fetch_success_body, wait_for_http_success};
pub use logs::{
    find_unwanted_pattern, scan_log_for_pattern, LogMatch, NON_200_SEQUENCER_STATUS_PATTERN,
    PANIC_PATTERN,
};
pub use port::wait_for_port_open;
