pub mod convergence;
pub mod endpoints;

pub use convergence::{
    assess_history, network_update_count, wait_for_value_change, ConvergenceMonitor,
};
pub use endpoints::{
    check_shape, EndpointCheck, EndpointOutcome, EndpointSpec, EndpointVerifier, ExpectedShape,
    Surface, ENDPOINT_SPECS, REQUIRED_METRICS_KEYS,
};
