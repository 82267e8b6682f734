//! Sequencer pipeline verifier.
//!
//! Drives an oracle-reporting deployment (reporter, sequencer, two local chains) through boot,
//! readiness, endpoint-shape, convergence and cross-chain stages, stopping at the first failure.

pub mod chain;
pub mod error;
pub mod probes;
pub mod runtime;
pub mod utils;
pub mod verifier;

pub mod config {
    pub mod chains;
}
