//! Shared pieces of the dosefit examples: logging setup and a toy Gs signaling network
//! integrated with a fixed-step Runge-Kutta scheme.
mod gs_cascade;
mod logging;

pub use gs_cascade::{GsCascade, GsModel, Rk4};
pub use logging::init_tracing;
