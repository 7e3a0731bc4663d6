//! Dialogue logic for the voice enrollment skill.
//!
//! Everything here is synchronous and free of I/O: handlers take the current
//! state plus one decoded bus message and return a [`Step`] of effects. The
//! runtime in `omva-skill` owns the bus and executes those effects.

pub mod deletion;
pub mod dialog;
pub mod enrollment;
pub mod errors;
pub mod health;
pub mod intent;
pub mod names;
pub mod samples;
pub mod session;
pub mod verification;

pub use dialog::Dialog;
pub use enrollment::{EnrollmentContext, EnrollmentStage, LastError, RetryOffer};
pub use errors::map_plugin_error;
pub use health::{HealthConfig, HealthMonitor, HealthStatus};
pub use intent::{recognize, Confirmation, Intent};
pub use session::{ActiveFlow, Session, Step};
