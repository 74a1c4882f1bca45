//! edgemesh-placement — picks the device that runs a service request.
//!
//! A request names a service and, per acceptable execution type, the
//! command to run. The orchestrator resolves candidate devices from the
//! registry, scores them concurrently under a deadline, ranks them, guards
//! local execution with the service validator, and hands the winner to the
//! executor.
//!
//! # Components
//!
//! - **`candidate`** — Candidate resolution over the device registry
//! - **`orchestrator`** — Request state machine, fan-out, ranking, dispatch
//! - **`validator`** — Command and requester checks for local execution
//! - **`executor`** — Seam to the process executors
//! - **`request`** — Request/result types and the result vocabulary

pub mod candidate;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod request;
pub mod validator;

pub use candidate::{ExecutionCandidate, resolve};
pub use error::{PlacementError, PlacementErrorResult};
pub use executor::{ExecutionError, ExecutionRequest, ExecutionStatus, Executor};
pub use orchestrator::{DEFAULT_DEADLINE, Orchestrator, OrchestratorConfig};
pub use request::{
    ExecOptions, PlacementResult, RequestServiceInfo, ResultMessage, ScoringMode, ServiceRequest,
};
pub use validator::{SHELL_METACHARACTERS, ServiceValidator, ValidationError, ValidationResult};
