//! Live ingestion of a flow-shop solver's event stream and the Gantt layout
//! derived from it.
//!
//! ```text
//!   child stdout/stderr ──▶ wire::decode ──▶ IterationStore ──▶ layout ──▶ views ──▶ RenderCommand[]
//!        (supervisor)         (SolverEvent)     (per-iteration     (LayoutModel)   (gantt,
//!                                                slots + colors)                    time axis)
//! ```

pub mod config;
pub mod layout;
pub mod model;
pub mod store;
pub mod supervisor;
pub mod svg;
pub mod validator;
pub mod views;
pub mod wire;

pub use layout::{LayoutModel, layout};
pub use model::{Iteration, Slot, SolverEvent};
pub use store::IterationStore;
pub use supervisor::{RunHandle, RunUpdate, Supervisor, SupervisorConfig};
pub use validator::{InstanceSummary, ValidationError, validate_instance};
