//! The enrollment session: tagged-union state, the event-driven machine
//! that moves between states, and the scope that owns its timers.

pub mod machine;
pub mod scope;
pub mod state;

pub use machine::{Collaborators, EnrollmentWorkflow, WorkflowHandle};
pub use scope::SessionScope;
pub use state::{SessionOutcome, SessionReport, WorkflowPhase, WorkflowState, WorkflowView};
