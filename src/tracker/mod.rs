pub mod controller;
pub mod state;

pub use controller::{SessionTracker, StartReceipt, TransitionOutcome, TransitionReceipt};
pub use state::TrackerStatus;
