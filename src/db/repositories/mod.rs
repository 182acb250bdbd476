mod interruptions;
mod work_sessions;

pub use work_sessions::{Counter, KeyTotals, SecondsUpdate};
