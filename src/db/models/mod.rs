pub mod interruption;
pub mod work_session;

pub use interruption::Interruption;
pub use work_session::{SessionKey, WorkSession};
