//! Session layer tying the exodus engine to a host embedding.

pub mod session;

pub use session::{LeaveDecision, LeaverSession, SETTLE_DELAY};
