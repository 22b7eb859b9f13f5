//! Live bridge from a gateway job to a server-sent event stream.
//!
//! [`frame`] encodes and queues named frames for the HTTP body;
//! [`session`] drives one job's events into those frames until a
//! terminal condition.

pub mod frame;
pub mod session;

pub use frame::{FrameKind, FrameWriter};
pub use session::{run_session, BridgeSettings, SessionOutcome};
