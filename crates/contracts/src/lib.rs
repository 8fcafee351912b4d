//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the reading model,
//! dwell windows, appearance records, the stream schema descriptor and the sink trait.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every reading carries a timestamp attribute parsed into [`Timestamp`]
//! - Readings arrive in non-decreasing timestamp order per stream

mod blueprint;
mod error;
mod flush;
mod reading;
mod record;
mod schema;
mod sink;
mod tag_id;
mod timestamp;

pub use blueprint::*;
pub use error::*;
pub use flush::FlushReport;
pub use reading::*;
pub use record::*;
pub use schema::*;
pub use sink::*;
pub use tag_id::TagId;
pub use timestamp::Timestamp;

/// Reserved wire key that ends a live session.
pub const QUIT_SENTINEL: &str = "QUIT";

/// Reserved wire key that ends one logical run without closing the session.
pub const END_SENTINEL: &str = "END";
