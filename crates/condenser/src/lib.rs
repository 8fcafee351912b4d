//! # Condenser
//!
//! Appearance condensation: folds sightings into per-(object, reader) dwell
//! windows and closes them into [`contracts::AppearanceRecord`]s.
//!
//! ## Update rule
//!
//! The first sighting of a key opens a window; every later sighting only moves
//! its end.
//!
//! ## Flush rule
//!
//! `flush(protected)` evicts every window except `protected`. With a drain
//! limit configured, a pass that leaves at most that many windows evicts them
//! as well. `flush(None)` evicts everything.
//!
//! ```ignore
//! use condenser::Condenser;
//!
//! let condenser = Condenser::new(sink, Some(2));
//! condenser.observe(schema.bind(reading)?);
//! let report = condenser.flush(Some(&current_key)).await;
//! ```

mod condenser;
mod sequence;
mod table;

pub use condenser::Condenser;
pub use contracts::FlushReport;
pub use sequence::RecordSequence;
pub use table::CondensationTable;
