//! Operators for exercising pipelines in tests.
//!
//! # Example
//!
//! ```no_run
//! use sluice_executor::fragment::Fragment;
//! use sluice_executor::testing::{CountingSource, Forwarder, RecordingSink};
//!
//! # fn main() -> sluice_core::Result<()> {
//! let mut fragment = Fragment::new("relay");
//! let source = fragment.make_operator("source", CountingSource::new(5))?;
//! let relay = fragment.make_operator("relay", Forwarder::<i64>::new())?;
//! let (sink, log) = RecordingSink::<i64>::new();
//! let sink = fragment.make_operator("sink", sink)?;
//! fragment.add_flow(source, relay, &[])?;
//! fragment.add_flow(relay, sink, &[])?;
//! fragment.run_blocking()?;
//! assert_eq!(log.values(), vec![1, 2, 3, 4, 5]);
//! # Ok(())
//! # }
//! ```

mod operators;

pub use operators::{
    CountingSource, EventLog, FailingOperator, Forwarder, LifecycleProbe, RecordingSink, SharedLog,
};
