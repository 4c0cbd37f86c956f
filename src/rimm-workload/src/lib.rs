//! Incremental JSON workload stream decoding, schema validation, and action
//! dispatch for the rimm scheduler simulator (spec component E).

mod action;
mod decoder;
mod driver;
mod error;
pub mod schema;
mod stream;

pub use action::{Action, CheckDescriptor, ShortCheck, WorkloadEvent};
pub use decoder::{decode_one, DecodeOutcome};
pub use driver::WorkloadDriver;
pub use error::WorkloadError;
pub use stream::WorkloadStream;
