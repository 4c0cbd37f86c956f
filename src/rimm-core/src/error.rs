//! Error types for the domain model: unknown registry names and
//! malformed variable updates.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown bin packer `{0}`")]
    UnknownPacker(String),

    #[error("unknown check splitter `{0}`")]
    UnknownSplitter(String),

    #[error("unknown variable `{0}`")]
    UnknownVar(String),

    #[error("unknown rantask policy `{0}` (expected `reschedule` or `discard`)")]
    UnknownRanTaskPolicy(String),

    #[error("expected an integer value for `{0}`")]
    ExpectedInt(String),

    #[error("expected a string value for `{0}`")]
    ExpectedString(String),
}
