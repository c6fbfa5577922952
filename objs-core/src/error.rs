/*!
Error types for the Objs core library.
*/

use crate::types::ValueKind;
use thiserror::Error;

/// Result type used throughout the Objs core.
pub type Result<T> = std::result::Result<T, ObjsError>;

/// Errors that can occur while cloning, comparing or snapshotting values.
#[derive(Error, Debug)]
pub enum ObjsError {
    /// Invalid Snapshotter configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation received an argument it can not act on
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    /// The value has never been saved by the Snapshotter
    #[error("Value has no snapshots")]
    NotTracked,

    /// The value is tracked but its history is empty
    #[error("No snapshot left to {0}")]
    Exhausted(&'static str),

    /// Tracing subscriber or metrics registry setup failed
    #[error("Observability error: {0}")]
    Observability(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The ways an argument can be rejected before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    /// `null` or `undefined` where a value was required
    #[error("{0} is not defined")]
    NotDefined(&'static str),

    #[error("could not act on a primitive value")]
    Primitive,

    /// Dates and functions can not be synchronized or tracked in place
    #[error("could not act on an immutable {0} value")]
    Immutable(ValueKind),

    /// Id tracking requires the identifier property
    #[error("value does not define an '{0}' property")]
    MissingIdentifier(String),

    #[error("source and target types differ")]
    TypeMismatch,

    #[error("could not act on same instances")]
    SameInstance,

    /// The value graph contains a cycle and can not be serialized
    #[error("value contains a circular reference")]
    Circular,
}

impl ObjsError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new observability error
    pub fn observability<S: Into<String>>(msg: S) -> Self {
        Self::Observability(msg.into())
    }

    /// Whether this error is an invalid argument of the given kind
    pub fn is_invalid_argument(&self, kind: &InvalidArgument) -> bool {
        matches!(self, Self::InvalidArgument(inner) if inner == kind)
    }
}
