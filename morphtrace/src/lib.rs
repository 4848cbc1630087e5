//! # `morphtrace`
//!
//! Time-series ("traces") and discrete events recorded from compartmental neuron
//! simulations, together with the machinery used to post-process them. Mainly, the
//! crate provides:
//!
//! 1. Three representations of a continuous signal: fixed timestep, variable timestep
//!    and piecewise-analytic (see [`traces`]).
//! 2. A plugin registry that maps `(trace kind, operation)` to an implementation, with
//!    fallback through fixed timestep conversion and an operator table (see
//!    [`methods`]).
//! 3. Timestamped events and event sets (see [`events`]).
//! 4. String tags and a small query language to select traces by their tags (see
//!    [`tags`]).
//! 5. A self-describing plain text format for a collection of traces and events (see
//!    [`io::csv`]).
//! 6. A list of possible errors any component can generate (see [`enum@Error`]).

pub mod events;
pub mod io;
pub mod methods;
pub mod results;
pub mod tags;
pub mod traces;
pub mod units;

pub use events::{Event, EventSet};
pub use io::csv::NeuroCsvWriter;
pub use methods::{FrozenMethodCtrl, MethodArgs, MethodOutput, RegisterOpts, TraceMethodCtrl};
pub use results::{ResultSet, TraceSource};
pub use tags::{parse_str, TagSelector, TagSet, Tagged};
pub use traces::{Trace, TraceData, TraceFixedDt, TraceKind, TracePiecewise, TraceVariableDt};
pub use units::{Quantity, QuantityArray, Unit};

use thiserror::Error;

/// Errors generated by all components of the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Parallel sequences handed to a constructor have different lengths
    #[error("mismatched lengths: {time_points} time points but {values} values")]
    MismatchedLengths {
        /// Number of time points
        time_points: usize,
        /// Number of data values
        values: usize,
    },

    /// The time points of a trace decrease somewhere
    #[error("time points must be non-decreasing, but sample {index} is earlier than its predecessor")]
    NonMonotonicTrace {
        /// Index of the offending sample
        index: usize,
    },

    /// Pieces of a piecewise trace are empty, unsorted, overlapping or not contiguous
    #[error("invalid piece {index} in piecewise trace: {reason}")]
    InvalidPiecewise {
        /// Index of the offending piece
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// A fixed timestep trace needs a strictly positive timestep
    #[error("timestep must be strictly positive, got {0}")]
    InvalidTimestep(f64),

    /// A start time or time point is NaN or infinite
    #[error("time points must be finite, got {value} at index {index}")]
    NonFiniteTime {
        /// Index of the offending time point
        index: usize,
        /// The offending value
        value: f64,
    },

    /// Resampling onto a fixed timestep grid is not possible
    #[error("cannot resample with timestep {dt}: {reason}")]
    InvalidResample {
        /// The requested timestep, in the time unit of the trace
        dt: f64,
        /// What went wrong
        reason: &'static str,
    },

    /// The trace has no samples or no pieces
    #[error("trace must contain at least one sample")]
    EmptyTrace,

    /// Two fixed timestep traces do not share the same time grid
    #[error("traces are not sampled on the same time grid")]
    MismatchedGrid,

    /// No direct registration and no fallback for the method
    #[error("no method `{method}` registered for {kind} traces")]
    MethodNotFound {
        /// Kind of the trace the method was requested for
        kind: traces::TraceKind,
        /// Name of the method
        method: String,
    },

    /// A resolved method was called on a trace of another kind
    #[error("method `{method}` was resolved for {expected} traces, but called on a {found} trace")]
    WrongTraceKind {
        /// Name of the method
        method: String,
        /// Kind the method was resolved for
        expected: traces::TraceKind,
        /// Kind of the trace it was called on
        found: traces::TraceKind,
    },

    /// No operator registered for the exact operand kinds
    #[error("no operator registered for `{lhs} {op} {rhs}`")]
    OperatorNotFound {
        /// The operator symbol
        op: methods::BinOp,
        /// Left operand kind
        lhs: methods::OperandKind,
        /// Right operand kind
        rhs: methods::OperandKind,
    },

    /// A method resolved through fixed timestep conversion but no target timestep was given
    #[error("method `{method}` on {kind} traces needs a resample interval to convert to a fixed timestep trace")]
    MissingResampleInterval {
        /// Kind of the trace being converted
        kind: traces::TraceKind,
        /// Name of the method
        method: String,
    },

    /// A method argument is missing or has the wrong type
    #[error("invalid argument `{name}` for method `{method}`: expected {expected}")]
    InvalidArgument {
        /// Name of the method
        method: String,
        /// Name of the argument
        name: String,
        /// What was expected
        expected: &'static str,
    },

    /// The tag selector could not be parsed
    #[error("invalid tag selector `{selector}`: {reason} at {start}..{end} (`{fragment}`)")]
    InvalidSelector {
        /// The complete selector source
        selector: String,
        /// The offending part of the source
        fragment: String,
        /// Start offset of the offending part
        start: usize,
        /// End offset of the offending part
        end: usize,
        /// Parser diagnostic
        reason: String,
    },

    /// The method was already registered for this trace kind
    #[error("method `{method}` is already registered for {kind} traces")]
    DuplicateMethod {
        /// Kind of the trace
        kind: traces::TraceKind,
        /// Name of the method
        method: String,
    },

    /// The operator was already registered for these operand kinds
    #[error("operator `{lhs} {op} {rhs}` is already registered")]
    DuplicateOperator {
        /// The operator symbol
        op: methods::BinOp,
        /// Left operand kind
        lhs: methods::OperandKind,
        /// Right operand kind
        rhs: methods::OperandKind,
    },

    /// Fallback through conversion may only be declared by a fixed timestep registration
    #[error("method `{method}`: fallback to fixed timestep traces can only be declared on a fixed timestep registration, not {kind}")]
    InvalidFallback {
        /// Kind the registration was attempted for
        kind: traces::TraceKind,
        /// Name of the method
        method: String,
    },

    /// Two traces (or event sets) in one result set share a name
    #[error("name `{0}` is already used in this result set")]
    DuplicateTraceName(String),

    /// Conversion between units of different dimensions
    #[error("cannot convert `{from}` to `{to}`: incompatible dimensions")]
    IncompatibleUnits {
        /// Source unit
        from: String,
        /// Target unit
        to: String,
    },

    /// The unit symbol is not known
    #[error("unknown unit `{0}`")]
    UnknownUnit(String),

    /// A header line of the text format could not be read back
    #[error("malformed header line `{0}`")]
    InvalidHeader(String),

    /// Writing the output failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Encoding or decoding a header failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Alias for [`Error`]
pub type TraceError = Error;
/// Alias for [`Result<T, Error>`]
pub type TraceResult<T> = Result<T, Error>;
