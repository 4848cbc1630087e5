//! Input and output of traces and event sets

pub mod csv;

pub use self::csv::{ColumnHeader, EventSetHeader, NeuroCsvWriter};
