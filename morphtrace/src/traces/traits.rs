//! Helper traits for traces.

use enum_dispatch::enum_dispatch;

use super::{Sample, TraceData, TraceKind};
use crate::units::Unit;

/// Trait implemented by interpolation strategies
pub trait InterpolationMethod<T> {
    /// Compute the interpolation of two samples at `time`.
    ///
    /// Returns `None` if it isn't possible to interpolate at the given time using the
    /// given samples.
    fn at(a: &Sample<T>, b: &Sample<T>, time: f64) -> Option<T>;
}

/// Capabilities shared by every trace representation.
///
/// Times and values are magnitudes in [`time_unit`](Self::time_unit) and
/// [`data_unit`](Self::data_unit) respectively.
#[enum_dispatch]
pub trait TraceSampling {
    /// The representation of the trace
    fn kind(&self) -> TraceKind;
    /// The unit of the time axis
    fn time_unit(&self) -> &Unit;
    /// The unit of the data values
    fn data_unit(&self) -> &Unit;
    /// The first time covered by the trace
    fn min_time(&self) -> f64;
    /// The last time covered by the trace
    fn max_time(&self) -> f64;
    /// Apply `v -> scale * v + offset` to every value and relabel the data unit.
    fn affine(&self, scale: f64, offset: f64, unit: Unit) -> TraceData;
}
