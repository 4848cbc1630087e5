//! Trace representations
//!
//! A [`Trace`] is a recorded (or synthetic) signal over time, carrying a name, a
//! comment and a set of tags. The signal itself is stored in one of three
//! representations, collected in the closed sum type [`TraceData`]:
//!
//! - [`TraceFixedDt`]: samples at a uniform timestep `dt` starting at `t0`.
//! - [`TraceVariableDt`]: samples at arbitrary non-decreasing time points.
//! - [`TracePiecewise`]: contiguous analytic pieces (flat or linear segments).
//!
//! Operations every representation supports (sampling, coverage queries, conversion to
//! a fixed timestep) live here. Optional operations (FFT, plotting hints, arithmetic)
//! are registered per [`TraceKind`] with a [`TraceMethodCtrl`](crate::TraceMethodCtrl).
mod traits;

mod fixed_dt;
pub mod interpolation;
mod piecewise;
mod variable_dt;

use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};

use enum_dispatch::enum_dispatch;

pub use self::fixed_dt::TraceFixedDt;
use self::interpolation::{Constant, Linear};
pub use self::piecewise::{Piece, PieceFunction, TracePiecewise};
pub use self::traits::*;
pub use self::variable_dt::TraceVariableDt;
use crate::tags::{TagSet, Tagged};
use crate::units::{Quantity, QuantityArray, Unit};
use crate::{Error, TraceResult};

/// Tolerance, in units of one sample interval, when locating a query time on a
/// sampling grid.
pub(crate) const GRID_TOLERANCE: f64 = 1e-9;

/// Upper bound on the number of intervals [`TraceData::resample`] will produce.
const MAX_RESAMPLE_STEPS: f64 = 1e8;

/// A single sample of a trace.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sample<T> {
    /// The time point when this sample was taken.
    pub time: f64,
    /// The value of the trace at the given sample.
    pub value: T,
}

/// The representation of a trace, used as the key of the method registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum TraceKind {
    /// [`TraceFixedDt`]
    #[display(fmt = "fixed-dt")]
    FixedDt,
    /// [`TraceVariableDt`]
    #[display(fmt = "variable-dt")]
    VariableDt,
    /// [`TracePiecewise`]
    #[display(fmt = "piecewise")]
    Piecewise,
}

/// The signal of a trace in one of the supported representations
#[enum_dispatch(TraceSampling)]
#[derive(Clone, Debug)]
pub enum TraceData {
    /// Uniformly sampled
    TraceFixedDt,
    /// Sampled at arbitrary time points
    TraceVariableDt,
    /// Contiguous analytic pieces
    TracePiecewise,
}

impl TraceData {
    /// Get the value of the signal at `time` (a magnitude in the time unit).
    ///
    /// Sampled representations use the interpolation method `I` between neighbouring
    /// samples; piecewise traces are evaluated analytically. Returns `None` outside
    /// `[min_time, max_time]`.
    pub fn value_at<I>(&self, time: f64) -> Option<f64>
    where
        I: InterpolationMethod<f64>,
    {
        match self {
            TraceData::TraceFixedDt(tr) => tr.value_at::<I>(time),
            TraceData::TraceVariableDt(tr) => tr.value_at::<I>(time),
            TraceData::TracePiecewise(tr) => tr.value_at(time),
        }
    }

    /// Check if `time` (a magnitude in the time unit) lies in `[min_time, max_time]`.
    ///
    /// Fixed timestep traces accept times a rounding error outside their grid.
    pub fn covers(&self, time: f64) -> bool {
        match self {
            TraceData::TraceFixedDt(tr) => tr.covers(time),
            _ => self.min_time() <= time && time <= self.max_time(),
        }
    }

    /// Resample the signal onto a uniform grid of step `dt` (a magnitude in the time
    /// unit) spanning `[min_time, max_time]`.
    ///
    /// Variable timestep traces are linearly interpolated between samples; piecewise
    /// traces are evaluated exactly at each grid point.
    pub fn resample(&self, dt: f64) -> TraceResult<TraceFixedDt> {
        if let TraceData::TraceFixedDt(tr) = self {
            if (tr.dt_magnitude() - dt).abs() <= dt * GRID_TOLERANCE {
                return Ok(tr.clone());
            }
        }
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(Error::InvalidTimestep(dt));
        }
        let (start, end) = (self.min_time(), self.max_time());
        let steps = ((end - start) / dt + GRID_TOLERANCE).floor();
        if !(steps.is_finite() && steps <= MAX_RESAMPLE_STEPS) {
            return Err(Error::InvalidResample {
                dt,
                reason: "the grid would have too many samples",
            });
        }
        let values = (0..=steps as usize)
            .map(|k| {
                let t = (start + k as f64 * dt).min(end);
                self.value_at::<Linear>(t).ok_or(Error::InvalidResample {
                    dt,
                    reason: "grid point outside the trace",
                })
            })
            .collect::<TraceResult<Vec<_>>>()?;
        TraceFixedDt::new(
            Quantity::new(start, self.time_unit().clone()),
            Quantity::new(dt, self.time_unit().clone()),
            QuantityArray::new(values, self.data_unit().clone()),
        )
    }
}

/// Process-wide unique identity of a [`Trace`].
///
/// Traces are compared and hashed by identity, never by content: two recordings with
/// identical samples are still distinct traces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display(fmt = "trace#{}", _0)]
pub struct TraceId(u64);

impl TraceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A signal over time together with its identity and metadata.
#[derive(Debug)]
pub struct Trace {
    id: TraceId,
    name: Option<String>,
    comment: Option<String>,
    tags: TagSet,
    data: TraceData,
}

impl Trace {
    /// Create a new anonymous, untagged trace
    pub fn new(data: impl Into<TraceData>) -> Self {
        Self {
            id: TraceId::next(),
            name: None,
            comment: None,
            tags: TagSet::new(),
            data: data.into(),
        }
    }

    /// Set the name of the trace
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the comment of the trace
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Add the given tags to the trace
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags);
        self
    }

    /// Create a new trace with new identity, carrying over the metadata of `self`.
    pub fn derive(&self, data: impl Into<TraceData>) -> Self {
        Self {
            id: TraceId::next(),
            name: self.name.clone(),
            comment: self.comment.clone(),
            tags: self.tags.clone(),
            data: data.into(),
        }
    }

    /// The identity of the trace
    pub fn id(&self) -> TraceId {
        self.id
    }

    /// The name of the trace
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The comment attached to the trace
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Mutable access to the tags, the only mutable part of a trace.
    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// The underlying representation
    pub fn data(&self) -> &TraceData {
        &self.data
    }

    /// The kind of representation
    pub fn kind(&self) -> TraceKind {
        self.data.kind()
    }

    /// Unit of the time axis
    pub fn time_unit(&self) -> &Unit {
        self.data.time_unit()
    }

    /// Unit of the data values
    pub fn data_unit(&self) -> &Unit {
        self.data.data_unit()
    }

    /// The first time covered by the trace
    pub fn min_time(&self) -> Quantity {
        Quantity::new(self.data.min_time(), self.time_unit().clone())
    }

    /// The last time covered by the trace
    pub fn max_time(&self) -> Quantity {
        Quantity::new(self.data.max_time(), self.time_unit().clone())
    }

    /// Sample the trace at `times`.
    ///
    /// Sampled traces hold the value of the preceding sample (see
    /// [`get_values_with`](Self::get_values_with) for other interpolation methods).
    /// Times outside the trace produce `None`. Fails if `times` is not in a time unit.
    pub fn get_values(&self, times: &QuantityArray) -> TraceResult<Vec<Option<Quantity>>> {
        self.get_values_with::<Constant>(times)
    }

    /// Sample the trace at `times`, interpolating with `I`.
    pub fn get_values_with<I>(&self, times: &QuantityArray) -> TraceResult<Vec<Option<Quantity>>>
    where
        I: InterpolationMethod<f64>,
    {
        let times = times.rescale(self.time_unit())?;
        let unit = self.data_unit();
        Ok(times
            .values
            .iter()
            .map(|&t| self.data.value_at::<I>(t).map(|v| Quantity::new(v, unit.clone())))
            .collect())
    }

    /// Mark which of `times` fall within `[min_time, max_time]`
    pub fn time_within_trace(&self, times: &QuantityArray) -> TraceResult<Vec<bool>> {
        let times = times.rescale(self.time_unit())?;
        Ok(times.values.iter().map(|&t| self.data.covers(t)).collect())
    }

    /// Convert the trace to a fixed timestep trace with step `dt`.
    ///
    /// The new trace has a new identity but keeps the name, comment and tags.
    pub fn to_fixed_dt(&self, dt: &Quantity) -> TraceResult<Trace> {
        let dt = dt.magnitude_in(self.time_unit())?;
        let data = self.data.resample(dt)?;
        Ok(self.derive(data))
    }

    /// Get the fixed timestep representation, if that is how the trace is stored
    pub fn as_fixed_dt(&self) -> Option<&TraceFixedDt> {
        match &self.data {
            TraceData::TraceFixedDt(tr) => Some(tr),
            _ => None,
        }
    }

    /// Get the variable timestep representation, if that is how the trace is stored
    pub fn as_variable_dt(&self) -> Option<&TraceVariableDt> {
        match &self.data {
            TraceData::TraceVariableDt(tr) => Some(tr),
            _ => None,
        }
    }

    /// Get the piecewise representation, if that is how the trace is stored
    pub fn as_piecewise(&self) -> Option<&TracePiecewise> {
        match &self.data {
            TraceData::TracePiecewise(tr) => Some(tr),
            _ => None,
        }
    }
}

impl Tagged for Trace {
    fn tags(&self) -> &TagSet {
        &self.tags
    }
}

impl PartialEq for Trace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Trace {}

impl Hash for Trace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary {
    //! In this module, we use [`mod@proptest`] to define arbitrary generators for
    //! different trace representations.
    use proptest::prelude::*;
    use proptest::sample::SizeRange;

    use super::*;

    /// Generate an arbitrary fixed timestep trace in `ms`/`mV`
    ///
    /// The size range must not admit empty traces.
    pub fn fixed_dt_trace(size: impl Into<SizeRange>) -> impl Strategy<Value = TraceFixedDt> {
        (
            -100.0..100.0f64,
            0.01..5.0f64,
            prop::collection::vec(-100.0..100.0f64, size),
        )
            .prop_map(|(t0, dt, values)| {
                TraceFixedDt::new(
                    Quantity::new(t0, Unit::ms()),
                    Quantity::new(dt, Unit::ms()),
                    QuantityArray::new(values, Unit::mv()),
                )
                .unwrap()
            })
    }

    /// Generate an arbitrary variable timestep trace in `ms`/`mV`, with non-decreasing
    /// time points
    pub fn variable_dt_trace(size: impl Into<SizeRange>) -> impl Strategy<Value = TraceVariableDt> {
        prop::collection::vec((0.0..1000.0f64, -100.0..100.0f64), size).prop_map(|mut samples| {
            samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            let (times, values): (Vec<_>, Vec<_>) = samples.into_iter().unzip();
            TraceVariableDt::new(
                QuantityArray::new(times, Unit::ms()),
                QuantityArray::new(values, Unit::mv()),
            )
            .unwrap()
        })
    }

    /// Generate an arbitrary piecewise linear trace in `ms`/`mV`
    pub fn piecewise_trace(size: impl Into<SizeRange>) -> impl Strategy<Value = TracePiecewise> {
        (
            -100.0..100.0f64,
            prop::collection::vec((0.1..10.0f64, -100.0..100.0f64, -100.0..100.0f64), size),
        )
            .prop_map(|(start, spans)| {
                let mut t = start;
                let pieces = spans
                    .into_iter()
                    .map(|(len, a, b)| {
                        let piece = Piece::linear(t, t + len, a, b);
                        t += len;
                        piece
                    })
                    .collect();
                TracePiecewise::new(pieces, Unit::ms(), Unit::mv()).unwrap()
            })
    }

    /// Generate an arbitrary trace of any representation
    pub fn trace_data(size: impl Into<SizeRange>) -> impl Strategy<Value = TraceData> {
        let size = size.into();
        prop_oneof![
            fixed_dt_trace(size.clone()).prop_map(TraceData::from),
            variable_dt_trace(size.clone()).prop_map(TraceData::from),
            piecewise_trace(size).prop_map(TraceData::from),
        ]
    }
}
