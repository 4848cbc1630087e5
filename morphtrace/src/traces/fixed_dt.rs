use super::{InterpolationMethod, Sample, TraceData, TraceKind, TraceSampling, GRID_TOLERANCE};
use crate::units::{Quantity, QuantityArray, Unit};
use crate::{Error, TraceResult};

/// A trace sampled at a uniform timestep `dt`, starting at `t0`.
#[derive(Clone, Debug)]
pub struct TraceFixedDt {
    t0: f64,
    dt: f64,
    time_unit: Unit,
    data: Vec<f64>,
    data_unit: Unit,
}

impl TraceFixedDt {
    /// Create a fixed timestep trace.
    ///
    /// The time unit of the trace is the unit of `dt`. Fails if `dt` is not strictly
    /// positive, if `t0` is not finite, if `t0` or `dt` are not times, or if there are
    /// no samples.
    pub fn new(t0: Quantity, dt: Quantity, data: QuantityArray) -> TraceResult<Self> {
        dt.unit.conversion_factor(&Unit::s())?;
        if !(dt.value > 0.0 && dt.value.is_finite()) {
            return Err(Error::InvalidTimestep(dt.value));
        }
        if data.is_empty() {
            return Err(Error::EmptyTrace);
        }
        let t0 = t0.magnitude_in(&dt.unit)?;
        if !t0.is_finite() {
            return Err(Error::NonFiniteTime { index: 0, value: t0 });
        }
        Ok(Self {
            t0,
            dt: dt.value,
            time_unit: dt.unit,
            data: data.values,
            data_unit: data.unit,
        })
    }

    /// Start time of the trace
    pub fn t0(&self) -> Quantity {
        Quantity::new(self.t0, self.time_unit.clone())
    }

    /// Sampling interval of the trace
    pub fn dt(&self) -> Quantity {
        Quantity::new(self.dt, self.time_unit.clone())
    }

    pub(crate) fn dt_magnitude(&self) -> f64 {
        self.dt
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: construction rejects empty traces.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw sample magnitudes, in the data unit
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// The samples with their unit
    pub fn data_pts(&self) -> QuantityArray {
        QuantityArray::new(self.data.clone(), self.data_unit.clone())
    }

    /// The time of every sample
    pub fn time_pts(&self) -> QuantityArray {
        let times = (0..self.data.len()).map(|i| self.time_of(i)).collect();
        QuantityArray::new(times, self.time_unit.clone())
    }

    fn time_of(&self, index: usize) -> f64 {
        self.t0 + index as f64 * self.dt
    }

    /// Check that `other` is sampled on exactly the same grid as `self`.
    pub(crate) fn same_grid(&self, other: &TraceFixedDt) -> TraceResult<()> {
        let factor = other.time_unit.conversion_factor(&self.time_unit)?;
        let tol = self.dt * GRID_TOLERANCE;
        if self.len() != other.len()
            || (self.dt - other.dt * factor).abs() > tol
            || (self.t0 - other.t0 * factor).abs() > tol
        {
            return Err(Error::MismatchedGrid);
        }
        Ok(())
    }

    /// Copy of `self` with new data values, on the same grid
    pub(crate) fn with_data(&self, data: Vec<f64>, data_unit: Unit) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            t0: self.t0,
            dt: self.dt,
            time_unit: self.time_unit.clone(),
            data,
            data_unit,
        }
    }

    /// Check if `time` lies in `[min_time, max_time]`, allowing for rounding error of a
    /// fraction of a sample at both ends.
    pub(crate) fn covers(&self, time: f64) -> bool {
        let pos = (time - self.t0) / self.dt;
        -GRID_TOLERANCE <= pos && pos <= (self.data.len() - 1) as f64 + GRID_TOLERANCE
    }

    /// Look up the value at `time` in O(1).
    ///
    /// The sample index is `floor((time - t0) / dt)`. Between two samples, `I` decides
    /// the value; [`Constant`](super::interpolation::Constant) keeps the sample at that
    /// index.
    pub(crate) fn value_at<I>(&self, time: f64) -> Option<f64>
    where
        I: InterpolationMethod<f64>,
    {
        if !self.covers(time) {
            return None;
        }
        let last = self.data.len() - 1;
        let pos = ((time - self.t0) / self.dt).max(0.0);
        let idx = ((pos + GRID_TOLERANCE).floor() as usize).min(last);
        if idx == last || (pos - idx as f64).abs() <= GRID_TOLERANCE {
            return Some(self.data[idx]);
        }
        let first = Sample {
            time: self.time_of(idx),
            value: self.data[idx],
        };
        let second = Sample {
            time: self.time_of(idx + 1),
            value: self.data[idx + 1],
        };
        I::at(&first, &second, time.clamp(first.time, second.time))
    }
}

impl TraceSampling for TraceFixedDt {
    fn kind(&self) -> TraceKind {
        TraceKind::FixedDt
    }

    fn time_unit(&self) -> &Unit {
        &self.time_unit
    }

    fn data_unit(&self) -> &Unit {
        &self.data_unit
    }

    fn min_time(&self) -> f64 {
        self.t0
    }

    fn max_time(&self) -> f64 {
        self.time_of(self.data.len() - 1)
    }

    fn affine(&self, scale: f64, offset: f64, unit: Unit) -> TraceData {
        let data = self.data.iter().map(|v| scale * v + offset).collect();
        self.with_data(data, unit).into()
    }
}
