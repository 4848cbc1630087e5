use itertools::Itertools;

use super::{InterpolationMethod, Sample, TraceData, TraceKind, TraceSampling};
use crate::units::{QuantityArray, Unit};
use crate::{Error, TraceResult};

/// A trace sampled at arbitrary, non-decreasing time points.
#[derive(Clone, Debug)]
pub struct TraceVariableDt {
    time_pts: Vec<f64>,
    time_unit: Unit,
    data: Vec<f64>,
    data_unit: Unit,
}

impl TraceVariableDt {
    /// Create a variable timestep trace from parallel sequences of times and values.
    ///
    /// Fails if the sequences differ in length, are empty, if a time point is NaN or
    /// infinite, or if the time points ever decrease.
    pub fn new(time_pts: QuantityArray, data_pts: QuantityArray) -> TraceResult<Self> {
        time_pts.unit.conversion_factor(&Unit::s())?;
        if time_pts.len() != data_pts.len() {
            return Err(Error::MismatchedLengths {
                time_points: time_pts.len(),
                values: data_pts.len(),
            });
        }
        if time_pts.is_empty() {
            return Err(Error::EmptyTrace);
        }
        if let Some((index, &value)) = time_pts.values.iter().find_position(|t| !t.is_finite()) {
            return Err(Error::NonFiniteTime { index, value });
        }
        if let Some((index, _)) = time_pts
            .values
            .iter()
            .tuple_windows()
            .find_position(|(prev, next)| !(prev <= next))
        {
            return Err(Error::NonMonotonicTrace { index: index + 1 });
        }
        Ok(Self {
            time_pts: time_pts.values,
            time_unit: time_pts.unit,
            data: data_pts.values,
            data_unit: data_pts.unit,
        })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: construction rejects empty traces.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The time points of the samples
    pub fn time_pts(&self) -> QuantityArray {
        QuantityArray::new(self.time_pts.clone(), self.time_unit.clone())
    }

    /// The sample values
    pub fn data_pts(&self) -> QuantityArray {
        QuantityArray::new(self.data.clone(), self.data_unit.clone())
    }

    /// The raw sample magnitudes, in the data unit
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// The raw time magnitudes, in the time unit
    pub fn times(&self) -> &[f64] {
        &self.time_pts
    }

    /// Copy of `self` with new data values at the same time points
    pub(crate) fn with_data(&self, data: Vec<f64>, data_unit: Unit) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            time_pts: self.time_pts.clone(),
            time_unit: self.time_unit.clone(),
            data,
            data_unit,
        }
    }

    /// Get the value at `time`.
    ///
    /// The preceding sample is located by binary search; between two samples `I`
    /// decides the value. When several samples share a time point, the last one wins.
    pub(crate) fn value_at<I>(&self, time: f64) -> Option<f64>
    where
        I: InterpolationMethod<f64>,
    {
        if !(self.min_time() <= time && time <= self.max_time()) {
            return None;
        }
        let idx = self.time_pts.partition_point(|&t| t <= time) - 1;
        if idx == self.time_pts.len() - 1 || self.time_pts[idx] == time {
            return Some(self.data[idx]);
        }
        let first = Sample {
            time: self.time_pts[idx],
            value: self.data[idx],
        };
        let second = Sample {
            time: self.time_pts[idx + 1],
            value: self.data[idx + 1],
        };
        I::at(&first, &second, time)
    }
}

impl TraceSampling for TraceVariableDt {
    fn kind(&self) -> TraceKind {
        TraceKind::VariableDt
    }

    fn time_unit(&self) -> &Unit {
        &self.time_unit
    }

    fn data_unit(&self) -> &Unit {
        &self.data_unit
    }

    fn min_time(&self) -> f64 {
        self.time_pts[0]
    }

    fn max_time(&self) -> f64 {
        self.time_pts[self.time_pts.len() - 1]
    }

    fn affine(&self, scale: f64, offset: f64, unit: Unit) -> TraceData {
        let data = self.data.iter().map(|v| scale * v + offset).collect();
        self.with_data(data, unit).into()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::super::arbitrary;
    use super::super::interpolation::{Constant, Linear, Nearest};
    use super::*;

    fn trace(times: Vec<f64>, values: Vec<f64>) -> TraceResult<TraceVariableDt> {
        TraceVariableDt::new(QuantityArray::new(times, Unit::ms()), QuantityArray::new(values, Unit::mv()))
    }

    #[test]
    fn reject_bad_construction() {
        assert!(matches!(
            trace(vec![0.0, 1.0], vec![1.0]),
            Err(Error::MismatchedLengths {
                time_points: 2,
                values: 1
            })
        ));
        assert!(matches!(
            trace(vec![0.0, 2.0, 1.0], vec![1.0, 2.0, 3.0]),
            Err(Error::NonMonotonicTrace { index: 2 })
        ));
        assert!(matches!(trace(vec![], vec![]), Err(Error::EmptyTrace)));
        assert!(matches!(
            trace(vec![0.0, f64::INFINITY], vec![1.0, 2.0]),
            Err(Error::NonFiniteTime { index: 1, .. })
        ));
        assert!(matches!(
            trace(vec![f64::NAN, 1.0], vec![1.0, 2.0]),
            Err(Error::NonFiniteTime { index: 0, .. })
        ));
    }

    #[test]
    fn step_hold_by_default() {
        let tr = trace(vec![0.0, 1.0, 4.0], vec![0.0, 10.0, 40.0]).unwrap();
        assert_eq!(tr.value_at::<Constant>(0.5), Some(0.0));
        assert_eq!(tr.value_at::<Constant>(1.0), Some(10.0));
        assert_eq!(tr.value_at::<Constant>(3.9), Some(10.0));
        assert_eq!(tr.value_at::<Constant>(4.0), Some(40.0));
        assert_eq!(tr.value_at::<Constant>(4.1), None);
        assert_eq!(tr.value_at::<Constant>(-0.1), None);
    }

    #[test]
    fn interpolation_on_request() {
        let tr = trace(vec![0.0, 1.0, 4.0], vec![0.0, 10.0, 40.0]).unwrap();
        assert_eq!(tr.value_at::<Linear>(2.5), Some(25.0));
        assert_eq!(tr.value_at::<Nearest>(3.0), Some(40.0));
        assert_eq!(tr.value_at::<Nearest>(2.0), Some(10.0));
    }

    #[test]
    fn repeated_time_points() {
        let tr = trace(vec![0.0, 1.0, 1.0, 2.0], vec![0.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(tr.value_at::<Constant>(1.0), Some(7.0));
        assert_eq!(tr.value_at::<Linear>(1.5), Some(8.0));
    }

    proptest! {
        #[test]
        fn samples_are_recovered(tr in arbitrary::variable_dt_trace(1..100)) {
            for (i, t) in tr.times().iter().enumerate() {
                let last_at_t = tr.times().iter().rposition(|x| x == t).unwrap();
                prop_assert_eq!(tr.value_at::<Constant>(*t), Some(tr.data()[last_at_t]), "sample {}", i);
            }
        }
    }
}
