//! Interpolation methods for sampled traces

use num_traits::Float;

use super::{InterpolationMethod, Sample};

/// Constant interpolation, or "step-hold".
///
/// Here, the previous sample value is propagated to the requested time point.
pub struct Constant;

impl<T: Clone> InterpolationMethod<T> for Constant {
    fn at(a: &Sample<T>, b: &Sample<T>, time: f64) -> Option<T> {
        if time == b.time {
            Some(b.value.clone())
        } else if a.time <= time && time < b.time {
            Some(a.value.clone())
        } else {
            None
        }
    }
}

/// Nearest interpolation.
///
/// Here, the value from the nearest sample (time-wise) is propagated to the requested
/// time point. Ties go to the later sample.
pub struct Nearest;

impl<T: Clone> InterpolationMethod<T> for Nearest {
    fn at(a: &Sample<T>, b: &Sample<T>, time: f64) -> Option<T> {
        if time < a.time || time > b.time {
            None
        } else if (b.time - time) > (time - a.time) {
            Some(a.value.clone())
        } else {
            Some(b.value.clone())
        }
    }
}

/// Linear interpolation between the two neighbouring samples.
pub struct Linear;

impl<T: Float> InterpolationMethod<T> for Linear {
    fn at(first: &Sample<T>, second: &Sample<T>, time: f64) -> Option<T> {
        if time < first.time || time > second.time {
            return None;
        }
        let span = second.time - first.time;
        if span <= 0.0 {
            // Repeated time point: hold the later value.
            return Some(second.value);
        }
        let t: T = num_traits::cast((time - first.time) / span)?;
        let (a, b) = (first.value, second.value);

        if !a.is_finite() || !b.is_finite() {
            return <Constant as InterpolationMethod<T>>::at(first, second, time);
        }
        // Stable linear interpolation
        // https://www.open-std.org/jtc1/sc22/wg21/docs/papers/2019/p0811r3.html
        let val = if (a <= T::zero() && b >= T::zero()) || (a >= T::zero() && b <= T::zero()) {
            t * b + (T::one() - t) * a
        } else if t == T::one() {
            b
        } else {
            a + t * (b - a)
        };
        Some(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> (Sample<f64>, Sample<f64>) {
        (Sample { time: 1.0, value: 10.0 }, Sample { time: 3.0, value: 20.0 })
    }

    #[test]
    fn constant_holds_previous() {
        let (a, b) = samples();
        assert_eq!(<Constant as InterpolationMethod<f64>>::at(&a, &b, 1.0), Some(10.0));
        assert_eq!(<Constant as InterpolationMethod<f64>>::at(&a, &b, 2.9), Some(10.0));
        assert_eq!(<Constant as InterpolationMethod<f64>>::at(&a, &b, 3.0), Some(20.0));
        assert_eq!(<Constant as InterpolationMethod<f64>>::at(&a, &b, 3.1), None);
    }

    #[test]
    fn nearest_picks_closest() {
        let (a, b) = samples();
        assert_eq!(<Nearest as InterpolationMethod<f64>>::at(&a, &b, 1.9), Some(10.0));
        assert_eq!(<Nearest as InterpolationMethod<f64>>::at(&a, &b, 2.0), Some(20.0));
        assert_eq!(<Nearest as InterpolationMethod<f64>>::at(&a, &b, 0.5), None);
    }

    #[test]
    fn linear_midpoint() {
        let (a, b) = samples();
        assert_eq!(<Linear as InterpolationMethod<f64>>::at(&a, &b, 2.0), Some(15.0));
        assert_eq!(<Linear as InterpolationMethod<f64>>::at(&a, &b, 3.0), Some(20.0));
        let c = Sample { time: 0.0, value: -1.0 };
        let d = Sample { time: 1.0, value: 1.0 };
        assert_eq!(<Linear as InterpolationMethod<f64>>::at(&c, &d, 0.5), Some(0.0));
    }
}
