use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use super::{MethodArgs, MethodOutput, RegisterOpts, TraceMethodCtrl};
use crate::traces::{Trace, TraceFixedDt, TraceKind};
use crate::units::{QuantityArray, Unit};
use crate::{Error, TraceResult};

/// Discrete Fourier transform of a fixed timestep trace
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    /// Frequency of every bin, in `Hz`, ordered like [`Spectrum::amplitudes`]
    pub frequencies: QuantityArray,
    pub amplitudes: Vec<Complex64>,
}

/// Power spectral density of a fixed timestep trace
#[derive(Clone, Debug, PartialEq)]
pub struct PowerSpectrum {
    /// Frequency of every bin, in `Hz`, ordered like [`PowerSpectrum::power`]
    pub frequencies: QuantityArray,
    pub power: Vec<f64>,
}

/// Sample frequencies of a length `n` transform with sample spacing `d`: non-negative
/// frequencies first, then the negative ones in increasing order.
fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let val = 1.0 / (n as f64 * d);
    let split = (n + 1) / 2;
    (0..n)
        .map(|i| {
            let k = if i < split { i as f64 } else { i as f64 - n as f64 };
            k * val
        })
        .collect()
}

fn transform(tr: &TraceFixedDt) -> TraceResult<(QuantityArray, Vec<Complex64>)> {
    let mut buffer: Vec<Complex64> = tr.data().iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);

    let dt = tr.dt().magnitude_in(&Unit::s())?;
    let frequencies = QuantityArray::new(fftfreq(buffer.len(), dt), Unit::hz());
    Ok((frequencies, buffer))
}

fn fixed_dt<'a>(trace: &'a Trace, method: &str) -> TraceResult<&'a TraceFixedDt> {
    trace.as_fixed_dt().ok_or_else(|| Error::MethodNotFound {
        kind: trace.kind(),
        method: method.to_string(),
    })
}

/// `fft`: the spectrum of the trace, divided by the largest amplitude when `normalise`
/// is set (the default).
fn fft(trace: &Trace, args: &MethodArgs) -> TraceResult<MethodOutput> {
    let normalise = args.bool_or("fft", "normalise", true)?;
    let (frequencies, mut amplitudes) = transform(fixed_dt(trace, "fft")?)?;
    if normalise {
        let max = amplitudes.iter().map(|c| c.norm()).fold(0.0, f64::max);
        if max > 0.0 {
            amplitudes.iter_mut().for_each(|c| *c /= max);
        }
    }
    Ok(Spectrum {
        frequencies,
        amplitudes,
    }
    .into())
}

/// `psd`: squared magnitude of every bin, divided by the largest one when `normalise`
/// is set (the default).
fn psd(trace: &Trace, args: &MethodArgs) -> TraceResult<MethodOutput> {
    let normalise = args.bool_or("psd", "normalise", true)?;
    let (frequencies, amplitudes) = transform(fixed_dt(trace, "psd")?)?;
    let mut power: Vec<f64> = amplitudes.iter().map(|c| c.norm_sqr()).collect();
    if normalise {
        let max = power.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            power.iter_mut().for_each(|p| *p /= max);
        }
    }
    Ok(PowerSpectrum { frequencies, power }.into())
}

pub(super) fn register(ctrl: &mut TraceMethodCtrl) -> TraceResult<()> {
    let opts = RegisterOpts::default().fallback_to_fixed_dt();
    ctrl.register(TraceKind::FixedDt, "fft", fft, opts)?;
    ctrl.register(TraceKind::FixedDt, "psd", psd, opts)?;
    Ok(())
}
