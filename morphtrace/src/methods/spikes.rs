use itertools::Itertools;

use super::{MethodArgs, MethodOutput, RegisterOpts, TraceMethodCtrl};
use crate::events::{Event, EventSet};
use crate::traces::{Trace, TraceKind};
use crate::units::{Quantity, Unit};
use crate::{Error, TraceResult};

/// Sample index ranges `[rise, fall)` where `data` stays above `threshold`.
///
/// An excursion already in progress at the first sample, or still in progress at the
/// last one, is not a complete spike and is skipped.
fn threshold_crossings(data: &[f64], threshold: f64) -> Vec<(usize, usize)> {
    let mut spikes = Vec::new();
    let mut rise = None;
    for (i, (prev, next)) in data.iter().map(|&v| v > threshold).tuple_windows().enumerate() {
        match (prev, next) {
            (false, true) => rise = Some(i + 1),
            (true, false) => {
                if let Some(rise) = rise.take() {
                    spikes.push((rise, i + 1));
                }
            }
            _ => {}
        }
    }
    spikes
}

/// `spikes`: one event per threshold crossing, at the time of the peak, with the peak
/// value as payload. The `threshold` argument defaults to `0 mV`.
fn spikes(trace: &Trace, args: &MethodArgs) -> TraceResult<MethodOutput> {
    let tr = trace.as_fixed_dt().ok_or_else(|| Error::MethodNotFound {
        kind: trace.kind(),
        method: "spikes".to_string(),
    })?;
    let threshold = args
        .quantity_or("spikes", "threshold", Quantity::new(0.0, Unit::mv()))?
        .magnitude_in(trace.data_unit())?;

    let data = tr.data();
    let times = tr.time_pts();
    let events = threshold_crossings(data, threshold)
        .into_iter()
        .map(|(rise, fall)| {
            let peak = (rise..fall).fold(rise, |best, i| if data[i] > data[best] { i } else { best });
            Event::with_payload(
                Quantity::new(times.values[peak], times.unit.clone()),
                Quantity::new(data[peak], trace.data_unit().clone()),
            )
        })
        .collect_vec();
    log::debug!("found {} spikes in {}", events.len(), trace.id());
    Ok(EventSet::from_events(events, times.unit)?.into())
}

pub(super) fn register(ctrl: &mut TraceMethodCtrl) -> TraceResult<()> {
    ctrl.register(
        TraceKind::FixedDt,
        "spikes",
        spikes,
        RegisterOpts::default().fallback_to_fixed_dt(),
    )
}
