use super::{MethodArgs, MethodOutput, RegisterOpts, TraceMethodCtrl};
use crate::traces::{Trace, TraceData, TraceKind};
use crate::units::QuantityArray;
use crate::TraceResult;

/// Points to draw a trace as a polyline
#[derive(Clone, Debug, PartialEq)]
pub struct PlotPoints {
    pub times: QuantityArray,
    pub values: QuantityArray,
}

/// Sampled traces plot their samples; piecewise traces plot the end points of every
/// piece.
fn plotpoints(trace: &Trace, _: &MethodArgs) -> TraceResult<MethodOutput> {
    let points = match trace.data() {
        TraceData::TraceFixedDt(tr) => PlotPoints {
            times: tr.time_pts(),
            values: tr.data_pts(),
        },
        TraceData::TraceVariableDt(tr) => PlotPoints {
            times: tr.time_pts(),
            values: tr.data_pts(),
        },
        TraceData::TracePiecewise(tr) => {
            let values = tr
                .pieces()
                .iter()
                .flat_map(|p| [p.start_value(), p.end_value()])
                .collect();
            PlotPoints {
                times: tr.piece_bounds(),
                values: QuantityArray::new(values, trace.data_unit().clone()),
            }
        }
    };
    Ok(points.into())
}

pub(super) fn register(ctrl: &mut TraceMethodCtrl) -> TraceResult<()> {
    for kind in [TraceKind::FixedDt, TraceKind::VariableDt, TraceKind::Piecewise] {
        ctrl.register(kind, "plotpoints", plotpoints, RegisterOpts::default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traces::{Piece, TracePiecewise, TraceVariableDt};
    use crate::units::Unit;

    #[test]
    fn piecewise_plots_piece_end_points() {
        let ctrl = TraceMethodCtrl::with_std_methods().unwrap();
        let tr = Trace::new(
            TracePiecewise::new(
                vec![Piece::flat(0.0, 10.0, -65.0), Piece::linear(10.0, 20.0, -65.0, 20.0)],
                Unit::ms(),
                Unit::mv(),
            )
            .unwrap(),
        );
        let points = ctrl
            .invoke(&tr, "plotpoints", &MethodArgs::new())
            .unwrap()
            .into_plot_points()
            .unwrap();
        assert_eq!(points.times.values, vec![0.0, 10.0, 10.0, 20.0]);
        assert_eq!(points.values.values, vec![-65.0, -65.0, -65.0, 20.0]);
        assert_eq!(points.values.unit, Unit::mv());
    }

    #[test]
    fn sampled_traces_plot_samples() {
        let ctrl = TraceMethodCtrl::with_std_methods().unwrap();
        let tr = Trace::new(
            TraceVariableDt::new(
                QuantityArray::new(vec![0.0, 0.5, 2.0], Unit::ms()),
                QuantityArray::new(vec![1.0, 2.0, 3.0], Unit::na()),
            )
            .unwrap(),
        );
        let points = ctrl
            .invoke(&tr, "plotpoints", &MethodArgs::new())
            .unwrap()
            .into_plot_points()
            .unwrap();
        assert_eq!(points.times.values, vec![0.0, 0.5, 2.0]);
        assert_eq!(points.values, QuantityArray::new(vec![1.0, 2.0, 3.0], Unit::na()));
    }
}
