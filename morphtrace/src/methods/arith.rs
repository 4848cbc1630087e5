//! Standard arithmetic operators
//!
//! - trace `op` trace: fixed timestep traces on an identical grid only;
//! - trace `op` scalar: every trace kind;
//! - scalar `op` trace: sampled traces, and piecewise traces except for division, which
//!   would not stay piecewise linear.
//!
//! Addition and subtraction require compatible units and keep the unit of the trace (or
//! of the left trace). Multiplication and division combine the units.

use super::{BinOp, Operand, OperandKind, TraceMethodCtrl};
use crate::traces::{Trace, TraceData, TraceKind, TraceSampling};
use crate::units::Unit;
use crate::{Error, TraceResult};

const OPS: [BinOp; 4] = [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Div];

fn combine(op: BinOp, lhs: f64, rhs: f64) -> f64 {
    match op {
        BinOp::Add => lhs + rhs,
        BinOp::Sub => lhs - rhs,
        BinOp::Mul => lhs * rhs,
        BinOp::Div => lhs / rhs,
    }
}

/// The unit of `lhs op rhs`, and the factor to apply to magnitudes in `rhs` first.
fn result_unit(op: BinOp, lhs: &Unit, rhs: &Unit) -> TraceResult<(f64, Unit)> {
    match op {
        BinOp::Add | BinOp::Sub => Ok((rhs.conversion_factor(lhs)?, lhs.clone())),
        BinOp::Mul => Ok((1.0, lhs.mul(rhs))),
        BinOp::Div => Ok((1.0, lhs.div(rhs))),
    }
}

fn unexpected(op: BinOp, lhs: &Operand<'_>, rhs: &Operand<'_>) -> Error {
    Error::OperatorNotFound {
        op,
        lhs: lhs.kind(),
        rhs: rhs.kind(),
    }
}

fn trace_trace(op: BinOp, lhs: Operand<'_>, rhs: Operand<'_>) -> TraceResult<Trace> {
    let (Some(a), Some(b)) = (
        lhs.as_trace().and_then(Trace::as_fixed_dt),
        rhs.as_trace().and_then(Trace::as_fixed_dt),
    ) else {
        return Err(unexpected(op, &lhs, &rhs));
    };
    a.same_grid(b)?;
    let (factor, unit) = result_unit(op, a.data_unit(), b.data_unit())?;
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(x, y)| combine(op, *x, y * factor))
        .collect();
    Ok(Trace::new(a.with_data(data, unit)))
}

fn trace_scalar(op: BinOp, lhs: Operand<'_>, rhs: Operand<'_>) -> TraceResult<Trace> {
    let (Some(trace), Some(scalar)) = (lhs.as_trace(), rhs.as_scalar()) else {
        return Err(unexpected(op, &lhs, &rhs));
    };
    let (factor, unit) = result_unit(op, trace.data_unit(), &scalar.unit)?;
    let s = scalar.value * factor;
    let (scale, offset) = match op {
        BinOp::Add => (1.0, s),
        BinOp::Sub => (1.0, -s),
        BinOp::Mul => (s, 0.0),
        BinOp::Div => (1.0 / s, 0.0),
    };
    Ok(Trace::new(trace.data().affine(scale, offset, unit)))
}

fn scalar_trace(op: BinOp, lhs: Operand<'_>, rhs: Operand<'_>) -> TraceResult<Trace> {
    let (Some(scalar), Some(trace)) = (lhs.as_scalar(), rhs.as_trace()) else {
        return Err(unexpected(op, &lhs, &rhs));
    };
    let data = trace.data();
    let result = match op {
        BinOp::Add | BinOp::Sub => {
            // Expressed in the unit of the trace
            let s = scalar.magnitude_in(trace.data_unit())?;
            let scale = if op == BinOp::Add { 1.0 } else { -1.0 };
            data.affine(scale, s, trace.data_unit().clone())
        }
        BinOp::Mul => data.affine(scalar.value, 0.0, scalar.unit.mul(trace.data_unit())),
        BinOp::Div => {
            let unit = scalar.unit.div(trace.data_unit());
            let invert = |values: &[f64]| values.iter().map(|v| scalar.value / v).collect::<Vec<_>>();
            match data {
                TraceData::TraceFixedDt(tr) => tr.with_data(invert(tr.data()), unit).into(),
                TraceData::TraceVariableDt(tr) => tr.with_data(invert(tr.data()), unit).into(),
                TraceData::TracePiecewise(_) => return Err(unexpected(op, &lhs, &rhs)),
            }
        }
    };
    Ok(Trace::new(result))
}

pub(super) fn register(ctrl: &mut TraceMethodCtrl) -> TraceResult<()> {
    let fixed = OperandKind::Trace(TraceKind::FixedDt);
    let kinds = [TraceKind::FixedDt, TraceKind::VariableDt, TraceKind::Piecewise];
    for op in OPS {
        ctrl.register_operator(op, fixed, fixed, move |l, r| trace_trace(op, l, r))?;
        for kind in kinds {
            let kind = OperandKind::Trace(kind);
            ctrl.register_operator(op, kind, OperandKind::Scalar, move |l, r| trace_scalar(op, l, r))?;
            if !(op == BinOp::Div && kind == OperandKind::Trace(TraceKind::Piecewise)) {
                ctrl.register_operator(op, OperandKind::Scalar, kind, move |l, r| scalar_trace(op, l, r))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use paste::paste;

    use super::*;
    use crate::traces::{Piece, TraceFixedDt, TracePiecewise, TraceVariableDt};
    use crate::units::{Quantity, QuantityArray};

    fn ctrl() -> TraceMethodCtrl {
        TraceMethodCtrl::with_std_methods().unwrap()
    }

    fn fixed(values: Vec<f64>, unit: Unit) -> Trace {
        Trace::new(
            TraceFixedDt::new(
                Quantity::new(0.0, Unit::ms()),
                Quantity::new(1.0, Unit::ms()),
                QuantityArray::new(values, unit),
            )
            .unwrap(),
        )
    }

    fn variable() -> Trace {
        Trace::new(
            TraceVariableDt::new(
                QuantityArray::new(vec![0.0, 0.5, 2.0], Unit::ms()),
                QuantityArray::new(vec![1.0, 2.0, 4.0], Unit::mv()),
            )
            .unwrap(),
        )
    }

    fn piecewise() -> Trace {
        Trace::new(
            TracePiecewise::new(
                vec![Piece::flat(0.0, 1.0, 2.0), Piece::linear(1.0, 2.0, 2.0, 4.0)],
                Unit::ms(),
                Unit::mv(),
            )
            .unwrap(),
        )
    }

    fn values(trace: &Trace) -> Vec<f64> {
        let times = QuantityArray::new(vec![0.0, 0.5, 1.5, 2.0], Unit::ms());
        trace
            .get_values(&times)
            .unwrap()
            .into_iter()
            .map(|v| v.map(|q| q.value).unwrap_or(f64::NAN))
            .collect()
    }

    macro_rules! trace_scalar_cases {
        ($($op:ident: $scalar:expr => $variable:expr, $piecewise:expr;)*) => {
            $(
                paste! {
                    #[test]
                    fn [<variable_dt_ $op:lower _scalar>]() {
                        let out = ctrl().apply_operator(BinOp::$op, &variable(), $scalar).unwrap();
                        assert_eq!(out.kind(), TraceKind::VariableDt);
                        assert_eq!(values(&out), $variable);
                    }

                    #[test]
                    fn [<piecewise_ $op:lower _scalar>]() {
                        let out = ctrl().apply_operator(BinOp::$op, &piecewise(), $scalar).unwrap();
                        assert_eq!(out.kind(), TraceKind::Piecewise);
                        assert_eq!(values(&out), $piecewise);
                    }
                }
            )*
        };
    }

    trace_scalar_cases! {
        Add: Quantity::new(1.0, Unit::mv()) => vec![2.0, 3.0, 3.0, 5.0], vec![3.0, 3.0, 4.0, 5.0];
        Sub: Quantity::new(0.001, Unit::parse("V").unwrap()) => vec![0.0, 1.0, 1.0, 3.0], vec![1.0, 1.0, 2.0, 3.0];
        Mul: Quantity::new(2.0, Unit::dimensionless()) => vec![2.0, 4.0, 4.0, 8.0], vec![4.0, 4.0, 6.0, 8.0];
        Div: Quantity::new(2.0, Unit::dimensionless()) => vec![0.5, 1.0, 1.0, 2.0], vec![1.0, 1.0, 1.5, 2.0];
    }

    #[test]
    fn fixed_dt_pairs() {
        let a = fixed(vec![1.0, 2.0, 3.0], Unit::mv());
        let b = fixed(vec![0.001, 0.002, 0.003], Unit::parse("V").unwrap());
        let sum = ctrl().apply_operator(BinOp::Add, &a, &b).unwrap();
        assert_eq!(sum.data_unit(), &Unit::mv());
        assert_eq!(sum.as_fixed_dt().unwrap().data(), &[2.0, 4.0, 6.0]);

        let i = fixed(vec![1.0, 2.0, 4.0], Unit::na());
        let ratio = ctrl().apply_operator(BinOp::Div, &a, &i).unwrap();
        assert_eq!(ratio.data_unit().symbol(), "mV/nA");
        assert_eq!(ratio.as_fixed_dt().unwrap().data(), &[1.0, 1.0, 0.75]);

        let err = ctrl().apply_operator(BinOp::Add, &a, &i).unwrap_err();
        assert!(matches!(err, Error::IncompatibleUnits { .. }));

        let short = fixed(vec![1.0, 2.0], Unit::mv());
        let err = ctrl().apply_operator(BinOp::Sub, &a, &short).unwrap_err();
        assert!(matches!(err, Error::MismatchedGrid));
    }

    #[test]
    fn scalar_on_the_left() {
        let ten = Quantity::new(10.0, Unit::mv());
        let out = ctrl().apply_operator(BinOp::Sub, ten.clone(), &piecewise()).unwrap();
        assert_eq!(values(&out), vec![8.0, 8.0, 7.0, 6.0]);

        let out = ctrl().apply_operator(BinOp::Div, ten.clone(), &variable()).unwrap();
        assert_eq!(out.data_unit().symbol(), "mV/mV");
        assert_eq!(out.as_variable_dt().unwrap().data(), &[10.0, 5.0, 2.5]);

        let err = ctrl().apply_operator(BinOp::Div, ten, &piecewise()).unwrap_err();
        assert!(matches!(err, Error::OperatorNotFound { op: BinOp::Div, .. }));
    }

    #[test]
    fn results_are_new_traces() {
        let a = fixed(vec![1.0, 2.0], Unit::mv()).with_name("a").with_tags(["Voltage"]);
        let out = ctrl()
            .apply_operator(BinOp::Mul, &a, Quantity::new(3.0, Unit::dimensionless()))
            .unwrap();
        assert_ne!(out.id(), a.id());
        assert_eq!(out.name(), None);
        assert_eq!(a.as_fixed_dt().unwrap().data(), &[1.0, 2.0]);
    }
}
