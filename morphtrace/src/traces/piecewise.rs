use itertools::Itertools;

use super::{TraceData, TraceKind, TraceSampling};
use crate::units::{QuantityArray, Unit};
use crate::{Error, TraceResult};

/// The analytic form of a [`Piece`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PieceFunction {
    /// A constant value over the piece
    Flat {
        /// The value
        value: f64,
    },
    /// A straight line from `start_value` at the start of the piece to `end_value` at
    /// its end
    Linear {
        /// Value at the start of the piece
        start_value: f64,
        /// Value at the end of the piece
        end_value: f64,
    },
}

/// A segment of a [`TracePiecewise`] covering `[start, end]`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Piece {
    start: f64,
    end: f64,
    function: PieceFunction,
}

impl Piece {
    /// A constant segment
    pub fn flat(start: f64, end: f64, value: f64) -> Self {
        Self {
            start,
            end,
            function: PieceFunction::Flat { value },
        }
    }

    /// A linear segment
    pub fn linear(start: f64, end: f64, start_value: f64, end_value: f64) -> Self {
        Self {
            start,
            end,
            function: PieceFunction::Linear { start_value, end_value },
        }
    }

    /// Start time of the piece
    pub fn min_time(&self) -> f64 {
        self.start
    }

    /// End time of the piece
    pub fn max_time(&self) -> f64 {
        self.end
    }

    /// The analytic form of the piece
    pub fn function(&self) -> PieceFunction {
        self.function
    }

    /// Value at the start of the piece
    pub fn start_value(&self) -> f64 {
        match self.function {
            PieceFunction::Flat { value } => value,
            PieceFunction::Linear { start_value, .. } => start_value,
        }
    }

    /// Value at the end of the piece
    pub fn end_value(&self) -> f64 {
        match self.function {
            PieceFunction::Flat { value } => value,
            PieceFunction::Linear { end_value, .. } => end_value,
        }
    }

    /// Evaluate the piece at `time`, which must lie within the piece
    pub fn value_at(&self, time: f64) -> f64 {
        match self.function {
            PieceFunction::Flat { value } => value,
            PieceFunction::Linear { start_value, end_value } => {
                let t = (time - self.start) / (self.end - self.start);
                start_value + t * (end_value - start_value)
            }
        }
    }

    fn affine(&self, scale: f64, offset: f64) -> Self {
        let function = match self.function {
            PieceFunction::Flat { value } => PieceFunction::Flat {
                value: scale * value + offset,
            },
            PieceFunction::Linear { start_value, end_value } => PieceFunction::Linear {
                start_value: scale * start_value + offset,
                end_value: scale * end_value + offset,
            },
        };
        Self { function, ..*self }
    }
}

/// A trace made of contiguous, non-overlapping analytic pieces.
#[derive(Clone, Debug)]
pub struct TracePiecewise {
    pieces: Vec<Piece>,
    time_unit: Unit,
    data_unit: Unit,
}

impl TracePiecewise {
    /// Create a piecewise trace.
    ///
    /// Fails immediately unless there is at least one piece, every piece spans a
    /// non-empty time window, and every piece starts exactly where the previous one
    /// ends.
    pub fn new(pieces: Vec<Piece>, time_unit: Unit, data_unit: Unit) -> TraceResult<Self> {
        time_unit.conversion_factor(&Unit::s())?;
        if pieces.is_empty() {
            return Err(Error::EmptyTrace);
        }
        if let Some((index, _)) = pieces
            .iter()
            .find_position(|piece| !(piece.start < piece.end && piece.start.is_finite() && piece.end.is_finite()))
        {
            return Err(Error::InvalidPiecewise {
                index,
                reason: "piece must span a non-empty, finite time window".to_string(),
            });
        }
        for (index, (prev, next)) in pieces.iter().tuple_windows().enumerate() {
            let tol = super::GRID_TOLERANCE * prev.end.abs().max(1.0);
            if next.start < prev.end - tol {
                return Err(Error::InvalidPiecewise {
                    index: index + 1,
                    reason: format!("starts at {} before the previous piece ends at {}", next.start, prev.end),
                });
            }
            if next.start > prev.end + tol {
                return Err(Error::InvalidPiecewise {
                    index: index + 1,
                    reason: format!("starts at {} leaving a gap after the previous piece ends at {}", next.start, prev.end),
                });
            }
        }
        Ok(Self {
            pieces,
            time_unit,
            data_unit,
        })
    }

    /// The pieces, sorted by time
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// The start and end time of every piece, in order
    pub fn piece_bounds(&self) -> QuantityArray {
        let times = self.pieces.iter().flat_map(|p| [p.start, p.end]).collect();
        QuantityArray::new(times, self.time_unit.clone())
    }

    /// Evaluate the trace at `time`.
    ///
    /// A time on the boundary shared by two pieces is evaluated by the later piece; the
    /// end of the last piece belongs to the last piece.
    pub(crate) fn value_at(&self, time: f64) -> Option<f64> {
        if !(self.min_time() <= time && time <= self.max_time()) {
            return None;
        }
        let idx = self.pieces.partition_point(|p| p.start <= time) - 1;
        Some(self.pieces[idx].value_at(time))
    }
}

impl TraceSampling for TracePiecewise {
    fn kind(&self) -> TraceKind {
        TraceKind::Piecewise
    }

    fn time_unit(&self) -> &Unit {
        &self.time_unit
    }

    fn data_unit(&self) -> &Unit {
        &self.data_unit
    }

    fn min_time(&self) -> f64 {
        self.pieces[0].start
    }

    fn max_time(&self) -> f64 {
        self.pieces[self.pieces.len() - 1].end
    }

    fn affine(&self, scale: f64, offset: f64, unit: Unit) -> TraceData {
        TracePiecewise {
            pieces: self.pieces.iter().map(|p| p.affine(scale, offset)).collect(),
            time_unit: self.time_unit.clone(),
            data_unit: unit,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::super::arbitrary;
    use super::*;

    fn three_ramps() -> TracePiecewise {
        TracePiecewise::new(
            vec![
                Piece::linear(0.0, 10.0, 0.0, 10.0),
                Piece::flat(10.0, 20.0, -5.0),
                Piece::linear(20.0, 30.0, 100.0, 0.0),
            ],
            Unit::ms(),
            Unit::mv(),
        )
        .unwrap()
    }

    #[test]
    fn boundary_resolves_to_next_piece() {
        let tr = three_ramps();
        assert_eq!(tr.value_at(10.0), Some(-5.0));
        assert_eq!(tr.value_at(20.0), Some(100.0));
        assert_eq!(tr.value_at(30.0), Some(0.0));
        assert_eq!(tr.value_at(0.0), Some(0.0));
    }

    #[test]
    fn analytic_evaluation() {
        let tr = three_ramps();
        assert_eq!(tr.value_at(5.0), Some(5.0));
        assert_eq!(tr.value_at(15.0), Some(-5.0));
        assert_eq!(tr.value_at(25.0), Some(50.0));
        assert_eq!(tr.value_at(30.5), None);
        assert_eq!(tr.value_at(-0.5), None);
    }

    #[test]
    fn reject_overlap_gap_and_empty_pieces() {
        let overlap = TracePiecewise::new(
            vec![Piece::flat(0.0, 10.0, 1.0), Piece::flat(9.0, 20.0, 2.0)],
            Unit::ms(),
            Unit::mv(),
        );
        assert!(matches!(overlap, Err(Error::InvalidPiecewise { index: 1, .. })));

        let gap = TracePiecewise::new(
            vec![Piece::flat(0.0, 10.0, 1.0), Piece::flat(11.0, 20.0, 2.0)],
            Unit::ms(),
            Unit::mv(),
        );
        assert!(matches!(gap, Err(Error::InvalidPiecewise { index: 1, .. })));

        let unsorted = TracePiecewise::new(
            vec![Piece::flat(10.0, 20.0, 1.0), Piece::flat(0.0, 10.0, 2.0)],
            Unit::ms(),
            Unit::mv(),
        );
        assert!(matches!(unsorted, Err(Error::InvalidPiecewise { index: 1, .. })));

        let reversed = TracePiecewise::new(vec![Piece::flat(10.0, 0.0, 1.0)], Unit::ms(), Unit::mv());
        assert!(matches!(reversed, Err(Error::InvalidPiecewise { index: 0, .. })));

        let empty = TracePiecewise::new(vec![], Unit::ms(), Unit::mv());
        assert!(matches!(empty, Err(Error::EmptyTrace)));
    }

    proptest! {
        #[test]
        fn piece_bounds_are_monotonic(tr in arbitrary::piecewise_trace(1..20)) {
            let bounds = tr.piece_bounds().values;
            prop_assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn pieces_evaluate_linearly(tr in arbitrary::piecewise_trace(1..20)) {
            for piece in tr.pieces() {
                let mid = (piece.min_time() + piece.max_time()) / 2.0;
                let expected = (piece.start_value() + piece.end_value()) / 2.0;
                let actual = tr.value_at(mid).unwrap();
                prop_assert!((actual - expected).abs() < 1e-6);
            }
        }
    }
}
