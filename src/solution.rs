use crate::matrix::{CostBuffer, CostInput};
use crate::report::{SolveStatus, SolverStats};
use crate::scalar::{Accumulator, CostScalar, Entry};
use crate::solver::SolverOptions;

/// Optimal assignment in the caller's index space.
///
/// `row_indices` is strictly ascending and `col_indices[k]` is the column
/// matched to `row_indices[k]`.
#[derive(Debug, Clone)]
pub struct Solution<A> {
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    /// Sum of the caller's entries over the returned pairs.
    ///
    /// Forbidden entries contribute the NaN or +inf from the input, never the
    /// sentinel. `None` unless `SolverOptions::compute_cost` is set.
    pub total_cost: Option<A>,
    /// Dual potential per input row.
    pub row_potentials: Vec<A>,
    /// Dual potential per input column.
    pub col_potentials: Vec<A>,
    pub stats: SolverStats,
}

impl<A: Accumulator> Solution<A> {
    /// Number of returned pairs.
    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }

    /// `(row, col)` pairs in ascending row order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_indices
            .iter()
            .copied()
            .zip(self.col_indices.iter().copied())
    }

    /// Maps the engine's `col4row` back onto the caller's matrix.
    pub(crate) fn project<C>(
        input: &C,
        buffer: &CostBuffer<A>,
        col4row: &[usize],
        u: Vec<A>,
        v: Vec<A>,
        options: &SolverOptions,
        mut stats: SolverStats,
    ) -> Self
    where
        C: CostInput + ?Sized,
        C::Scalar: CostScalar<Acc = A>,
    {
        let mut pairs: Vec<(usize, usize)> = col4row
            .iter()
            .enumerate()
            .map(|(i, &j)| if buffer.transposed() { (j, i) } else { (i, j) })
            .collect();
        if buffer.transposed() {
            pairs.sort_unstable_by_key(|&(row, _)| row);
        }

        let mut row_indices = Vec::with_capacity(pairs.len());
        let mut col_indices = Vec::with_capacity(pairs.len());
        let mut total = A::zero();
        for (row, col) in pairs {
            let value = input.entry(row, col);
            if matches!(value.classify(), Entry::Forbidden) {
                stats.forbidden_assigned += 1;
                if options.drop_forbidden {
                    stats.dropped += 1;
                    continue;
                }
            }
            total += value.widen();
            row_indices.push(row);
            col_indices.push(col);
        }

        stats.status = if stats.forbidden_assigned == 0 {
            SolveStatus::Optimal
        } else {
            SolveStatus::UsedForbidden
        };

        let (row_potentials, col_potentials) = if buffer.transposed() { (v, u) } else { (u, v) };

        Self {
            row_indices,
            col_indices,
            total_cost: options.compute_cost.then_some(total),
            row_potentials,
            col_potentials,
            stats,
        }
    }
}
