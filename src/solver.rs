use core::fmt;

use dyn_stack::{GlobalPodBuffer, PodStack, ReborrowMut, StackReq};
use std::time::{Duration, Instant};

use crate::matrix::{CostBuffer, CostInput, MatrixError};
use crate::report::{emit_line, AugmentReport, Reporter, SolveStatus, SolverStats, StdoutReporter};
use crate::scalar::{Accumulator, CostScalar};
use crate::solution::Solution;

/// Marks a row or column without a partner.
const UNASSIGNED: usize = usize::MAX;

/// Accumulation type used when solving `C`.
pub type AccOf<C> = <<C as CostInput>::Scalar as CostScalar>::Acc;

/// Errors while solving an assignment problem.
#[derive(Debug)]
pub enum SolveError {
    /// The cost matrix was rejected.
    Matrix(MatrixError),
    /// No free column was reachable from `row`.
    Infeasible { row: usize },
    /// Workspace requirement overflowed.
    WorkspaceOverflow,
    /// Workspace allocation failed.
    WorkspaceAlloc,
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matrix(err) => write!(f, "invalid cost matrix: {err}"),
            Self::Infeasible { row } => {
                write!(f, "no complete assignment exists (row {row} cannot be matched)")
            }
            Self::WorkspaceOverflow => write!(f, "workspace size overflow"),
            Self::WorkspaceAlloc => write!(f, "workspace allocation failed"),
        }
    }
}

impl std::error::Error for SolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Matrix(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MatrixError> for SolveError {
    fn from(err: MatrixError) -> Self {
        Self::Matrix(err)
    }
}

/// Options controlling a solve.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Sum the caller's costs over the returned pairs.
    pub compute_cost: bool,
    /// Leave pairs that use a forbidden entry out of the result.
    pub drop_forbidden: bool,
    /// Emit per-row diagnostics to stdout by default.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            compute_cost: true,
            drop_forbidden: false,
            verbose: false,
        }
    }
}

/// Dense linear assignment solver using shortest augmenting paths.
///
/// Holds the search workspace so that repeated solves of similarly sized
/// matrices do not allocate scratch memory again. A solver is not shared
/// between threads; give each thread its own.
pub struct LapSolver {
    workspace: GlobalPodBuffer,
    capacity: Capacity,
}

#[derive(Debug, Clone, Copy, Default)]
struct Capacity {
    nrows: usize,
    ncols: usize,
}

impl Capacity {
    fn covers(&self, other: &Capacity) -> bool {
        self.nrows >= other.nrows && self.ncols >= other.ncols
    }

    fn union(&self, other: &Capacity) -> Capacity {
        Capacity {
            nrows: self.nrows.max(other.nrows),
            ncols: self.ncols.max(other.ncols),
        }
    }
}

enum ReporterSlot<'a> {
    External(&'a mut dyn Reporter),
    Local(StdoutReporter),
    None,
}

impl<'a> ReporterSlot<'a> {
    fn new(reporter: Option<&'a mut dyn Reporter>, verbose: bool) -> Self {
        match reporter {
            Some(r) => Self::External(r),
            None if verbose => Self::Local(StdoutReporter::new()),
            None => Self::None,
        }
    }

    fn as_mut(&mut self) -> Option<&mut dyn Reporter> {
        match self {
            Self::External(r) => Some(*r),
            Self::Local(r) => Some(r),
            Self::None => None,
        }
    }
}

/// Per-row search scratch carved out of the solver workspace.
struct PathScratch<'a, A> {
    /// Shortest reduced distance found to each column.
    shortest: &'a mut [A],
    /// Row from which each column was last reached.
    path: &'a mut [usize],
    /// Unsettled columns; only a prefix is live during a search.
    remaining: &'a mut [usize],
    row_done: &'a mut [u8],
    col_done: &'a mut [u8],
}

/// Scratch for one search, sized for the widest accumulator (`i128`).
fn scratch_req(cap: &Capacity) -> Result<StackReq, SolveError> {
    let overflow = |_| SolveError::WorkspaceOverflow;
    StackReq::try_all_of([
        StackReq::try_new::<i128>(cap.ncols).map_err(overflow)?,
        StackReq::try_new::<usize>(cap.ncols).map_err(overflow)?,
        StackReq::try_new::<usize>(cap.ncols).map_err(overflow)?,
        StackReq::try_new::<u8>(cap.nrows).map_err(overflow)?,
        StackReq::try_new::<u8>(cap.ncols).map_err(overflow)?,
    ])
    .map_err(overflow)
}

impl LapSolver {
    /// Create a solver with an empty workspace; it grows on first use.
    pub fn new() -> Self {
        Self {
            workspace: GlobalPodBuffer::new(StackReq::empty()),
            capacity: Capacity::default(),
        }
    }

    /// Create a solver whose workspace already fits an `nrows x ncols`
    /// problem of any scalar type.
    pub fn with_capacity(nrows: usize, ncols: usize) -> Result<Self, SolveError> {
        let mut solver = Self::new();
        solver.reserve(Capacity {
            nrows: nrows.min(ncols),
            ncols: nrows.max(ncols),
        })?;
        Ok(solver)
    }

    fn reserve(&mut self, needed: Capacity) -> Result<(), SolveError> {
        if self.capacity.covers(&needed) {
            return Ok(());
        }
        let capacity = self.capacity.union(&needed);
        let req = scratch_req(&capacity)?;
        self.workspace = GlobalPodBuffer::try_new(req).map_err(|_| SolveError::WorkspaceAlloc)?;
        self.capacity = capacity;
        Ok(())
    }

    /// Solve the assignment problem for `costs`.
    ///
    /// Every row of the smaller dimension is matched to a distinct index of
    /// the larger one, minimizing the total cost. NaN and +inf entries are
    /// forbidden pairings; they are only used when nothing else completes
    /// the assignment, which `SolverStats::status` reports.
    pub fn solve<C>(
        &mut self,
        costs: &C,
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<Solution<AccOf<C>>, SolveError>
    where
        C: CostInput + ?Sized,
    {
        self.run(costs, options, reporter)
    }

    fn run<C, A>(
        &mut self,
        costs: &C,
        options: &SolverOptions,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<Solution<A>, SolveError>
    where
        C: CostInput + ?Sized,
        C::Scalar: CostScalar<Acc = A>,
        A: Accumulator,
    {
        let start_time = options.verbose.then(Instant::now);
        let mut reporter = ReporterSlot::new(reporter, options.verbose);

        let buffer = CostBuffer::<A>::new(costs)?;
        let (nrows, ncols) = (buffer.nrows(), buffer.ncols());
        self.reserve(Capacity { nrows, ncols })?;

        let mut u = vec![A::zero(); nrows];
        let mut v = initial_column_potentials(&buffer);
        let mut col4row = vec![UNASSIGNED; nrows];
        let mut row4col = vec![UNASSIGNED; ncols];

        let mut stack = PodStack::new(&mut self.workspace);
        let rows_scanned = augment_rows(
            &buffer,
            &mut u,
            &mut v,
            &mut col4row,
            &mut row4col,
            stack.rb_mut(),
            &mut reporter,
        )?;

        let stats = SolverStats {
            status: SolveStatus::Optimal,
            nrows: costs.nrows(),
            ncols: costs.ncols(),
            transposed: buffer.transposed(),
            forbidden_entries: buffer.forbidden(),
            forbidden_assigned: 0,
            dropped: 0,
            large_cost: buffer
                .large_cost()
                .map(|large| large.to_f64().unwrap_or(f64::INFINITY)),
            rows_scanned,
        };
        let solution = Solution::project(costs, &buffer, &col4row, u, v, options, stats);
        finish_solve(&solution.stats, start_time, &mut reporter);
        Ok(solution)
    }
}

impl Default for LapSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve the dense assignment problem for `costs` with default options.
///
/// Returns `(row_indices, col_indices)` with `row_indices` ascending and
/// `min(nrows, ncols)` pairs.
pub fn solve_dense<C>(costs: &C) -> Result<(Vec<usize>, Vec<usize>), SolveError>
where
    C: CostInput + ?Sized,
{
    let solution = LapSolver::new().solve(costs, &SolverOptions::default(), None)?;
    Ok((solution.row_indices, solution.col_indices))
}

/// Starting column potentials, with `u = 0`.
///
/// Square problems start from the column minima. When there are more
/// columns than rows, some columns stay free and their potentials must stay
/// equal, so every column starts at zero.
fn initial_column_potentials<A: Accumulator>(buffer: &CostBuffer<A>) -> Vec<A> {
    if buffer.nrows() < buffer.ncols() {
        return vec![A::zero(); buffer.ncols()];
    }
    let mut v = buffer.row(0).to_vec();
    for i in 1..buffer.nrows() {
        for (vj, &c) in v.iter_mut().zip(buffer.row(i)) {
            if c < *vj {
                *vj = c;
            }
        }
    }
    v
}

/// Inserts every row into the assignment, one shortest augmenting path at a
/// time. Returns the number of rows scanned over all searches.
fn augment_rows<A: Accumulator>(
    buffer: &CostBuffer<A>,
    u: &mut [A],
    v: &mut [A],
    col4row: &mut [usize],
    row4col: &mut [usize],
    stack: PodStack<'_>,
    reporter: &mut ReporterSlot<'_>,
) -> Result<usize, SolveError> {
    let (nrows, ncols) = (buffer.nrows(), buffer.ncols());
    let (shortest, stack) = stack.make_raw::<A>(ncols);
    let (path, stack) = stack.make_raw::<usize>(ncols);
    let (remaining, stack) = stack.make_raw::<usize>(ncols);
    let (row_done, stack) = stack.make_raw::<u8>(nrows);
    let (col_done, _) = stack.make_raw::<u8>(ncols);
    let mut scratch = PathScratch {
        shortest,
        path,
        remaining,
        row_done,
        col_done,
    };

    let mut total_scanned = 0;
    for cur_row in 0..nrows {
        let (sink, min_val, rows_scanned) =
            shortest_augmenting_path(buffer, u, v, row4col, cur_row, &mut scratch)?;
        total_scanned += rows_scanned;

        // Potentials: settled columns and scanned rows move by the slack
        // between the path length and their own distance.
        u[cur_row] += min_val;
        for i in 0..nrows {
            if scratch.row_done[i] != 0 && i != cur_row {
                u[i] += min_val - scratch.shortest[col4row[i]];
            }
        }
        for j in 0..ncols {
            if scratch.col_done[j] != 0 {
                v[j] -= min_val - scratch.shortest[j];
            }
        }

        // Rotate assignments along the path back to `cur_row`.
        let mut path_len = 0;
        let mut j = sink;
        loop {
            let i = scratch.path[j];
            row4col[j] = i;
            core::mem::swap(&mut col4row[i], &mut j);
            path_len += 1;
            if i == cur_row {
                break;
            }
        }

        log::trace!(
            "row {cur_row}: sink={sink}, scanned={rows_scanned}, path_len={path_len}, distance={min_val:?}"
        );
        if let Some(reporter) = reporter.as_mut() {
            reporter.on_augment(&AugmentReport {
                row: cur_row,
                rows_scanned,
                path_len,
                distance: min_val.to_f64().unwrap_or(f64::NAN),
                sink,
            });
        }
    }
    Ok(total_scanned)
}

/// Dijkstra search over columns from `cur_row` using reduced costs.
///
/// Columns are settled in order of distance, ties going to the lower column
/// index. Settling a column owned by another row continues from that row;
/// the first free column settled ends the search. Returns the free column,
/// the path length and the number of rows scanned.
fn shortest_augmenting_path<A: Accumulator>(
    buffer: &CostBuffer<A>,
    u: &[A],
    v: &[A],
    row4col: &[usize],
    cur_row: usize,
    scratch: &mut PathScratch<'_, A>,
) -> Result<(usize, A, usize), SolveError> {
    let ncols = buffer.ncols();
    let unreached = A::max_value();
    scratch.shortest.fill(unreached);
    scratch.path.fill(UNASSIGNED);
    scratch.row_done.fill(0);
    scratch.col_done.fill(0);
    for (it, col) in scratch.remaining.iter_mut().enumerate() {
        *col = it;
    }
    let mut num_remaining = ncols;

    let mut min_val = A::zero();
    let mut i = cur_row;
    let mut rows_scanned = 0;
    loop {
        scratch.row_done[i] = 1;
        rows_scanned += 1;

        let row = buffer.row(i);
        let u_i = u[i];
        let mut lowest = unreached;
        let mut index = UNASSIGNED;
        let mut best_col = UNASSIGNED;
        for it in 0..num_remaining {
            let j = scratch.remaining[it];
            let reduced = min_val + row[j] - u_i - v[j];
            if reduced < scratch.shortest[j] {
                scratch.path[j] = i;
                scratch.shortest[j] = reduced;
            }
            let dist = scratch.shortest[j];
            if dist < lowest || (dist == lowest && j < best_col) {
                lowest = dist;
                index = it;
                best_col = j;
            }
        }

        if index == UNASSIGNED || lowest == unreached {
            return Err(SolveError::Infeasible { row: cur_row });
        }
        min_val = lowest;
        let j = best_col;
        scratch.col_done[j] = 1;
        num_remaining -= 1;
        scratch.remaining[index] = scratch.remaining[num_remaining];

        match row4col[j] {
            UNASSIGNED => return Ok((j, min_val, rows_scanned)),
            owner => i = owner,
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3} us", secs * 1e6)
    } else {
        format!("{:.0} ns", secs * 1e9)
    }
}

fn finish_solve(stats: &SolverStats, start_time: Option<Instant>, reporter: &mut ReporterSlot<'_>) {
    if let Some(reporter) = reporter.as_mut() {
        reporter.on_finish();
    }
    if let Some(start) = start_time {
        let elapsed = format_duration(start.elapsed());
        emit_line(&format!(
            "{}x{}: {:?}, forbidden assigned {}, rows scanned {}, time: {elapsed}",
            stats.nrows, stats.ncols, stats.status, stats.forbidden_assigned, stats.rows_scanned
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<AugmentReport>, bool);

    impl Reporter for Recorder {
        fn on_augment(&mut self, report: &AugmentReport) {
            self.0.push(report.clone());
        }

        fn on_finish(&mut self) {
            self.1 = true;
        }
    }

    #[test]
    fn solves_small_square() {
        let costs = [[6, 9, 1], [10, 3, 2], [8, 7, 4]];
        let mut solver = LapSolver::new();
        let solution = solver
            .solve(&costs, &SolverOptions::default(), None)
            .unwrap();
        assert_eq!(solution.row_indices, vec![0, 1, 2]);
        assert_eq!(solution.col_indices, vec![2, 1, 0]);
        assert_eq!(solution.total_cost, Some(12i64));
        assert_eq!(solution.stats.status, SolveStatus::Optimal);
    }

    #[test]
    fn reports_every_row() {
        let costs = [[4.0, 1.0, 3.0], [2.0, 0.0, 5.0]];
        let mut recorder = Recorder(Vec::new(), false);
        let solution = LapSolver::new()
            .solve(&costs, &SolverOptions::default(), Some(&mut recorder))
            .unwrap();
        assert_eq!(solution.col_indices, vec![1, 0]);
        assert_eq!(recorder.0.len(), 2);
        assert_eq!(recorder.0[0].sink, 1);
        assert_eq!(recorder.0[1].sink, 0);
        assert_eq!(recorder.0[1].rows_scanned, 2);
        assert_eq!(recorder.0[1].path_len, 1);
        assert!(recorder.1);
        assert_eq!(
            solution.stats.rows_scanned,
            recorder.0.iter().map(|r| r.rows_scanned).sum::<usize>()
        );
    }

    #[test]
    fn workspace_grows_and_is_reused() {
        let mut solver = LapSolver::with_capacity(2, 2).unwrap();
        let small = [[1.0f32, 2.0], [2.0, 1.0]];
        solver.solve(&small, &SolverOptions::default(), None).unwrap();
        assert_eq!(solver.capacity.ncols, 2);

        let wide = [[3i64, 1, 2, 9], [1, 5, 4, 0]];
        let solution = solver.solve(&wide, &SolverOptions::default(), None).unwrap();
        assert_eq!(solution.col_indices, vec![1, 3]);
        assert_eq!(solution.total_cost, Some(1i128));
        assert_eq!((solver.capacity.nrows, solver.capacity.ncols), (2, 4));

        solver.solve(&small, &SolverOptions::default(), None).unwrap();
        assert_eq!(solver.capacity.ncols, 4);
    }

    #[test]
    fn potentials_are_tight_on_assignment() {
        let costs: [[i32; 4]; 3] = [[7, 2, 8, 1], [3, 9, 4, 6], [5, 5, 2, 7]];
        let solution = LapSolver::new()
            .solve(&costs, &SolverOptions::default(), None)
            .unwrap();
        for (i, row) in costs.iter().enumerate() {
            for (j, &c) in row.iter().enumerate() {
                let reduced = i64::from(c) - solution.row_potentials[i] - solution.col_potentials[j];
                assert!(reduced >= 0, "negative reduced cost at ({i},{j})");
            }
        }
        for (i, j) in solution.pairs() {
            let c = i64::from(costs[i][j]);
            assert_eq!(c, solution.row_potentials[i] + solution.col_potentials[j]);
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let costs: Vec<Vec<f64>> = vec![vec![]];
        let err = solve_dense(&costs).unwrap_err();
        assert!(matches!(
            err,
            SolveError::Matrix(MatrixError::EmptyInput { nrows: 1, ncols: 0 })
        ));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500 s");
        assert_eq!(format_duration(Duration::from_micros(2500)), "2.500 ms");
        assert_eq!(format_duration(Duration::from_nanos(12)), "12 ns");
    }
}
