//! Dense rectangular linear assignment solved with shortest augmenting paths.
//!
//! Given an `m x n` cost matrix, this crate finds a minimum-cost matching of
//! every index of the smaller dimension to a distinct index of the larger one.
//! Entries that are NaN or +inf mark forbidden pairings.
//!
//! How it works (high level):
//! - Copy the input into a dense working buffer, transposed if it has more
//!   rows than columns, with forbidden entries replaced by a large sentinel.
//! - Insert rows one at a time, each along a shortest augmenting path found
//!   by a Dijkstra search over reduced costs (Jonker-Volgenant style).
//! - Map the assignment back to the caller's row and column indices.
//!
//! Calling it:
//! - Any `CostInput` works: nested `Vec`s, arrays, `CostMatrixRef` strided
//!   views, `CostMatrix`, or `faer_core::MatRef` for `f32`/`f64`.
//! - Scalars may be `i32`, `i64`, `f32` or `f64`.
//! - Use `solve_dense` for plain index vectors, or `LapSolver::solve` to
//!   reuse the workspace and get costs, potentials and `SolverStats`.
//!
//! Example:
//! ```rust
//! use lapsolver_rs::{solve_dense, LapSolver, SolverOptions};
//!
//! let costs: Vec<Vec<i32>> = vec![vec![6, 9, 1], vec![10, 3, 2], vec![8, 7, 4]];
//! let (rows, cols) = solve_dense(&costs).unwrap();
//! assert_eq!(rows, vec![0, 1, 2]);
//! assert_eq!(cols, vec![2, 1, 0]);
//!
//! let mut solver = LapSolver::new();
//! let solution = solver.solve(&costs, &SolverOptions::default(), None).unwrap();
//! assert_eq!(solution.total_cost, Some(12));
//! ```

mod matrix;
mod report;
mod scalar;
mod solution;
mod solver;

pub use matrix::{CostInput, CostMatrix, CostMatrixRef, MatrixError};
pub use report::{AugmentReport, Reporter, SolveStatus, SolverStats, StdoutReporter};
pub use scalar::{Accumulator, CostScalar, Entry};
pub use solution::Solution;
pub use solver::{solve_dense, AccOf, LapSolver, SolveError, SolverOptions};
