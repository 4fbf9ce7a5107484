use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use lapsolver_rs::{CostMatrix, LapSolver, SolveStatus, SolverOptions};

/// Persisted problem: a cost matrix and the optimal total cost.
///
/// Text layout, `#` lines ignored:
/// ```text
/// dtype i64|f64
/// shape <nrows> <ncols>
/// total <cost>
/// <one matrix row per line, whitespace separated, nan/inf allowed>
/// ```
struct Fixture {
    name: String,
    dtype: String,
    nrows: usize,
    ncols: usize,
    total: String,
    rows: Vec<Vec<String>>,
}

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/dense")
}

fn header<'a>(lines: &mut impl Iterator<Item = &'a str>, key: &str, name: &str) -> Vec<&'a str> {
    let line = lines
        .next()
        .unwrap_or_else(|| panic!("{name}: missing `{key}` line"));
    let mut fields = line.split_whitespace();
    assert_eq!(fields.next(), Some(key), "{name}: expected `{key}` line");
    fields.collect()
}

fn load_fixture(path: &Path) -> Fixture {
    let name = path.file_stem().unwrap().to_string_lossy().into_owned();
    let text = fs::read_to_string(path).unwrap();
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let dtype = header(&mut lines, "dtype", &name)[0].to_owned();
    let shape = header(&mut lines, "shape", &name);
    let nrows = shape[0].parse().unwrap();
    let ncols = shape[1].parse().unwrap();
    let total = header(&mut lines, "total", &name)[0].to_owned();
    let rows: Vec<Vec<String>> = lines
        .map(|l| l.split_whitespace().map(str::to_owned).collect())
        .collect();
    assert_eq!(rows.len(), nrows, "{name}: row count");

    Fixture {
        name,
        dtype,
        nrows,
        ncols,
        total,
        rows,
    }
}

fn parse_matrix<T: std::str::FromStr>(fixture: &Fixture) -> Vec<Vec<T>>
where
    T::Err: std::fmt::Debug,
{
    fixture
        .rows
        .iter()
        .map(|row| row.iter().map(|x| x.parse().unwrap()).collect())
        .collect()
}

fn fixtures() -> Vec<Fixture> {
    let mut paths: Vec<PathBuf> = fs::read_dir(data_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();
    paths.iter().map(|p| load_fixture(p)).collect()
}

#[test]
fn fixtures_are_present() {
    let all = fixtures();
    assert!(!all.is_empty(), "no fixtures in {}", data_dir().display());
    for fixture in &all {
        assert!(fixture.rows.iter().all(|r| r.len() == fixture.ncols), "{}", fixture.name);
    }
}

#[test]
fn integer_fixtures_match_total_exactly() {
    let mut solver = LapSolver::new();
    for fixture in fixtures().iter().filter(|f| f.dtype == "i64") {
        let rows = parse_matrix::<i64>(fixture);
        let costs = CostMatrix::from_rows(&rows).unwrap();
        let solution = solver
            .solve(&costs, &SolverOptions::default(), None)
            .unwrap();

        let expected: i128 = fixture.total.parse().unwrap();
        let summed: i128 = solution
            .pairs()
            .map(|(r, c)| i128::from(rows[r][c]))
            .sum();
        assert_eq!(summed, expected, "{}", fixture.name);
        assert_eq!(solution.total_cost, Some(expected), "{}", fixture.name);
        assert_eq!(solution.len(), fixture.nrows.min(fixture.ncols), "{}", fixture.name);
    }
}

#[test]
fn float_fixtures_match_total_within_tolerance() {
    let mut solver = LapSolver::new();
    for fixture in fixtures().iter().filter(|f| f.dtype == "f64") {
        let rows = parse_matrix::<f64>(fixture);
        let solution = solver
            .solve(&rows, &SolverOptions::default(), None)
            .unwrap();

        let expected: f64 = fixture.total.parse().unwrap();
        let summed: f64 = solution.pairs().map(|(r, c)| rows[r][c]).sum();
        assert_relative_eq!(summed, expected, max_relative = 1e-9, epsilon = 1e-9);
        assert_eq!(solution.stats.status, SolveStatus::Optimal, "{}", fixture.name);
        assert_eq!(solution.len(), fixture.nrows.min(fixture.ncols), "{}", fixture.name);
    }
}

#[test]
fn float_fixtures_solve_as_f32_views() {
    // Narrowing changes the costs, so only structure is checked here.
    for fixture in fixtures().iter().filter(|f| f.dtype == "f64") {
        let rows = parse_matrix::<f32>(fixture);
        let (r, c) = lapsolver_rs::solve_dense(&rows).unwrap();
        assert_eq!(r.len(), fixture.nrows.min(fixture.ncols), "{}", fixture.name);
        assert!(r.windows(2).all(|w| w[0] < w[1]), "{}", fixture.name);
        let mut cols = c.clone();
        cols.sort_unstable();
        cols.dedup();
        assert_eq!(cols.len(), c.len(), "{}", fixture.name);
    }
}
