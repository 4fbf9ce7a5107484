use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Every returned pair uses a finite cost.
    Optimal,
    /// Some rows could only be matched through forbidden entries.
    UsedForbidden,
}

#[derive(Debug, Clone)]
pub struct SolverStats {
    pub status: SolveStatus,
    /// Shape of the caller's matrix.
    pub nrows: usize,
    pub ncols: usize,
    /// The working copy was the transpose of the input.
    pub transposed: bool,
    /// NaN or +inf entries in the input.
    pub forbidden_entries: usize,
    /// Forbidden entries on the optimal assignment.
    pub forbidden_assigned: usize,
    /// Pairs left out because `drop_forbidden` was set.
    pub dropped: usize,
    /// Sentinel cost substituted for forbidden entries, if there were any.
    pub large_cost: Option<f64>,
    /// Rows scanned over all shortest path searches.
    pub rows_scanned: usize,
}

/// One shortest augmenting path search.
#[derive(Debug, Clone)]
pub struct AugmentReport {
    /// Row of the working matrix being inserted.
    pub row: usize,
    /// Rows scanned before a free column was reached.
    pub rows_scanned: usize,
    /// Assigned pairs rotated along the path, including the new one.
    pub path_len: usize,
    /// Reduced length of the augmenting path.
    pub distance: f64,
    /// Free column that ended the path.
    pub sink: usize,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

pub trait Reporter {
    fn on_augment(&mut self, report: &AugmentReport);
    fn on_finish(&mut self) {}
}

/// Prints a table of augmentations when the solve finishes.
///
/// Only the first `limit` searches get a row of their own; the rest are
/// folded into a summary line.
pub struct StdoutReporter {
    rows: Vec<AugmentReport>,
    limit: usize,
    skipped: usize,
    skipped_scans: usize,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self::with_limit(32)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            rows: Vec::new(),
            limit,
            skipped: 0,
            skipped_scans: 0,
        }
    }
}

impl Default for StdoutReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for StdoutReporter {
    fn on_augment(&mut self, report: &AugmentReport) {
        if self.rows.len() < self.limit {
            self.rows.push(report.clone());
        } else {
            self.skipped += 1;
            self.skipped_scans += report.rows_scanned;
        }
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if !log::log_enabled!(log::Level::Info) {
            println!();
        }
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("row").set_alignment(CellAlignment::Right),
            Cell::new("scanned").set_alignment(CellAlignment::Right),
            Cell::new("path").set_alignment(CellAlignment::Right),
            Cell::new("distance").set_alignment(CellAlignment::Right),
            Cell::new("sink").set_alignment(CellAlignment::Right),
        ]);
        for row in &self.rows {
            table.add_row(vec![
                Cell::new(row.row).set_alignment(CellAlignment::Right),
                Cell::new(row.rows_scanned).set_alignment(CellAlignment::Right),
                Cell::new(row.path_len).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4e}", row.distance)).set_alignment(CellAlignment::Right),
                Cell::new(row.sink).set_alignment(CellAlignment::Right),
            ]);
        }
        if self.skipped > 0 {
            table.add_row(vec![
                Cell::new(format!("+{}", self.skipped)).set_alignment(CellAlignment::Right),
                Cell::new(self.skipped_scans).set_alignment(CellAlignment::Right),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ]);
        }

        for line in table.to_string().lines() {
            emit_line(line);
        }
        self.rows.clear();
        self.skipped = 0;
        self.skipped_scans = 0;
    }
}
