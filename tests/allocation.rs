use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use lapsolver_rs::{LapSolver, SolverOptions};

struct CountingAlloc;

static ALLOC_TOTAL: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            ALLOC_TOTAL.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            ALLOC_TOTAL.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe {
            System.dealloc(ptr, layout);
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            ALLOC_TOTAL.fetch_add(new_size, Ordering::Relaxed);
        }
        new_ptr
    }
}

fn reset_alloc_counter() {
    ALLOC_TOTAL.store(0, Ordering::SeqCst);
}

fn allocated_bytes() -> usize {
    ALLOC_TOTAL.load(Ordering::SeqCst)
}

#[test]
fn warm_solver_reuses_its_workspace() {
    let n = 200;
    let costs: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| ((i * 37 + j * 91) % 101) as f64).collect())
        .collect();
    let opts = SolverOptions::default();

    reset_alloc_counter();
    let mut solver = LapSolver::new();
    let cold = solver.solve(&costs, &opts, None).unwrap();
    let cold_bytes = allocated_bytes();

    reset_alloc_counter();
    let warm = solver.solve(&costs, &opts, None).unwrap();
    let warm_bytes = allocated_bytes();

    assert_eq!(cold.col_indices, warm.col_indices);
    assert!(warm_bytes < cold_bytes, "warm {warm_bytes} >= cold {cold_bytes}");
    // Working copy of the costs plus the per-call index and potential vectors.
    let budget = n * n * 8 + 16 * n * 8;
    assert!(warm_bytes <= budget, "allocations too high: {warm_bytes}");
}
