use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use bytemuck::Pod;
use num_traits::{Bounded, ToPrimitive, Zero};

/// Numeric type the solver accumulates potentials and path lengths in.
///
/// Implemented for `i64`, `i128` and `f64`.
pub trait Accumulator:
    Copy
    + PartialOrd
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + AddAssign
    + SubAssign
    + Zero
    + Bounded
    + ToPrimitive
    + Pod
    + Send
    + Sync
    + 'static
{
    /// Absolute value.
    fn magnitude(self) -> Self;

    /// Sentinel cost for forbidden entries: `2 * rows * max_abs + 1`, or
    /// `4 * rows * max_abs` for floats too large to show the `+ 1`.
    ///
    /// Returns `None` if the sentinel, scaled by `rows + 1` to leave room for
    /// potential updates, does not fit in the type.
    fn large_cost(max_abs: Self, rows: usize) -> Option<Self>;
}

macro_rules! impl_int_accumulator {
    ($($ty:ty),*) => {$(
        impl Accumulator for $ty {
            #[inline]
            fn magnitude(self) -> Self {
                self.abs()
            }

            fn large_cost(max_abs: Self, rows: usize) -> Option<Self> {
                let rows = <$ty>::try_from(rows).ok()?;
                let large = max_abs.checked_mul(2)?.checked_mul(rows)?.checked_add(1)?;
                large.checked_mul(rows.checked_add(1)?)?;
                Some(large)
            }
        }
    )*};
}

impl_int_accumulator!(i64, i128);

impl Accumulator for f64 {
    #[inline]
    fn magnitude(self) -> Self {
        self.abs()
    }

    fn large_cost(max_abs: Self, rows: usize) -> Option<Self> {
        let rows = rows as f64;
        let spread = 2.0 * rows * max_abs;
        let mut large = spread + 1.0;
        // Once the `+ 1` is absorbed, doubling still dominates any spread.
        if large <= spread {
            large = 2.0 * spread;
        }
        (large * (rows + 1.0)).is_finite().then_some(large)
    }
}

/// Classification of a single cost entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<A> {
    /// A usable cost, widened to the accumulation type.
    Finite(A),
    /// NaN or +Infinity: the pairing is not allowed.
    Forbidden,
    /// -Infinity, which makes the minimization unbounded.
    NegInfinite,
}

/// Element type of a cost matrix.
///
/// Implemented for `i32`, `i64`, `f32` and `f64`. Each scalar names the wider
/// type the solver works in, so `i32` inputs never overflow while sentinel
/// costs are added up.
pub trait CostScalar: Copy + fmt::Debug + Send + Sync + 'static {
    /// Working type of the solver for this scalar.
    type Acc: Accumulator;

    /// Classifies the entry as finite, forbidden or invalid.
    fn classify(self) -> Entry<Self::Acc>;

    /// Lossless conversion to the accumulation type, keeping NaN and
    /// infinities as they are.
    fn widen(self) -> Self::Acc;
}

macro_rules! impl_int_scalar {
    ($($ty:ty => $acc:ty),*) => {$(
        impl CostScalar for $ty {
            type Acc = $acc;

            #[inline]
            fn classify(self) -> Entry<$acc> {
                Entry::Finite(self.widen())
            }

            #[inline]
            fn widen(self) -> $acc {
                <$acc>::from(self)
            }
        }
    )*};
}

macro_rules! impl_float_scalar {
    ($($ty:ty),*) => {$(
        impl CostScalar for $ty {
            type Acc = f64;

            #[inline]
            fn classify(self) -> Entry<f64> {
                if self.is_finite() {
                    Entry::Finite(self.widen())
                } else if self == <$ty>::NEG_INFINITY {
                    Entry::NegInfinite
                } else {
                    Entry::Forbidden
                }
            }

            #[inline]
            fn widen(self) -> f64 {
                f64::from(self)
            }
        }
    )*};
}

impl_int_scalar!(i32 => i64, i64 => i128);
impl_float_scalar!(f32, f64);
