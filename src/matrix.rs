use core::fmt;

use faer_core::{Entity, MatRef};

use crate::scalar::{Accumulator, CostScalar, Entry};

/// Validation errors raised while reading a cost matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// The matrix has zero rows or zero columns.
    EmptyInput { nrows: usize, ncols: usize },
    /// Rows have different lengths, or a buffer does not match its shape.
    MalformedInput {
        row: usize,
        expected: usize,
        actual: usize,
    },
    /// An entry is -Infinity.
    InvalidCost { row: usize, col: usize },
    /// The forbidden-entry sentinel does not fit in the accumulation type.
    CostOverflow,
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput { nrows, ncols } => {
                write!(f, "cost matrix is empty: nrows={nrows}, ncols={ncols}")
            }
            Self::MalformedInput {
                row,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "row {row} has {actual} entries, expected {expected}"
                )
            }
            Self::InvalidCost { row, col } => {
                write!(f, "entry ({row},{col}) is -inf")
            }
            Self::CostOverflow => {
                write!(f, "cost magnitudes too large for the accumulation type")
            }
        }
    }
}

impl std::error::Error for MatrixError {}

/// Read access to a dense cost matrix.
///
/// The solver only ever reads entries through this trait and copies them
/// into its own buffer, so implementors may be strided or borrowed views.
pub trait CostInput {
    /// Element type.
    type Scalar: CostScalar;

    /// Number of rows.
    fn nrows(&self) -> usize;

    /// Number of columns.
    fn ncols(&self) -> usize;

    /// Entry at `(row, col)`. Indices are in bounds.
    fn entry(&self, row: usize, col: usize) -> Self::Scalar;

    /// Checks that the input is a proper rectangle.
    fn check_shape(&self) -> Result<(), MatrixError> {
        Ok(())
    }
}

impl<C: CostInput + ?Sized> CostInput for &C {
    type Scalar = C::Scalar;

    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> Self::Scalar {
        (**self).entry(row, col)
    }

    fn check_shape(&self) -> Result<(), MatrixError> {
        (**self).check_shape()
    }
}

/// Borrowed, possibly strided view of a cost matrix.
///
/// Transposes and sub-views are O(1) and never copy.
#[derive(Debug, Clone, Copy)]
pub struct CostMatrixRef<'a, T> {
    data: &'a [T],
    offset: usize,
    nrows: usize,
    ncols: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<'a, T: CostScalar> CostMatrixRef<'a, T> {
    /// View over a row-major slice of length `nrows * ncols`.
    pub fn from_row_major(
        data: &'a [T],
        nrows: usize,
        ncols: usize,
    ) -> Result<Self, MatrixError> {
        Self::from_row_major_with_stride(data, nrows, ncols, ncols)
    }

    /// View over a row-major slice whose rows start `row_stride` apart.
    pub fn from_row_major_with_stride(
        data: &'a [T],
        nrows: usize,
        ncols: usize,
        row_stride: usize,
    ) -> Result<Self, MatrixError> {
        let needed = match nrows {
            0 => Some(0),
            _ => (nrows - 1)
                .checked_mul(row_stride)
                .and_then(|start| start.checked_add(ncols)),
        };
        let needed = needed.ok_or_else(|| shape_overflow(nrows, data.len()))?;
        if row_stride < ncols || data.len() < needed {
            return Err(MatrixError::MalformedInput {
                row: nrows.saturating_sub(1),
                expected: needed,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            offset: 0,
            nrows,
            ncols,
            row_stride,
            col_stride: 1,
        })
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Entry at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[track_caller]
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.nrows && col < self.ncols);
        self.data[self.offset + row * self.row_stride + col * self.col_stride]
    }

    /// Swaps the roles of rows and columns.
    pub fn transpose(self) -> Self {
        Self {
            nrows: self.ncols,
            ncols: self.nrows,
            row_stride: self.col_stride,
            col_stride: self.row_stride,
            ..self
        }
    }

    /// View of the `nrows x ncols` block starting at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the block does not fit inside the matrix.
    #[track_caller]
    pub fn submatrix(self, row: usize, col: usize, nrows: usize, ncols: usize) -> Self {
        assert!(row + nrows <= self.nrows && col + ncols <= self.ncols);
        Self {
            offset: self.offset + row * self.row_stride + col * self.col_stride,
            nrows,
            ncols,
            ..self
        }
    }

    /// Copies the view into an owned, contiguous matrix.
    pub fn to_matrix(&self) -> Result<CostMatrix<T>, MatrixError> {
        let len = self
            .nrows
            .checked_mul(self.ncols)
            .ok_or_else(|| shape_overflow(self.nrows, self.data.len()))?;
        let mut data = Vec::with_capacity(len);
        for row in 0..self.nrows {
            for col in 0..self.ncols {
                data.push(self.get(row, col));
            }
        }
        Ok(CostMatrix {
            data,
            nrows: self.nrows,
            ncols: self.ncols,
        })
    }
}

impl<T: CostScalar> CostInput for CostMatrixRef<'_, T> {
    type Scalar = T;

    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> T {
        self.data[self.offset + row * self.row_stride + col * self.col_stride]
    }
}

/// Owned, row-major cost matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: CostScalar> CostMatrix<T> {
    /// Takes ownership of a row-major buffer of length `nrows * ncols`.
    pub fn from_row_major(data: Vec<T>, nrows: usize, ncols: usize) -> Result<Self, MatrixError> {
        let expected = nrows
            .checked_mul(ncols)
            .ok_or_else(|| shape_overflow(nrows, data.len()))?;
        if data.len() != expected {
            return Err(MatrixError::MalformedInput {
                row: nrows.saturating_sub(1),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, nrows, ncols })
    }

    /// Builds a matrix from rows, rejecting ragged input.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self, MatrixError> {
        let ncols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * ncols);
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != ncols {
                return Err(MatrixError::MalformedInput {
                    row,
                    expected: ncols,
                    actual: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Ok(Self {
            data,
            nrows: rows.len(),
            ncols,
        })
    }

    /// Borrowed view of the whole matrix.
    pub fn as_ref(&self) -> CostMatrixRef<'_, T> {
        CostMatrixRef {
            data: &self.data,
            offset: 0,
            nrows: self.nrows,
            ncols: self.ncols,
            row_stride: self.ncols,
            col_stride: 1,
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Row-major entries.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: CostScalar> CostInput for CostMatrix<T> {
    type Scalar = T;

    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> T {
        self.data[row * self.ncols + col]
    }
}

impl<T: CostScalar> CostInput for [Vec<T>] {
    type Scalar = T;

    fn nrows(&self) -> usize {
        self.len()
    }

    fn ncols(&self) -> usize {
        self.first().map_or(0, Vec::len)
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> T {
        self[row][col]
    }

    fn check_shape(&self) -> Result<(), MatrixError> {
        let expected = CostInput::ncols(self);
        match self.iter().position(|r| r.len() != expected) {
            Some(row) => Err(MatrixError::MalformedInput {
                row,
                expected,
                actual: self[row].len(),
            }),
            None => Ok(()),
        }
    }
}

impl<T: CostScalar> CostInput for Vec<Vec<T>> {
    type Scalar = T;

    fn nrows(&self) -> usize {
        self.as_slice().nrows()
    }

    fn ncols(&self) -> usize {
        self.as_slice().ncols()
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> T {
        self[row][col]
    }

    fn check_shape(&self) -> Result<(), MatrixError> {
        self.as_slice().check_shape()
    }
}

impl<T: CostScalar, const N: usize> CostInput for [[T; N]] {
    type Scalar = T;

    fn nrows(&self) -> usize {
        self.len()
    }

    fn ncols(&self) -> usize {
        N
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> T {
        self[row][col]
    }
}

impl<T: CostScalar, const N: usize, const M: usize> CostInput for [[T; N]; M] {
    type Scalar = T;

    fn nrows(&self) -> usize {
        M
    }

    fn ncols(&self) -> usize {
        N
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> T {
        self[row][col]
    }
}

impl<E: Entity + CostScalar> CostInput for MatRef<'_, E> {
    type Scalar = E;

    fn nrows(&self) -> usize {
        MatRef::nrows(self)
    }

    fn ncols(&self) -> usize {
        MatRef::ncols(self)
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> E {
        self.read(row, col)
    }
}

/// A declared shape whose element count does not fit in `usize`.
fn shape_overflow(nrows: usize, actual: usize) -> MatrixError {
    MatrixError::MalformedInput {
        row: nrows.saturating_sub(1),
        expected: usize::MAX,
        actual,
    }
}

/// Dense working copy handed to the assignment engine.
///
/// Always has `nrows <= ncols`; if the caller's matrix was taller than wide
/// the copy holds its transpose and `transposed` is set.
#[derive(Debug, Clone)]
pub(crate) struct CostBuffer<A> {
    values: Vec<A>,
    nrows: usize,
    ncols: usize,
    transposed: bool,
    large_cost: Option<A>,
    forbidden: usize,
}

impl<A: Accumulator> CostBuffer<A> {
    /// Validates `input` and copies it, substituting the sentinel for
    /// forbidden entries.
    pub(crate) fn new<C>(input: &C) -> Result<Self, MatrixError>
    where
        C: CostInput + ?Sized,
        C::Scalar: CostScalar<Acc = A>,
    {
        input.check_shape()?;
        let (in_rows, in_cols) = (input.nrows(), input.ncols());
        if in_rows == 0 || in_cols == 0 {
            return Err(MatrixError::EmptyInput {
                nrows: in_rows,
                ncols: in_cols,
            });
        }

        let mut max_abs = A::zero();
        let mut forbidden = 0;
        for row in 0..in_rows {
            for col in 0..in_cols {
                match input.entry(row, col).classify() {
                    Entry::Finite(value) => {
                        let value = value.magnitude();
                        if value > max_abs {
                            max_abs = value;
                        }
                    }
                    Entry::Forbidden => forbidden += 1,
                    Entry::NegInfinite => return Err(MatrixError::InvalidCost { row, col }),
                }
            }
        }

        let transposed = in_rows > in_cols;
        let (nrows, ncols) = if transposed {
            (in_cols, in_rows)
        } else {
            (in_rows, in_cols)
        };
        // Finite matrices never see the sentinel, whatever their magnitude.
        let large_cost = match forbidden {
            0 => None,
            _ => Some(A::large_cost(max_abs, nrows).ok_or(MatrixError::CostOverflow)?),
        };
        let sentinel = large_cost.unwrap_or(max_abs);

        let mut values = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                let entry = if transposed {
                    input.entry(j, i)
                } else {
                    input.entry(i, j)
                };
                values.push(match entry.classify() {
                    Entry::Finite(value) => value,
                    _ => sentinel,
                });
            }
        }

        log::debug!(
            "normalized {in_rows}x{in_cols} cost matrix: transposed={transposed}, \
             forbidden={forbidden}, large_cost={large_cost:?}"
        );

        Ok(Self {
            values,
            nrows,
            ncols,
            transposed,
            large_cost,
            forbidden,
        })
    }

    pub(crate) fn nrows(&self) -> usize {
        self.nrows
    }

    pub(crate) fn ncols(&self) -> usize {
        self.ncols
    }

    pub(crate) fn transposed(&self) -> bool {
        self.transposed
    }

    pub(crate) fn large_cost(&self) -> Option<A> {
        self.large_cost
    }

    pub(crate) fn forbidden(&self) -> usize {
        self.forbidden
    }

    /// Working costs of row `i`.
    #[inline]
    pub(crate) fn row(&self, i: usize) -> &[A] {
        &self.values[i * self.ncols..(i + 1) * self.ncols]
    }
}
