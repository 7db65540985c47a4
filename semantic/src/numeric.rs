//! The [`Numeric`] bound required by statistics and numeric ranges.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

/// A numeric type supporting `+ - * /`, square roots, and a total order.
///
/// Implemented for the primitive floats and the signed primitive integers. For integers, division
/// truncates and [`Numeric::sqrt`] is computed in `f64` and truncated back. Unsigned integers are
/// left out since deviations from the mean go negative.
pub trait Numeric:
    Copy
    + PartialOrd
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Converts a population size or count.
    fn from_usize(n: usize) -> Self;

    /// Square root.
    fn sqrt(self) -> Self;

    /// A total order, consistent with [`PartialOrd`] where that is defined.
    fn total_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! impl_numeric_float {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                const ZERO: Self = 0.0;
                const ONE: Self = 1.0;

                fn from_usize(n: usize) -> Self {
                    n as Self
                }

                fn sqrt(self) -> Self {
                    <$ty>::sqrt(self)
                }

                fn total_cmp(&self, other: &Self) -> Ordering {
                    <$ty>::total_cmp(self, other)
                }
            }
        )*
    };
}

macro_rules! impl_numeric_int {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                const ZERO: Self = 0;
                const ONE: Self = 1;

                fn from_usize(n: usize) -> Self {
                    n as Self
                }

                fn sqrt(self) -> Self {
                    (self as f64).sqrt() as Self
                }

                fn total_cmp(&self, other: &Self) -> Ordering {
                    Ord::cmp(self, other)
                }
            }
        )*
    };
}

impl_numeric_float!(f32, f64);
impl_numeric_int!(i32, i64);
