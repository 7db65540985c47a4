use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use crate::fold::Source;
use crate::materialize::{Materialized, Ordered};
use crate::numeric::Numeric;
use crate::stream::Stream;

type Mapper<E, D> = Arc<dyn Fn(&E) -> D + Send + Sync>;

/// Occurrence counts of each distinct value, in ascending value order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frequency<D> {
    counts: Vec<(D, usize)>,
}

impl<D: Numeric> Frequency<D> {
    /// Run-length counts over an already sorted slice.
    fn from_sorted(sorted: &[D]) -> Self {
        let mut counts: Vec<(D, usize)> = Vec::new();
        for &value in sorted {
            match counts.last_mut() {
                Some((last, count)) if Ordering::Equal == last.total_cmp(&value) => *count += 1,
                _ => counts.push((value, 1)),
            }
        }
        Self { counts }
    }

    /// How many times `value` occurs.
    pub fn get(&self, value: &D) -> usize {
        self.counts
            .binary_search_by(|(key, _)| key.total_cmp(value))
            .map_or(0, |index| self.counts[index].1)
    }

    /// `(value, count)` pairs in ascending value order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (D, usize)> {
        self.counts.iter().copied()
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Descriptive statistics over `mapper(element)` for every element of an ordered snapshot.
///
/// Sorted values, frequencies, mean, and variance are computed on first use and cached until
/// [`Self::reassign`]. Statistics which need a minimum population return zero below it: every
/// statistic of an empty population, `variance` and `standard_deviation` below two elements,
/// `skewness` below three, and `kurtosis` below four. `skewness` and `kurtosis` are also zero when
/// the standard deviation is.
pub struct Statistics<E, D> {
    ordered: Ordered<E>,
    mapper: Mapper<E, D>,
    sorted: OnceLock<Vec<D>>,
    frequency: OnceLock<Frequency<D>>,
    mean: OnceLock<D>,
    variance: OnceLock<D>,
}

impl<E, D> Statistics<E, D>
where
    E: Clone + Send + Sync + 'static,
    D: Numeric,
{
    pub(crate) fn new(ordered: Ordered<E>, mapper: Mapper<E, D>) -> Self {
        Self {
            ordered,
            mapper,
            sorted: OnceLock::new(),
            frequency: OnceLock::new(),
            mean: OnceLock::new(),
            variance: OnceLock::new(),
        }
    }

    /// The underlying ordered snapshot.
    pub fn ordered(&self) -> &Ordered<E> {
        &self.ordered
    }

    /// Population size.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns `true` if the population is empty.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Replaces the population by materializing `stream`, discarding every cached statistic.
    pub fn reassign(&mut self, stream: Stream<E>) {
        self.ordered.reassign(stream);
        self.sorted.take();
        self.frequency.take();
        self.mean.take();
        self.variance.take();
    }

    /// Mapped values, in rank order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = D> {
        self.ordered.iter().map(|element| (self.mapper)(element))
    }

    /// Mapped values, ascending.
    pub fn sorted(&self) -> &[D] {
        self.sorted.get_or_init(|| {
            let mut sorted = self.values().collect::<Vec<_>>();
            sorted.sort_by(|a, b| a.total_cmp(b));
            sorted
        })
    }

    /// Sum of all values.
    pub fn sum(&self) -> D {
        self.values().fold(D::ZERO, |sum, value| sum + value)
    }

    /// Arithmetic mean.
    pub fn mean(&self) -> D {
        *self.mean.get_or_init(|| match self.len() {
            0 => D::ZERO,
            n => self.sum() / D::from_usize(n),
        })
    }

    /// Sample variance, dividing by `N - 1`.
    pub fn variance(&self) -> D {
        *self.variance.get_or_init(|| {
            let n = self.len();
            if n < 2 {
                return D::ZERO;
            }
            let squares = self.central_moment_sum(|deviation| deviation * deviation);
            squares / D::from_usize(n - 1)
        })
    }

    /// Square root of the sample variance.
    pub fn standard_deviation(&self) -> D {
        self.variance().sqrt()
    }

    /// The middle value, or the mean of the two middle values.
    pub fn median(&self) -> D {
        let sorted = self.sorted();
        let n = sorted.len();
        match n {
            0 => D::ZERO,
            _ if n % 2 == 1 => sorted[n / 2],
            _ => (sorted[n / 2 - 1] + sorted[n / 2]) / (D::ONE + D::ONE),
        }
    }

    /// `[sorted[N / 4], median, sorted[3N / 4]]`, without interpolation.
    pub fn quartiles(&self) -> [D; 3] {
        let sorted = self.sorted();
        let n = sorted.len();
        if n == 0 {
            return [D::ZERO; 3];
        }
        [sorted[n / 4], self.median(), sorted[3 * n / 4]]
    }

    /// Third quartile minus first quartile.
    pub fn interquartile_range(&self) -> D {
        let [first, _, third] = self.quartiles();
        third - first
    }

    /// Largest value minus smallest value.
    pub fn range(&self) -> D {
        match self.sorted() {
            [] => D::ZERO,
            [min, .., max] => *max - *min,
            [_] => D::ZERO,
        }
    }

    /// Occurrence count of every distinct value.
    ///
    /// Computed once; repeated calls return the same instance until [`Self::reassign`].
    pub fn frequency(&self) -> &Frequency<D> {
        self.frequency
            .get_or_init(|| Frequency::from_sorted(self.sorted()))
    }

    /// The most frequent value. Ties go to the smallest value.
    pub fn mode(&self) -> D {
        let mut mode = D::ZERO;
        let mut best = 0;
        for (value, count) in self.frequency().iter() {
            if count > best {
                mode = value;
                best = count;
            }
        }
        mode
    }

    /// Third central moment over `N`, normalized by the sample standard deviation cubed.
    pub fn skewness(&self) -> D {
        let n = self.len();
        let deviation = self.standard_deviation();
        if n < 3 || D::ZERO == deviation {
            return D::ZERO;
        }
        let moment = self.central_moment_sum(|d| d * d * d) / D::from_usize(n);
        moment / (deviation * deviation * deviation)
    }

    /// Excess kurtosis: fourth central moment over `N`, normalized by the sample standard
    /// deviation to the fourth, minus three.
    pub fn kurtosis(&self) -> D {
        let n = self.len();
        let deviation = self.standard_deviation();
        if n < 4 || D::ZERO == deviation {
            return D::ZERO;
        }
        let moment = self.central_moment_sum(|d| d * d * d * d) / D::from_usize(n);
        let variance = deviation * deviation;
        moment / (variance * variance) - D::from_usize(3)
    }

    fn central_moment_sum(&self, power: impl Fn(D) -> D) -> D {
        let mean = self.mean();
        self.values()
            .fold(D::ZERO, |sum, value| sum + power(value - mean))
    }
}

impl<E, D> Materialized<E> for Statistics<E, D>
where
    E: Clone + Send + Sync + 'static,
    D: Numeric,
{
    fn source(&self) -> Source<E> {
        self.ordered.source()
    }

    fn concurrency(&self) -> usize {
        self.ordered.concurrency()
    }

    fn count(&self) -> usize {
        self.ordered.len()
    }
}
