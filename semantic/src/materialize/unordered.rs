use crate::fold::Source;
use crate::generator::Generator;
use crate::materialize::Materialized;
use crate::stream::Stream;

/// A materialization which folds directly over the generator.
///
/// Timestamps are ignored for ordering: results follow production order sequentially and have no
/// guaranteed order in parallel. Nothing is buffered, so every terminal operation re-runs the
/// pipeline.
pub struct Unordered<E> {
    generator: Generator<E>,
    concurrency: usize,
}

impl<E> Clone for Unordered<E> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            concurrency: self.concurrency,
        }
    }
}

impl<E: 'static> Unordered<E> {
    pub(crate) fn new(generator: Generator<E>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency,
        }
    }

    /// Returns to a lazy stream handle over the same generator.
    pub fn into_stream(self) -> Stream<E> {
        Stream::new(self.generator, self.concurrency)
    }
}

impl<E> Materialized<E> for Unordered<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn source(&self) -> Source<E> {
        Source::from_generator(self.generator.clone())
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }
}
