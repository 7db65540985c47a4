//! The [`Collector`] fold protocol shared by every terminal operation.

use std::fmt::{self, Debug};
use std::sync::Arc;

type IdentityFn<A> = dyn Fn() -> A + Send + Sync;
type InterruptFn<A> = dyn Fn(&A) -> bool + Send + Sync;
type AccumulateFn<E, A> = dyn Fn(&mut A, E, usize) + Send + Sync;
type CombineFn<A> = dyn Fn(A, A) -> A + Send + Sync;
type FinishFn<A, R> = dyn Fn(A) -> R + Send + Sync;

/// How far an interrupt reaches when a [`Collector`] runs sharded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelScope {
    /// An interrupt in any shard decides the whole result, so every shard stops.
    #[default]
    Global,
    /// The earliest fold position at which any shard interrupted decides the result. Shards stop
    /// once they are past that position; shards still before it keep folding, since they may
    /// hold an earlier answer, e.g. for "find first".
    Earliest,
}

/// A fold descriptor: identity, optional interrupt, accumulator, combiner, and finisher.
///
/// Sequentially, a collector starts from `identity()`, feeds every element to the accumulator,
/// and stops as soon as the interrupt returns `true` for the accumulator (which also stops the
/// source from producing). Sharded, each shard folds its own partial accumulator and the partials
/// are merged with the combiner in shard order, so the combiner must be associative and must not
/// care which shard produced which partial.
///
/// Along with each element the accumulator gets its fold position: the index in rank order for
/// ordered sources, the production position otherwise. Positions are global across shards.
pub struct Collector<E, A, R> {
    identity: Arc<IdentityFn<A>>,
    interrupt: Option<Arc<InterruptFn<A>>>,
    accumulator: Arc<AccumulateFn<E, A>>,
    combiner: Arc<CombineFn<A>>,
    finisher: Arc<FinishFn<A, R>>,
    scope: CancelScope,
}

impl<E, A, R> Clone for Collector<E, A, R> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            interrupt: self.interrupt.clone(),
            accumulator: Arc::clone(&self.accumulator),
            combiner: Arc::clone(&self.combiner),
            finisher: Arc::clone(&self.finisher),
            scope: self.scope,
        }
    }
}

impl<E, A, R> Debug for Collector<E, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("interrupting", &self.interrupt.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<E, A, R> Collector<E, A, R> {
    /// Creates a non-interrupting collector.
    pub fn new(
        identity: impl Fn() -> A + Send + Sync + 'static,
        accumulator: impl Fn(&mut A, E, usize) + Send + Sync + 'static,
        combiner: impl Fn(A, A) -> A + Send + Sync + 'static,
        finisher: impl Fn(A) -> R + Send + Sync + 'static,
    ) -> Self {
        Self {
            identity: Arc::new(identity),
            interrupt: None,
            accumulator: Arc::new(accumulator),
            combiner: Arc::new(combiner),
            finisher: Arc::new(finisher),
            scope: CancelScope::Global,
        }
    }

    /// Adds a short-circuit predicate over the accumulator, checked right after each element is
    /// accumulated.
    ///
    /// Once it returns `true` the fold (or shard, see [`CancelScope`]) stops, and so does the
    /// source, without producing another element.
    pub fn with_interrupt(mut self, interrupt: impl Fn(&A) -> bool + Send + Sync + 'static) -> Self {
        self.interrupt = Some(Arc::new(interrupt));
        self
    }

    /// Sets how far an interrupt reaches in a sharded fold. Defaults to [`CancelScope::Global`].
    pub fn with_cancel_scope(mut self, scope: CancelScope) -> Self {
        self.scope = scope;
        self
    }

    /// The interrupt's [`CancelScope`].
    pub fn cancel_scope(&self) -> CancelScope {
        self.scope
    }

    /// Returns `true` if this collector can short-circuit.
    pub fn is_interrupting(&self) -> bool {
        self.interrupt.is_some()
    }

    /// Runs this collector sequentially over `items`, positioned `0..`.
    pub fn collect_iter(&self, items: impl IntoIterator<Item = E>) -> R {
        let mut accumulator = self.identity();
        for (position, element) in items.into_iter().enumerate() {
            self.accumulate(&mut accumulator, element, position);
            if self.interrupted(&accumulator) {
                break;
            }
        }
        self.finish(accumulator)
    }

    pub(crate) fn identity(&self) -> A {
        (self.identity)()
    }

    pub(crate) fn interrupted(&self, accumulator: &A) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|interrupt| (interrupt)(accumulator))
    }

    pub(crate) fn accumulate(&self, accumulator: &mut A, element: E, position: usize) {
        (self.accumulator)(accumulator, element, position)
    }

    pub(crate) fn combine(&self, left: A, right: A) -> A {
        (self.combiner)(left, right)
    }

    pub(crate) fn finish(&self, accumulator: A) -> R {
        (self.finisher)(accumulator)
    }
}
