//! The [`Generator`], a lazy push-based element producer.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::Timestamp;

/// A generator's driving function: `(push, cancel, halted)`.
type StageFn<E> =
    dyn Fn(&mut dyn FnMut(E, Timestamp), &dyn Fn(&E) -> bool, &dyn Fn() -> bool) + Send + Sync;

/// A recipe which, when invoked, synchronously pushes `(element, timestamp)` pairs into a callback.
///
/// The second argument of [`Self::generate`] is a cancellation check. A generator calls it with
/// each element before pushing that element, and stops producing as soon as it returns `true`.
/// This is what lets short-circuiting terminal operations terminate infinite sources.
///
/// Within a pipeline, stages also hand their parents an element independent "halted" check, so a
/// consumer which has made up its mind stops the source even while intermediate stages drop every
/// element.
///
/// Generators are shared by reference count and never copied, so many stream handles may branch
/// off the same one. Invoking a generator twice replays it only if its captured computation is
/// free of side effects: a generator wrapping a random or I/O supplier is not restartable, and
/// that is the responsibility of whoever builds it.
pub struct Generator<E> {
    generate: Arc<StageFn<E>>,
}

impl<E> Clone for Generator<E> {
    fn clone(&self) -> Self {
        Self {
            generate: Arc::clone(&self.generate),
        }
    }
}

impl<E> Debug for Generator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").finish_non_exhaustive()
    }
}

impl<E: 'static> Generator<E> {
    /// Creates a generator from its driving function.
    ///
    /// `generate(push, cancel)` must call `cancel(&element)` before each `push(element, timestamp)`
    /// and return once `cancel` answers `true`.
    pub fn new<F>(generate: F) -> Self
    where
        F: Fn(&mut dyn FnMut(E, Timestamp), &dyn Fn(&E) -> bool) + Send + Sync + 'static,
    {
        Self::staged(move |push, cancel, halted| {
            generate(push, &|element| halted() || cancel(element))
        })
    }

    /// Creates a pipeline stage. Unlike [`Self::new`], the driving function sees the
    /// downstream `halted` check separately and must forward it to its parent.
    pub(crate) fn staged<F>(generate: F) -> Self
    where
        F: Fn(&mut dyn FnMut(E, Timestamp), &dyn Fn(&E) -> bool, &dyn Fn() -> bool)
            + Send
            + Sync
            + 'static,
    {
        Self {
            generate: Arc::new(generate),
        }
    }

    /// A generator which produces nothing.
    pub fn empty() -> Self {
        Self::new(|_push, _cancel| {})
    }

    /// Runs the generator to completion (or cancellation), pushing every element into `push`.
    pub fn generate(&self, push: &mut dyn FnMut(E, Timestamp), cancel: &dyn Fn(&E) -> bool) {
        (self.generate)(push, cancel, &|| false)
    }

    /// Like [`Self::generate`], also stopping once `halted()` answers `true`.
    pub(crate) fn generate_with(
        &self,
        push: &mut dyn FnMut(E, Timestamp),
        cancel: &dyn Fn(&E) -> bool,
        halted: &dyn Fn() -> bool,
    ) {
        (self.generate)(push, cancel, halted)
    }

    /// Returns `true` if both generators share the same underlying function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.generate, &other.generate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn counting(limit: i64) -> Generator<i64> {
        Generator::new(move |push, cancel| {
            for i in 0..limit {
                if cancel(&i) {
                    break;
                }
                push(i, i);
            }
        })
    }

    #[test]
    fn test_generate() {
        let mut out = Vec::new();
        counting(4).generate(&mut |e, t| out.push((e, t)), &|_| false);
        assert_eq!(vec![(0, 0), (1, 1), (2, 2), (3, 3)], out);
    }

    #[test]
    fn test_cancel() {
        let mut out = Vec::new();
        counting(100).generate(&mut |e, _| out.push(e), &|&e| e >= 3);
        assert_eq!(vec![0, 1, 2], out);
    }

    #[test]
    fn test_halted_stops_source() {
        let mut out = Vec::new();
        let pushed = std::cell::Cell::new(0);
        counting(100).generate_with(
            &mut |e, _| {
                pushed.set(pushed.get() + 1);
                out.push(e);
            },
            &|_| false,
            &|| pushed.get() >= 2,
        );
        assert_eq!(vec![0, 1], out);
    }

    #[test]
    fn test_shared() {
        let generator = counting(3);
        let branch = generator.clone();
        assert!(generator.ptr_eq(&branch));
        assert!(!generator.ptr_eq(&Generator::empty()));
    }
}
