use std::cell::Cell;

use crate::Timestamp;
use crate::generator::Generator;

/// The downstream side of a stage: forwards elements and tracks whether the stage should stop.
pub(super) struct Emitter<'s, 'f, T> {
    push: &'s mut (dyn FnMut(T, Timestamp) + 'f),
    cancel: &'s dyn Fn(&T) -> bool,
    halted: &'s dyn Fn() -> bool,
    stop: &'s Cell<bool>,
}

impl<T> Emitter<'_, '_, T> {
    /// Pushes `value` downstream unless downstream cancels on it, in which case the stage stops.
    pub(super) fn emit(&mut self, value: T, timestamp: Timestamp) {
        if self.is_halted() || (self.cancel)(&value) {
            self.stop.set(true);
        } else {
            (self.push)(value, timestamp);
        }
    }

    /// Stops the parent from producing further elements.
    pub(super) fn halt(&self) {
        self.stop.set(true);
    }

    /// Returns `true` once this stage or anything downstream of it has stopped.
    pub(super) fn is_halted(&self) -> bool {
        self.stop.get() || (self.halted)()
    }
}

/// Runs `parent` once, handing every element it produces to `step`.
///
/// Downstream `cancel` is only ever asked about elements this stage emits. The parent stops once
/// the stage's stop flag is raised, or as soon as downstream reports itself halted, so a stage
/// dropping every element still lets a finished consumer stop the source.
pub(super) fn relay<E: 'static, T>(
    parent: &Generator<E>,
    push: &mut dyn FnMut(T, Timestamp),
    cancel: &dyn Fn(&T) -> bool,
    halted: &dyn Fn() -> bool,
    mut step: impl FnMut(E, Timestamp, &mut Emitter<'_, '_, T>),
) {
    let stop = Cell::new(false);
    let mut emitter = Emitter {
        push,
        cancel,
        halted,
        stop: &stop,
    };
    parent.generate_with(
        &mut |element, timestamp| {
            if !emitter.is_halted() {
                step(element, timestamp, &mut emitter);
            }
        },
        &|_| false,
        &|| stop.get() || halted(),
    );
}
