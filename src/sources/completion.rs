//! One-shot completion flag a thread can block on.

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
pub(crate) struct Completion {
    done: Mutex<bool>,
    cv: Condvar,
}

impl Completion {
    pub(crate) fn finish(&self) {
        *self.done.lock() = true;
        self.cv.notify_all();
    }

    pub(crate) fn is_done(&self) -> bool {
        *self.done.lock()
    }

    pub(crate) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cv.wait(&mut done);
        }
    }
}

/// Finishes the completion when dropped, including on unwind.
pub(crate) struct FinishOnDrop<'a>(pub(crate) &'a Completion);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}
