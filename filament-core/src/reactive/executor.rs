//! Deferred execution.
//!
//! Signal writes never run subscribers synchronously. The runtime queues a
//! single flush as a microtask, and the installed [`Executor`] decides when
//! that microtask runs.
//!
//! - [`QueueExecutor`] (the default) stores microtasks in a thread-local
//!   queue that the host drains with [`tick`], typically once per turn of
//!   its event loop.
//! - [`TokioExecutor`] hands each microtask to `tokio::task::spawn_local`,
//!   so flushes happen on the next scheduling point of a `LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::runtime::Runtime;

/// A unit of deferred work.
pub type Microtask = Box<dyn FnOnce()>;

/// Schedules microtasks for later execution on the current thread.
pub trait Executor {
    /// Queue `task` to run after the current synchronous turn.
    fn queue_microtask(&self, task: Microtask);
}

/// Thread-local FIFO queue drained by [`tick`].
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueExecutor;

impl Executor for QueueExecutor {
    fn queue_microtask(&self, task: Microtask) {
        MICROTASKS.with(|queue| queue.borrow_mut().push_back(task));
    }
}

/// Runs microtasks as tokio local tasks.
///
/// Must be used from inside a `tokio::task::LocalSet`; `spawn_local`
/// panics otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn queue_microtask(&self, task: Microtask) {
        tokio::task::spawn_local(async move { task() });
    }
}

thread_local! {
    static EXECUTOR: RefCell<Rc<dyn Executor>> = RefCell::new(Rc::new(QueueExecutor));
    static MICROTASKS: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());
}

/// Install the executor for the current thread, returning the previous one.
pub fn set_executor(executor: impl Executor + 'static) -> Rc<dyn Executor> {
    EXECUTOR.with(|cell| std::mem::replace(&mut *cell.borrow_mut(), Rc::new(executor)))
}

/// Queue a microtask on the current thread's executor.
pub fn queue_microtask(task: Microtask) {
    let executor = EXECUTOR.with(|cell| Rc::clone(&cell.borrow()));
    executor.queue_microtask(task);
}

/// Drain the [`QueueExecutor`] queue, including microtasks queued while
/// draining.
///
/// Returns the number of microtasks that ran. Stops early, leaving the rest
/// queued, once `RuntimeConfig::max_tick_rounds` is reached.
pub fn tick() -> usize {
    let limit = Runtime::config().max_tick_rounds;
    let mut ran = 0;

    while ran < limit {
        let next = MICROTASKS.with(|queue| queue.borrow_mut().pop_front());
        let Some(task) = next else {
            return ran;
        };
        task();
        ran += 1;
    }

    let remaining = MICROTASKS.with(|queue| queue.borrow().len());
    if remaining > 0 {
        tracing::warn!(
            ran,
            remaining,
            "tick() stopped after reaching max_tick_rounds; effects may be updating each other in a cycle"
        );
    }
    ran
}

/// Number of microtasks waiting in the [`QueueExecutor`] queue.
pub fn queued_microtasks() -> usize {
    MICROTASKS.with(|queue| queue.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn tick_runs_queued_tasks_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            queue_microtask(Box::new(move || log.borrow_mut().push(i)));
        }

        assert_eq!(queued_microtasks(), 3);
        assert_eq!(tick(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(queued_microtasks(), 0);
    }

    #[test]
    fn tick_drains_tasks_queued_while_draining() {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        queue_microtask(Box::new(move || {
            inner.set(inner.get() + 1);
            let again = inner.clone();
            queue_microtask(Box::new(move || again.set(again.get() + 1)));
        }));

        assert_eq!(tick(), 2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn set_executor_returns_previous() {
        struct Immediate;
        impl Executor for Immediate {
            fn queue_microtask(&self, task: Microtask) {
                task();
            }
        }

        let previous = set_executor(Immediate);
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        queue_microtask(Box::new(move || flag.set(true)));
        assert!(ran.get());

        EXECUTOR.with(|cell| *cell.borrow_mut() = previous);
    }
}
