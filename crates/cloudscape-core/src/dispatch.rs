//! The dispatch context: a single logical execution context for tree state.
//!
//! Every structural mutation of the UI-facing tree must happen inside one
//! serialized context. `Dispatcher` provides that context as a dedicated
//! thread with its own task queue. Producers on other threads either
//! fire-and-forget with [`Dispatcher::post`] or block until their closure
//! has run with [`Dispatcher::invoke`] (synchronous hand-off).
//!
//! # Ordering
//!
//! Tasks submitted from one thread execute in submission order. There is no
//! global ordering guarantee across submitting threads.
//!
//! # Re-entrancy
//!
//! `invoke` called from the dispatch thread itself runs the closure inline
//! rather than queueing it, so code that is already on the dispatch thread
//! never deadlocks against its own queue.
//!
//! # Example
//!
//! ```
//! use cloudscape_core::dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::spawn("explorer-ui");
//!
//! // Block until the closure has run on the dispatch thread.
//! let answer = dispatcher.invoke(|| 21 * 2).unwrap();
//! assert_eq!(answer, 42);
//!
//! dispatcher.stop_and_join();
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;

use crate::error::{DispatchError, DispatchResult};
use crate::logging::targets;

/// A task sent to the dispatch thread.
enum Task {
    /// Execute a closure.
    Run(Box<dyn FnOnce() + Send>),
    /// Shutdown signal.
    Shutdown,
}

/// A single-threaded execution context with a FIFO task queue.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`; any thread may submit tasks. The tasks
/// themselves always run on the one dedicated dispatch thread.
pub struct Dispatcher {
    /// Channel sender for submitting tasks.
    sender: Sender<Task>,
    /// Identity of the dispatch thread.
    thread_id: ThreadId,
    /// Thread handle for joining.
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Whether the dispatcher accepts new tasks.
    running: AtomicBool,
}

impl Dispatcher {
    /// Start a new dispatch thread with the given name.
    ///
    /// The thread starts immediately and processes tasks until [`stop`]
    /// (or drop) is called.
    ///
    /// [`stop`]: Self::stop
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, receiver) = unbounded();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || dispatch_loop(receiver))
            .expect("failed to spawn dispatch thread");
        let thread_id = handle.thread().id();

        tracing::debug!(target: targets::DISPATCH, name = %name, "dispatch thread started");

        Self {
            sender,
            thread_id,
            handle: Mutex::new(Some(handle)),
            running: AtomicBool::new(true),
        }
    }

    /// Check if the dispatcher is still accepting tasks.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if the current thread is the dispatch thread.
    #[inline]
    pub fn is_dispatch_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Get an affinity token for the dispatch thread.
    ///
    /// Use this to assert from other components that they are being mutated
    /// on the dispatch thread.
    pub fn affinity(&self) -> DispatchAffinity {
        DispatchAffinity {
            thread_id: self.thread_id,
        }
    }

    /// Submit a task for asynchronous execution on the dispatch thread.
    ///
    /// Returns `true` if the task was queued, `false` if the dispatcher has
    /// been stopped.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_running() {
            return false;
        }
        self.sender.send(Task::Run(Box::new(f))).is_ok()
    }

    /// Submit a closure and block until it has run on the dispatch thread.
    ///
    /// This is the synchronous hand-off used to marshal tree mutations from
    /// background threads: when `invoke` returns `Ok`, the closure's effects
    /// are fully applied and its return value is handed back.
    ///
    /// Called from the dispatch thread itself, the closure runs inline.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Stopped`] if the dispatcher has shut down before
    ///   the closure could run.
    /// - [`DispatchError::TaskPanicked`] if the closure panicked. The panic
    ///   is contained on the dispatch thread.
    pub fn invoke<R, F>(&self, f: F) -> DispatchResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_dispatch_thread() {
            return Ok(f());
        }
        if !self.is_running() {
            return Err(DispatchError::Stopped);
        }

        let (result_sender, result_receiver) = bounded(1);
        let task = Task::Run(Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(f));
            let _ = result_sender.send(result);
        }));

        if self.sender.send(task).is_err() {
            return Err(DispatchError::Stopped);
        }

        match result_receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(DispatchError::TaskPanicked),
            Err(_) => Err(DispatchError::Stopped),
        }
    }

    /// Request shutdown after processing remaining tasks.
    ///
    /// Non-blocking; use [`join`](Self::join) to wait for completion. After
    /// `stop()`, no new tasks are accepted.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _ = self.sender.send(Task::Shutdown);
    }

    /// Wait for the dispatch thread to finish.
    ///
    /// Returns `true` if the thread was joined, `false` if already joined.
    pub fn join(&self) -> bool {
        let mut handle = self.handle.lock();
        if let Some(h) = handle.take() {
            h.join().is_ok()
        } else {
            false
        }
    }

    /// Stop the dispatcher and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
        // Don't block in drop - just request shutdown
    }
}

/// The main loop run by the dispatch thread.
fn dispatch_loop(receiver: Receiver<Task>) {
    while let Ok(task) = receiver.recv() {
        match task {
            Task::Run(f) => run_task(f),
            Task::Shutdown => {
                // Drain tasks already queued before the shutdown request
                while let Ok(task) = receiver.try_recv() {
                    if let Task::Run(f) = task {
                        run_task(f);
                    }
                }
                break;
            }
        }
    }
    tracing::debug!(target: targets::DISPATCH, "dispatch thread exiting");
}

fn run_task(f: Box<dyn FnOnce() + Send>) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(
            target: targets::DISPATCH,
            "dispatched task panicked; dispatch thread continues"
        );
    }
}

/// Thread affinity token for the dispatch thread.
///
/// Components whose state may only be mutated inside the dispatch context
/// keep a copy of this token and assert on it at their mutation points.
///
/// # Example
///
/// ```
/// use cloudscape_core::dispatch::Dispatcher;
///
/// let dispatcher = Dispatcher::spawn("ui");
/// let affinity = dispatcher.affinity();
///
/// dispatcher.invoke(move || {
///     affinity.debug_assert_on_thread(); // fine, we are on the thread
/// }).unwrap();
/// dispatcher.stop_and_join();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DispatchAffinity {
    thread_id: ThreadId,
}

impl DispatchAffinity {
    /// Create an affinity token bound to the current thread.
    ///
    /// Useful in tests that drive everything from one thread.
    pub fn current() -> Self {
        Self {
            thread_id: thread::current().id(),
        }
    }

    /// Get the thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread is the dispatch thread.
    #[inline]
    pub fn is_on_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Panic if the current thread is not the dispatch thread.
    ///
    /// Always active. Use [`debug_assert_on_thread`](Self::debug_assert_on_thread)
    /// for checks that should only run in debug builds.
    #[inline]
    pub fn assert_on_thread(&self) {
        if !self.is_on_thread() {
            self.panic_wrong_thread();
        }
    }

    /// Debug-only assertion that we are on the dispatch thread.
    ///
    /// No-op in release builds.
    #[inline]
    pub fn debug_assert_on_thread(&self) {
        #[cfg(debug_assertions)]
        self.assert_on_thread();
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self) -> ! {
        let current = thread::current();
        let current_name = current.name().unwrap_or("<unnamed>");
        let current_id = current.id();

        panic!(
            "\n\
            ══════════════════════════════════════════════════════════════════\n\
            DISPATCH CONTEXT VIOLATION\n\
            ══════════════════════════════════════════════════════════════════\n\
            \n\
            Tree state was accessed from outside its dispatch context.\n\
            \n\
            Dispatch thread ID: {:?}\n\
            Current thread: \"{current_name}\" (ID: {current_id:?})\n\
            \n\
            Mirror mutations and other single-context state must run on the\n\
            dispatch thread. Route the operation through Dispatcher::post()\n\
            or Dispatcher::invoke() instead of touching the state directly.\n\
            \n\
            ══════════════════════════════════════════════════════════════════",
            self.thread_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_invoke_returns_value() {
        let dispatcher = Dispatcher::spawn("test-invoke");
        let result = dispatcher.invoke(|| 42);
        assert_eq!(result, Ok(42));
        dispatcher.stop_and_join();
    }

    #[test]
    fn test_invoke_runs_on_dispatch_thread() {
        let dispatcher = Dispatcher::spawn("test-thread");
        let dispatch_id = dispatcher.thread_id;

        let ran_on = dispatcher.invoke(|| thread::current().id()).unwrap();
        assert_eq!(ran_on, dispatch_id);
        assert_ne!(ran_on, thread::current().id());

        dispatcher.stop_and_join();
    }

    #[test]
    fn test_invoke_inline_reentrancy() {
        // invoke from within an invoked closure must run inline, not deadlock
        let dispatcher = Arc::new(Dispatcher::spawn("test-reentrant"));

        let dispatcher_clone = dispatcher.clone();
        let result = dispatcher
            .invoke(move || dispatcher_clone.invoke(|| 7).unwrap())
            .unwrap();
        assert_eq!(result, 7);

        dispatcher.stop_and_join();
    }

    #[test]
    fn test_post_fifo_order() {
        let dispatcher = Dispatcher::spawn("test-fifo");
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order_clone = order.clone();
            dispatcher.post(move || {
                order_clone.lock().push(i);
            });
        }

        // invoke from this same thread queues behind the posts
        dispatcher.invoke(|| {}).unwrap();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
        dispatcher.stop_and_join();
    }

    #[test]
    fn test_invoke_after_stop() {
        let dispatcher = Dispatcher::spawn("test-stopped");
        dispatcher.stop_and_join();

        let result = dispatcher.invoke(|| 1);
        assert_eq!(result, Err(DispatchError::Stopped));
        assert!(!dispatcher.post(|| {}));
    }

    #[test]
    fn test_invoke_panicking_task() {
        let dispatcher = Dispatcher::spawn("test-panic");

        let result: DispatchResult<()> = dispatcher.invoke(|| panic!("boom"));
        assert_eq!(result, Err(DispatchError::TaskPanicked));

        // The dispatch thread survives the panic
        assert_eq!(dispatcher.invoke(|| 5), Ok(5));
        dispatcher.stop_and_join();
    }

    #[test]
    fn test_pending_tasks_drain_on_stop() {
        let dispatcher = Dispatcher::spawn("test-drain");
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        for _ in 0..5 {
            let counter_clone = counter.clone();
            dispatcher.post(move || {
                thread::sleep(Duration::from_millis(5));
                counter_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        dispatcher.stop_and_join();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_affinity_same_thread() {
        let affinity = DispatchAffinity::current();
        assert!(affinity.is_on_thread());
        affinity.assert_on_thread();
    }

    #[test]
    fn test_affinity_wrong_thread_panics() {
        let affinity = DispatchAffinity::current();

        let result = thread::spawn(move || {
            affinity.assert_on_thread();
        })
        .join();

        assert!(result.is_err(), "expected affinity violation panic");
    }

    #[test]
    fn test_is_dispatch_thread() {
        let dispatcher = Dispatcher::spawn("test-identity");
        assert!(!dispatcher.is_dispatch_thread());

        let flag = dispatcher
            .invoke({
                let affinity = dispatcher.affinity();
                move || affinity.is_on_thread()
            })
            .unwrap();
        assert!(flag);

        dispatcher.stop_and_join();
    }
}
