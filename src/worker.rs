//! The fixed worker pool: threads parked on a condition, woken to run one
//! color class's packets, re-parked once the class drains.
//!
//! Two condition variables share a single mutex-guarded state block (§4.6):
//! workers wait on `work_available` for a new color class; the dispatcher
//! waits on `all_idle` for the current class to drain. The packet queue
//! itself is a plain `(cursor, total)` pair claimed with an atomic
//! fetch-add, so a worker never takes the mutex just to grab its next
//! packet — only to transition into or out of the idle state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{Builder, JoinHandle};

/// A packet worker is any value exposing `run(begin, end, worker_id)`.
/// Closures capture whatever borrowed mesh arrays they operate on, which
/// plays the role of the user argument in the language-neutral contract
/// (§6: `fn(begin, end, worker_id, user_arg)`).
pub trait PacketFn: Send + Sync {
    fn run(&self, begin: usize, end: usize, worker_id: usize);
}

impl<F> PacketFn for F
where
    F: Fn(usize, usize, usize) + Send + Sync,
{
    fn run(&self, begin: usize, end: usize, worker_id: usize) {
        self(begin, end, worker_id)
    }
}

/// One color class worth of work: the packet function plus the `(begin,
/// end)` ranges to claim from, shared read-only by every worker.
struct ClassJob {
    job: &'static dyn PacketFn,
    packets: Arc<[(usize, usize)]>,
}

struct State {
    current: Option<ClassJob>,
    total: usize,
    idle: usize,
    generation: u64,
    stop: bool,
}

struct Inner {
    mutex: Mutex<State>,
    work_available: Condvar,
    all_idle: Condvar,
    cursor: AtomicUsize,
    n_workers: usize,
}

/// A fixed set of `N` OS threads, parked on a condition until the
/// dispatcher hands them a color class to run.
pub struct WorkerPool {
    inner: Arc<Inner>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(n_workers: usize) -> Self {
        assert!((1..=128).contains(&n_workers), "worker count must be clamped to [1,128] by the caller");

        let inner = Arc::new(Inner {
            mutex: Mutex::new(State {
                current: None,
                total: 0,
                idle: 0,
                generation: 0,
                stop: false,
            }),
            work_available: Condvar::new(),
            all_idle: Condvar::new(),
            cursor: AtomicUsize::new(0),
            n_workers,
        });

        let handles = (0..n_workers)
            .map(|worker_id| {
                let inner = inner.clone();
                Builder::new()
                    .name(format!("lplib-worker-{worker_id}"))
                    .spawn(move || worker_loop(inner, worker_id))
                    .expect("failed to spawn scheduler worker thread")
            })
            .collect();

        Self { inner, handles }
    }

    pub fn n_workers(&self) -> usize {
        self.inner.n_workers
    }

    /// Runs one color class to completion: every packet in `packets` is
    /// executed exactly once by some worker, and this call does not return
    /// until all of them have (the barrier of §5).
    ///
    /// # Safety
    ///
    /// `job` must outlive every worker's use of it, which is guaranteed
    /// because this function blocks until the class has fully drained
    /// before returning — no worker retains a reference to `job` past that
    /// point.
    pub unsafe fn dispatch_class(&self, job: &dyn PacketFn, packets: Arc<[(usize, usize)]>) {
        let total = packets.len();
        let job: &'static dyn PacketFn = std::mem::transmute(job);

        {
            let mut state = self.inner.mutex.lock().expect("worker mutex poisoned");
            self.inner.cursor.store(0, Ordering::SeqCst);
            state.current = Some(ClassJob { job, packets });
            state.total = total;
            state.idle = 0;
            state.generation += 1;
            self.inner.work_available.notify_all();

            let _ = self
                .inner
                .all_idle
                .wait_while(state, |s| s.idle != self.inner.n_workers)
                .expect("worker mutex poisoned");
        }
    }

    /// Joins every worker thread. Only valid when no launch is active.
    pub fn shutdown(self) {
        {
            let mut state = self.inner.mutex.lock().expect("worker mutex poisoned");
            state.stop = true;
            self.inner.work_available.notify_all();
        }
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(inner: Arc<Inner>, worker_id: usize) {
    let mut seen_generation = 0u64;
    loop {
        let class = {
            let mut state = inner.mutex.lock().expect("worker mutex poisoned");
            while state.generation == seen_generation && !state.stop {
                state = inner.work_available.wait(state).expect("worker mutex poisoned");
            }
            if state.stop {
                return;
            }
            seen_generation = state.generation;
            match &state.current {
                Some(class) => ClassJob {
                    job: class.job,
                    packets: class.packets.clone(),
                },
                None => continue,
            }
        };

        let total = class.packets.len();
        loop {
            let idx = inner.cursor.fetch_add(1, Ordering::SeqCst);
            if idx >= total {
                break;
            }
            let (begin, end) = class.packets[idx];
            class.job.run(begin, end, worker_id);
        }

        let mut state = inner.mutex.lock().expect("worker mutex poisoned");
        state.idle += 1;
        if state.idle == inner.n_workers {
            inner.all_idle.notify_one();
        }
    }
}
