//! The public scheduler: family registry, dependency manager, and the
//! dispatcher that drives a launch through coloring, barrier, and packet
//! dispatch (§4.4).

use crate::coloring;
use crate::dependency::{DependencyManager, ObserveFn};
use crate::error::{Result, SchedulerError};
use crate::family::Family;
use crate::worker::{PacketFn, WorkerPool};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Worker count is clamped into this range, per §6.
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 128;

static EPOCH: once_cell::sync::OnceCell<Instant> = once_cell::sync::OnceCell::new();

/// Seconds elapsed since an arbitrary, process-wide epoch fixed on first
/// use. Only relative differences between two calls are meaningful.
pub fn wall_clock() -> f64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_secs_f64()
}

/// Process-wide-per-instance scheduler state: worker pool, per-family
/// tables, and the dependency matrix across families.
pub struct Scheduler {
    pool: WorkerPool,
    families: Mutex<Vec<Family>>,
    dependencies: Mutex<DependencyManager>,
    launch_active: AtomicBool,
}

impl Scheduler {
    /// Creates a scheduler with `n_workers` threads, clamped to
    /// `[MIN_WORKERS, MAX_WORKERS]`.
    pub fn init(n_workers: usize) -> Self {
        let n_workers = n_workers.clamp(MIN_WORKERS, MAX_WORKERS);
        Self {
            pool: WorkerPool::new(n_workers),
            families: Mutex::new(Vec::new()),
            dependencies: Mutex::new(DependencyManager::new()),
            launch_active: AtomicBool::new(false),
        }
    }

    /// Registers a new entity type of the given cardinality and returns its
    /// family id. Cardinality must be at least 1.
    pub fn register_family(&self, cardinality: usize) -> usize {
        assert!(cardinality >= 1, "family cardinality must be at least 1");
        let mut families = self.families.lock().expect("families mutex poisoned");
        let family_id = families.len();
        families.push(Family::new(cardinality, self.pool.n_workers()));
        self.dependencies
            .lock()
            .expect("dependency mutex poisoned")
            .register_family(family_id);
        family_id
    }

    /// Declares that packets of `writer` write into `target` through the
    /// indirection described by `observe`. Marks `writer` dirty.
    pub fn add_dependency(&self, writer: usize, target: usize, observe: ObserveFn) -> Result<()> {
        self.reject_during_launch()?;
        let mut families = self.families.lock().expect("families mutex poisoned");
        self.check_family(&families, writer)?;
        self.check_family(&families, target)?;
        self.dependencies
            .lock()
            .expect("dependency mutex poisoned")
            .add_link(writer, target, observe);
        families[writer].dirty = true;
        Ok(())
    }

    /// Removes any link from `writer` to `target`. Marks `writer` dirty.
    pub fn remove_dependency(&self, writer: usize, target: usize) -> Result<()> {
        self.reject_during_launch()?;
        let mut families = self.families.lock().expect("families mutex poisoned");
        self.check_family(&families, writer)?;
        self.check_family(&families, target)?;
        self.dependencies
            .lock()
            .expect("dependency mutex poisoned")
            .remove_link(writer, target);
        families[writer].dirty = true;
        Ok(())
    }

    /// Updates a family's cardinality, marking every family that writes
    /// into it dirty, and itself dirty (its own packets are recomputed).
    pub fn resize_family(&self, target: usize, new_cardinality: usize) -> Result<()> {
        self.reject_during_launch()?;
        assert!(new_cardinality >= 1, "family cardinality must be at least 1");
        let mut families = self.families.lock().expect("families mutex poisoned");
        self.check_family(&families, target)?;
        let writers = self
            .dependencies
            .lock()
            .expect("dependency mutex poisoned")
            .writers_of(target);
        families[target].repartition(new_cardinality, self.pool.n_workers());
        for writer in writers {
            families[writer].dirty = true;
        }
        Ok(())
    }

    /// Runs every packet of `family_id` exactly once, in color-class order,
    /// with a barrier between classes. Returns the wall-clock time elapsed.
    pub fn launch(&self, family_id: usize, f: &dyn PacketFn) -> Result<f64> {
        if self
            .launch_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SchedulerError::LaunchInProgress);
        }
        let result = self.launch_inner(family_id, f);
        self.launch_active.store(false, Ordering::SeqCst);
        result
    }

    fn launch_inner(&self, family_id: usize, f: &dyn PacketFn) -> Result<f64> {
        let start = Instant::now();

        let mut families = self.families.lock().expect("families mutex poisoned");
        self.check_family(&families, family_id)?;

        if families[family_id].dirty {
            let links = self
                .dependencies
                .lock()
                .expect("dependency mutex poisoned")
                .outgoing(family_id)
                .to_vec();
            let classes = coloring::color(&families[family_id].packets, &links);
            #[cfg(debug_assertions)]
            coloring::debug_check_classes(&families[family_id].packets, &links, &classes);
            families[family_id].colors = classes;
            families[family_id].dirty = false;
        }

        let packets = families[family_id].packets.clone();
        let colors = families[family_id].colors.clone();
        drop(families);

        for class in &colors {
            let ranges: std::sync::Arc<[(usize, usize)]> = class
                .iter()
                .map(|&idx| (packets[idx].begin, packets[idx].end))
                .collect();
            // SAFETY: `dispatch_class` blocks until the class has fully
            // drained before returning, and `f` outlives this whole call
            // since it is borrowed from the caller's stack frame for the
            // duration of `launch`.
            unsafe { self.pool.dispatch_class(f, ranges) };
        }

        Ok(start.elapsed().as_secs_f64())
    }

    /// `(n_workers, n_families)`.
    pub fn info(&self) -> (usize, usize) {
        let families = self.families.lock().expect("families mutex poisoned");
        (self.pool.n_workers(), families.len())
    }

    /// Joins all worker threads. Only valid when no launch is active.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }

    fn reject_during_launch(&self) -> Result<()> {
        if self.launch_active.load(Ordering::SeqCst) {
            return Err(SchedulerError::MutationDuringLaunch);
        }
        Ok(())
    }

    fn check_family(&self, families: &[Family], family_id: usize) -> Result<()> {
        if family_id >= families.len() {
            Err(SchedulerError::UnknownFamily(family_id))
        } else {
            Ok(())
        }
    }
}
