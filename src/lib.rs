//! A shared-memory parallel loop scheduler specialized for unstructured-mesh
//! computations.
//!
//! The scheduler lets a caller describe an array-indexed computation over
//! one or more mesh entity families (vertices, edges, triangles, tetrahedra,
//! ...) and have it executed concurrently by a fixed worker pool, while
//! guaranteeing that no two workers simultaneously write to the same cell of
//! any family declared as "written through an indirection" by a dependency
//! link. See `coloring` for how that guarantee is computed and `worker` for
//! how it is enforced at runtime.
//!
//! ```no_run
//! use lplib::{Scheduler, ObserveFn};
//! use std::sync::Arc;
//!
//! let scheduler = Scheduler::init(4);
//! let vertices = scheduler.register_family(10_000);
//!
//! let mut data = vec![0i64; 10_000];
//! scheduler
//!     .launch(vertices, &|begin: usize, end: usize, _worker_id: usize| {
//!         for _i in begin..=end {
//!             // ... touch data[i - 1] ...
//!         }
//!     })
//!     .unwrap();
//! # let _ = &mut data;
//! scheduler.shutdown();
//! ```

mod coloring;
mod dependency;
mod error;
mod family;
mod partition;
mod scheduler;
mod worker;

pub mod mesh;
pub mod neighbours;

pub use crate::coloring::ColorClass;
pub use crate::dependency::ObserveFn;
pub use crate::error::{Result, SchedulerError};
pub use crate::partition::Packet;
pub use crate::scheduler::{wall_clock, Scheduler, MAX_WORKERS, MIN_WORKERS};
pub use crate::worker::PacketFn;
