//! Error taxonomy for the scheduler and its mesh I/O collaborator.
//!
//! Mirrors the taxonomy of the specification: configuration errors, I/O errors
//! surfaced by the mesh collaborator, and internal assertion failures. The
//! scheduler never retries; every fallible entry point returns one of these
//! variants to its immediate caller.

use std::fmt::{self, Display, Formatter};
use std::io;

/// Errors the scheduler (or its mesh I/O collaborator) can report.
#[derive(Debug)]
pub enum SchedulerError {
    /// `launch`/`add_dependency`/`resize_family` referenced a family id that
    /// was never returned by `register_family`.
    UnknownFamily(usize),
    /// `init` was asked for a worker count that can't be honored even after
    /// clamping (never actually constructed; kept for completeness of the
    /// taxonomy — `init` clamps instead of failing, per spec §6).
    InvalidWorkerCount(usize),
    /// `launch` was called while another launch on the same scheduler is
    /// still in progress.
    LaunchInProgress,
    /// A family was resized, or a dependency link was added/removed, while a
    /// launch was active.
    MutationDuringLaunch,
    /// An outgoing dependency link had no observation function at launch
    /// time. Cannot happen through the public API (`add_dependency` always
    /// takes one), kept as a defensive configuration error.
    MissingObserver { writer: usize, target: usize },
    /// A coloring invariant (two same-class packets touch the same target
    /// index) was violated. Only raised by debug-assertion checks.
    Invariant(String),
    /// The mesh collaborator could not open, read, or write a file.
    Io(io::Error),
    /// The mesh collaborator rejected a mesh (wrong dimension, no vertices).
    InvalidMesh(String),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFamily(id) => write!(f, "unknown family id {id}"),
            Self::InvalidWorkerCount(n) => write!(f, "invalid worker count {n}"),
            Self::LaunchInProgress => write!(f, "a launch is already active on this scheduler"),
            Self::MutationDuringLaunch => {
                write!(f, "families and dependency links cannot be mutated while a launch is active")
            }
            Self::MissingObserver { writer, target } => write!(
                f,
                "dependency link {writer} -> {target} has no observation function"
            ),
            Self::Invariant(msg) => write!(f, "coloring invariant violated: {msg}"),
            Self::Io(err) => write!(f, "mesh I/O error: {err}"),
            Self::InvalidMesh(msg) => write!(f, "invalid mesh: {msg}"),
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SchedulerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
