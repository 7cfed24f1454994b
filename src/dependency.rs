//! Dependency links between families and the manager that tracks them.
//!
//! A link `(writer, target)` means packets of `writer` mutate cells of
//! `target` through a user-supplied indirection. The manager only records
//! the edges and marks writers dirty; the coloring engine (`crate::coloring`)
//! is what actually consumes the observation functions.

use crate::partition::Packet;
use std::sync::Arc;

/// Side-effect-free mapping from a packet to the set of target-family
/// indices it touches. Called repeatedly by the coloring engine, never
/// during a launch.
pub type ObserveFn = Arc<dyn Fn(Packet) -> Vec<usize> + Send + Sync>;

/// An ordered pair `(writer family, target family)` plus the function used
/// to enumerate the target indices a writer packet touches.
#[derive(Clone)]
pub struct DependencyLink {
    pub writer: usize,
    pub target: usize,
    pub observe: ObserveFn,
}

/// Tracks the outgoing dependency links of every family.
///
/// Links are only ever added or removed while no launch is active (§5); the
/// scheduler enforces that invariant, this type just stores the edges.
#[derive(Default)]
pub struct DependencyManager {
    /// `links[writer]` is the set of links whose writer family is `writer`.
    links: Vec<Vec<DependencyLink>>,
}

impl DependencyManager {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Ensures storage exists for a freshly registered family id.
    pub fn register_family(&mut self, family_id: usize) {
        if family_id >= self.links.len() {
            self.links.resize_with(family_id + 1, Vec::new);
        }
    }

    pub fn add_link(&mut self, writer: usize, target: usize, observe: ObserveFn) {
        self.links[writer].push(DependencyLink {
            writer,
            target,
            observe,
        });
    }

    /// Removes every link from `writer` to `target`. A no-op if none exists.
    pub fn remove_link(&mut self, writer: usize, target: usize) {
        self.links[writer].retain(|link| link.target != target);
    }

    pub fn outgoing(&self, writer: usize) -> &[DependencyLink] {
        &self.links[writer]
    }

    /// Families with at least one outgoing link to `target`.
    pub fn writers_of(&self, target: usize) -> Vec<usize> {
        self.links
            .iter()
            .enumerate()
            .filter_map(|(writer, links)| {
                links
                    .iter()
                    .any(|link| link.target == target)
                    .then_some(writer)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_observer() -> ObserveFn {
        Arc::new(|_packet: Packet| Vec::new())
    }

    #[test]
    fn add_and_query_link() {
        let mut mgr = DependencyManager::new();
        mgr.register_family(0);
        mgr.register_family(1);
        mgr.add_link(0, 1, noop_observer());
        assert_eq!(mgr.outgoing(0).len(), 1);
        assert_eq!(mgr.outgoing(0)[0].target, 1);
        assert_eq!(mgr.writers_of(1), vec![0]);
    }

    #[test]
    fn remove_link_clears_it() {
        let mut mgr = DependencyManager::new();
        mgr.register_family(0);
        mgr.register_family(1);
        mgr.add_link(0, 1, noop_observer());
        mgr.remove_link(0, 1);
        assert!(mgr.outgoing(0).is_empty());
        assert!(mgr.writers_of(1).is_empty());
    }
}
