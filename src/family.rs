//! Per-family metadata: cardinality, packets, and the cached coloring.

use crate::coloring::ColorClass;
use crate::partition::{partition, Packet};

/// One registered entity type (vertices, edges, triangles, tetrahedra, ...).
pub struct Family {
    pub cardinality: usize,
    pub packets: Vec<Packet>,
    pub colors: Vec<ColorClass>,
    /// `true` until the next launch recomputes `colors` under the current
    /// dependency set (invariant 3, §3).
    pub dirty: bool,
}

impl Family {
    pub fn new(cardinality: usize, n_workers: usize) -> Self {
        let packets = partition(cardinality, n_workers);
        // A family with no outgoing links at all is trivially "colored" as
        // one class; this is overwritten by the coloring engine on first
        // launch if any outgoing link exists.
        let colors = vec![(0..packets.len()).collect()];
        Self {
            cardinality,
            packets,
            colors,
            dirty: true,
        }
    }

    pub fn repartition(&mut self, cardinality: usize, n_workers: usize) {
        self.cardinality = cardinality;
        self.packets = partition(cardinality, n_workers);
        self.colors = vec![(0..self.packets.len()).collect()];
        self.dirty = true;
    }
}
