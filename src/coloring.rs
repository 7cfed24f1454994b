//! Greedy, deterministic graph coloring of one family's packets.
//!
//! Two packets of a family conflict if any outgoing dependency link would
//! have them write the same target-family index concurrently. The conflict
//! relation is modeled as an undirected graph (`petgraph::graph::UnGraph`)
//! over packet indices; coloring that graph with a fixed, order-stable
//! greedy heuristic gives color classes that are safe to run concurrently
//! and bit-reproducible across platforms (§4.3, §8 property 5).

use crate::dependency::DependencyLink;
use crate::partition::Packet;
use hashbrown::HashMap;
use petgraph::graph::{NodeIndex, UnGraph};

/// An ordered list of packet indices (into the family's packet vector) that
/// may execute concurrently.
pub type ColorClass = Vec<usize>;

/// Builds the conflict graph for `packets` under `links`, then greedily
/// colors it. Returns one color class per color, in ascending color order.
///
/// With no outgoing links, every packet is conflict-free and the result is a
/// single class containing all packets, in packet-id order.
pub fn color(packets: &[Packet], links: &[DependencyLink]) -> Vec<ColorClass> {
    let n = packets.len();
    let mut graph = UnGraph::<(), ()>::with_capacity(n, 0);
    let nodes: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();

    if !links.is_empty() {
        // target-index -> packets (by index into `packets`) that touch it,
        // aggregated across every outgoing link (different targets never
        // introduce false conflicts since each map is keyed per-target).
        let mut touches: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for link in links {
            for (packet_idx, packet) in packets.iter().enumerate() {
                for target_index in (link.observe)(*packet) {
                    touches
                        .entry((link.target, target_index))
                        .or_insert_with(Vec::new)
                        .push(packet_idx);
                }
            }
        }

        let mut edges_seen: hashbrown::HashSet<(usize, usize)> = hashbrown::HashSet::new();
        for owners in touches.values() {
            if owners.len() < 2 {
                continue;
            }
            for i in 0..owners.len() {
                for j in (i + 1)..owners.len() {
                    let (a, b) = (owners[i], owners[j]);
                    if a == b {
                        continue;
                    }
                    let key = if a < b { (a, b) } else { (b, a) };
                    if edges_seen.insert(key) {
                        graph.add_edge(nodes[key.0], nodes[key.1], ());
                    }
                }
            }
        }
    }

    // Order by descending conflict-degree, ties broken by packet id ascending.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let deg_a = graph.neighbors(nodes[a]).count();
        let deg_b = graph.neighbors(nodes[b]).count();
        deg_b.cmp(&deg_a).then(a.cmp(&b))
    });

    let mut color_of: Vec<Option<usize>> = vec![None; n];
    for &packet_idx in &order {
        let mut used = hashbrown::HashSet::new();
        for neighbor in graph.neighbors(nodes[packet_idx]) {
            if let Some(c) = color_of[neighbor.index()] {
                used.insert(c);
            }
        }
        let mut candidate = 0usize;
        while used.contains(&candidate) {
            candidate += 1;
        }
        color_of[packet_idx] = Some(candidate);
    }

    let num_colors = color_of.iter().filter_map(|c| *c).max().map_or(0, |m| m + 1);
    let mut classes: Vec<ColorClass> = vec![Vec::new(); num_colors.max(1)];
    for (packet_idx, c) in color_of.iter().enumerate() {
        classes[c.unwrap_or(0)].push(packet_idx);
    }
    for class in &mut classes {
        class.sort_unstable();
    }
    classes
}

/// Re-derives the conflict relation from scratch and checks that no two
/// packets sharing a color also share a touched target-index (§3 invariant
/// 2, §7 "internal assertion"). Only ever run under `debug_assertions` — it
/// redoes the observation-function work the coloring pass already did, so
/// it is not something a release build should pay for on every launch.
pub fn debug_check_classes(packets: &[Packet], links: &[DependencyLink], classes: &[ColorClass]) {
    for link in links {
        for (class_id, class) in classes.iter().enumerate() {
            let mut touched = hashbrown::HashSet::new();
            for &packet_idx in class {
                for target_index in (link.observe)(packets[packet_idx]) {
                    assert!(
                        touched.insert(target_index),
                        "coloring invariant violated: target index {target_index} of family {} \
                         touched by two packets in color class {class_id}",
                        link.target
                    );
                }
            }
        }
    }
}
