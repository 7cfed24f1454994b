//! The parallel neighbours worked example (§4.7): tet <-> tet face adjacency
//! via per-subdomain hashing followed by cross-subdomain stitching, built
//! entirely on top of the scheduler's public API.
//!
//! Phase one and phase two are each a separate `Scheduler::launch` over the
//! same tetrahedra family. The happens-before edge the specification
//! requires between the two phases (§5: "between launches on the same
//! scheduler, a happens-before is guaranteed because launches are
//! serialized") is exactly what makes it safe for phase two to read every
//! worker's phase-one table without any additional synchronization.

mod face;
mod table;

pub(crate) use face::hash_key;

use crate::error::Result;
use crate::mesh::{Mesh, Triangle};
use crate::scheduler::Scheduler;
use face::{canonical_face, TVPF};
use std::cell::UnsafeCell;
use table::Table;

/// `neighbours[i][j]` is the 1-based id of the tet sharing face `j` of tet
/// `i + 1`, or `0` if that face lies on the boundary.
pub struct Neighbours {
    pub table: Vec<[i64; 4]>,
}

/// Per-worker hash table, shared read-only across workers once phase one
/// completes. Each table is only ever mutated by the worker that owns it
/// (the one whose `worker_id` indexes it), and only during phase one; phase
/// two only reads tables belonging to *other* workers.
struct WorkerTables(Vec<UnsafeCell<Table>>);
// SAFETY: index `w` is written only by the worker thread running with
// `worker_id == w`, and only while that worker's packets are being
// processed during phase one. Phase two performs read-only probes on other
// workers' tables after the scheduler barrier between the two launches has
// established a happens-before edge over all of phase one's writes.
unsafe impl Sync for WorkerTables {}

struct SharedNeighbours(Vec<UnsafeCell<[i64; 4]>>);
// SAFETY: cell `i` (0-based tet index) is written only by the worker that
// processes packet containing tet `i + 1`, which is unique per tet within
// a single launch.
unsafe impl Sync for SharedNeighbours {}

struct MatchCounts(Vec<UnsafeCell<u8>>);
// SAFETY: see `SharedNeighbours` — same per-tet exclusivity argument.
unsafe impl Sync for MatchCounts {}

/// Computes face adjacency for every tetrahedron of `mesh`, using
/// `scheduler` to drive both phases of §4.7 in parallel.
pub fn compute(scheduler: &Scheduler, mesh: &Mesh) -> Result<Neighbours> {
    let n_tets = mesh.tetrahedra.len();
    let (n_workers, _) = scheduler.info();
    let family = scheduler.register_family(n_tets.max(1));

    let tets_per_worker = (n_tets + n_workers - 1) / n_workers;
    let h = (2 * tets_per_worker).max(1).next_power_of_two();

    let tables = WorkerTables((0..n_workers).map(|_| UnsafeCell::new(Table::new(h))).collect());
    let neighbours = SharedNeighbours((0..n_tets).map(|_| UnsafeCell::new([0i64; 4])).collect());
    let match_counts = MatchCounts((0..n_tets).map(|_| UnsafeCell::new(0u8)).collect());

    if n_tets > 0 {
        phase_one(scheduler, family, mesh, &tables, &neighbours, &match_counts)?;
        phase_two(scheduler, family, mesh, &tables, &neighbours, &match_counts, n_workers, h)?;
    }

    Ok(Neighbours {
        table: neighbours.0.into_iter().map(UnsafeCell::into_inner).collect(),
    })
}

fn phase_one(
    scheduler: &Scheduler,
    family: usize,
    mesh: &Mesh,
    tables: &WorkerTables,
    neighbours: &SharedNeighbours,
    match_counts: &MatchCounts,
) -> Result<f64> {
    scheduler.launch(family, &|begin: usize, end: usize, worker_id: usize| {
        // SAFETY: exclusive access to this worker's own table, per the
        // `WorkerTables` invariant above.
        let table = unsafe { &mut *tables.0[worker_id].get() };
        for tet_id in begin..=end {
            let tet = &mesh.tetrahedra[tet_id - 1];
            for face_idx in 0..4u8 {
                let key = canonical_face(tet, face_idx as usize);
                if let Some((other_tet, other_face)) = table.probe_or_insert(tet_id, face_idx, key) {
                    // SAFETY: both `tet_id` and `other_tet` were inserted by
                    // this same worker earlier in this phase, so both cells
                    // belong to this worker's exclusive range.
                    unsafe {
                        (*neighbours.0[tet_id - 1].get())[face_idx as usize] = other_tet as i64;
                        (*neighbours.0[other_tet - 1].get())[other_face as usize] = tet_id as i64;
                        *match_counts.0[tet_id - 1].get() += 1;
                        *match_counts.0[other_tet - 1].get() += 1;
                    }
                }
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn phase_two(
    scheduler: &Scheduler,
    family: usize,
    mesh: &Mesh,
    tables: &WorkerTables,
    neighbours: &SharedNeighbours,
    match_counts: &MatchCounts,
    n_workers: usize,
    _h: usize,
) -> Result<f64> {
    scheduler.launch(family, &|begin: usize, end: usize, worker_id: usize| {
        for tet_id in begin..=end {
            // SAFETY: written only by the worker owning `tet_id` in phase one.
            let matched = unsafe { *match_counts.0[tet_id - 1].get() };
            if matched >= 4 {
                continue;
            }
            let tet = &mesh.tetrahedra[tet_id - 1];
            for face_idx in 0..4usize {
                // SAFETY: only this call's owning worker writes this cell.
                let already = unsafe { (*neighbours.0[tet_id - 1].get())[face_idx] };
                if already != 0 {
                    continue;
                }
                let key = canonical_face(tet, face_idx);
                for other_worker in 0..n_workers {
                    if other_worker == worker_id {
                        continue;
                    }
                    // SAFETY: other workers' tables are read-only by now —
                    // phase one for every worker has already completed, and
                    // the barrier between launches establishes the
                    // happens-before edge that makes those writes visible.
                    let other_table = unsafe { &*tables.0[other_worker].get() };
                    if let Some((matched_tet, _matched_face)) = other_table.find(key) {
                        // SAFETY: writing only `tet_id`'s own cell.
                        unsafe {
                            (*neighbours.0[tet_id - 1].get())[face_idx] = matched_tet as i64;
                        }
                        break;
                    }
                }
            }
        }
    })
}

/// Emits one triangle per boundary/material-interface face (§4.7, §8
/// property 7). Reference `0` for external faces, `1` for material
/// interfaces; the strict `tet_id < neighbour_id` inequality dedupes
/// interface faces to a single emission, from the smaller-id side.
///
/// §4.7's own prose gives the inequality as `i > neighbour_id`, but that
/// contradicts both the worked scenario S3 ("exactly one interface triangle
/// ... emitted from the tet with the smaller id") and the counting formula of
/// §8 property 7 (`Σ_{i<m, ...}`), which agree with each other. The smaller-id
/// reading is taken as authoritative here; see DESIGN.md's Open Question
/// resolutions for the full reasoning. Either direction dedupes correctly
/// (exactly one of the two tets emits), so this choice changes which side
/// emits and the resulting face winding, never the triangle count.
pub fn extract_boundary(mesh: &Mesh, neighbours: &Neighbours) -> Vec<Triangle> {
    let mut triangles = Vec::new();
    for (tet_idx, tet) in mesh.tetrahedra.iter().enumerate() {
        let tet_id = (tet_idx + 1) as i64;
        for face_idx in 0..4usize {
            let ngb = neighbours.table[tet_idx][face_idx];
            let reference = if ngb == 0 {
                Some(0)
            } else {
                let ngb_tet = &mesh.tetrahedra[(ngb - 1) as usize];
                if ngb_tet.reference != tet.reference && tet_id < ngb {
                    Some(1)
                } else {
                    None
                }
            };
            if let Some(reference) = reference {
                let [a, b, c] = TVPF[face_idx];
                triangles.push(Triangle {
                    idx: [tet.idx[a], tet.idx[b], tet.idx[c]],
                    reference,
                });
            }
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Tetrahedron, Vertex};
    use rstest::rstest;

    fn vertex(x: f64, y: f64, z: f64) -> Vertex {
        Vertex { xyz: [x, y, z], reference: 0 }
    }

    /// S1: a single tet, vertices 1..4.
    fn single_tet_mesh() -> Mesh {
        Mesh {
            vertices: vec![vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0), vertex(0.0, 0.0, 1.0)],
            tetrahedra: vec![Tetrahedron { idx: [1, 2, 3, 4], reference: 1 }],
            triangles: vec![],
        }
    }

    /// S2/S3 shared vertex set: tet A = 1-2-3-4, tet B = 1-2-3-5, sharing
    /// face (1,2,3). `reference_b` distinguishes the S2 (same reference) and
    /// S3 (different reference) scenarios.
    fn two_tets_sharing_a_face(reference_b: i32) -> Mesh {
        Mesh {
            vertices: vec![
                vertex(0.0, 0.0, 0.0),
                vertex(1.0, 0.0, 0.0),
                vertex(0.0, 1.0, 0.0),
                vertex(0.0, 0.0, 1.0),
                vertex(1.0, 1.0, 1.0),
            ],
            tetrahedra: vec![
                Tetrahedron { idx: [1, 2, 3, 4], reference: 1 },
                Tetrahedron { idx: [1, 2, 3, 5], reference: reference_b },
            ],
            triangles: vec![],
        }
    }

    /// S4: standard 6-tet decomposition of a cube with corners 1..8, a
    /// single reference.
    fn cube_of_six_tets_mesh() -> Mesh {
        let vertices = vec![
            vertex(0.0, 0.0, 0.0),
            vertex(1.0, 0.0, 0.0),
            vertex(1.0, 1.0, 0.0),
            vertex(0.0, 1.0, 0.0),
            vertex(0.0, 0.0, 1.0),
            vertex(1.0, 0.0, 1.0),
            vertex(1.0, 1.0, 1.0),
            vertex(0.0, 1.0, 1.0),
        ];
        let tets = [
            [1, 2, 3, 7],
            [1, 3, 4, 7],
            [1, 4, 8, 7],
            [1, 8, 5, 7],
            [1, 5, 6, 7],
            [1, 6, 2, 7],
        ];
        Mesh {
            vertices,
            tetrahedra: tets.iter().map(|idx| Tetrahedron { idx: *idx, reference: 1 }).collect(),
            triangles: vec![],
        }
    }

    /// §8 S1-S4: expected external/interface boundary triangle counts.
    #[rstest]
    #[case::s1_single_tet(single_tet_mesh(), 4, 0)]
    #[case::s2_two_tets_same_reference(two_tets_sharing_a_face(1), 6, 0)]
    #[case::s3_two_tets_different_reference(two_tets_sharing_a_face(2), 6, 1)]
    #[case::s4_cube_of_six_tets(cube_of_six_tets_mesh(), 12, 0)]
    fn boundary_scenarios(#[case] mesh: Mesh, #[case] expected_external: usize, #[case] expected_interface: usize) {
        let scheduler = Scheduler::init(4);
        let neighbours = compute(&scheduler, &mesh).unwrap();
        scheduler.shutdown();

        let boundary = extract_boundary(&mesh, &neighbours);
        let external = boundary.iter().filter(|t| t.reference == 0).count();
        let interface = boundary.iter().filter(|t| t.reference == 1).count();
        assert_eq!(external, expected_external);
        assert_eq!(interface, expected_interface);
        assert_eq!(boundary.len(), expected_external + expected_interface);
    }

    /// S3, pinned down: two tets sharing a face but with the shared vertices
    /// permuted in tet B's `idx` (so the two tets' literal `idx[TVPF[3]]`
    /// orderings differ even though they describe the same physical face).
    /// This lets a test distinguish "interface triangle built from tet A's
    /// `idx`" from "built from tet B's `idx`", which a mesh where both tets
    /// list the shared vertices in the same order cannot (see DESIGN.md's
    /// Open Question resolution on §4.7's `i > neighbour_id` vs. `i <
    /// neighbour_id` contradiction).
    #[test]
    fn s3_interface_triangle_is_emitted_by_the_smaller_id_tet() {
        let mesh = Mesh {
            vertices: vec![
                vertex(0.0, 0.0, 0.0),
                vertex(1.0, 0.0, 0.0),
                vertex(0.0, 1.0, 0.0),
                vertex(0.0, 0.0, 1.0),
                vertex(1.0, 1.0, 1.0),
            ],
            tetrahedra: vec![
                // tet 1 (the smaller id): shared vertices in order (1,2,3).
                Tetrahedron { idx: [1, 2, 3, 4], reference: 1 },
                // tet 2: same physical face {1,2,3}, but listed as (2,3,1) in
                // `idx` so its TVPF-ordered face differs from tet 1's.
                Tetrahedron { idx: [2, 3, 1, 5], reference: 2 },
            ],
            triangles: vec![],
        };

        let scheduler = Scheduler::init(4);
        let neighbours = compute(&scheduler, &mesh).unwrap();
        scheduler.shutdown();

        // Adjacency is still recorded on both sides regardless of which one
        // goes on to emit the interface triangle.
        assert_eq!(neighbours.table[0][3], 2);
        assert_eq!(neighbours.table[1][3], 1);

        let boundary = extract_boundary(&mesh, &neighbours);
        let interface: Vec<_> = boundary.iter().filter(|t| t.reference == 1).collect();
        assert_eq!(interface.len(), 1, "exactly one interface triangle, per §8 S3");

        // tet 1's own idx[TVPF[3]] == idx[[0,2,1]] == [1,3,2]; tet 2's would
        // be idx[[0,2,1]] == [2,1,3]. Only the smaller-id tet's ordering
        // should appear.
        assert_eq!(
            interface[0].idx,
            [1, 3, 2],
            "interface triangle must be built from tet 1 (the smaller id), not tet 2"
        );
    }

    /// S1: a tet with no neighbours has every `neighbours[i][j]` zero.
    #[test]
    fn single_tet_has_no_neighbours() {
        let mesh = single_tet_mesh();
        let scheduler = Scheduler::init(4);
        let neighbours = compute(&scheduler, &mesh).unwrap();
        scheduler.shutdown();
        assert_eq!(neighbours.table[0], [0, 0, 0, 0]);
    }

    /// S2/S3: the shared face (position 3 in both tets' `idx`) is recorded
    /// as mutual adjacency regardless of whether references match.
    #[test]
    fn shared_face_sets_mutual_adjacency() {
        for reference_b in [1, 2] {
            let mesh = two_tets_sharing_a_face(reference_b);
            let scheduler = Scheduler::init(4);
            let neighbours = compute(&scheduler, &mesh).unwrap();
            scheduler.shutdown();
            assert_eq!(neighbours.table[0][3], 2);
            assert_eq!(neighbours.table[1][3], 1);
        }
    }

    /// §8 property 6: neighbour symmetry and equal canonical keys.
    #[test]
    fn neighbour_relation_is_symmetric() {
        let mesh = Mesh {
            vertices: vec![
                vertex(0.0, 0.0, 0.0),
                vertex(1.0, 0.0, 0.0),
                vertex(0.0, 1.0, 0.0),
                vertex(0.0, 0.0, 1.0),
                vertex(1.0, 1.0, 1.0),
            ],
            tetrahedra: vec![
                Tetrahedron { idx: [1, 2, 3, 4], reference: 1 },
                Tetrahedron { idx: [1, 2, 3, 5], reference: 1 },
            ],
            triangles: vec![],
        };
        let scheduler = Scheduler::init(2);
        let neighbours = compute(&scheduler, &mesh).unwrap();
        scheduler.shutdown();

        for (tet_idx, row) in neighbours.table.iter().enumerate() {
            let tet_id = tet_idx + 1;
            for (face_idx, &ngb) in row.iter().enumerate() {
                if ngb == 0 {
                    continue;
                }
                let ngb_row = &neighbours.table[(ngb as usize) - 1];
                let back = ngb_row.iter().position(|&n| n as usize == tet_id);
                assert!(back.is_some(), "no reciprocal neighbour entry for tet {tet_id} face {face_idx}");
                let ngb_face = back.unwrap();
                let a = canonical_face(&mesh.tetrahedra[tet_idx], face_idx);
                let b = canonical_face(&mesh.tetrahedra[(ngb as usize) - 1], ngb_face);
                assert_eq!(a, b);
            }
        }
    }

    fn random_tet_mesh(n_vertices: usize, n_tets: usize, seed: u64) -> Mesh {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let vertices = (0..n_vertices)
            .map(|_| vertex(rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()))
            .collect();
        let tetrahedra = (0..n_tets)
            .map(|_| Tetrahedron {
                idx: [
                    rng.gen_range(1..=n_vertices as i64),
                    rng.gen_range(1..=n_vertices as i64),
                    rng.gen_range(1..=n_vertices as i64),
                    rng.gen_range(1..=n_vertices as i64),
                ],
                reference: 1,
            })
            .collect();
        Mesh { vertices, tetrahedra, triangles: vec![] }
    }

    /// §8 S5 / property 5: adjacency tables for the same mesh are bitwise
    /// identical regardless of worker count.
    #[rstest]
    #[case::one_worker(1)]
    #[case::four_workers(4)]
    #[case::eight_workers(8)]
    fn adjacency_is_deterministic_across_worker_counts(#[case] n_workers: usize) {
        let mesh = random_tet_mesh(3_000, 10_000, 0xC0FFEE);
        let scheduler = Scheduler::init(n_workers);
        let neighbours = compute(&scheduler, &mesh).unwrap();
        scheduler.shutdown();

        let reference_mesh = random_tet_mesh(3_000, 10_000, 0xC0FFEE);
        let reference_scheduler = Scheduler::init(1);
        let reference = compute(&reference_scheduler, &reference_mesh).unwrap();
        reference_scheduler.shutdown();

        assert_eq!(neighbours.table, reference.table);
    }
}
