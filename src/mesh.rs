//! The mesh file collaborator (§1, §6): out of scope for the scheduler
//! itself, but a concrete implementation is needed to exercise the
//! `tetrahedra_neighbours` example end to end. This is a small bespoke
//! binary format, not the real GMF/libMeshb format — only the shape of the
//! interface (open, report dimension/cardinality, read/write vertex and
//! tetrahedron and triangle blocks) is what the specification actually
//! requires of this collaborator.

use crate::error::{Result, SchedulerError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A vertex: three coordinates plus a material/region reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub xyz: [f64; 3],
    pub reference: i32,
}

/// A tetrahedron: four 1-based vertex ids plus a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tetrahedron {
    pub idx: [i64; 4],
    pub reference: i32,
}

/// A triangle: three 1-based vertex ids plus a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub idx: [i64; 3],
    pub reference: i32,
}

/// An in-memory mesh: dimension is always 3 (the only dimension the core
/// accepts, §6), entities are stored 0-indexed (entity id `i`, 1-based, is
/// `vertices[i - 1]`).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub tetrahedra: Vec<Tetrahedron>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn dimension(&self) -> u32 {
        3
    }
}

const MAGIC: &[u8; 4] = b"LPM1";

/// Appends `.meshb` to `path` unless it already ends in `.mesh` (the CLI
/// suffix rule of §6, also applied by the mesh collaborator directly so
/// library callers get the same behavior as the example binary).
pub fn normalize_path(path: &str) -> String {
    if path.ends_with(".mesh") || path.ends_with(".meshb") {
        path.to_string()
    } else {
        format!("{path}.meshb")
    }
}

/// Reads a mesh from `path`. Rejects meshes without vertices or whose
/// declared dimension isn't 3 (§6, §7).
pub fn read(path: &Path) -> Result<Mesh> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(SchedulerError::InvalidMesh(format!(
            "{}: not an LPM1 mesh file",
            path.display()
        )));
    }

    let dimension = read_u32(&mut reader)?;
    if dimension != 3 {
        return Err(SchedulerError::InvalidMesh(format!(
            "{}: unsupported dimension {dimension}, only 3 is accepted",
            path.display()
        )));
    }

    let n_vertices = read_u64(&mut reader)? as usize;
    if n_vertices == 0 {
        return Err(SchedulerError::InvalidMesh(format!(
            "{}: mesh has no vertices",
            path.display()
        )));
    }
    let mut vertices = Vec::with_capacity(n_vertices);
    for _ in 0..n_vertices {
        let xyz = [read_f64(&mut reader)?, read_f64(&mut reader)?, read_f64(&mut reader)?];
        let reference = read_u32(&mut reader)? as i32;
        vertices.push(Vertex { xyz, reference });
    }

    let n_tets = read_u64(&mut reader)? as usize;
    let mut tetrahedra = Vec::with_capacity(n_tets);
    for _ in 0..n_tets {
        let idx = [
            read_u64(&mut reader)? as i64,
            read_u64(&mut reader)? as i64,
            read_u64(&mut reader)? as i64,
            read_u64(&mut reader)? as i64,
        ];
        let reference = read_u32(&mut reader)? as i32;
        tetrahedra.push(Tetrahedron { idx, reference });
    }

    let n_tris = read_u64(&mut reader)? as usize;
    let mut triangles = Vec::with_capacity(n_tris);
    for _ in 0..n_tris {
        let idx = [
            read_u64(&mut reader)? as i64,
            read_u64(&mut reader)? as i64,
            read_u64(&mut reader)? as i64,
        ];
        let reference = read_u32(&mut reader)? as i32;
        triangles.push(Triangle { idx, reference });
    }

    Ok(Mesh {
        vertices,
        tetrahedra,
        triangles,
    })
}

/// Writes `mesh` to `path`, creating or truncating it.
pub fn write(path: &Path, mesh: &Mesh) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(MAGIC)?;
    write_u32(&mut writer, mesh.dimension())?;

    write_u64(&mut writer, mesh.vertices.len() as u64)?;
    for v in &mesh.vertices {
        write_f64(&mut writer, v.xyz[0])?;
        write_f64(&mut writer, v.xyz[1])?;
        write_f64(&mut writer, v.xyz[2])?;
        write_u32(&mut writer, v.reference as u32)?;
    }

    write_u64(&mut writer, mesh.tetrahedra.len() as u64)?;
    for t in &mesh.tetrahedra {
        for v in t.idx {
            write_u64(&mut writer, v as u64)?;
        }
        write_u32(&mut writer, t.reference as u32)?;
    }

    write_u64(&mut writer, mesh.triangles.len() as u64)?;
    for t in &mesh.triangles {
        for v in t.idx {
            write_u64(&mut writer, v as u64)?;
        }
        write_u32(&mut writer, t.reference as u32)?;
    }

    writer.flush()?;
    Ok(())
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64(w: &mut impl Write, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    fn single_tet_mesh() -> Mesh {
        Mesh {
            vertices: vec![
                Vertex { xyz: [0.0, 0.0, 0.0], reference: 0 },
                Vertex { xyz: [1.0, 0.0, 0.0], reference: 0 },
                Vertex { xyz: [0.0, 1.0, 0.0], reference: 0 },
                Vertex { xyz: [0.0, 0.0, 1.0], reference: 0 },
            ],
            tetrahedra: vec![Tetrahedron { idx: [1, 2, 3, 4], reference: 1 }],
            triangles: vec![],
        }
    }

    #[test]
    fn round_trip_preserves_arrays() {
        let mesh = single_tet_mesh();
        let path = temp_dir().join(format!("lplib-test-{}.meshb", std::process::id()));
        write(&path, &mesh).unwrap();
        let read_back = read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(read_back.vertices, mesh.vertices);
        assert_eq!(read_back.tetrahedra, mesh.tetrahedra);
        assert_eq!(read_back.triangles, mesh.triangles);
    }

    #[test]
    fn rejects_mesh_without_vertices() {
        let mesh = Mesh::default();
        let path = temp_dir().join(format!("lplib-test-empty-{}.meshb", std::process::id()));
        write(&path, &mesh).unwrap();
        let err = read(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, SchedulerError::InvalidMesh(_)));
    }

    #[test]
    fn suffix_rule_appends_meshb() {
        assert_eq!(normalize_path("cube"), "cube.meshb");
        assert_eq!(normalize_path("cube.mesh"), "cube.mesh");
        assert_eq!(normalize_path("cube.meshb"), "cube.meshb");
    }
}
