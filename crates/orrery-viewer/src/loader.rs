//! Turns a model file into mesh data.
//!
//! Supported format: STL, both binary and ASCII, sniffed from the file
//! contents. STL is a triangle soup; vertices are kept per-facet so the mesh
//! renders with flat shading, which is what the format encodes.

use std::path::Path;

use anyhow::{bail, Context, Result};
use bytemuck::{Pod, Zeroable};

/// One mesh vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Axis-aligned bounding box of a mesh.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    fn empty() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }

    fn grow(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }

    pub fn center(&self) -> [f32; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Radius of the bounding sphere around `center()`.
    pub fn radius(&self) -> f32 {
        let c = self.center();
        let dx = self.max[0] - c[0];
        let dy = self.max[1] - c[1];
        let dz = self.max[2] - c[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// CPU-side triangle mesh produced by the loader.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Loads a mesh from `path`.
///
/// The format is sniffed from the contents, not the extension: a file that
/// starts with `solid` and contains a `facet` keyword is parsed as ASCII STL,
/// anything else as binary STL. (Binary files emitted by some exporters also
/// begin with `solid`, hence the second check.)
pub fn load_model(path: &Path) -> Result<Mesh> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read model file {}", path.display()))?;

    parse_stl(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parses STL data from a byte buffer.
pub fn parse_stl(bytes: &[u8]) -> Result<Mesh> {
    if looks_like_ascii(bytes) {
        parse_ascii(bytes)
    } else {
        parse_binary(bytes)
    }
}

fn looks_like_ascii(bytes: &[u8]) -> bool {
    if !bytes.starts_with(b"solid") {
        return false;
    }
    // Scan a bounded prefix; a binary header is only 80 bytes, so a `facet`
    // keyword soon after `solid` is a reliable ASCII signal.
    let prefix = &bytes[..bytes.len().min(1024)];
    prefix.windows(5).any(|w| w == b"facet")
}

// ── binary ────────────────────────────────────────────────────────────────

const BINARY_HEADER_LEN: usize = 80;
const BINARY_TRIANGLE_LEN: usize = 50; // 12 f32 + u16 attribute count

fn parse_binary(bytes: &[u8]) -> Result<Mesh> {
    if bytes.len() < BINARY_HEADER_LEN + 4 {
        bail!("binary STL truncated: {} bytes", bytes.len());
    }

    let count = u32::from_le_bytes(
        bytes[BINARY_HEADER_LEN..BINARY_HEADER_LEN + 4]
            .try_into()
            .expect("slice length is 4"),
    ) as usize;

    let body = &bytes[BINARY_HEADER_LEN + 4..];
    let needed = count
        .checked_mul(BINARY_TRIANGLE_LEN)
        .context("triangle count overflows")?;
    if body.len() < needed {
        bail!(
            "binary STL truncated: header declares {} triangles, data holds {}",
            count,
            body.len() / BINARY_TRIANGLE_LEN
        );
    }

    let mut builder = MeshBuilder::with_capacity(count);

    for tri in body.chunks_exact(BINARY_TRIANGLE_LEN).take(count) {
        let mut f = [0.0f32; 12];
        for (i, v) in f.iter_mut().enumerate() {
            let off = i * 4;
            *v = f32::from_le_bytes(tri[off..off + 4].try_into().expect("slice length is 4"));
        }

        let normal = [f[0], f[1], f[2]];
        let verts = [
            [f[3], f[4], f[5]],
            [f[6], f[7], f[8]],
            [f[9], f[10], f[11]],
        ];
        builder.push_facet(normal, verts);
    }

    builder.finish()
}

// ── ascii ─────────────────────────────────────────────────────────────────

fn parse_ascii(bytes: &[u8]) -> Result<Mesh> {
    let text = std::str::from_utf8(bytes).context("ASCII STL is not valid UTF-8")?;

    let mut builder = MeshBuilder::with_capacity(0);

    let mut tokens = text.split_whitespace();
    let mut normal = [0.0f32; 3];
    let mut verts: Vec<[f32; 3]> = Vec::with_capacity(3);

    while let Some(tok) = tokens.next() {
        match tok {
            "facet" => {
                let kw = tokens.next().context("facet without normal keyword")?;
                if kw != "normal" {
                    bail!("expected `normal` after `facet`, found `{kw}`");
                }
                normal = read_vec3(&mut tokens).context("malformed facet normal")?;
                verts.clear();
            }
            "vertex" => {
                verts.push(read_vec3(&mut tokens).context("malformed vertex")?);
            }
            "endfacet" => {
                if verts.len() != 3 {
                    bail!("facet has {} vertices, expected 3", verts.len());
                }
                builder.push_facet(normal, [verts[0], verts[1], verts[2]]);
            }
            // solid/endsolid names, outer/endloop markers
            _ => {}
        }
    }

    builder.finish()
}

fn read_vec3<'a, I>(tokens: &mut I) -> Result<[f32; 3]>
where
    I: Iterator<Item = &'a str>,
{
    let mut out = [0.0f32; 3];
    for v in out.iter_mut() {
        let tok = tokens.next().context("unexpected end of input")?;
        *v = tok
            .parse::<f32>()
            .with_context(|| format!("not a number: `{tok}`"))?;
    }
    Ok(out)
}

// ── mesh assembly ─────────────────────────────────────────────────────────

struct MeshBuilder {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl MeshBuilder {
    fn with_capacity(triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangles * 3),
            indices: Vec::with_capacity(triangles * 3),
            bounds: Aabb::empty(),
        }
    }

    /// Adds one facet, recomputing the normal when the stored one is zero or
    /// non-finite (common in files from sloppy exporters).
    fn push_facet(&mut self, normal: [f32; 3], verts: [[f32; 3]; 3]) {
        let normal = if usable_normal(normal) {
            normal
        } else {
            face_normal(verts)
        };

        let base = self.vertices.len() as u32;
        for v in verts {
            self.bounds.grow(v);
            self.vertices.push(MeshVertex {
                position: v,
                normal,
            });
        }
        self.indices.extend([base, base + 1, base + 2]);
    }

    fn finish(self) -> Result<Mesh> {
        if self.vertices.is_empty() {
            bail!("model contains no triangles");
        }
        debug_assert!(!self.bounds.is_empty());

        Ok(Mesh {
            vertices: self.vertices,
            indices: self.indices,
            bounds: self.bounds,
        })
    }
}

fn usable_normal(n: [f32; 3]) -> bool {
    let len2 = n[0] * n[0] + n[1] * n[1] + n[2] * n[2];
    len2.is_finite() && len2 > 1e-12
}

fn face_normal(v: [[f32; 3]; 3]) -> [f32; 3] {
    let e1 = [v[1][0] - v[0][0], v[1][1] - v[0][1], v[1][2] - v[0][2]];
    let e2 = [v[2][0] - v[0][0], v[2][1] - v[0][1], v[2][2] - v[0][2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        // Degenerate triangle; any unit vector keeps the shader defined.
        [0.0, 0.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a binary STL buffer holding the given facets.
    fn binary_stl(facets: &[([f32; 3], [[f32; 3]; 3])]) -> Vec<u8> {
        let mut out = vec![0u8; BINARY_HEADER_LEN];
        out.extend((facets.len() as u32).to_le_bytes());
        for (normal, verts) in facets {
            for v in normal.iter() {
                out.extend(v.to_le_bytes());
            }
            for vert in verts {
                for v in vert.iter() {
                    out.extend(v.to_le_bytes());
                }
            }
            out.extend(0u16.to_le_bytes());
        }
        out
    }

    const TRI: ([f32; 3], [[f32; 3]; 3]) = (
        [0.0, 0.0, 1.0],
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    );

    #[test]
    fn binary_single_triangle() {
        let mesh = parse_stl(&binary_stl(&[TRI])).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.bounds.min, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.bounds.max, [1.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn binary_zero_normal_is_recomputed() {
        let facet = ([0.0, 0.0, 0.0], TRI.1);
        let mesh = parse_stl(&binary_stl(&[facet])).unwrap();
        // Vertices wind counter-clockwise in the XY plane, so +Z.
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn binary_truncated_body_fails() {
        let mut bytes = binary_stl(&[TRI]);
        bytes.truncate(bytes.len() - 10);
        let err = parse_stl(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("truncated"));
    }

    #[test]
    fn binary_short_header_fails() {
        assert!(parse_stl(&[0u8; 40]).is_err());
    }

    #[test]
    fn binary_empty_model_fails() {
        let bytes = binary_stl(&[]);
        assert!(parse_stl(&bytes).is_err());
    }

    #[test]
    fn ascii_single_triangle() {
        let text = b"solid demo
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid demo
";
        let mesh = parse_stl(text).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertices[2].position, [0.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn ascii_bad_number_fails() {
        let text = b"solid demo
  facet normal 0 0 bogus
  endfacet
endsolid
";
        assert!(parse_stl(text).is_err());
    }

    #[test]
    fn ascii_wrong_vertex_count_fails() {
        let text = b"solid demo
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
    endloop
  endfacet
endsolid
";
        assert!(parse_stl(text).is_err());
    }

    #[test]
    fn binary_file_starting_with_solid_is_not_ascii() {
        // Some exporters write `solid` into the binary header. Without a
        // `facet` keyword nearby the sniffer must fall through to binary.
        let mut bytes = binary_stl(&[TRI]);
        bytes[..5].copy_from_slice(b"solid");
        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn bounds_center_and_radius() {
        let facet = (
            [0.0, 0.0, 1.0],
            [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0]],
        );
        let mesh = parse_stl(&binary_stl(&[facet])).unwrap();
        assert_eq!(mesh.bounds.center(), [0.0, 0.0, 0.0]);
        let r = mesh.bounds.radius();
        assert!((r - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn meshes_from_separate_parses_are_independent() {
        let a = parse_stl(&binary_stl(&[TRI])).unwrap();
        let mut b = parse_stl(&binary_stl(&[TRI])).unwrap();
        b.vertices[0].position = [9.0, 9.0, 9.0];
        assert_eq!(a.vertices[0].position, [0.0, 0.0, 0.0]);
    }
}
