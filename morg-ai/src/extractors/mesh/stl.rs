//! STL parsing (binary and ASCII)
//!
//! Binary layout: 80-byte header, `u32` LE triangle count, then 50 bytes per
//! triangle (normal, three vertices as `f32` LE, `u16` attribute count).
//! Normals are ignored; geometry comes from the vertices alone.

use super::{MeshAccumulator, MeshError, MeshFormat, MeshSummary, MAX_TRIANGLES};
use nalgebra::Vector3;

const HEADER_LEN: usize = 80;
const PREAMBLE_LEN: usize = HEADER_LEN + 4;
const TRIANGLE_LEN: usize = 50;

fn declared_count(bytes: &[u8]) -> Option<u64> {
    let raw = bytes.get(HEADER_LEN..PREAMBLE_LEN)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64)
}

/// Size arithmetic matches a binary STL (trailing padding up to 80 bytes tolerated)
pub fn looks_binary(bytes: &[u8]) -> bool {
    match declared_count(bytes) {
        Some(count) if count > 0 && count <= MAX_TRIANGLES => {
            let expected = PREAMBLE_LEN + count as usize * TRIANGLE_LEN;
            bytes.len() >= expected && bytes.len() <= expected + HEADER_LEN
        }
        _ => false,
    }
}

/// Starts with `solid` and mentions facets/vertices early on
pub fn looks_ascii(bytes: &[u8]) -> bool {
    let trimmed = trim_leading_whitespace(bytes);
    if !trimmed.starts_with(b"solid") {
        return false;
    }
    let preview = &trimmed[..trimmed.len().min(4096)];
    let text = String::from_utf8_lossy(preview);
    text.contains("facet") && text.contains("vertex")
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Parse either STL flavor
///
/// Binary wins when the size arithmetic is consistent, since many binary
/// exporters also start their header with "solid". A "solid" file that is
/// not valid UTF-8 is read as binary too.
pub fn parse(bytes: &[u8]) -> Result<MeshSummary, MeshError> {
    if looks_binary(bytes) {
        parse_binary(bytes)
    } else if trim_leading_whitespace(bytes).starts_with(b"solid")
        && std::str::from_utf8(bytes).is_ok()
    {
        parse_ascii(bytes)
    } else {
        parse_binary(bytes)
    }
}

pub fn parse_binary(bytes: &[u8]) -> Result<MeshSummary, MeshError> {
    let count = declared_count(bytes).ok_or_else(|| {
        MeshError::parse(
            MeshFormat::Stl,
            format!("file too short for binary header ({} bytes)", bytes.len()),
        )
    })?;

    if count > MAX_TRIANGLES {
        return Err(MeshError::too_many(MeshFormat::Stl, count));
    }

    let expected = PREAMBLE_LEN + count as usize * TRIANGLE_LEN;
    if bytes.len() < expected {
        return Err(MeshError::parse(
            MeshFormat::Stl,
            format!(
                "truncated body: {} triangles need {} bytes, found {}",
                count,
                expected,
                bytes.len()
            ),
        ));
    }

    let mut acc = MeshAccumulator::new();
    for record in bytes[PREAMBLE_LEN..expected].chunks_exact(TRIANGLE_LEN) {
        // skip the 12-byte normal
        let a = read_vertex(&record[12..24]);
        let b = read_vertex(&record[24..36]);
        let c = read_vertex(&record[36..48]);
        acc.add_triangle(a, b, c);
    }

    acc.finish(MeshFormat::Stl)
}

fn read_vertex(raw: &[u8]) -> Vector3<f64> {
    let f = |i: usize| {
        f32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]) as f64
    };
    Vector3::new(f(0), f(4), f(8))
}

pub fn parse_ascii(bytes: &[u8]) -> Result<MeshSummary, MeshError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| MeshError::parse(MeshFormat::Stl, format!("invalid UTF-8: {}", e)))?;

    let mut acc = MeshAccumulator::new();
    let mut pending: Vec<Vector3<f64>> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let coords: Vec<f64> = tokens
                    .map(|t| t.parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| {
                        MeshError::parse(
                            MeshFormat::Stl,
                            format!("line {}: bad vertex coordinate: {}", line_no + 1, e),
                        )
                    })?;
                if coords.len() != 3 {
                    return Err(MeshError::parse(
                        MeshFormat::Stl,
                        format!("line {}: vertex needs 3 coordinates", line_no + 1),
                    ));
                }
                pending.push(Vector3::new(coords[0], coords[1], coords[2]));
                if pending.len() == 3 {
                    acc.add_triangle(pending[0], pending[1], pending[2]);
                    pending.clear();
                    if acc.triangle_count() > MAX_TRIANGLES {
                        return Err(MeshError::too_many(MeshFormat::Stl, acc.triangle_count()));
                    }
                }
            }
            Some("endloop") if !pending.is_empty() => {
                return Err(MeshError::parse(
                    MeshFormat::Stl,
                    format!(
                        "line {}: facet has {} vertices, expected 3",
                        line_no + 1,
                        pending.len()
                    ),
                ));
            }
            _ => {}
        }
    }

    if !pending.is_empty() {
        return Err(MeshError::parse(MeshFormat::Stl, "unterminated facet at end of file"));
    }

    acc.finish(MeshFormat::Stl)
}

#[cfg(test)]
mod tests {
    use super::super::test_meshes::{cube_ascii_stl, cube_binary_stl};
    use super::*;

    #[test]
    fn test_binary_cube() {
        let bytes = cube_binary_stl(3.0);
        assert!(looks_binary(&bytes));

        let summary = parse(&bytes).unwrap();
        assert_eq!(summary.num_triangles, 12);
        assert_eq!(summary.bounding_box_max, [3.0, 3.0, 3.0]);
        assert!((summary.volume - 27.0).abs() < 1e-6);
    }

    #[test]
    fn test_binary_with_solid_header_is_still_binary() {
        let mut bytes = cube_binary_stl(1.0);
        bytes[..5].copy_from_slice(b"solid");

        let summary = parse(&bytes).unwrap();
        assert_eq!(summary.num_triangles, 12);
    }

    #[test]
    fn test_solid_header_with_long_trailer_reads_as_binary() {
        let mut bytes = cube_binary_stl(2.0);
        bytes[..11].copy_from_slice(b"solid cube ");
        bytes.extend(std::iter::repeat(0xFFu8).take(200));
        assert!(!looks_binary(&bytes));

        let summary = parse(&bytes).unwrap();
        assert_eq!(summary.num_triangles, 12);
        assert!((summary.volume - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_binary_truncated() {
        let mut bytes = cube_binary_stl(1.0);
        bytes.truncate(bytes.len() - 60);

        let err = parse_binary(&bytes).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse STL: truncated body"));
    }

    #[test]
    fn test_binary_count_over_limit() {
        let mut bytes = vec![0u8; 84];
        bytes[80..84].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = parse_binary(&bytes).unwrap_err();
        assert!(matches!(err, MeshError::TooManyTriangles { .. }));
    }

    #[test]
    fn test_binary_short_header() {
        assert!(parse_binary(b"tiny").is_err());
    }

    #[test]
    fn test_ascii_cube() {
        let text = cube_ascii_stl(1.5);
        assert!(looks_ascii(text.as_bytes()));

        let summary = parse(text.as_bytes()).unwrap();
        assert_eq!(summary.num_triangles, 12);
        assert!((summary.volume - 3.375).abs() < 1e-9);
    }

    #[test]
    fn test_ascii_incomplete_facet() {
        let text = "solid bad\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nendloop\nendfacet\nendsolid\n";
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("facet has 2 vertices"));
    }

    #[test]
    fn test_ascii_bad_coordinate() {
        let text = "solid bad\nfacet normal 0 0 1\nouter loop\nvertex 0 zero 0\n";
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_ascii_without_facets_is_empty() {
        let err = parse(b"solid nothing\nendsolid nothing\n").unwrap_err();
        assert!(matches!(err, MeshError::Empty("STL")));
    }
}
