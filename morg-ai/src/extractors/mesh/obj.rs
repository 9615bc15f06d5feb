//! Wavefront OBJ parsing
//!
//! Only `v` and `f` statements matter. Face indices are 1-based, negative
//! indices count back from the most recent vertex, and `v/vt/vn` forms are
//! accepted. Polygons are fan-triangulated.

use super::{MeshAccumulator, MeshError, MeshFormat, MeshSummary, MAX_TRIANGLES};
use nalgebra::Vector3;

pub fn parse(bytes: &[u8]) -> Result<MeshSummary, MeshError> {
    let text = String::from_utf8_lossy(bytes);

    let mut vertices: Vec<Vector3<f64>> = Vec::new();
    let mut acc = MeshAccumulator::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("");
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("v") => {
                let coords = tokens
                    .take(3)
                    .map(|t| t.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| bad_line(line_no, format!("bad vertex coordinate: {}", e)))?;
                if coords.len() != 3 {
                    return Err(bad_line(line_no, "vertex needs 3 coordinates"));
                }
                vertices.push(Vector3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let corners = tokens
                    .map(|t| resolve_index(t, vertices.len()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|msg| bad_line(line_no, msg))?;
                if corners.len() < 3 {
                    return Err(bad_line(
                        line_no,
                        format!("face has {} vertices, expected at least 3", corners.len()),
                    ));
                }
                for i in 1..corners.len() - 1 {
                    acc.add_triangle(
                        vertices[corners[0]],
                        vertices[corners[i]],
                        vertices[corners[i + 1]],
                    );
                }
                if acc.triangle_count() > MAX_TRIANGLES {
                    return Err(MeshError::too_many(MeshFormat::Obj, acc.triangle_count()));
                }
            }
            _ => {}
        }
    }

    acc.finish(MeshFormat::Obj)
}

fn bad_line(line_no: usize, message: impl std::fmt::Display) -> MeshError {
    MeshError::parse(MeshFormat::Obj, format!("line {}: {}", line_no + 1, message))
}

/// Turn one face corner (`7`, `7/2`, `7//3`, `-1`) into a zero-based index
fn resolve_index(token: &str, vertex_count: usize) -> Result<usize, String> {
    let head = token.split('/').next().unwrap_or("");
    let index: i64 = head
        .parse()
        .map_err(|_| format!("bad face index '{}'", token))?;

    let resolved = match index {
        0 => return Err("face index 0 is invalid".to_string()),
        i if i > 0 => i - 1,
        i => vertex_count as i64 + i,
    };

    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(format!(
            "face index {} out of range ({} vertices defined)",
            index, vertex_count
        ));
    }
    Ok(resolved as usize)
}
