//! 3MF parsing
//!
//! A 3MF file is a zip package whose model part (normally
//! `3D/3dmodel.model`) is XML. Each `<mesh>` lists `<vertex x y z>` entries
//! followed by `<triangle v1 v2 v3>` entries indexing that mesh's vertices.
//! Build item and component transforms are not applied.

use super::{MeshAccumulator, MeshError, MeshFormat, MeshSummary, MAX_TRIANGLES};
use nalgebra::Vector3;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DEFAULT_MODEL_PART: &str = "3D/3dmodel.model";

/// Inflated size cap for the model XML
pub const MAX_MODEL_PART_BYTES: u64 = 512 * 1024 * 1024;

pub fn parse(bytes: &[u8]) -> Result<MeshSummary, MeshError> {
    let xml = read_model_part(bytes, MAX_MODEL_PART_BYTES)?;
    parse_model_xml(&xml)
}

/// Locate and read the model XML inside the package, refusing parts that
/// inflate beyond `limit` bytes
fn read_model_part(bytes: &[u8], limit: u64) -> Result<String, MeshError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| MeshError::parse(MeshFormat::ThreeMf, format!("not a zip package: {}", e)))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let part = names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(DEFAULT_MODEL_PART))
        .or_else(|| {
            names.iter().find(|n| {
                let lower = n.to_ascii_lowercase();
                lower.starts_with("3d/") && lower.ends_with(".model")
            })
        })
        .cloned()
        .ok_or_else(|| MeshError::parse(MeshFormat::ThreeMf, "package has no 3D model part"))?;

    let entry = archive
        .by_name(&part)
        .map_err(|e| MeshError::parse(MeshFormat::ThreeMf, format!("{}: {}", part, e)))?;
    let too_large = || {
        MeshError::parse(
            MeshFormat::ThreeMf,
            format!("{} exceeds {} bytes uncompressed", part, limit),
        )
    };
    if entry.size() > limit {
        return Err(too_large());
    }

    // declared sizes can lie; cap the actual inflate too
    let mut xml = String::new();
    entry
        .take(limit + 1)
        .read_to_string(&mut xml)
        .map_err(|e| MeshError::parse(MeshFormat::ThreeMf, format!("{}: {}", part, e)))?;
    if xml.len() as u64 > limit {
        return Err(too_large());
    }

    tracing::trace!(part = %part, bytes = xml.len(), "Read 3MF model part");
    Ok(xml)
}

/// Walk the model XML and fold every mesh triangle into the accumulator
pub fn parse_model_xml(xml: &str) -> Result<MeshSummary, MeshError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut acc = MeshAccumulator::new();
    let mut vertices: Vec<Vector3<f64>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"mesh" => vertices.clear(),
                b"vertex" => {
                    let [x, y, z] = float_attrs(&e, [b"x", b"y", b"z"])?;
                    vertices.push(Vector3::new(x, y, z));
                }
                b"triangle" => {
                    let [v1, v2, v3] = index_attrs(&e, [b"v1", b"v2", b"v3"], vertices.len())?;
                    acc.add_triangle(vertices[v1], vertices[v2], vertices[v3]);
                    if acc.triangle_count() > MAX_TRIANGLES {
                        return Err(MeshError::too_many(MeshFormat::ThreeMf, acc.triangle_count()));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MeshError::parse(
                    MeshFormat::ThreeMf,
                    format!("XML error at byte {}: {}", reader.buffer_position(), e),
                ))
            }
            _ => {}
        }
    }

    acc.finish(MeshFormat::ThreeMf)
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, MeshError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| MeshError::parse(MeshFormat::ThreeMf, e.to_string()))?;
        if attr.key.local_name().as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| MeshError::parse(MeshFormat::ThreeMf, e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(element: &BytesStart<'_>, key: &[u8]) -> Result<String, MeshError> {
    attr_value(element, key)?.ok_or_else(|| {
        MeshError::parse(
            MeshFormat::ThreeMf,
            format!(
                "<{}> missing attribute '{}'",
                String::from_utf8_lossy(element.local_name().as_ref()),
                String::from_utf8_lossy(key)
            ),
        )
    })
}

fn float_attrs(element: &BytesStart<'_>, keys: [&[u8]; 3]) -> Result<[f64; 3], MeshError> {
    let mut out = [0.0; 3];
    for (slot, key) in out.iter_mut().zip(keys) {
        let raw = required_attr(element, key)?;
        *slot = raw.trim().parse().map_err(|_| {
            MeshError::parse(MeshFormat::ThreeMf, format!("bad vertex coordinate '{}'", raw))
        })?;
    }
    Ok(out)
}

fn index_attrs(
    element: &BytesStart<'_>,
    keys: [&[u8]; 3],
    vertex_count: usize,
) -> Result<[usize; 3], MeshError> {
    let mut out = [0usize; 3];
    for (slot, key) in out.iter_mut().zip(keys) {
        let raw = required_attr(element, key)?;
        let index: usize = raw.trim().parse().map_err(|_| {
            MeshError::parse(MeshFormat::ThreeMf, format!("bad triangle index '{}'", raw))
        })?;
        if index >= vertex_count {
            return Err(MeshError::parse(
                MeshFormat::ThreeMf,
                format!(
                    "triangle index {} out of range ({} vertices in mesh)",
                    index, vertex_count
                ),
            ));
        }
        *slot = index;
    }
    Ok(out)
}
