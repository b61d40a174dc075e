//! Geometry columns are hexadecimal WKB, always a MultiPolygon.

use serde_json::Value;

use crate::error::{DataError, Result};

const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOLYGON: u32 = 6;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;
const EWKB_FLAGS_MASK: u32 = 0xF000_0000;

#[derive(Clone, Copy)]
enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn from_marker(marker: u8) -> Result<Self> {
        match marker {
            0 => Ok(ByteOrder::Big),
            1 => Ok(ByteOrder::Little),
            other => Err(DataError::Geometry(format!("invalid byte order marker {}", other))),
        }
    }

    fn marker(self) -> u8 {
        match self {
            ByteOrder::Big => 0,
            ByteOrder::Little => 1,
        }
    }

    fn read_u32(self, bytes: &[u8]) -> Result<u32> {
        let raw: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| DataError::Geometry("truncated WKB".to_string()))?;
        Ok(match self {
            ByteOrder::Big => u32::from_be_bytes(raw),
            ByteOrder::Little => u32::from_le_bytes(raw),
        })
    }

    fn write_u32(self, out: &mut Vec<u8>, value: u32) {
        match self {
            ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
            ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Normalize a hex (E)WKB Polygon or MultiPolygon to a MultiPolygon.
///
/// Polygons are wrapped in a one-member MultiPolygon keeping their byte order,
/// dimensions and SRID. Empty input means no geometry.
pub fn to_multipolygon_hex(wkb_hex: &str) -> Result<Option<String>> {
    let wkb_hex = wkb_hex.trim();
    if wkb_hex.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(wkb_hex)
        .map_err(|e| DataError::Geometry(format!("invalid hex WKB: {}", e)))?;

    let order = ByteOrder::from_marker(*bytes.first().ok_or_else(|| {
        DataError::Geometry("empty WKB".to_string())
    })?)?;
    let raw_type = order.read_u32(&bytes[1..])?;
    let flags = raw_type & EWKB_FLAGS_MASK;
    let code = raw_type & !EWKB_FLAGS_MASK;
    let (iso_dims, base) = (code / 1000, code % 1000);

    match base {
        WKB_MULTIPOLYGON => Ok(Some(hex::encode_upper(&bytes))),
        WKB_POLYGON => {
            let header_len = if flags & EWKB_SRID_FLAG != 0 { 9 } else { 5 };
            let srid = bytes
                .get(5..header_len)
                .ok_or_else(|| DataError::Geometry("truncated WKB".to_string()))?;
            let body = &bytes[header_len..];

            let mut out = Vec::with_capacity(bytes.len() + 9);
            out.push(order.marker());
            order.write_u32(&mut out, flags | (iso_dims * 1000 + WKB_MULTIPOLYGON));
            out.extend_from_slice(srid);
            order.write_u32(&mut out, 1);
            out.push(order.marker());
            order.write_u32(&mut out, (flags & !EWKB_SRID_FLAG) | (iso_dims * 1000 + WKB_POLYGON));
            out.extend_from_slice(body);
            Ok(Some(hex::encode_upper(out)))
        }
        other => Err(DataError::Geometry(format!(
            "expected a Polygon or MultiPolygon, got WKB type {}",
            other
        ))),
    }
}

/// Encode a GeoJSON Polygon or MultiPolygon as little-endian 2D MultiPolygon WKB hex
pub fn geojson_to_multipolygon_hex(geometry: &Value) -> Result<String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DataError::Geometry("GeoJSON geometry without type".to_string()))?;
    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| DataError::Geometry("GeoJSON geometry without coordinates".to_string()))?;

    let polygons: Vec<&Value> = match kind {
        "Polygon" => vec![coordinates],
        "MultiPolygon" => as_array(coordinates)?.iter().collect(),
        other => {
            return Err(DataError::Geometry(format!(
                "expected a Polygon or MultiPolygon, got {}",
                other
            )))
        }
    };

    let order = ByteOrder::Little;
    let mut out = Vec::new();
    out.push(order.marker());
    order.write_u32(&mut out, WKB_MULTIPOLYGON);
    order.write_u32(&mut out, polygons.len() as u32);

    for polygon in polygons {
        let rings = as_array(polygon)?;
        out.push(order.marker());
        order.write_u32(&mut out, WKB_POLYGON);
        order.write_u32(&mut out, rings.len() as u32);
        for ring in rings {
            let points = as_array(ring)?;
            order.write_u32(&mut out, points.len() as u32);
            for point in points {
                let (x, y) = position(point)?;
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
            }
        }
    }

    Ok(hex::encode_upper(out))
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| DataError::Geometry("malformed GeoJSON coordinates".to_string()))
}

fn position(point: &Value) -> Result<(f64, f64)> {
    let coords = as_array(point)?;
    match (coords.first().and_then(Value::as_f64), coords.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(DataError::Geometry(format!("invalid GeoJSON position {}", point))),
    }
}
