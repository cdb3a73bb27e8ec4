//! Encoded-polyline codec, fixed-point precision 1e5.
//!
//! Routes arrive pre-computed as compact ASCII strings: each coordinate
//! component is the zig-zag-encoded signed delta from the previous point,
//! split into 5-bit chunks, every chunk offset by 63 with bit 6 acting as a
//! continuation flag. Decoding is a bounded byte scan and never fails;
//! corrupt or truncated input yields the points decoded up to that position.

use crate::model::LatLon;

const PRECISION: f64 = 1e5;

/// A continuation run longer than this cannot come from a real coordinate
/// delta; the component is treated as truncated.
const MAX_SHIFT: u32 = 60;

/// Decode an encoded polyline into its coordinate sequence.
///
/// Empty input decodes to an empty path. A trailing half pair (a latitude
/// delta with no longitude delta) is dropped.
pub fn decode(encoded: &str) -> Vec<LatLon> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat = 0i64;
    let mut lon = 0i64;

    while index < bytes.len() {
        let Some((lat_delta, after_lat)) = decode_component(bytes, index) else {
            break;
        };
        let Some((lon_delta, after_lon)) = decode_component(bytes, after_lat) else {
            break;
        };
        index = after_lon;
        // a maxed continuation run decodes to i64::MIN; an overflowing
        // position marks corrupt input, keep only the pairs before it
        let Some(next_lat) = lat.checked_add(lat_delta) else {
            break;
        };
        let Some(next_lon) = lon.checked_add(lon_delta) else {
            break;
        };
        lat = next_lat;
        lon = next_lon;
        points.push(LatLon::new(lat as f64 / PRECISION, lon as f64 / PRECISION));
    }

    points
}

fn decode_component(bytes: &[u8], mut index: usize) -> Option<(i64, usize)> {
    let mut accumulated: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = *bytes.get(index)?;
        index += 1;
        let chunk = u64::from(byte.wrapping_sub(63));
        accumulated |= (chunk & 0x1f) << shift;
        if chunk & 0x20 == 0 {
            break;
        }
        shift += 5;
        if shift > MAX_SHIFT {
            return None;
        }
    }

    let halved = (accumulated >> 1) as i64;
    let delta = if accumulated & 1 != 0 { !halved } else { halved };
    Some((delta, index))
}

/// Encode a coordinate sequence into polyline form.
///
/// Coordinates are rounded onto the 1e5 fixed-point grid, so
/// `decode(&encode(path))` reproduces `path` up to that rounding.
pub fn encode(path: &[LatLon]) -> String {
    let mut encoded = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;

    for point in path {
        let lat = (point.lat * PRECISION).round() as i64;
        let lon = (point.lon * PRECISION).round() as i64;
        encode_component(lat - prev_lat, &mut encoded);
        encode_component(lon - prev_lon, &mut encoded);
        prev_lat = lat;
        prev_lon = lon;
    }

    encoded
}

fn encode_component(delta: i64, out: &mut String) {
    let mut value = ((delta << 1) ^ (delta >> 63)) as u64;
    loop {
        let mut chunk = (value & 0x1f) as u8;
        value >>= 5;
        if value > 0 {
            chunk |= 0x20;
        }
        out.push(char::from(chunk + 63));
        if value == 0 {
            break;
        }
    }
}
