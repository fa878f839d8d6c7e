//! Great-circle distance between two reports.

use crate::collector::types::Record;
use crate::error::{ParseError, ParseErrorKind};

/// Mean earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Haversine distance in nautical miles between two coordinates in degrees.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_NM * c
}

/// Distance in nautical miles between `a` and `b`, reading latitude and
/// longitude from the same positions in both records.
pub fn distance_nm(
    a: &Record,
    b: &Record,
    lat_index: usize,
    lon_index: usize,
) -> Result<f64, ParseError> {
    let (lat1, lon1) = coordinates(a, lat_index, lon_index)?;
    let (lat2, lon2) = coordinates(b, lat_index, lon_index)?;
    Ok(haversine_nm(lat1, lon1, lat2, lon2))
}

fn coordinates(record: &Record, lat_index: usize, lon_index: usize) -> Result<(f64, f64), ParseError> {
    let lat = coordinate(record, lat_index, 90.0)?;
    let lon = coordinate(record, lon_index, 180.0)?;
    Ok((lat, lon))
}

fn coordinate(record: &Record, index: usize, limit: f64) -> Result<f64, ParseError> {
    let text = record.require(index, ParseErrorKind::Coordinate)?;
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| {
            ParseError::new(ParseErrorKind::Coordinate, index, text, e.to_string())
        })?;
    if !value.is_finite() || value.abs() > limit {
        return Err(ParseError::new(
            ParseErrorKind::Coordinate,
            index,
            text,
            format!("outside [-{limit}, {limit}]"),
        ));
    }
    Ok(value)
}
