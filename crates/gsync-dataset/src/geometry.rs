use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

/// Geometry family declared by a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    /// Mixed or undeclared geometry.
    Unknown,
}

impl GeometryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::Unknown => "Unknown",
        }
    }
}

impl FromStr for GeometryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(GeometryType::Point),
            "linestring" | "line" => Ok(GeometryType::LineString),
            "polygon" => Ok(GeometryType::Polygon),
            "multipoint" => Ok(GeometryType::MultiPoint),
            "multilinestring" => Ok(GeometryType::MultiLineString),
            "multipolygon" => Ok(GeometryType::MultiPolygon),
            "unknown" | "geometry" => Ok(GeometryType::Unknown),
            other => Err(format!("unknown geometry type '{other}'")),
        }
    }
}

/// Serialized spatial shape (WKT).
///
/// Text is normalized on construction so two encodings of the same shape
/// that differ only in spacing or keyword case compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Geometry {
    wkt: String,
}

impl Geometry {
    pub fn from_wkt(raw: &str) -> Self {
        Self {
            wkt: normalize_wkt(raw),
        }
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wkt)
    }
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wkt)
    }
}

fn normalize_wkt(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        let glue = matches!(ch, '(' | ')' | ',');
        let after_glue = matches!(out.chars().last(), Some('(' | ','));
        if pending_space && !glue && !after_glue && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch.to_ascii_uppercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_noise_is_ignored() {
        let a = Geometry::from_wkt("POINT(1 2)");
        let b = Geometry::from_wkt("  point ( 1   2 ) ");
        assert_eq!(a, b);
        assert_eq!(b.wkt(), "POINT(1 2)");
    }

    #[test]
    fn coordinates_still_matter() {
        let a = Geometry::from_wkt("LINESTRING(0 0, 1 1)");
        let b = Geometry::from_wkt("LINESTRING(0 0, 1 2)");
        assert_ne!(a, b);
        assert_eq!(a.wkt(), "LINESTRING(0 0,1 1)");
    }
}
