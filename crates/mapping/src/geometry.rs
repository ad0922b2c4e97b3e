//! Minimal planar geometry model used by the geometry converters.
//!
//! Geometries come from providers as WKT, GeoJSON objects, bounding-box lists
//! or `lonmin/latmin/lonmax/latmax` objects. Only points, polygons and
//! multipolygons are needed to compute bounds and render WKT or GeoJSON.

use serde_json::{Value, json};

/// Decimal places kept when rendering WKT.
pub const COORDS_ROUNDING_PRECISION: usize = 4;

/// WKT strings longer than this are likely to be rejected in query strings.
pub const WKT_MAX_LEN: usize = 1600;

type Ring = Vec<[f64; 2]>;
type Polygon = Vec<Ring>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point([f64; 2]),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

#[derive(Debug)]
enum Nested {
    Coordinates(Vec<f64>),
    List(Vec<Nested>),
}

impl Geometry {
    /// Builds a rectangle from `[min_x, min_y, max_x, max_y]`.
    pub fn from_bbox(bbox: [f64; 4]) -> Self {
        let [min_x, min_y, max_x, max_y] = bbox;
        Geometry::Polygon(vec![vec![[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]]])
    }

    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(text) => Self::from_wkt(text),
            Value::Array(items) => {
                let numbers: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
                match numbers.as_deref() {
                    Some([min_x, min_y, max_x, max_y]) => Ok(Self::from_bbox([*min_x, *min_y, *max_x, *max_y])),
                    _ => Err("expected a [min_x, min_y, max_x, max_y] bounding box".to_string()),
                }
            }
            Value::Object(object) => {
                if let Some(kind) = object.get("type").and_then(Value::as_str) {
                    return Self::from_geojson(kind, object.get("coordinates").unwrap_or(&Value::Null));
                }
                let corner = |key: &str| object.get(key).and_then(Value::as_f64);
                match (corner("lonmin"), corner("latmin"), corner("lonmax"), corner("latmax")) {
                    (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Ok(Self::from_bbox([min_x, min_y, max_x, max_y])),
                    _ => Err("object is neither GeoJSON nor a lonmin/latmin/lonmax/latmax box".to_string()),
                }
            }
            other => Err(format!("unsupported geometry value: {other}")),
        }
    }

    pub fn from_wkt(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let open = trimmed.find('(').ok_or_else(|| format!("not a WKT geometry: {trimmed}"))?;
        let kind = trimmed[..open].trim().to_ascii_uppercase();
        let mut characters = trimmed[open..].chars().peekable();
        let nested = parse_nested(&mut characters)?;
        if characters.any(|character| !character.is_whitespace()) {
            return Err(format!("trailing characters in WKT: {trimmed}"));
        }
        match kind.as_str() {
            "POINT" => match nested {
                Nested::List(mut items) if items.len() == 1 => point(items.remove(0)).map(Geometry::Point),
                _ => Err("POINT expects a single coordinate".to_string()),
            },
            "POLYGON" => polygon(nested).map(Geometry::Polygon),
            "MULTIPOLYGON" => match nested {
                Nested::List(items) => items.into_iter().map(polygon).collect::<Result<_, _>>().map(Geometry::MultiPolygon),
                Nested::Coordinates(_) => Err("MULTIPOLYGON expects polygons".to_string()),
            },
            other => Err(format!("unsupported WKT geometry type: {other}")),
        }
    }

    fn from_geojson(kind: &str, coordinates: &Value) -> Result<Self, String> {
        let position = |value: &Value| -> Result<[f64; 2], String> {
            match value.as_array().map(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>()) {
                Some(Some(numbers)) if numbers.len() >= 2 => Ok([numbers[0], numbers[1]]),
                _ => Err(format!("invalid GeoJSON position: {value}")),
            }
        };
        let ring = |value: &Value| -> Result<Ring, String> {
            value
                .as_array()
                .ok_or_else(|| "GeoJSON ring must be an array".to_string())?
                .iter()
                .map(position)
                .collect()
        };
        let polygon = |value: &Value| -> Result<Polygon, String> {
            value
                .as_array()
                .ok_or_else(|| "GeoJSON polygon must be an array".to_string())?
                .iter()
                .map(ring)
                .collect()
        };
        match kind {
            "Point" => position(coordinates).map(Geometry::Point),
            "Polygon" => polygon(coordinates).map(Geometry::Polygon),
            "MultiPolygon" => coordinates
                .as_array()
                .ok_or_else(|| "GeoJSON multipolygon must be an array".to_string())?
                .iter()
                .map(polygon)
                .collect::<Result<_, _>>()
                .map(Geometry::MultiPolygon),
            other => Err(format!("unsupported GeoJSON geometry type: {other}")),
        }
    }

    fn polygons(&self) -> Vec<&Polygon> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::Polygon(polygon) => vec![polygon],
            Geometry::MultiPolygon(polygons) => polygons.iter().collect(),
        }
    }

    fn positions(&self) -> Vec<[f64; 2]> {
        match self {
            Geometry::Point(position) => vec![*position],
            _ => self.polygons().into_iter().flatten().flatten().copied().collect(),
        }
    }

    /// `[min_x, min_y, max_x, max_y]` of the whole geometry.
    pub fn bounds(&self) -> [f64; 4] {
        bounds_of(&self.positions())
    }

    /// Bounds of each polygon, largest area first.
    pub fn polygon_bounds_by_area(&self) -> Vec<[f64; 4]> {
        let mut polygons: Vec<(f64, [f64; 4])> = self
            .polygons()
            .into_iter()
            .map(|polygon| (polygon_area(polygon), bounds_of(&polygon.iter().flatten().copied().collect::<Vec<_>>())))
            .collect();
        if polygons.is_empty() {
            return vec![self.bounds()];
        }
        polygons.sort_by(|left, right| right.0.total_cmp(&left.0));
        polygons.into_iter().map(|(_, bounds)| bounds).collect()
    }

    /// WKT with coordinates rounded to four decimals and trailing zeros trimmed.
    pub fn to_wkt(&self) -> String {
        let wkt = match self {
            Geometry::Point([x, y]) => format!("POINT ({} {})", round(*x), round(*y)),
            Geometry::Polygon(polygon) => format!("POLYGON {}", polygon_wkt(polygon)),
            Geometry::MultiPolygon(polygons) => {
                let parts: Vec<String> = polygons.iter().map(|polygon| polygon_wkt(polygon)).collect();
                format!("MULTIPOLYGON ({})", parts.join(", "))
            }
        };
        if wkt.len() > WKT_MAX_LEN {
            tracing::debug!(length = wkt.len(), max = WKT_MAX_LEN, "geometry WKT exceeds recommended length");
        }
        wkt
    }

    pub fn to_geojson(&self) -> Value {
        match self {
            Geometry::Point(position) => json!({"type": "Point", "coordinates": position}),
            Geometry::Polygon(polygon) => json!({"type": "Polygon", "coordinates": polygon}),
            Geometry::MultiPolygon(polygons) => json!({"type": "MultiPolygon", "coordinates": polygons}),
        }
    }
}

fn parse_nested(characters: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Nested, String> {
    skip_whitespace(characters);
    if characters.peek() != Some(&'(') {
        let mut token = String::new();
        while let Some(&character) = characters.peek() {
            if character == ',' || character == ')' {
                break;
            }
            token.push(character);
            characters.next();
        }
        let numbers = token
            .split_whitespace()
            .map(|part| part.parse::<f64>().map_err(|_| format!("invalid coordinate '{part}'")))
            .collect::<Result<Vec<f64>, String>>()?;
        if numbers.len() < 2 {
            return Err(format!("coordinate needs at least two numbers: '{}'", token.trim()));
        }
        return Ok(Nested::Coordinates(numbers));
    }
    characters.next();
    let mut items = Vec::new();
    loop {
        items.push(parse_nested(characters)?);
        skip_whitespace(characters);
        match characters.next() {
            Some(',') => continue,
            Some(')') => break,
            other => return Err(format!("unexpected {other:?} in WKT")),
        }
    }
    Ok(Nested::List(items))
}

fn skip_whitespace(characters: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while characters.peek().is_some_and(|character| character.is_whitespace()) {
        characters.next();
    }
}

fn point(nested: Nested) -> Result<[f64; 2], String> {
    match nested {
        Nested::Coordinates(numbers) => Ok([numbers[0], numbers[1]]),
        Nested::List(_) => Err("expected a coordinate".to_string()),
    }
}

fn polygon(nested: Nested) -> Result<Polygon, String> {
    let Nested::List(rings) = nested else {
        return Err("POLYGON expects rings".to_string());
    };
    rings
        .into_iter()
        .map(|ring| match ring {
            Nested::List(points) => points.into_iter().map(point).collect(),
            Nested::Coordinates(_) => Err("ring expects coordinates".to_string()),
        })
        .collect()
}

fn bounds_of(positions: &[[f64; 2]]) -> [f64; 4] {
    positions.iter().fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |[min_x, min_y, max_x, max_y], [x, y]| [min_x.min(*x), min_y.min(*y), max_x.max(*x), max_y.max(*y)],
    )
}

fn ring_area(ring: &Ring) -> f64 {
    let twice_area: f64 = ring.windows(2).map(|pair| pair[0][0] * pair[1][1] - pair[1][0] * pair[0][1]).sum();
    (twice_area / 2.0).abs()
}

fn polygon_area(polygon: &Polygon) -> f64 {
    let mut rings = polygon.iter();
    let exterior = rings.next().map(ring_area).unwrap_or_default();
    exterior - rings.map(ring_area).sum::<f64>()
}

fn polygon_wkt(polygon: &Polygon) -> String {
    let rings: Vec<String> = polygon
        .iter()
        .map(|ring| {
            let points: Vec<String> = ring.iter().map(|[x, y]| format!("{} {}", round(*x), round(*y))).collect();
            format!("({})", points.join(", "))
        })
        .collect();
    format!("({})", rings.join(", "))
}

fn round(value: f64) -> String {
    let fixed = format!("{value:.prec$}", prec = COORDS_ROUNDING_PRECISION);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" { "0".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multipolygon_wkt_and_orders_bounds_by_area() {
        let geometry = Geometry::from_wkt("MULTIPOLYGON(((0 0, 1 0, 1 1, 0 1, 0 0)), ((10 10, 14 10, 14 14, 10 14, 10 10)))").expect("parse");
        assert_eq!(geometry.bounds(), [0.0, 0.0, 14.0, 14.0]);
        assert_eq!(geometry.polygon_bounds_by_area(), vec![[10.0, 10.0, 14.0, 14.0], [0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn reads_geojson_and_lonlat_boxes() {
        let geojson = json!({"type": "Point", "coordinates": [1.5, 43.25]});
        assert_eq!(Geometry::from_value(&geojson).expect("point"), Geometry::Point([1.5, 43.25]));
        let bbox = json!({"lonmin": 1, "latmin": 43, "lonmax": 2, "latmax": 44});
        assert_eq!(Geometry::from_value(&bbox).expect("box").bounds(), [1.0, 43.0, 2.0, 44.0]);
    }

    #[test]
    fn wkt_round_trips_through_geojson_shape() {
        let geometry = Geometry::from_wkt("POINT (1.00004 -0.00001)").expect("point");
        assert_eq!(geometry.to_wkt(), "POINT (1 0)");
        assert_eq!(geometry.to_geojson()["type"], "Point");
    }

    #[test]
    fn rejects_malformed_wkt() {
        assert!(Geometry::from_wkt("POLYGON((0 0, 1 0").is_err());
        assert!(Geometry::from_wkt("LINESTRING(0 0, 1 1)").is_err());
        assert!(Geometry::from_wkt("Sentinel-2").is_err());
    }
}
