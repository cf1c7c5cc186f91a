use crate::envelope::Envelope;
use crate::result::{Error, Result};

/// Dimensionality of a geometry's coordinates.
///
/// Selects the WKB geometry type code offset and the envelope contents
/// indicator used in the GeoPackage binary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensions {
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl Dimensions {
    pub fn has_z(self) -> bool {
        matches!(self, Dimensions::Xyz | Dimensions::Xyzm)
    }

    pub fn has_m(self) -> bool {
        matches!(self, Dimensions::Xym | Dimensions::Xyzm)
    }

    /// Offset added to the base WKB geometry type code (1000 for Z, 2000
    /// for M, 3000 for ZM)
    pub fn wkb_code_offset(self) -> u32 {
        match self {
            Dimensions::Xy => 0,
            Dimensions::Xyz => 1000,
            Dimensions::Xym => 2000,
            Dimensions::Xyzm => 3000,
        }
    }
}

/// A single position. `z` and `m` are present according to the owning
/// geometry's [Dimensions].
#[derive(Debug, Clone, Copy)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

// NaN ordinates mean "empty", so equality must treat NaN as equal to
// itself or empty coordinates would never compare equal
impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        fn ordinate_eq(first: f64, second: f64) -> bool {
            first == second || (first.is_nan() && second.is_nan())
        }

        fn optional_eq(first: Option<f64>, second: Option<f64>) -> bool {
            match (first, second) {
                (Some(a), Some(b)) => ordinate_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }

        ordinate_eq(self.x, other.x)
            && ordinate_eq(self.y, other.y)
            && optional_eq(self.z, other.z)
            && optional_eq(self.m, other.m)
    }
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Coord {
            x,
            y,
            z: None,
            m: None,
        }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Coord {
            x,
            y,
            z: Some(z),
            m: None,
        }
    }

    pub fn xym(x: f64, y: f64, m: f64) -> Self {
        Coord {
            x,
            y,
            z: None,
            m: Some(m),
        }
    }

    pub fn xyzm(x: f64, y: f64, z: f64, m: f64) -> Self {
        Coord {
            x,
            y,
            z: Some(z),
            m: Some(m),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        match (self.z.is_some(), self.m.is_some()) {
            (false, false) => Dimensions::Xy,
            (true, false) => Dimensions::Xyz,
            (false, true) => Dimensions::Xym,
            (true, true) => Dimensions::Xyzm,
        }
    }

    /// A coordinate is empty when every ordinate it carries is NaN
    pub fn is_empty(&self) -> bool {
        self.x.is_nan()
            && self.y.is_nan()
            && self.z.map_or(true, f64::is_nan)
            && self.m.map_or(true, f64::is_nan)
    }

    /// The all-NaN coordinate of the given dimensionality
    pub fn empty(dimensions: Dimensions) -> Self {
        Coord {
            x: f64::NAN,
            y: f64::NAN,
            z: dimensions.has_z().then(|| f64::NAN),
            m: dimensions.has_m().then(|| f64::NAN),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub coord: Coord,
}

impl Point {
    pub fn new(coord: Coord) -> Self {
        Point { coord }
    }

    pub fn empty(dimensions: Dimensions) -> Self {
        Point {
            coord: Coord::empty(dimensions),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineString {
    pub dimensions: Dimensions,
    pub coords: Vec<Coord>,
}

impl LineString {
    pub fn new(dimensions: Dimensions, coords: Vec<Coord>) -> Self {
        LineString { dimensions, coords }
    }
}

/// Rings are closed coordinate sequences; the first is the exterior
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub dimensions: Dimensions,
    pub rings: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(dimensions: Dimensions, rings: Vec<Vec<Coord>>) -> Self {
        Polygon { dimensions, rings }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiPoint {
    pub dimensions: Dimensions,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiLineString {
    pub dimensions: Dimensions,
    pub line_strings: Vec<LineString>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon {
    pub dimensions: Dimensions,
    pub polygons: Vec<Polygon>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryCollection {
    pub dimensions: Dimensions,
    pub geometries: Vec<Geom>,
}

/// Closed set of geometry types storable in a GeoPackage feature table.
///
/// Dispatch on the variant tag replaces the per-type class hierarchy the
/// format is usually modeled with, while keeping exhaustive-match safety.
#[derive(Debug, Clone, PartialEq)]
pub enum Geom {
    Point(Point),
    LineString(LineString),
    Polygon(Polygon),
    MultiPoint(MultiPoint),
    MultiLineString(MultiLineString),
    MultiPolygon(MultiPolygon),
    GeometryCollection(GeometryCollection),
}

impl Geom {
    pub fn dimensions(&self) -> Dimensions {
        match self {
            Geom::Point(g) => g.coord.dimensions(),
            Geom::LineString(g) => g.dimensions,
            Geom::Polygon(g) => g.dimensions,
            Geom::MultiPoint(g) => g.dimensions,
            Geom::MultiLineString(g) => g.dimensions,
            Geom::MultiPolygon(g) => g.dimensions,
            Geom::GeometryCollection(g) => g.dimensions,
        }
    }

    /// Base WKB geometry type code, before the dimensionality offset
    fn base_code(&self) -> u32 {
        match self {
            Geom::Point(_) => 1,
            Geom::LineString(_) => 2,
            Geom::Polygon(_) => 3,
            Geom::MultiPoint(_) => 4,
            Geom::MultiLineString(_) => 5,
            Geom::MultiPolygon(_) => 6,
            Geom::GeometryCollection(_) => 7,
        }
    }

    pub fn wkb_code(&self) -> u32 {
        self.base_code() + self.dimensions().wkb_code_offset()
    }

    /// Geometry type name as stored in `gpkg_geometry_columns`
    pub fn type_name(&self) -> &'static str {
        match self {
            Geom::Point(_) => "POINT",
            Geom::LineString(_) => "LINESTRING",
            Geom::Polygon(_) => "POLYGON",
            Geom::MultiPoint(_) => "MULTIPOINT",
            Geom::MultiLineString(_) => "MULTILINESTRING",
            Geom::MultiPolygon(_) => "MULTIPOLYGON",
            Geom::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geom::Point(g) => g.coord.is_empty(),
            Geom::LineString(g) => g.coords.is_empty(),
            Geom::Polygon(g) => g.rings.is_empty(),
            Geom::MultiPoint(g) => g.points.is_empty(),
            Geom::MultiLineString(g) => g.line_strings.is_empty(),
            Geom::MultiPolygon(g) => g.polygons.is_empty(),
            Geom::GeometryCollection(g) => g.geometries.is_empty(),
        }
    }

    /// Axis-aligned extent of the geometry. Empty geometries produce the
    /// empty (all-NaN) envelope.
    pub fn envelope(&self) -> Envelope {
        let mut envelope = Envelope::EMPTY;
        self.expand(&mut envelope);
        envelope
    }

    fn expand(&self, envelope: &mut Envelope) {
        match self {
            Geom::Point(g) => {
                if !g.coord.is_empty() {
                    envelope.expand(&g.coord);
                }
            }
            Geom::LineString(g) => {
                for coord in &g.coords {
                    envelope.expand(coord);
                }
            }
            Geom::Polygon(g) => {
                for ring in &g.rings {
                    for coord in ring {
                        envelope.expand(coord);
                    }
                }
            }
            Geom::MultiPoint(g) => {
                for point in &g.points {
                    if !point.coord.is_empty() {
                        envelope.expand(&point.coord);
                    }
                }
            }
            Geom::MultiLineString(g) => {
                for line_string in &g.line_strings {
                    for coord in &line_string.coords {
                        envelope.expand(coord);
                    }
                }
            }
            Geom::MultiPolygon(g) => {
                for polygon in &g.polygons {
                    for ring in &polygon.rings {
                        for coord in ring {
                            envelope.expand(coord);
                        }
                    }
                }
            }
            Geom::GeometryCollection(g) => {
                for geometry in &g.geometries {
                    geometry.expand(envelope);
                }
            }
        }
    }
}

// Conversions to and from the geo-types XY model. The crate's own enum is
// the storage representation; these keep the public API usable with the
// wider geo ecosystem.

impl From<geo_types::Coordinate<f64>> for Coord {
    fn from(coord: geo_types::Coordinate<f64>) -> Self {
        Coord::xy(coord.x, coord.y)
    }
}

impl From<geo_types::Point<f64>> for Geom {
    fn from(point: geo_types::Point<f64>) -> Self {
        Geom::Point(Point::new(Coord::xy(point.x(), point.y())))
    }
}

impl From<geo_types::LineString<f64>> for Geom {
    fn from(line_string: geo_types::LineString<f64>) -> Self {
        Geom::LineString(LineString::new(
            Dimensions::Xy,
            line_string.0.into_iter().map(Coord::from).collect(),
        ))
    }
}

fn ring_coords(ring: &geo_types::LineString<f64>) -> Vec<Coord> {
    ring.0.iter().copied().map(Coord::from).collect()
}

impl From<geo_types::Polygon<f64>> for Geom {
    fn from(polygon: geo_types::Polygon<f64>) -> Self {
        let mut rings = vec![ring_coords(polygon.exterior())];
        rings.extend(polygon.interiors().iter().map(ring_coords));
        Geom::Polygon(Polygon::new(Dimensions::Xy, rings))
    }
}

impl From<geo_types::MultiPoint<f64>> for Geom {
    fn from(multi_point: geo_types::MultiPoint<f64>) -> Self {
        Geom::MultiPoint(MultiPoint {
            dimensions: Dimensions::Xy,
            points: multi_point
                .0
                .into_iter()
                .map(|p| Point::new(Coord::xy(p.x(), p.y())))
                .collect(),
        })
    }
}

impl From<geo_types::MultiLineString<f64>> for Geom {
    fn from(multi_line_string: geo_types::MultiLineString<f64>) -> Self {
        Geom::MultiLineString(MultiLineString {
            dimensions: Dimensions::Xy,
            line_strings: multi_line_string
                .0
                .into_iter()
                .map(|ls| match Geom::from(ls) {
                    Geom::LineString(ls) => ls,
                    _ => unreachable!(),
                })
                .collect(),
        })
    }
}

impl From<geo_types::MultiPolygon<f64>> for Geom {
    fn from(multi_polygon: geo_types::MultiPolygon<f64>) -> Self {
        Geom::MultiPolygon(MultiPolygon {
            dimensions: Dimensions::Xy,
            polygons: multi_polygon
                .0
                .into_iter()
                .map(|p| match Geom::from(p) {
                    Geom::Polygon(p) => p,
                    _ => unreachable!(),
                })
                .collect(),
        })
    }
}

impl TryFrom<&Geom> for geo_types::Geometry<f64> {
    type Error = Error;

    fn try_from(geom: &Geom) -> Result<Self> {
        if geom.dimensions() != Dimensions::Xy {
            return Err(Error::Format(
                "geometries with Z or M ordinates have no geo-types equivalent".to_owned(),
            ));
        }

        fn line_string(ls: &LineString) -> geo_types::LineString<f64> {
            geo_types::LineString::new(
                ls.coords
                    .iter()
                    .map(|c| geo_types::Coordinate { x: c.x, y: c.y })
                    .collect(),
            )
        }

        fn polygon(p: &Polygon) -> geo_types::Polygon<f64> {
            let mut rings = p.rings.iter().map(|ring| {
                geo_types::LineString::new(
                    ring.iter()
                        .map(|c| geo_types::Coordinate { x: c.x, y: c.y })
                        .collect(),
                )
            });
            let exterior = rings.next().unwrap_or_else(|| geo_types::LineString::new(Vec::new()));
            geo_types::Polygon::new(exterior, rings.collect())
        }

        Ok(match geom {
            Geom::Point(g) => {
                geo_types::Geometry::Point(geo_types::Point::new(g.coord.x, g.coord.y))
            }
            Geom::LineString(g) => geo_types::Geometry::LineString(line_string(g)),
            Geom::Polygon(g) => geo_types::Geometry::Polygon(polygon(g)),
            Geom::MultiPoint(g) => geo_types::Geometry::MultiPoint(geo_types::MultiPoint::new(
                g.points
                    .iter()
                    .map(|p| geo_types::Point::new(p.coord.x, p.coord.y))
                    .collect(),
            )),
            Geom::MultiLineString(g) => geo_types::Geometry::MultiLineString(
                geo_types::MultiLineString::new(g.line_strings.iter().map(line_string).collect()),
            ),
            Geom::MultiPolygon(g) => geo_types::Geometry::MultiPolygon(
                geo_types::MultiPolygon::new(g.polygons.iter().map(polygon).collect()),
            ),
            Geom::GeometryCollection(_) => {
                return Err(Error::Format(
                    "geometry collections are not converted to geo-types".to_owned(),
                ))
            }
        })
    }
}
