//! GeoPackage binary geometry codec.
//!
//! A stored geometry is a fixed header (magic, version, flags, SRS id,
//! optional envelope) followed by a standard well-known-binary payload. The
//! header's byte order is carried in its flags byte; the WKB payload's byte
//! order is carried in the payload's own first byte. The two are encoded
//! independently and must be decoded independently.

use crate::envelope::{Envelope, EnvelopeContents};
use crate::result::{Error, Result};
use crate::types::{
    Coord, Dimensions, Geom, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Magic bytes 'G', 'P'
const MAGIC: [u8; 2] = [0x47, 0x50];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// The parsed or to-be-written fixed-size prefix of a stored geometry
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryHeader {
    pub version: u8,
    pub endianness: Endianness,
    pub srs_id: i32,
    pub contents: EnvelopeContents,
    pub empty: bool,
    pub envelope: Envelope,
}

impl BinaryHeader {
    /// Header length in bytes, envelope included
    pub fn byte_size(&self) -> usize {
        8 + 8 * self.contents.array_size()
    }
}

/// A decoded geometry value together with its header
#[derive(Debug, Clone, PartialEq)]
pub struct GpkgGeometry {
    pub header: BinaryHeader,
    pub geometry: Geom,
}

// https://www.geopackage.org/spec/#flags_layout
struct HeaderFlags {
    extended: bool,
    empty: bool,
    little_endian: bool,
    envelope: EnvelopeContents,
}

impl HeaderFlags {
    fn from_byte(byte: u8) -> Result<Self> {
        Ok(HeaderFlags {
            extended: (byte >> 5) & 1 > 0,
            empty: (byte >> 4) & 1 > 0,
            little_endian: byte & 1 > 0,
            envelope: EnvelopeContents::from_code((byte >> 1) & 0b111)?,
        })
    }

    fn to_byte(&self) -> u8 {
        let mut flags = 0u8;
        flags |= (self.extended as u8) << 5;
        flags |= (self.empty as u8) << 4;
        flags |= self.envelope.code() << 1;
        flags |= self.little_endian as u8;
        flags
    }
}

/// Write-side configuration for the codec. The byte order and version are
/// explicit here rather than crate-wide constants; decoding accepts either
/// byte order regardless of this configuration.
#[derive(Debug, Clone, Copy)]
pub struct GeometryCodec {
    pub version: u8,
    pub endianness: Endianness,
}

impl Default for GeometryCodec {
    /// Version 0 ("version 1" in the specification's counting) and network
    /// byte order
    fn default() -> Self {
        GeometryCodec {
            version: 0,
            endianness: Endianness::Big,
        }
    }
}

impl GeometryCodec {
    pub fn new(version: u8, endianness: Endianness) -> Self {
        GeometryCodec {
            version,
            endianness,
        }
    }

    /// Encode a geometry as header + WKB. Empty geometries are written with
    /// envelope contents code 0 regardless of their dimensionality, with
    /// the empty flag set.
    pub fn encode(&self, geometry: &Geom, srs_id: i32) -> Result<Vec<u8>> {
        let empty = geometry.is_empty();
        let contents = if empty {
            EnvelopeContents::None
        } else {
            EnvelopeContents::for_dimensions(geometry.dimensions())
        };
        let envelope = geometry.envelope();

        let flags = HeaderFlags {
            extended: false,
            empty,
            little_endian: self.endianness == Endianness::Little,
            envelope: contents,
        };

        let mut bytes = Vec::with_capacity(8 + 8 * contents.array_size());
        bytes.extend_from_slice(&MAGIC);
        bytes.push(self.version);
        bytes.push(flags.to_byte());

        match self.endianness {
            Endianness::Big => {
                bytes.write_i32::<BigEndian>(srs_id)?;
                for bound in envelope.to_array(contents) {
                    bytes.write_f64::<BigEndian>(bound)?;
                }
                write_geometry::<BigEndian>(&mut bytes, geometry, 0)?;
            }
            Endianness::Little => {
                bytes.write_i32::<LittleEndian>(srs_id)?;
                for bound in envelope.to_array(contents) {
                    bytes.write_f64::<LittleEndian>(bound)?;
                }
                write_geometry::<LittleEndian>(&mut bytes, geometry, 1)?;
            }
        }

        Ok(bytes)
    }

    /// Decode a stored geometry, honoring the header byte-order flag for
    /// every multi-byte header field and the WKB payload's own byte-order
    /// byte for the payload
    pub fn decode(bytes: &[u8]) -> Result<GpkgGeometry> {
        if bytes.len() < 8 {
            return Err(Error::Format(format!(
                "geometry binary must be at least 8 bytes, got {}",
                bytes.len()
            )));
        }

        if bytes[0..2] != MAGIC {
            return Err(Error::Format(
                "geometry binary must begin with the bytes 'G', 'P'".to_owned(),
            ));
        }

        let version = bytes[2];
        let flags = HeaderFlags::from_byte(bytes[3])?;

        if flags.extended {
            return Err(Error::Format(
                "extended geometry binary encoding is not supported".to_owned(),
            ));
        }

        let endianness = if flags.little_endian {
            Endianness::Little
        } else {
            Endianness::Big
        };

        let mut srs_bytes = [0u8; 4];
        srs_bytes.copy_from_slice(&bytes[4..8]);
        let srs_id = match endianness {
            Endianness::Big => i32::from_be_bytes(srs_bytes),
            Endianness::Little => i32::from_le_bytes(srs_bytes),
        };

        let double_count = flags.envelope.array_size();
        let header_size = 8 + 8 * double_count;
        if bytes.len() < header_size {
            return Err(Error::Format(format!(
                "geometry binary is shorter than its envelope contents indicator requires \
                 ({} < {})",
                bytes.len(),
                header_size
            )));
        }

        let mut doubles = Vec::with_capacity(double_count);
        let mut cursor = Cursor::new(&bytes[8..header_size]);
        for _ in 0..double_count {
            doubles.push(match endianness {
                Endianness::Big => cursor.read_f64::<BigEndian>()?,
                Endianness::Little => cursor.read_f64::<LittleEndian>()?,
            });
        }
        let envelope = Envelope::from_array(flags.envelope, &doubles)?;

        let geometry = read_geometry(&mut Cursor::new(&bytes[header_size..]))?;

        Ok(GpkgGeometry {
            header: BinaryHeader {
                version,
                endianness,
                srs_id,
                contents: flags.envelope,
                empty: flags.empty,
                envelope,
            },
            geometry,
        })
    }
}

fn write_coord<B: ByteOrder>(w: &mut impl Write, coord: &Coord) -> Result<()> {
    w.write_f64::<B>(coord.x)?;
    w.write_f64::<B>(coord.y)?;
    if let Some(z) = coord.z {
        w.write_f64::<B>(z)?;
    }
    if let Some(m) = coord.m {
        w.write_f64::<B>(m)?;
    }
    Ok(())
}

fn write_coord_sequence<B: ByteOrder>(w: &mut impl Write, coords: &[Coord]) -> Result<()> {
    w.write_u32::<B>(coords.len() as u32)?;
    for coord in coords {
        write_coord::<B>(w, coord)?;
    }
    Ok(())
}

fn write_rings<B: ByteOrder>(w: &mut impl Write, rings: &[Vec<Coord>]) -> Result<()> {
    w.write_u32::<B>(rings.len() as u32)?;
    for ring in rings {
        write_coord_sequence::<B>(w, ring)?;
    }
    Ok(())
}

// Every geometry, nested members of multi-geometries included, is written
// as a complete WKB value: byte-order byte, type code, body
fn write_geometry<B: ByteOrder>(w: &mut impl Write, geometry: &Geom, order_byte: u8) -> Result<()> {
    w.write_u8(order_byte)?;
    w.write_u32::<B>(geometry.wkb_code())?;

    match geometry {
        Geom::Point(point) => write_coord::<B>(w, &point.coord),
        Geom::LineString(line_string) => write_coord_sequence::<B>(w, &line_string.coords),
        Geom::Polygon(polygon) => write_rings::<B>(w, &polygon.rings),
        Geom::MultiPoint(multi_point) => {
            w.write_u32::<B>(multi_point.points.len() as u32)?;
            for point in &multi_point.points {
                w.write_u8(order_byte)?;
                w.write_u32::<B>(1 + point.coord.dimensions().wkb_code_offset())?;
                write_coord::<B>(w, &point.coord)?;
            }
            Ok(())
        }
        Geom::MultiLineString(multi_line_string) => {
            w.write_u32::<B>(multi_line_string.line_strings.len() as u32)?;
            for line_string in &multi_line_string.line_strings {
                w.write_u8(order_byte)?;
                w.write_u32::<B>(2 + line_string.dimensions.wkb_code_offset())?;
                write_coord_sequence::<B>(w, &line_string.coords)?;
            }
            Ok(())
        }
        Geom::MultiPolygon(multi_polygon) => {
            w.write_u32::<B>(multi_polygon.polygons.len() as u32)?;
            for polygon in &multi_polygon.polygons {
                w.write_u8(order_byte)?;
                w.write_u32::<B>(3 + polygon.dimensions.wkb_code_offset())?;
                write_rings::<B>(w, &polygon.rings)?;
            }
            Ok(())
        }
        Geom::GeometryCollection(collection) => {
            w.write_u32::<B>(collection.geometries.len() as u32)?;
            for member in &collection.geometries {
                write_geometry::<B>(w, member, order_byte)?;
            }
            Ok(())
        }
    }
}

fn read_coord<B: ByteOrder, R: Read>(r: &mut R, dimensions: Dimensions) -> Result<Coord> {
    let x = r.read_f64::<B>()?;
    let y = r.read_f64::<B>()?;
    let z = if dimensions.has_z() {
        Some(r.read_f64::<B>()?)
    } else {
        None
    };
    let m = if dimensions.has_m() {
        Some(r.read_f64::<B>()?)
    } else {
        None
    };
    Ok(Coord { x, y, z, m })
}

fn read_coord_sequence<B: ByteOrder, R: Read>(
    r: &mut R,
    dimensions: Dimensions,
) -> Result<Vec<Coord>> {
    let count = r.read_u32::<B>()?;
    let mut coords = Vec::with_capacity(count as usize);
    for _ in 0..count {
        coords.push(read_coord::<B, _>(r, dimensions)?);
    }
    Ok(coords)
}

fn dimensions_from_code(code: u32) -> Result<Dimensions> {
    match code / 1000 {
        0 => Ok(Dimensions::Xy),
        1 => Ok(Dimensions::Xyz),
        2 => Ok(Dimensions::Xym),
        3 => Ok(Dimensions::Xyzm),
        _ => Err(Error::UnsupportedGeometryType(code)),
    }
}

/// Read one complete WKB geometry, dispatching on its own byte-order byte
pub(crate) fn read_geometry(r: &mut impl Read) -> Result<Geom> {
    match r.read_u8()? {
        0 => read_geometry_body::<BigEndian>(r),
        1 => read_geometry_body::<LittleEndian>(r),
        other => Err(Error::Format(format!(
            "invalid WKB byte order marker {}",
            other
        ))),
    }
}

fn read_geometry_body<B: ByteOrder>(r: &mut impl Read) -> Result<Geom> {
    let code = r.read_u32::<B>()?;
    let dimensions = dimensions_from_code(code)?;

    match code % 1000 {
        1 => Ok(Geom::Point(Point::new(read_coord::<B, _>(r, dimensions)?))),
        2 => Ok(Geom::LineString(LineString::new(
            dimensions,
            read_coord_sequence::<B, _>(r, dimensions)?,
        ))),
        3 => {
            let ring_count = r.read_u32::<B>()?;
            let mut rings = Vec::with_capacity(ring_count as usize);
            for _ in 0..ring_count {
                rings.push(read_coord_sequence::<B, _>(r, dimensions)?);
            }
            Ok(Geom::Polygon(Polygon::new(dimensions, rings)))
        }
        4 => {
            let count = r.read_u32::<B>()?;
            let mut points = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match read_geometry(r)? {
                    Geom::Point(point) => points.push(point),
                    other => {
                        return Err(Error::Format(format!(
                            "multipoint member must be a point, found {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Geom::MultiPoint(MultiPoint { dimensions, points }))
        }
        5 => {
            let count = r.read_u32::<B>()?;
            let mut line_strings = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match read_geometry(r)? {
                    Geom::LineString(line_string) => line_strings.push(line_string),
                    other => {
                        return Err(Error::Format(format!(
                            "multilinestring member must be a linestring, found {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Geom::MultiLineString(MultiLineString {
                dimensions,
                line_strings,
            }))
        }
        6 => {
            let count = r.read_u32::<B>()?;
            let mut polygons = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match read_geometry(r)? {
                    Geom::Polygon(polygon) => polygons.push(polygon),
                    other => {
                        return Err(Error::Format(format!(
                            "multipolygon member must be a polygon, found {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Geom::MultiPolygon(MultiPolygon {
                dimensions,
                polygons,
            }))
        }
        7 => {
            let count = r.read_u32::<B>()?;
            let mut geometries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                geometries.push(read_geometry(r)?);
            }
            Ok(Geom::GeometryCollection(GeometryCollection {
                dimensions,
                geometries,
            }))
        }
        _ => Err(Error::UnsupportedGeometryType(code)),
    }
}
