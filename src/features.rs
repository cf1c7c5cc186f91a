//! Feature tables (vector geometries stored as BLOBs through the codec)
//! and tile pyramid metadata.

use crate::catalog::{register_or_validate, table_or_view_exists, within_transaction};
use crate::contents::{
    register_content_on, valid_identifier, validate_new_table_name, BoundingBox, Content,
    FEATURES_DATA_TYPE, TILES_DATA_TYPE,
};
use crate::gpkg_wkb::{GeometryCodec, GpkgGeometry};
use crate::result::{Error, Result};
use crate::sql::table_definitions::{create_feature_table_ddl, create_tile_table_ddl};
use crate::srs::SpatialRefSys;
use crate::types::{Dimensions, Geom};
use crate::GeoPackage;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

/// Declaration of a feature table's single geometry column
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryColumn {
    pub column_name: String,
    /// Uppercase geometry type name, e.g. "POINT", or "GEOMETRY" for a
    /// mixed-type column
    pub geometry_type_name: String,
    pub dimensions: Dimensions,
}

/// A row of `gpkg_tile_matrix`: the grid dimensions of one zoom level
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrix {
    pub table_name: String,
    pub zoom_level: i64,
    pub matrix_width: i64,
    pub matrix_height: i64,
    pub tile_width: i64,
    pub tile_height: i64,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
}

impl GeoPackage {
    /// Create a feature table together with its `gpkg_geometry_columns`
    /// and `gpkg_contents` rows, as one transaction
    pub fn add_feature_table(
        &mut self,
        table_name: &str,
        geometry_column: &GeometryColumn,
        columns: &[(&str, &str)],
        identifier: Option<&str>,
        description: &str,
        bounding_box: &BoundingBox,
        srs: &SpatialRefSys,
    ) -> Result<Content> {
        let srs_id = srs.srs_id;
        within_transaction(&mut self.conn, |tx| {
            validate_new_table_name(table_name)?;

            if !valid_identifier(&geometry_column.column_name) {
                return Err(Error::SchemaValidation(format!(
                    "geometry column name '{}' is not a valid identifier",
                    geometry_column.column_name
                )));
            }

            for (name, _) in columns {
                if !valid_identifier(name) {
                    return Err(Error::SchemaValidation(format!(
                        "column name '{}' is not a valid identifier",
                        name
                    )));
                }
            }

            if table_or_view_exists(tx, table_name)? {
                return Err(Error::SchemaValidation(format!(
                    "a table named '{}' already exists",
                    table_name
                )));
            }

            tx.execute(
                &create_feature_table_ddl(table_name, &geometry_column.column_name, columns),
                [],
            )?;

            tx.execute(
                "INSERT INTO gpkg_geometry_columns
                 (table_name, column_name, geometry_type_name, srs_id, z, m)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    table_name,
                    geometry_column.column_name,
                    geometry_column.geometry_type_name,
                    srs_id,
                    geometry_column.dimensions.has_z() as i64,
                    geometry_column.dimensions.has_m() as i64,
                ],
            )?;

            let content = register_content_on(
                tx,
                table_name,
                FEATURES_DATA_TYPE,
                identifier,
                description,
                bounding_box,
                Some(srs_id),
            )?;

            debug!(table_name, "created feature table");
            Ok(content)
        })
    }

    fn geometry_column_for(&self, table_name: &str) -> Result<(String, i64)> {
        self.conn
            .query_row(
                "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
                params![table_name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| {
                Error::SchemaValidation(format!(
                    "no geometry column is registered for table '{}'",
                    table_name
                ))
            })
    }

    /// Insert a geometry into a feature table, encoded with the supplied
    /// codec and the table's registered spatial reference system. Returns
    /// the new feature's identifier.
    pub fn insert_feature(
        &mut self,
        table_name: &str,
        geometry: &Geom,
        codec: &GeometryCodec,
    ) -> Result<i64> {
        let (column_name, srs_id) = self.geometry_column_for(table_name)?;
        let bytes = codec.encode(geometry, srs_id as i32)?;

        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES (?1)",
                table_name, column_name
            ),
            params![bytes],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// All geometries of a feature table, decoded, with their row ids
    pub fn feature_geometries(&self, table_name: &str) -> Result<Vec<(i64, GpkgGeometry)>> {
        let (column_name, _) = self.geometry_column_for(table_name)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, {} FROM {} ORDER BY id",
            column_name, table_name
        ))?;

        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((id, bytes))
        })?;

        let mut geometries = Vec::new();
        for row in rows {
            let (id, bytes) = row?;
            geometries.push((id, GeometryCodec::decode(&bytes)?));
        }
        Ok(geometries)
    }

    /// Create a tile pyramid table together with its `gpkg_tile_matrix_set`
    /// and `gpkg_contents` rows, as one transaction. The tile matrix set
    /// extent must be fully specified.
    pub fn add_tile_matrix_set(
        &mut self,
        table_name: &str,
        identifier: Option<&str>,
        description: &str,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        srs: &SpatialRefSys,
    ) -> Result<Content> {
        let srs_id = srs.srs_id;
        within_transaction(&mut self.conn, |tx| {
            validate_new_table_name(table_name)?;

            if table_or_view_exists(tx, table_name)? {
                return Err(Error::SchemaValidation(format!(
                    "a table named '{}' already exists",
                    table_name
                )));
            }

            tx.execute(&create_tile_table_ddl(table_name), [])?;

            tx.execute(
                "INSERT INTO gpkg_tile_matrix_set
                 (table_name, srs_id, min_x, min_y, max_x, max_y)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![table_name, srs_id, min_x, min_y, max_x, max_y],
            )?;

            let content = register_content_on(
                tx,
                table_name,
                TILES_DATA_TYPE,
                identifier,
                description,
                &BoundingBox::new(min_x, min_y, max_x, max_y),
                Some(srs_id),
            )?;

            debug!(table_name, "created tile matrix set");
            Ok(content)
        })
    }

    /// Register one zoom level of a tile pyramid. Re-adding an identical
    /// zoom level is a no-op; differing grid parameters for an existing
    /// zoom level are a conflict.
    pub fn add_tile_matrix(
        &mut self,
        table_name: &str,
        zoom_level: i64,
        matrix_width: i64,
        matrix_height: i64,
        tile_width: i64,
        tile_height: i64,
        pixel_x_size: f64,
        pixel_y_size: f64,
    ) -> Result<TileMatrix> {
        if zoom_level < 0 {
            return Err(Error::SchemaValidation(format!(
                "zoom level may not be negative, got {}",
                zoom_level
            )));
        }

        if matrix_width <= 0 || matrix_height <= 0 || tile_width <= 0 || tile_height <= 0 {
            return Err(Error::SchemaValidation(
                "tile matrix dimensions must be positive".to_owned(),
            ));
        }

        if pixel_x_size <= 0.0 || pixel_y_size <= 0.0 {
            return Err(Error::SchemaValidation(
                "tile matrix pixel sizes must be positive".to_owned(),
            ));
        }

        let matrix = TileMatrix {
            table_name: table_name.to_owned(),
            zoom_level,
            matrix_width,
            matrix_height,
            tile_width,
            tile_height,
            pixel_x_size,
            pixel_y_size,
        };

        within_transaction(&mut self.conn, |tx| {
            let set_exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM gpkg_tile_matrix_set WHERE table_name = ?1",
                params![table_name],
                |row| row.get(0),
            )?;
            if set_exists == 0 {
                return Err(Error::SchemaValidation(format!(
                    "no tile matrix set is registered for table '{}'",
                    table_name
                )));
            }

            let existing = tx
                .query_row(
                    "SELECT table_name, zoom_level, matrix_width, matrix_height,
                            tile_width, tile_height, pixel_x_size, pixel_y_size
                     FROM gpkg_tile_matrix WHERE table_name = ?1 AND zoom_level = ?2",
                    params![table_name, zoom_level],
                    |row| {
                        Ok(TileMatrix {
                            table_name: row.get(0)?,
                            zoom_level: row.get(1)?,
                            matrix_width: row.get(2)?,
                            matrix_height: row.get(3)?,
                            tile_width: row.get(4)?,
                            tile_height: row.get(5)?,
                            pixel_x_size: row.get(6)?,
                            pixel_y_size: row.get(7)?,
                        })
                    },
                )
                .optional()?;

            register_or_validate(
                existing,
                |found| *found == matrix,
                |_| {
                    Error::SchemaValidation(format!(
                        "tile matrix for '{}' zoom {} already exists with different grid \
                         parameters",
                        table_name, zoom_level
                    ))
                },
                || {
                    tx.execute(
                        "INSERT INTO gpkg_tile_matrix
                         (table_name, zoom_level, matrix_width, matrix_height,
                          tile_width, tile_height, pixel_x_size, pixel_y_size)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            table_name,
                            zoom_level,
                            matrix_width,
                            matrix_height,
                            tile_width,
                            tile_height,
                            pixel_x_size,
                            pixel_y_size,
                        ],
                    )?;
                    Ok(matrix.clone())
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coord, LineString, Point};
    use tempfile::tempdir;

    fn geopackage(name: &str) -> (tempfile::TempDir, GeoPackage) {
        let dir = tempdir().unwrap();
        let gp = GeoPackage::create(dir.path().join(name)).unwrap();
        (dir, gp)
    }

    fn point_column() -> GeometryColumn {
        GeometryColumn {
            column_name: "geom".to_owned(),
            geometry_type_name: "POINT".to_owned(),
            dimensions: Dimensions::Xy,
        }
    }

    #[test]
    fn feature_round_trip_through_storage() {
        let (_dir, mut gp) = geopackage("features.gpkg");
        let srs = gp.spatial_ref_sys(1).unwrap().unwrap();

        gp.add_feature_table(
            "landmarks",
            &point_column(),
            &[("name", "TEXT")],
            Some("landmarks"),
            "points of interest",
            &BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            &srs,
        )
        .unwrap();

        let codec = GeometryCodec::default();
        let point = Geom::Point(Point::new(Coord::xy(-105.0, 40.0)));
        let id = gp.insert_feature("landmarks", &point, &codec).unwrap();

        let features = gp.feature_geometries("landmarks").unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].0, id);
        assert_eq!(features[0].1.geometry, point);
        assert_eq!(features[0].1.header.srs_id, 1);
    }

    #[test]
    fn z_line_string_features_keep_their_dimensions() {
        let (_dir, mut gp) = geopackage("features_z.gpkg");
        let srs = gp.spatial_ref_sys(1).unwrap().unwrap();

        gp.add_feature_table(
            "trails",
            &GeometryColumn {
                column_name: "path".to_owned(),
                geometry_type_name: "LINESTRING".to_owned(),
                dimensions: Dimensions::Xyz,
            },
            &[],
            None,
            "",
            &BoundingBox::default(),
            &srs,
        )
        .unwrap();

        let trail = Geom::LineString(LineString::new(
            crate::types::Dimensions::Xyz,
            vec![
                Coord::xyz(-105.0, 40.0, 5280.0),
                Coord::xyz(-106.0, 41.0, 6000.0),
            ],
        ));
        gp.insert_feature("trails", &trail, &GeometryCodec::default())
            .unwrap();

        let features = gp.feature_geometries("trails").unwrap();
        assert_eq!(features[0].1.geometry, trail);
    }

    #[test]
    fn insert_into_unregistered_table_fails() {
        let (_dir, mut gp) = geopackage("unregistered.gpkg");
        let point = Geom::Point(Point::new(Coord::xy(0.0, 0.0)));
        let result = gp.insert_feature("nowhere", &point, &GeometryCodec::default());
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn tile_matrix_requires_its_set() {
        let (_dir, mut gp) = geopackage("tiles_no_set.gpkg");
        let result = gp.add_tile_matrix("no_set", 0, 1, 1, 256, 256, 1.0, 1.0);
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn tile_matrix_lifecycle() {
        let (_dir, mut gp) = geopackage("tiles.gpkg");
        let srs = gp.spatial_ref_sys(1).unwrap().unwrap();

        gp.add_tile_matrix_set(
            "basemap",
            Some("basemap"),
            "",
            -180.0,
            -90.0,
            180.0,
            90.0,
            &srs,
        )
        .unwrap();

        let first = gp
            .add_tile_matrix("basemap", 0, 2, 1, 256, 256, 0.703125, 0.703125)
            .unwrap();
        let second = gp
            .add_tile_matrix("basemap", 0, 2, 1, 256, 256, 0.703125, 0.703125)
            .unwrap();
        assert_eq!(first, second);

        let conflict = gp.add_tile_matrix("basemap", 0, 4, 2, 256, 256, 0.3515625, 0.3515625);
        assert!(matches!(conflict, Err(Error::SchemaValidation(_))));

        assert!(matches!(
            gp.add_tile_matrix("basemap", 1, 0, 2, 256, 256, 0.35, 0.35),
            Err(Error::SchemaValidation(_))
        ));
        assert!(matches!(
            gp.add_tile_matrix("basemap", 1, 4, 2, 256, 256, -0.35, 0.35),
            Err(Error::SchemaValidation(_))
        ));
    }
}
