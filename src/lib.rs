//! A library for working with GeoPackages: SQLite-based containers for
//! geospatial features and tiles, extended here with routable network
//! tables and shortest-path search over them.
//!
//! A [GeoPackage] is created with the mandatory catalog tables and
//! spatial reference systems in place; user tables (features, tiles,
//! networks) are registered through it and geometry values are stored as
//! BLOBs encoded by [gpkg_wkb::GeometryCodec].

mod catalog;
pub mod contents;
pub mod envelope;
pub mod features;
pub mod gpkg_wkb;
pub mod network;
pub mod result;
pub mod routing;
mod sql;
pub mod srs;
pub mod types;

pub use crate::contents::{BoundingBox, Content};
pub use crate::gpkg_wkb::{GeometryCodec, GpkgGeometry};
pub use crate::network::Network;
pub use crate::result::{Error, Result};
pub use crate::routing::Route;
pub use crate::srs::SpatialRefSys;
pub use crate::types::Geom;

use rusqlite::{Connection, DatabaseName, OpenFlags};
use std::path::Path;
use tracing::info;

/// Application id stored at byte offset 68 of the SQLite file
pub const APPLICATION_ID: i32 = 0x4750_3130;

/// An open GeoPackage. Creation lays down the tables the specification
/// requires; opening validates what is already there.
pub struct GeoPackage {
    /// The underlying rusqlite connection for the GeoPackage
    ///
    /// Access is provided to allow a user to do what is necessary for
    /// their specific use case, but extra care should be taken if using
    /// this for write operations, since the integrity of the GeoPackage
    /// could be compromised.
    pub conn: Connection,
}

impl GeoPackage {
    /// Create an empty GeoPackage with the catalog tables
    /// (`gpkg_spatial_ref_sys`, `gpkg_contents`, `gpkg_geometry_columns`,
    /// `gpkg_tile_matrix_set`, `gpkg_tile_matrix`) and the three mandatory
    /// spatial reference systems. Refuses a path that already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<GeoPackage> {
        let path = path.as_ref();

        if path.exists() {
            return Err(Error::CreateExisting);
        }

        let mut conn = Connection::open(path)?;
        conn.pragma_update(Some(DatabaseName::Main), "application_id", APPLICATION_ID)?;

        let tx = conn.transaction().map_err(Error::Transaction)?;
        catalog::ensure_core_tables(&tx)?;
        tx.commit().map_err(Error::Transaction)?;

        info!(path = %path.display(), "created geopackage");
        Ok(GeoPackage { conn })
    }

    /// Open an existing GeoPackage, validating the application id, the
    /// database integrity, and foreign key consistency before returning
    pub fn open<P: AsRef<Path>>(path: P) -> Result<GeoPackage> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;

        let application_id: i32 =
            conn.query_row("SELECT * FROM pragma_application_id()", [], |row| {
                row.get(0)
            })?;
        if application_id != APPLICATION_ID {
            return Err(Error::OpenValidation(format!(
                "application id {:#010x} does not identify a GeoPackage",
                application_id
            )));
        }

        let integrity_check: String =
            conn.query_row("SELECT * FROM pragma_integrity_check()", [], |row| {
                row.get(0)
            })?;
        if integrity_check != "ok" {
            return Err(Error::OpenValidation(format!(
                "integrity check failed: {}",
                integrity_check
            )));
        }

        // use a block to force a drop of stmt and release the borrow
        // so that we can move conn
        {
            let mut stmt = conn.prepare("SELECT * FROM pragma_foreign_key_check()")?;
            let mut rows = stmt.query([])?;
            if rows.next()?.is_some() {
                return Err(Error::OpenValidation(
                    "foreign key violations are present".to_owned(),
                ));
            }
        }

        Ok(GeoPackage { conn })
    }

    /// Close the GeoPackage
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_conn, err)| Error::Storage(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contents::FEATURES_DATA_TYPE;
    use crate::features::GeometryColumn;
    use crate::types::{Coord, Dimensions, Point};
    use tempfile::tempdir;

    #[test]
    fn create_close_open_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("round_trip.gpkg");

        let gp = GeoPackage::create(&path).unwrap();
        gp.close().unwrap();

        let gp = GeoPackage::open(&path).unwrap();
        assert!(gp.spatial_ref_sys(1).unwrap().is_some());
        assert!(gp
            .contents_by_type(FEATURES_DATA_TYPE, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn create_refuses_an_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exists.gpkg");

        GeoPackage::create(&path).unwrap().close().unwrap();
        assert!(matches!(
            GeoPackage::create(&path),
            Err(Error::CreateExisting)
        ));
    }

    #[test]
    fn open_rejects_a_plain_sqlite_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.sqlite");

        let conn = Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.close().unwrap();

        assert!(matches!(
            GeoPackage::open(&path),
            Err(Error::OpenValidation(_))
        ));
    }

    #[test]
    fn features_survive_close_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persisted.gpkg");

        let mut gp = GeoPackage::create(&path).unwrap();
        let srs = gp.spatial_ref_sys(1).unwrap().unwrap();
        gp.add_feature_table(
            "landmarks",
            &GeometryColumn {
                column_name: "geom".to_owned(),
                geometry_type_name: "POINT".to_owned(),
                dimensions: Dimensions::Xy,
            },
            &[],
            Some("landmarks"),
            "",
            &BoundingBox::default(),
            &srs,
        )
        .unwrap();

        let point = Geom::Point(Point::new(Coord::xy(-105.0, 40.0)));
        gp.insert_feature("landmarks", &point, &GeometryCodec::default())
            .unwrap();
        gp.close().unwrap();

        let gp = GeoPackage::open(&path).unwrap();
        let features = gp.feature_geometries("landmarks").unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].1.geometry, point);

        let content = gp.content("landmarks").unwrap().unwrap();
        assert_eq!(content.data_type, FEATURES_DATA_TYPE);
    }
}
