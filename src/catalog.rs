//! Core catalog tables: creation, mandatory SRS seeding, and spatial
//! reference system registration.

use crate::result::{Error, Result};
use crate::sql::table_definitions::*;
use crate::srs::{defaults, SpatialRefSys};
use crate::GeoPackage;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::debug;

pub(crate) fn table_or_view_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Register-or-validate primitive shared by SRS, content, and attribute
/// description registration: look up by natural key, return the existing
/// entity when every other field matches, error on a partial match,
/// insert when absent.
pub(crate) fn register_or_validate<T>(
    existing: Option<T>,
    matches: impl FnOnce(&T) -> bool,
    conflict: impl FnOnce(&T) -> Error,
    insert: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match existing {
        Some(entity) if matches(&entity) => Ok(entity),
        Some(entity) => Err(conflict(&entity)),
        None => insert(),
    }
}

/// Run a multi-step mutation as one transaction. The transaction rolls
/// back when the closure fails; storage errors that forced the rollback
/// are reported as [Error::Transaction], validation errors pass through.
pub(crate) fn within_transaction<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction().map_err(Error::Transaction)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit().map_err(Error::Transaction)?;
            Ok(value)
        }
        Err(Error::Storage(err)) => Err(Error::Transaction(err)),
        Err(other) => Err(other),
    }
}

/// Create the catalog tables if absent and seed the three mandatory
/// spatial reference systems. Safe to run against a database that already
/// has them; seeded rows are verified rather than duplicated.
pub(crate) fn ensure_core_tables(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_SPATIAL_REF_SYS_TABLE, [])?;
    conn.execute(CREATE_CONTENTS_TABLE, [])?;
    conn.execute(CREATE_GEOMETRY_COLUMNS_TABLE, [])?;
    conn.execute(CREATE_TILE_MATRIX_SET_TABLE, [])?;
    conn.execute(CREATE_TILE_MATRIX_TABLE, [])?;

    for srs in [
        defaults::wgs84(),
        defaults::cartesian(),
        defaults::geographic(),
    ] {
        add_srs_on(conn, &srs)?;
    }

    Ok(())
}

fn row_to_srs(row: &rusqlite::Row<'_>) -> rusqlite::Result<SpatialRefSys> {
    let name: String = row.get(0)?;
    let srs_id: i64 = row.get(1)?;
    let organization: String = row.get(2)?;
    let organization_coordsys_id: i64 = row.get(3)?;
    let definition: String = row.get(4)?;
    let description: Option<String> = row.get(5)?;
    Ok(SpatialRefSys::new(
        &name,
        srs_id,
        &organization,
        organization_coordsys_id,
        &definition,
        description.as_deref().unwrap_or(""),
    ))
}

pub(crate) fn srs_by_organization_on(
    conn: &Connection,
    organization: &str,
    organization_coordsys_id: i64,
) -> Result<Option<SpatialRefSys>> {
    conn.query_row(
        "SELECT srs_name, srs_id, organization, organization_coordsys_id, definition, description
         FROM gpkg_spatial_ref_sys
         WHERE organization = ?1 COLLATE NOCASE AND organization_coordsys_id = ?2",
        params![organization, organization_coordsys_id],
        row_to_srs,
    )
    .optional()
    .map_err(Error::from)
}

pub(crate) fn srs_on(conn: &Connection, srs_id: i64) -> Result<Option<SpatialRefSys>> {
    conn.query_row(
        "SELECT srs_name, srs_id, organization, organization_coordsys_id, definition, description
         FROM gpkg_spatial_ref_sys
         WHERE srs_id = ?1",
        params![srs_id],
        row_to_srs,
    )
    .optional()
    .map_err(Error::from)
}

pub(crate) fn add_srs_on(conn: &Connection, srs: &SpatialRefSys) -> Result<SpatialRefSys> {
    let existing = srs_by_organization_on(conn, &srs.organization, srs.organization_coordsys_id)?;

    register_or_validate(
        existing,
        |found| found.equivalent(srs),
        |_| {
            Error::SchemaValidation(format!(
                "a spatial reference system for {}:{} already exists with different fields",
                srs.organization, srs.organization_coordsys_id
            ))
        },
        || {
            conn.execute(
                "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    srs.name,
                    srs.srs_id,
                    srs.organization,
                    srs.organization_coordsys_id,
                    srs.definition,
                    srs.description,
                ],
            )?;
            debug!(srs_id = srs.srs_id, organization = %srs.organization, "registered spatial reference system");
            Ok(srs.clone())
        },
    )
}

impl GeoPackage {
    /// Register a spatial reference system, or return the already
    /// registered equivalent. A registration whose organization and
    /// organization-assigned id are taken by a different definition fails
    /// with [Error::SchemaValidation].
    pub fn add_spatial_ref_sys(&mut self, srs: &SpatialRefSys) -> Result<SpatialRefSys> {
        within_transaction(&mut self.conn, |tx| add_srs_on(tx, srs))
    }

    /// Look up a spatial reference system by its GeoPackage identifier
    pub fn spatial_ref_sys(&self, srs_id: i64) -> Result<Option<SpatialRefSys>> {
        srs_on(&self.conn, srs_id)
    }

    /// Look up a spatial reference system by its defining organization and
    /// the organization's numeric identifier. The organization compares
    /// case-insensitively.
    pub fn spatial_ref_sys_by_organization(
        &self,
        organization: &str,
        organization_coordsys_id: i64,
    ) -> Result<Option<SpatialRefSys>> {
        srs_by_organization_on(&self.conn, organization, organization_coordsys_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mandatory_srs_rows_are_seeded() {
        let dir = tempdir().unwrap();
        let gp = GeoPackage::create(dir.path().join("seeded.gpkg")).unwrap();

        let wgs84 = gp.spatial_ref_sys(1).unwrap().unwrap();
        assert_eq!(wgs84.organization, "EPSG");
        assert_eq!(wgs84.organization_coordsys_id, 4326);

        assert!(gp.spatial_ref_sys(-1).unwrap().is_some());
        assert!(gp.spatial_ref_sys(0).unwrap().is_some());
        assert!(gp.spatial_ref_sys(9999).unwrap().is_none());
    }

    #[test]
    fn srs_registration_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut gp = GeoPackage::create(dir.path().join("srs.gpkg")).unwrap();

        let srs = SpatialRefSys::new(
            "Web Mercator",
            3857,
            "EPSG",
            3857,
            "PROJCS[\"WGS 84 / Pseudo-Mercator\"]",
            "spherical mercator projection",
        );

        let first = gp.add_spatial_ref_sys(&srs).unwrap();
        let second = gp.add_spatial_ref_sys(&srs).unwrap();
        assert_eq!(first, second);

        let count: i64 = gp
            .conn
            .query_row(
                "SELECT COUNT(*) FROM gpkg_spatial_ref_sys WHERE organization_coordsys_id = 3857",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn conflicting_srs_registration_fails() {
        let dir = tempdir().unwrap();
        let mut gp = GeoPackage::create(dir.path().join("conflict.gpkg")).unwrap();

        let srs = SpatialRefSys::new(
            "Web Mercator",
            3857,
            "EPSG",
            3857,
            "PROJCS[\"WGS 84 / Pseudo-Mercator\"]",
            "",
        );
        gp.add_spatial_ref_sys(&srs).unwrap();

        let conflicting = SpatialRefSys::new(
            "Web Mercator",
            3857,
            "EPSG",
            3857,
            "PROJCS[\"something else entirely\"]",
            "",
        );
        assert!(matches!(
            gp.add_spatial_ref_sys(&conflicting),
            Err(Error::SchemaValidation(_))
        ));
    }

    #[test]
    fn organization_lookup_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let gp = GeoPackage::create(dir.path().join("nocase.gpkg")).unwrap();

        let srs = gp
            .spatial_ref_sys_by_organization("epsg", 4326)
            .unwrap()
            .unwrap();
        assert_eq!(srs.srs_id, 1);
    }

    #[test]
    fn whitespace_variant_definition_still_matches() {
        let dir = tempdir().unwrap();
        let mut gp = GeoPackage::create(dir.path().join("wkt.gpkg")).unwrap();

        let srs = SpatialRefSys::new("test", 100, "TEST", 100, "PROJCS[\"name\",UNIT[\"m\"]]", "");
        gp.add_spatial_ref_sys(&srs).unwrap();

        let reformatted = SpatialRefSys::new(
            "test",
            100,
            "TEST",
            100,
            "PROJCS[ \"name\",\n    UNIT[\"m\"] ]",
            "",
        );
        let registered = gp.add_spatial_ref_sys(&reformatted).unwrap();
        assert_eq!(registered.definition, "PROJCS[\"name\",UNIT[\"m\"]]");
    }
}
