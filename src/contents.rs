//! The `gpkg_contents` registry: every user data table (features, tiles,
//! networks) is registered here, keyed by table name.

use crate::catalog::{register_or_validate, table_or_view_exists, within_transaction};
use crate::result::{Error, Result};
use crate::srs::SpatialRefSys;
use crate::GeoPackage;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

pub const FEATURES_DATA_TYPE: &str = "features";
pub const TILES_DATA_TYPE: &str = "tiles";

/// Bounding box as stored in `gpkg_contents`; every component may be null
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min_x: Option<f64>,
    pub min_y: Option<f64>,
    pub max_x: Option<f64>,
    pub max_y: Option<f64>,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x: Some(min_x),
            min_y: Some(min_y),
            max_x: Some(max_x),
            max_y: Some(max_y),
        }
    }
}

/// A row of `gpkg_contents`
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub table_name: String,
    pub data_type: String,
    pub identifier: Option<String>,
    pub description: String,
    pub last_change: String,
    pub bounding_box: BoundingBox,
    pub srs_id: Option<i64>,
}

impl Content {
    /// Field comparison used by idempotent registration; the last-change
    /// timestamp is the database's business and is ignored
    fn equivalent(
        &self,
        data_type: &str,
        identifier: Option<&str>,
        description: &str,
        bounding_box: &BoundingBox,
        srs_id: Option<i64>,
    ) -> bool {
        self.data_type == data_type
            && self.identifier.as_deref() == identifier
            && self.description == description
            && self.bounding_box == *bounding_box
            && self.srs_id == srs_id
    }
}

/// Table names must begin with a letter or underscore and continue with
/// letters, digits, or underscores
pub(crate) fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

pub(crate) fn validate_new_table_name(name: &str) -> Result<()> {
    if !valid_identifier(name) {
        return Err(Error::SchemaValidation(format!(
            "table name '{}' must begin with a letter or underscore and may only contain \
             letters, digits, and underscores",
            name
        )));
    }

    if name.starts_with("gpkg_") {
        return Err(Error::SchemaValidation(format!(
            "table name '{}' may not start with the reserved prefix 'gpkg_'",
            name
        )));
    }

    Ok(())
}

fn row_to_content(row: &rusqlite::Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content {
        table_name: row.get(0)?,
        data_type: row.get(1)?,
        identifier: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        last_change: row.get(4)?,
        bounding_box: BoundingBox {
            min_x: row.get(5)?,
            min_y: row.get(6)?,
            max_x: row.get(7)?,
            max_y: row.get(8)?,
        },
        srs_id: row.get(9)?,
    })
}

const CONTENT_COLUMNS: &str = "table_name, data_type, identifier, description, last_change, \
                               min_x, min_y, max_x, max_y, srs_id";

pub(crate) fn content_on(conn: &Connection, table_name: &str) -> Result<Option<Content>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM gpkg_contents WHERE table_name = ?1",
            CONTENT_COLUMNS
        ),
        params![table_name],
        row_to_content,
    )
    .optional()
    .map_err(Error::from)
}

/// Validation order: name pattern, reserved prefix, backing table
/// existence, then register-or-validate against any existing entry.
pub(crate) fn register_content_on(
    conn: &Connection,
    table_name: &str,
    data_type: &str,
    identifier: Option<&str>,
    description: &str,
    bounding_box: &BoundingBox,
    srs_id: Option<i64>,
) -> Result<Content> {
    validate_new_table_name(table_name)?;

    if data_type.is_empty() {
        return Err(Error::SchemaValidation(
            "content data type may not be empty".to_owned(),
        ));
    }

    if !table_or_view_exists(conn, table_name)? {
        return Err(Error::SchemaValidation(format!(
            "content entry '{}' references a table that does not exist",
            table_name
        )));
    }

    let existing = content_on(conn, table_name)?;

    register_or_validate(
        existing,
        |found| found.equivalent(data_type, identifier, description, bounding_box, srs_id),
        |_| {
            Error::SchemaValidation(format!(
                "a content entry for '{}' already exists with different properties",
                table_name
            ))
        },
        || {
            conn.execute(
                "INSERT INTO gpkg_contents
                 (table_name, data_type, identifier, description, min_x, min_y, max_x, max_y, srs_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    table_name,
                    data_type,
                    identifier,
                    description,
                    bounding_box.min_x,
                    bounding_box.min_y,
                    bounding_box.max_x,
                    bounding_box.max_y,
                    srs_id,
                ],
            )?;
            debug!(table_name, data_type, "registered content");
            content_on(conn, table_name)?.ok_or_else(|| {
                Error::SchemaValidation(format!(
                    "content entry '{}' vanished during registration",
                    table_name
                ))
            })
        },
    )
}

impl GeoPackage {
    /// Register an existing table in `gpkg_contents`. Registering the same
    /// table twice with identical properties returns the existing entry;
    /// differing properties are a conflict.
    pub fn register_content(
        &mut self,
        table_name: &str,
        data_type: &str,
        identifier: Option<&str>,
        description: &str,
        bounding_box: &BoundingBox,
        srs: Option<&SpatialRefSys>,
    ) -> Result<Content> {
        within_transaction(&mut self.conn, |tx| {
            register_content_on(
                tx,
                table_name,
                data_type,
                identifier,
                description,
                bounding_box,
                srs.map(|s| s.srs_id),
            )
        })
    }

    /// Create a user table from caller-supplied DDL and register it, as a
    /// single transaction: a failure in either step leaves neither behind
    pub fn create_user_table(
        &mut self,
        table_name: &str,
        ddl: &str,
        data_type: &str,
        identifier: Option<&str>,
        description: &str,
        bounding_box: &BoundingBox,
        srs: Option<&SpatialRefSys>,
    ) -> Result<Content> {
        let srs_id = srs.map(|s| s.srs_id);
        within_transaction(&mut self.conn, |tx| {
            validate_new_table_name(table_name)?;

            if table_or_view_exists(tx, table_name)? {
                return Err(Error::SchemaValidation(format!(
                    "a table named '{}' already exists",
                    table_name
                )));
            }

            tx.execute_batch(ddl)?;

            register_content_on(
                tx,
                table_name,
                data_type,
                identifier,
                description,
                bounding_box,
                srs_id,
            )
        })
    }

    /// Look up a content entry; absence is a valid result, not an error
    pub fn content(&self, table_name: &str) -> Result<Option<Content>> {
        content_on(&self.conn, table_name)
    }

    /// All content entries of a data type, optionally restricted to one
    /// spatial reference system
    pub fn contents_by_type(&self, data_type: &str, srs: Option<&SpatialRefSys>) -> Result<Vec<Content>> {
        let mut sql = format!(
            "SELECT {} FROM gpkg_contents WHERE data_type = ?1",
            CONTENT_COLUMNS
        );
        if srs.is_some() {
            sql.push_str(" AND srs_id = ?2");
        }
        sql.push_str(" ORDER BY table_name");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match srs {
            Some(srs) => stmt.query_map(params![data_type, srs.srs_id], row_to_content)?,
            None => stmt.query_map(params![data_type], row_to_content)?,
        };

        let mut contents = Vec::new();
        for row in rows {
            contents.push(row?);
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn geopackage(name: &str) -> (tempfile::TempDir, GeoPackage) {
        let dir = tempdir().unwrap();
        let gp = GeoPackage::create(dir.path().join(name)).unwrap();
        (dir, gp)
    }

    #[test]
    fn reserved_prefix_and_bad_names_are_rejected() {
        let (_dir, mut gp) = geopackage("names.gpkg");

        for name in ["gpkg_foo", "1bad", "has space", "has-dash", ""] {
            let result = gp.register_content(
                name,
                FEATURES_DATA_TYPE,
                None,
                "",
                &BoundingBox::default(),
                None,
            );
            assert!(
                matches!(result, Err(Error::SchemaValidation(_))),
                "expected rejection for {:?}",
                name
            );
        }
    }

    #[test]
    fn registration_requires_a_backing_table() {
        let (_dir, mut gp) = geopackage("backing.gpkg");

        let result = gp.register_content(
            "_valid_1",
            FEATURES_DATA_TYPE,
            None,
            "",
            &BoundingBox::default(),
            None,
        );
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn valid_name_with_backing_table_registers() {
        let (_dir, mut gp) = geopackage("valid.gpkg");

        gp.conn
            .execute("CREATE TABLE _valid_1 (id INTEGER PRIMARY KEY)", [])
            .unwrap();

        let srs = gp.spatial_ref_sys(1).unwrap().unwrap();
        let content = gp
            .register_content(
                "_valid_1",
                FEATURES_DATA_TYPE,
                Some("valid"),
                "a test table",
                &BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
                Some(&srs),
            )
            .unwrap();

        assert_eq!(content.table_name, "_valid_1");
        assert_eq!(content.srs_id, Some(1));
        assert!(!content.last_change.is_empty());
    }

    #[test]
    fn duplicate_registration_is_idempotent_or_conflict() {
        let (_dir, mut gp) = geopackage("dupe.gpkg");

        gp.conn
            .execute("CREATE TABLE roads (id INTEGER PRIMARY KEY)", [])
            .unwrap();

        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let first = gp
            .register_content("roads", FEATURES_DATA_TYPE, Some("roads"), "", &bbox, None)
            .unwrap();
        let second = gp
            .register_content("roads", FEATURES_DATA_TYPE, Some("roads"), "", &bbox, None)
            .unwrap();
        assert_eq!(first, second);

        let conflicting =
            gp.register_content("roads", TILES_DATA_TYPE, Some("roads"), "", &bbox, None);
        assert!(matches!(conflicting, Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn create_user_table_rolls_back_whole_unit() {
        let (_dir, mut gp) = geopackage("rollback.gpkg");

        // second statement fails, so the created table must not survive
        let result = gp.create_user_table(
            "half_made",
            "CREATE TABLE half_made (id INTEGER PRIMARY KEY);
             INSERT INTO no_such_table VALUES (1);",
            FEATURES_DATA_TYPE,
            None,
            "",
            &BoundingBox::default(),
            None,
        );
        assert!(result.is_err());

        assert!(!crate::catalog::table_or_view_exists(&gp.conn, "half_made").unwrap());
        assert!(gp.content("half_made").unwrap().is_none());
    }

    #[test]
    fn contents_by_type_filters_on_srs() {
        let (_dir, mut gp) = geopackage("listing.gpkg");

        gp.conn
            .execute("CREATE TABLE a (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        gp.conn
            .execute("CREATE TABLE b (id INTEGER PRIMARY KEY)", [])
            .unwrap();

        let wgs84 = gp.spatial_ref_sys(1).unwrap().unwrap();
        let cartesian = gp.spatial_ref_sys(-1).unwrap().unwrap();

        let bbox = BoundingBox::default();
        gp.register_content("a", FEATURES_DATA_TYPE, Some("a"), "", &bbox, Some(&wgs84))
            .unwrap();
        gp.register_content("b", FEATURES_DATA_TYPE, Some("b"), "", &bbox, Some(&cartesian))
            .unwrap();

        let all = gp.contents_by_type(FEATURES_DATA_TYPE, None).unwrap();
        assert_eq!(all.len(), 2);

        let wgs84_only = gp.contents_by_type(FEATURES_DATA_TYPE, Some(&wgs84)).unwrap();
        assert_eq!(wgs84_only.len(), 1);
        assert_eq!(wgs84_only[0].table_name, "a");

        assert!(gp.contents_by_type(TILES_DATA_TYPE, None).unwrap().is_empty());
    }
}
