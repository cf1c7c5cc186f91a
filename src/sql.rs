//! DDL for the GeoPackage core tables and the network extension tables.
//! Table and column names here are contract: other GeoPackage readers
//! depend on them verbatim.

pub(crate) mod table_definitions {
    pub const CREATE_SPATIAL_REF_SYS_TABLE: &str = "CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
        srs_name TEXT NOT NULL,
        srs_id INTEGER NOT NULL PRIMARY KEY,
        organization TEXT NOT NULL,
        organization_coordsys_id INTEGER NOT NULL,
        definition TEXT NOT NULL,
        description TEXT
    )";

    pub const CREATE_CONTENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS gpkg_contents (
        table_name TEXT NOT NULL PRIMARY KEY,
        data_type TEXT NOT NULL,
        identifier TEXT UNIQUE,
        description TEXT DEFAULT '',
        last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
        min_x DOUBLE,
        min_y DOUBLE,
        max_x DOUBLE,
        max_y DOUBLE,
        srs_id INTEGER,
        CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
    )";

    pub const CREATE_GEOMETRY_COLUMNS_TABLE: &str = "CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        geometry_type_name TEXT NOT NULL,
        srs_id INTEGER NOT NULL,
        z TINYINT NOT NULL,
        m TINYINT NOT NULL,
        CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
        CONSTRAINT uk_gc_table_name UNIQUE (table_name),
        CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
        CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
    )";

    pub const CREATE_TILE_MATRIX_SET_TABLE: &str = "CREATE TABLE IF NOT EXISTS gpkg_tile_matrix_set (
        table_name TEXT NOT NULL PRIMARY KEY,
        srs_id INTEGER NOT NULL,
        min_x DOUBLE NOT NULL,
        min_y DOUBLE NOT NULL,
        max_x DOUBLE NOT NULL,
        max_y DOUBLE NOT NULL,
        CONSTRAINT fk_gtms_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
        CONSTRAINT fk_gtms_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
    )";

    pub const CREATE_TILE_MATRIX_TABLE: &str = "CREATE TABLE IF NOT EXISTS gpkg_tile_matrix (
        table_name TEXT NOT NULL,
        zoom_level INTEGER NOT NULL,
        matrix_width INTEGER NOT NULL,
        matrix_height INTEGER NOT NULL,
        tile_width INTEGER NOT NULL,
        tile_height INTEGER NOT NULL,
        pixel_x_size DOUBLE NOT NULL,
        pixel_y_size DOUBLE NOT NULL,
        CONSTRAINT pk_ttm PRIMARY KEY (table_name, zoom_level),
        CONSTRAINT fk_tmm_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name)
    )";

    pub const CREATE_NETWORK_ATTRIBUTE_DESCRIPTION_TABLE: &str =
        "CREATE TABLE IF NOT EXISTS network_attribute_description (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name TEXT NOT NULL,
        name TEXT NOT NULL,
        units TEXT NOT NULL,
        data_type TEXT NOT NULL,
        description TEXT NOT NULL,
        attributed_type TEXT NOT NULL,
        UNIQUE (table_name, name, attributed_type),
        CONSTRAINT fk_natd_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name)
    )";

    pub fn create_network_table_ddl(table_name: &str) -> String {
        format!(
            "CREATE TABLE {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_node INTEGER NOT NULL,
        to_node INTEGER NOT NULL,
        UNIQUE (from_node, to_node)
    )",
            table_name
        )
    }

    pub fn create_node_attributes_table_ddl(table_name: &str) -> String {
        format!(
            "CREATE TABLE {} (
        node_id INTEGER PRIMARY KEY
    )",
            table_name
        )
    }

    pub fn create_feature_table_ddl(
        table_name: &str,
        geometry_column: &str,
        columns: &[(&str, &str)],
    ) -> String {
        let mut ddl = format!(
            "CREATE TABLE {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        {} BLOB",
            table_name, geometry_column
        );
        for (name, sql_type) in columns {
            ddl.push_str(&format!(",\n        {} {}", name, sql_type));
        }
        ddl.push_str("\n    )");
        ddl
    }

    pub fn create_tile_table_ddl(table_name: &str) -> String {
        format!(
            "CREATE TABLE {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zoom_level INTEGER NOT NULL,
        tile_column INTEGER NOT NULL,
        tile_row INTEGER NOT NULL,
        tile_data BLOB NOT NULL,
        UNIQUE (zoom_level, tile_column, tile_row)
    )",
            table_name
        )
    }
}
