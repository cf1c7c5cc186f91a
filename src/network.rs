//! Network extension: persistent graph storage inside a GeoPackage.
//!
//! A network is a content entry (data type "network") backed by an edge
//! table and a parallel node-attribute table. Named, typed attributes may
//! be attached to nodes or edges; each attribute is an added column on the
//! relevant side table, described by a row in the shared
//! `network_attribute_description` table.

use crate::catalog::{register_or_validate, table_or_view_exists, within_transaction};
use crate::contents::{
    content_on, register_content_on, valid_identifier, validate_new_table_name, BoundingBox,
    Content,
};
use crate::result::{Error, Result};
use crate::sql::table_definitions::{
    create_network_table_ddl, create_node_attributes_table_ddl,
    CREATE_NETWORK_ATTRIBUTE_DESCRIPTION_TABLE,
};
use crate::srs::SpatialRefSys;
use crate::GeoPackage;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::fmt;
use tracing::debug;

pub const NETWORK_DATA_TYPE: &str = "network";

const NODE_ATTRIBUTES_TABLE_SUFFIX: &str = "_node_attributes";
pub const ATTRIBUTE_DESCRIPTION_TABLE_NAME: &str = "network_attribute_description";

/// Storage type an attribute's values are declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Blob,
    Integer,
    Real,
    Text,
}

impl DataType {
    /// Name stored in the attribute description table, which doubles as
    /// the SQL column type for the added attribute column
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Blob => "BLOB",
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
        }
    }

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "BLOB" => Ok(DataType::Blob),
            "INTEGER" => Ok(DataType::Integer),
            "REAL" => Ok(DataType::Real),
            "TEXT" => Ok(DataType::Text),
            other => Err(Error::SchemaValidation(format!(
                "unknown attribute data type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an attribute describes nodes or edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributedType {
    Node,
    Edge,
}

impl AttributedType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributedType::Node => "node",
            AttributedType::Edge => "edge",
        }
    }
}

/// A runtime attribute value. Values are checked against the declared
/// [DataType] before they touch storage; there is no implicit coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Blob(Vec<u8>),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn data_type(&self) -> DataType {
        match self {
            AttributeValue::Blob(_) => DataType::Blob,
            AttributeValue::Integer(_) => DataType::Integer,
            AttributeValue::Real(_) => DataType::Real,
            AttributeValue::Text(_) => DataType::Text,
        }
    }
}

impl ToSql for AttributeValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            AttributeValue::Blob(bytes) => ToSqlOutput::from(bytes.as_slice()),
            AttributeValue::Integer(value) => ToSqlOutput::from(*value),
            AttributeValue::Real(value) => ToSqlOutput::from(*value),
            AttributeValue::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Option<AttributeValue> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(AttributeValue::Integer(value)),
        ValueRef::Real(value) => Some(AttributeValue::Real(value)),
        ValueRef::Text(bytes) => Some(AttributeValue::Text(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
        ValueRef::Blob(bytes) => Some(AttributeValue::Blob(bytes.to_vec())),
    }
}

/// A content entry of data type "network"
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    content: Content,
}

impl Network {
    pub(crate) fn from_content(content: Content) -> Self {
        Network { content }
    }

    pub fn table_name(&self) -> &str {
        &self.content.table_name
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn node_attributes_table_name(&self) -> String {
        node_attributes_table_name(self.table_name())
    }
}

pub fn node_attributes_table_name(network_table_name: &str) -> String {
    format!("{}{}", network_table_name, NODE_ATTRIBUTES_TABLE_SUFFIX)
}

/// Description of a named, typed attribute attached to a network's nodes
/// or edges. (table name, attribute name, attributed type) is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescription {
    pub id: i64,
    pub table_name: String,
    pub name: String,
    pub units: String,
    pub data_type: DataType,
    pub description: String,
    pub attributed_type: AttributedType,
}

impl AttributeDescription {
    /// Table the attribute's column lives on
    fn attributed_table_name(&self) -> String {
        match self.attributed_type {
            AttributedType::Edge => self.table_name.clone(),
            AttributedType::Node => node_attributes_table_name(&self.table_name),
        }
    }

    pub(crate) fn check_value(&self, value: &AttributeValue) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(Error::TypeMismatch {
                attribute: self.name.clone(),
                expected: self.data_type,
                actual: value.data_type(),
            });
        }
        Ok(())
    }
}

/// A directed edge between two node identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: i64,
    pub from: i64,
    pub to: i64,
}

fn attribute_description_on(
    conn: &Connection,
    table_name: &str,
    name: &str,
    attributed_type: AttributedType,
) -> Result<Option<AttributeDescription>> {
    let row = conn
        .query_row(
            "SELECT id, units, data_type, description FROM network_attribute_description
             WHERE table_name = ?1 AND name = ?2 AND attributed_type = ?3",
            params![table_name, name, attributed_type.as_str()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((id, units, data_type, description)) => Ok(Some(AttributeDescription {
            id,
            table_name: table_name.to_owned(),
            name: name.to_owned(),
            units,
            data_type: DataType::from_str(&data_type)?,
            description,
            attributed_type,
        })),
    }
}

fn validate_descriptions(
    network: &Network,
    descriptions: &[AttributeDescription],
    attributed_type: AttributedType,
) -> Result<()> {
    if descriptions.is_empty() {
        return Err(Error::SchemaValidation(
            "attribute descriptions may not be empty".to_owned(),
        ));
    }

    for description in descriptions {
        if description.table_name != network.table_name() {
            return Err(Error::SchemaValidation(format!(
                "attribute description '{}' belongs to table '{}', not '{}'",
                description.name,
                description.table_name,
                network.table_name()
            )));
        }
        if description.attributed_type != attributed_type {
            return Err(Error::SchemaValidation(format!(
                "attribute description '{}' describes {}s, expected {}s",
                description.name,
                description.attributed_type.as_str(),
                attributed_type.as_str()
            )));
        }
    }

    Ok(())
}

impl GeoPackage {
    /// Create a network: its edge table, its node attribute table, and its
    /// content entry, as one transaction
    pub fn add_network(
        &mut self,
        table_name: &str,
        identifier: Option<&str>,
        description: &str,
        bounding_box: &BoundingBox,
        srs: Option<&SpatialRefSys>,
    ) -> Result<Network> {
        let srs_id = srs.map(|s| s.srs_id);
        let network = within_transaction(&mut self.conn, |tx| {
            validate_new_table_name(table_name)?;

            let node_table = node_attributes_table_name(table_name);

            if table_or_view_exists(tx, table_name)? {
                return Err(Error::SchemaValidation(format!(
                    "a table named '{}' already exists",
                    table_name
                )));
            }
            if table_or_view_exists(tx, &node_table)? {
                return Err(Error::SchemaValidation(format!(
                    "a table named '{}' already exists",
                    node_table
                )));
            }

            tx.execute(CREATE_NETWORK_ATTRIBUTE_DESCRIPTION_TABLE, [])?;
            tx.execute(&create_network_table_ddl(table_name), [])?;
            tx.execute(&create_node_attributes_table_ddl(&node_table), [])?;

            let content = register_content_on(
                tx,
                table_name,
                NETWORK_DATA_TYPE,
                identifier,
                description,
                bounding_box,
                srs_id,
            )?;

            Ok(Network::from_content(content))
        })?;

        debug!(table_name, "created network");
        Ok(network)
    }

    /// Look up a network by table name. A content entry of a different
    /// data type is "not found", not an error.
    pub fn network(&self, table_name: &str) -> Result<Option<Network>> {
        Ok(content_on(&self.conn, table_name)?
            .filter(|content| content.data_type == NETWORK_DATA_TYPE)
            .map(Network::from_content))
    }

    /// Declare an attribute for a network's nodes or edges. The
    /// declaration inserts a description row and adds a column of the
    /// declared type to the attributed side table, as one transaction.
    /// Redeclaring an identical attribute returns the existing
    /// description.
    pub fn add_attribute_description(
        &mut self,
        network: &Network,
        name: &str,
        units: &str,
        data_type: DataType,
        description: &str,
        attributed_type: AttributedType,
    ) -> Result<AttributeDescription> {
        let table_name = network.table_name().to_owned();

        within_transaction(&mut self.conn, |tx| {
            if !valid_identifier(name) {
                return Err(Error::SchemaValidation(format!(
                    "attribute name '{}' is not a valid identifier",
                    name
                )));
            }

            if units.is_empty() {
                return Err(Error::SchemaValidation(
                    "attribute units may not be empty".to_owned(),
                ));
            }

            let existing = attribute_description_on(tx, &table_name, name, attributed_type)?;

            register_or_validate(
                existing,
                |found| {
                    found.units == units
                        && found.data_type == data_type
                        && found.description == description
                },
                |_| {
                    Error::SchemaValidation(format!(
                        "attribute '{}' ({}) already exists on '{}' with different fields",
                        name,
                        attributed_type.as_str(),
                        table_name
                    ))
                },
                || {
                    tx.execute(
                        "INSERT INTO network_attribute_description
                         (table_name, name, units, data_type, description, attributed_type)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            table_name,
                            name,
                            units,
                            data_type.as_str(),
                            description,
                            attributed_type.as_str(),
                        ],
                    )?;
                    let id = tx.last_insert_rowid();

                    let attributed_table = match attributed_type {
                        AttributedType::Edge => table_name.clone(),
                        AttributedType::Node => node_attributes_table_name(&table_name),
                    };
                    tx.execute(
                        &format!(
                            "ALTER TABLE {} ADD COLUMN {} {}",
                            attributed_table,
                            name,
                            data_type.as_str()
                        ),
                        [],
                    )?;

                    debug!(
                        table_name = %table_name,
                        attribute = name,
                        "added attribute description"
                    );

                    Ok(AttributeDescription {
                        id,
                        table_name: table_name.clone(),
                        name: name.to_owned(),
                        units: units.to_owned(),
                        data_type,
                        description: description.to_owned(),
                        attributed_type,
                    })
                },
            )
        })
    }

    /// A network's named attribute description, if declared
    pub fn attribute_description(
        &self,
        network: &Network,
        name: &str,
        attributed_type: AttributedType,
    ) -> Result<Option<AttributeDescription>> {
        attribute_description_on(&self.conn, network.table_name(), name, attributed_type)
    }

    /// All attribute descriptions of a network for nodes or for edges
    pub fn attribute_descriptions(
        &self,
        network: &Network,
        attributed_type: AttributedType,
    ) -> Result<Vec<AttributeDescription>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, units, data_type, description
             FROM network_attribute_description
             WHERE table_name = ?1 AND attributed_type = ?2
             ORDER BY id",
        )?;

        let rows = stmt.query_map(
            params![network.table_name(), attributed_type.as_str()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        let mut descriptions = Vec::new();
        for row in rows {
            let (id, name, units, data_type, description) = row?;
            descriptions.push(AttributeDescription {
                id,
                table_name: network.table_name().to_owned(),
                name,
                units,
                data_type: DataType::from_str(&data_type)?,
                description,
                attributed_type,
            });
        }
        Ok(descriptions)
    }

    /// Add a single edge, returning it with its assigned identifier
    pub fn add_edge(&mut self, network: &Network, from: i64, to: i64) -> Result<Edge> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (from_node, to_node) VALUES (?1, ?2)",
                network.table_name()
            ),
            params![from, to],
        )?;

        Ok(Edge {
            id: self.conn.last_insert_rowid(),
            from,
            to,
        })
    }

    /// Bulk edge insert; the whole batch is one transaction
    pub fn add_edges(&mut self, network: &Network, pairs: &[(i64, i64)]) -> Result<()> {
        let insert = format!(
            "INSERT INTO {} (from_node, to_node) VALUES (?1, ?2)",
            network.table_name()
        );

        within_transaction(&mut self.conn, |tx| {
            let mut stmt = tx.prepare(&insert)?;
            for (from, to) in pairs {
                stmt.execute(params![from, to])?;
            }
            Ok(())
        })?;

        debug!(
            table_name = network.table_name(),
            count = pairs.len(),
            "added edges"
        );
        Ok(())
    }

    /// Bulk insert of edges carrying attribute values. Every value is
    /// type-checked against its description before anything is written;
    /// the whole batch is one transaction.
    pub fn add_attributed_edges(
        &mut self,
        network: &Network,
        descriptions: &[AttributeDescription],
        edges: &[((i64, i64), Vec<AttributeValue>)],
    ) -> Result<()> {
        validate_descriptions(network, descriptions, AttributedType::Edge)?;

        for (_, values) in edges {
            if values.len() != descriptions.len() {
                return Err(Error::SchemaValidation(format!(
                    "every edge must carry {} attribute values, got {}",
                    descriptions.len(),
                    values.len()
                )));
            }
            for (description, value) in descriptions.iter().zip(values) {
                description.check_value(value)?;
            }
        }

        let column_names = descriptions
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (3..3 + descriptions.len())
            .map(|index| format!("?{}", index))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} (from_node, to_node, {}) VALUES (?1, ?2, {})",
            network.table_name(),
            column_names,
            placeholders
        );

        within_transaction(&mut self.conn, |tx| {
            let mut stmt = tx.prepare(&insert)?;
            for ((from, to), values) in edges {
                let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(2 + values.len());
                bound.push(from);
                bound.push(to);
                for value in values {
                    bound.push(value);
                }
                stmt.execute(bound.as_slice())?;
            }
            Ok(())
        })?;

        debug!(
            table_name = network.table_name(),
            count = edges.len(),
            "added attributed edges"
        );
        Ok(())
    }

    /// An edge by identifier, or None
    pub fn edge(&self, network: &Network, edge_id: i64) -> Result<Option<Edge>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT from_node, to_node FROM {} WHERE id = ?1",
                    network.table_name()
                ),
                params![edge_id],
                |row| {
                    Ok(Edge {
                        id: edge_id,
                        from: row.get(0)?,
                        to: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    /// The edge from one node to another, or None
    pub fn edge_between(&self, network: &Network, from: i64, to: i64) -> Result<Option<Edge>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE from_node = ?1 AND to_node = ?2",
                    network.table_name()
                ),
                params![from, to],
                |row| {
                    Ok(Edge {
                        id: row.get(0)?,
                        from,
                        to,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    /// Edges leaving a node, ordered by edge identifier
    pub fn exits(&self, network: &Network, node: i64) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, to_node FROM {} WHERE from_node = ?1 ORDER BY id",
            network.table_name()
        ))?;

        let rows = stmt.query_map(params![node], |row| {
            Ok(Edge {
                id: row.get(0)?,
                from: node,
                to: row.get(1)?,
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Nodes that have an edge into the given node
    pub fn entries(&self, network: &Network, node: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT from_node FROM {} WHERE to_node = ?1 ORDER BY from_node",
            network.table_name()
        ))?;

        let rows = stmt.query_map(params![node], |row| row.get(0))?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    /// Apply a callback to every edge of a network
    pub fn visit_edges(&self, network: &Network, mut f: impl FnMut(Edge)) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, from_node, to_node FROM {} ORDER BY id",
            network.table_name()
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok(Edge {
                id: row.get(0)?,
                from: row.get(1)?,
                to: row.get(2)?,
            })
        })?;

        for row in rows {
            f(row?);
        }
        Ok(())
    }

    /// One attribute value of an edge; None when the edge exists but the
    /// attribute was never set
    pub fn edge_attribute(
        &self,
        edge: &Edge,
        description: &AttributeDescription,
    ) -> Result<Option<AttributeValue>> {
        if description.attributed_type != AttributedType::Edge {
            return Err(Error::SchemaValidation(format!(
                "attribute '{}' describes nodes, not edges",
                description.name
            )));
        }

        let value = self.conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                description.name,
                description.attributed_table_name()
            ),
            params![edge.id],
            |row| Ok(value_from_ref(row.get_ref(0)?)),
        )?;

        if let Some(value) = &value {
            description.check_value(value)?;
        }
        Ok(value)
    }

    /// Several attribute values of an edge, fetched in one query, in
    /// description order
    pub fn edge_attributes(
        &self,
        network: &Network,
        edge: &Edge,
        descriptions: &[AttributeDescription],
    ) -> Result<Vec<Option<AttributeValue>>> {
        validate_descriptions(network, descriptions, AttributedType::Edge)?;

        let column_names = descriptions
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let values = self.conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                column_names,
                network.table_name()
            ),
            params![edge.id],
            |row| {
                let mut values = Vec::with_capacity(descriptions.len());
                for index in 0..descriptions.len() {
                    values.push(value_from_ref(row.get_ref(index)?));
                }
                Ok(values)
            },
        )?;

        for (description, value) in descriptions.iter().zip(&values) {
            if let Some(value) = value {
                description.check_value(value)?;
            }
        }
        Ok(values)
    }

    /// Attribute values of one node, in description order; a node with no
    /// attribute row yields all-None
    pub fn node_attributes(
        &self,
        network: &Network,
        node: i64,
        descriptions: &[AttributeDescription],
    ) -> Result<Vec<Option<AttributeValue>>> {
        let mut per_node = self.nodes_attributes(network, &[node], descriptions)?;
        Ok(per_node.pop().unwrap_or_else(|| vec![None; descriptions.len()]))
    }

    /// Attribute values for several nodes, in node order then description
    /// order
    pub fn nodes_attributes(
        &self,
        network: &Network,
        nodes: &[i64],
        descriptions: &[AttributeDescription],
    ) -> Result<Vec<Vec<Option<AttributeValue>>>> {
        validate_descriptions(network, descriptions, AttributedType::Node)?;

        let column_names = descriptions
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE node_id = ?1",
            column_names,
            network.node_attributes_table_name()
        ))?;

        let mut per_node = Vec::with_capacity(nodes.len());
        for node in nodes {
            let values = stmt
                .query_row(params![node], |row| {
                    let mut values = Vec::with_capacity(descriptions.len());
                    for index in 0..descriptions.len() {
                        values.push(value_from_ref(row.get_ref(index)?));
                    }
                    Ok(values)
                })
                .optional()?
                .unwrap_or_else(|| vec![None; descriptions.len()]);

            for (description, value) in descriptions.iter().zip(&values) {
                if let Some(value) = value {
                    description.check_value(value)?;
                }
            }
            per_node.push(values);
        }
        Ok(per_node)
    }

    /// Insert attribute rows for a batch of nodes. Every value is
    /// type-checked before anything is written; the batch is one
    /// transaction.
    pub fn add_node_attributes(
        &mut self,
        network: &Network,
        descriptions: &[AttributeDescription],
        nodes: &[(i64, Vec<AttributeValue>)],
    ) -> Result<()> {
        validate_descriptions(network, descriptions, AttributedType::Node)?;

        for (node, values) in nodes {
            if values.len() != descriptions.len() {
                return Err(Error::SchemaValidation(format!(
                    "node {} must carry {} attribute values, got {}",
                    node,
                    descriptions.len(),
                    values.len()
                )));
            }
            for (description, value) in descriptions.iter().zip(values) {
                description.check_value(value)?;
            }
        }

        let column_names = descriptions
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (2..2 + descriptions.len())
            .map(|index| format!("?{}", index))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} (node_id, {}) VALUES (?1, {})",
            network.node_attributes_table_name(),
            column_names,
            placeholders
        );

        within_transaction(&mut self.conn, |tx| {
            let mut stmt = tx.prepare(&insert)?;
            for (node, values) in nodes {
                let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(1 + values.len());
                bound.push(node);
                for value in values {
                    bound.push(value);
                }
                stmt.execute(bound.as_slice())?;
            }
            Ok(())
        })?;

        debug!(
            table_name = network.table_name(),
            count = nodes.len(),
            "added node attributes"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn network_fixture(name: &str) -> (tempfile::TempDir, GeoPackage, Network) {
        let dir = tempdir().unwrap();
        let mut gp = GeoPackage::create(dir.path().join(name)).unwrap();
        let network = gp
            .add_network(
                "roads",
                Some("roads"),
                "road network",
                &BoundingBox::default(),
                None,
            )
            .unwrap();
        (dir, gp, network)
    }

    #[test]
    fn add_network_creates_all_tables() {
        let (_dir, gp, network) = network_fixture("tables.gpkg");

        assert!(crate::catalog::table_or_view_exists(&gp.conn, "roads").unwrap());
        assert!(crate::catalog::table_or_view_exists(&gp.conn, "roads_node_attributes").unwrap());
        assert!(crate::catalog::table_or_view_exists(
            &gp.conn,
            ATTRIBUTE_DESCRIPTION_TABLE_NAME
        )
        .unwrap());
        assert_eq!(network.content().data_type, NETWORK_DATA_TYPE);

        let found = gp.network("roads").unwrap().unwrap();
        assert_eq!(found, network);
        assert!(gp.network("absent").unwrap().is_none());
    }

    #[test]
    fn duplicate_network_table_is_rejected() {
        let (_dir, mut gp, _network) = network_fixture("dupe.gpkg");
        let result = gp.add_network("roads", None, "", &BoundingBox::default(), None);
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn attribute_description_is_idempotent_or_conflict() {
        let (_dir, mut gp, network) = network_fixture("attrs.gpkg");

        let first = gp
            .add_attribute_description(
                &network,
                "length",
                "meters",
                DataType::Real,
                "edge length",
                AttributedType::Edge,
            )
            .unwrap();
        let second = gp
            .add_attribute_description(
                &network,
                "length",
                "meters",
                DataType::Real,
                "edge length",
                AttributedType::Edge,
            )
            .unwrap();
        assert_eq!(first, second);

        let conflict = gp.add_attribute_description(
            &network,
            "length",
            "feet",
            DataType::Real,
            "edge length",
            AttributedType::Edge,
        );
        assert!(matches!(conflict, Err(Error::SchemaValidation(_))));

        // same name may describe nodes independently of edges
        gp.add_attribute_description(
            &network,
            "length",
            "meters",
            DataType::Real,
            "node length",
            AttributedType::Node,
        )
        .unwrap();
    }

    #[test]
    fn exits_and_entries_follow_edge_direction() {
        let (_dir, mut gp, network) = network_fixture("exits.gpkg");

        gp.add_edges(&network, &[(1, 2), (1, 3), (2, 3), (3, 1)])
            .unwrap();

        let exits = gp.exits(&network, 1).unwrap();
        assert_eq!(
            exits.iter().map(|e| e.to).collect::<Vec<_>>(),
            vec![2, 3]
        );

        let entries = gp.entries(&network, 3).unwrap();
        assert_eq!(entries, vec![1, 2]);

        assert!(gp.exits(&network, 99).unwrap().is_empty());

        let mut visited = 0;
        gp.visit_edges(&network, |_| visited += 1).unwrap();
        assert_eq!(visited, 4);
    }

    #[test]
    fn edge_between_binds_both_parameters() {
        let (_dir, mut gp, network) = network_fixture("between.gpkg");

        gp.add_edges(&network, &[(1, 2), (2, 1), (2, 2)]).unwrap();

        let edge = gp.edge_between(&network, 1, 2).unwrap().unwrap();
        assert_eq!((edge.from, edge.to), (1, 2));

        let reverse = gp.edge_between(&network, 2, 1).unwrap().unwrap();
        assert_eq!((reverse.from, reverse.to), (2, 1));
        assert_ne!(edge.id, reverse.id);

        assert!(gp.edge_between(&network, 1, 3).unwrap().is_none());

        let by_id = gp.edge(&network, edge.id).unwrap().unwrap();
        assert_eq!(by_id, edge);
    }

    #[test]
    fn attributed_edges_round_trip() {
        let (_dir, mut gp, network) = network_fixture("attributed.gpkg");

        let length = gp
            .add_attribute_description(
                &network,
                "length",
                "meters",
                DataType::Real,
                "edge length",
                AttributedType::Edge,
            )
            .unwrap();
        let name = gp
            .add_attribute_description(
                &network,
                "name",
                "text",
                DataType::Text,
                "street name",
                AttributedType::Edge,
            )
            .unwrap();

        let descriptions = vec![length.clone(), name.clone()];
        gp.add_attributed_edges(
            &network,
            &descriptions,
            &[
                (
                    (1, 2),
                    vec![
                        AttributeValue::Real(120.5),
                        AttributeValue::Text("Main St".to_owned()),
                    ],
                ),
                (
                    (2, 3),
                    vec![
                        AttributeValue::Real(80.0),
                        AttributeValue::Text("Elm St".to_owned()),
                    ],
                ),
            ],
        )
        .unwrap();

        let edge = gp.edge_between(&network, 1, 2).unwrap().unwrap();
        assert_eq!(
            gp.edge_attribute(&edge, &length).unwrap(),
            Some(AttributeValue::Real(120.5))
        );

        let values = gp.edge_attributes(&network, &edge, &descriptions).unwrap();
        assert_eq!(
            values,
            vec![
                Some(AttributeValue::Real(120.5)),
                Some(AttributeValue::Text("Main St".to_owned())),
            ]
        );
    }

    #[test]
    fn type_mismatch_writes_nothing() {
        let (_dir, mut gp, network) = network_fixture("mismatch.gpkg");

        let length = gp
            .add_attribute_description(
                &network,
                "length",
                "meters",
                DataType::Real,
                "edge length",
                AttributedType::Edge,
            )
            .unwrap();

        let result = gp.add_attributed_edges(
            &network,
            &[length],
            &[
                ((1, 2), vec![AttributeValue::Real(1.0)]),
                ((2, 3), vec![AttributeValue::Text("oops".to_owned())]),
            ],
        );
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));

        // the mismatch is caught before any row is written
        let count: i64 = gp
            .conn
            .query_row("SELECT COUNT(*) FROM roads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn node_attributes_round_trip() {
        let (_dir, mut gp, network) = network_fixture("nodes.gpkg");

        let elevation = gp
            .add_attribute_description(
                &network,
                "elevation",
                "meters",
                DataType::Real,
                "node elevation",
                AttributedType::Node,
            )
            .unwrap();

        let descriptions = vec![elevation];
        gp.add_node_attributes(
            &network,
            &descriptions,
            &[
                (1, vec![AttributeValue::Real(1600.0)]),
                (2, vec![AttributeValue::Real(1750.5)]),
            ],
        )
        .unwrap();

        let per_node = gp
            .nodes_attributes(&network, &[1, 2, 3], &descriptions)
            .unwrap();
        assert_eq!(per_node[0], vec![Some(AttributeValue::Real(1600.0))]);
        assert_eq!(per_node[1], vec![Some(AttributeValue::Real(1750.5))]);
        // node 3 has no attribute row
        assert_eq!(per_node[2], vec![None]);

        let single = gp.node_attributes(&network, 2, &descriptions).unwrap();
        assert_eq!(single, vec![Some(AttributeValue::Real(1750.5))]);
    }

    #[test]
    fn foreign_descriptions_are_rejected() {
        let (_dir, mut gp, network) = network_fixture("foreign.gpkg");
        let other = gp
            .add_network("rails", None, "", &BoundingBox::default(), None)
            .unwrap();

        let foreign = gp
            .add_attribute_description(
                &other,
                "length",
                "meters",
                DataType::Real,
                "",
                AttributedType::Edge,
            )
            .unwrap();

        let result = gp.add_attributed_edges(
            &network,
            &[foreign],
            &[((1, 2), vec![AttributeValue::Real(1.0)])],
        );
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }

    #[test]
    fn node_description_cannot_read_edge_attribute() {
        let (_dir, mut gp, network) = network_fixture("sides.gpkg");

        let node_attr = gp
            .add_attribute_description(
                &network,
                "elevation",
                "meters",
                DataType::Real,
                "",
                AttributedType::Node,
            )
            .unwrap();

        let edge = gp.add_edge(&network, 1, 2).unwrap();
        let result = gp.edge_attribute(&edge, &node_attr);
        assert!(matches!(result, Err(Error::SchemaValidation(_))));
    }
}
