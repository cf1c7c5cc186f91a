/// A spatial reference system as it appears in `gpkg_spatial_ref_sys`.
///
/// The pair (organization, organization_coordsys_id) is the natural key:
/// registering the same pair twice must either match every other field
/// (idempotent no-op) or fail. Organizations compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialRefSys {
    pub name: String,
    pub srs_id: i64,
    pub organization: String,
    pub organization_coordsys_id: i64,
    pub definition: String,
    pub description: String,
}

impl SpatialRefSys {
    /// The definition is normalized at construction so that equality is
    /// stable against formatting differences in the WKT source
    pub fn new(
        name: &str,
        srs_id: i64,
        organization: &str,
        organization_coordsys_id: i64,
        definition: &str,
        description: &str,
    ) -> Self {
        SpatialRefSys {
            name: name.to_owned(),
            srs_id,
            organization: organization.to_owned(),
            organization_coordsys_id,
            definition: normalize_wkt(definition),
            description: description.to_owned(),
        }
    }

    /// Field-wise comparison used by idempotent registration. The srs_id
    /// is excluded: the natural key is organization + coordsys id.
    pub fn equivalent(&self, other: &SpatialRefSys) -> bool {
        self.name == other.name
            && self.organization.eq_ignore_ascii_case(&other.organization)
            && self.organization_coordsys_id == other.organization_coordsys_id
            && self.definition == other.definition
    }
}

/// Strips whitespace outside double-quoted literals, so that two WKT
/// strings that differ only in formatting compare equal. Quoted names
/// keep their spacing.
pub(crate) fn normalize_wkt(definition: &str) -> String {
    let mut normalized = String::with_capacity(definition.len());
    let mut in_quotes = false;

    for c in definition.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            normalized.push(c);
        } else if c.is_whitespace() && !in_quotes {
            // dropped
        } else {
            normalized.push(c);
        }
    }

    normalized
}

pub mod defaults {
    use super::SpatialRefSys;

    pub fn wgs84() -> SpatialRefSys {
        SpatialRefSys::new(
            "WGS 84 geodetic",
            1,
            "EPSG",
            4326,
            "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]",
            "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid",
        )
    }

    pub fn cartesian() -> SpatialRefSys {
        SpatialRefSys::new(
            "undefined cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
            "undefined cartesian coordinate reference system",
        )
    }

    pub fn geographic() -> SpatialRefSys {
        SpatialRefSys::new(
            "undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
            "undefined geographic coordinate reference system",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_unquoted_whitespace() {
        assert_eq!(
            normalize_wkt("GEOGCS[ \"WGS 84\",\n  DATUM[\"WGS_1984\"] ]"),
            "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\"]]"
        );
    }

    #[test]
    fn normalization_preserves_quoted_spacing() {
        assert_eq!(normalize_wkt("UNIT[\"degree angle\"]"), "UNIT[\"degree angle\"]");
    }

    #[test]
    fn equivalence_ignores_organization_case_and_formatting() {
        let first = SpatialRefSys::new("WGS 84 geodetic", 1, "EPSG", 4326, "GEOGCS[\"WGS 84\"]", "");
        let second =
            SpatialRefSys::new("WGS 84 geodetic", 1, "epsg", 4326, "GEOGCS[ \"WGS 84\" ]", "");
        assert!(first.equivalent(&second));
    }

    #[test]
    fn equivalence_rejects_differing_definitions() {
        let first = SpatialRefSys::new("WGS 84 geodetic", 1, "EPSG", 4326, "GEOGCS[\"WGS 84\"]", "");
        let second =
            SpatialRefSys::new("WGS 84 geodetic", 1, "EPSG", 4326, "GEOGCS[\"WGS 85\"]", "");
        assert!(!first.equivalent(&second));
    }
}
