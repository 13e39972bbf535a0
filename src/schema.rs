//! Schema-version dispatch shared by database parsers.
//!
//! A data source changes shape across OS releases. Each shape is a
//! [`SchemaVariant`] pairing its query with its header list, so the two
//! cannot drift apart. A parser picks a variant from the device version or
//! by probing the database, then calls [`extract`].

use crate::plugin::ArtifactTable;
use crate::sqlite::query_table;
use anyhow::Result;
use rusqlite::Connection;
use semver::Version;

/// Parses OS versions such as `"18"`, `"14.2"` or `"10.3.4"`.
///
/// Missing components are zero. Anything after the third component, or a
/// non-numeric suffix such as a build letter, is ignored.
pub fn parse_os_version(raw: &str) -> Option<Version> {
    let mut parts = raw.trim().split('.').map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u64>().ok()
    });

    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);

    Some(Version::new(major, minor, patch))
}

/// One version-specific query shape.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVariant {
    pub label: &'static str,
    /// Lowest OS version served, inclusive.
    pub min: (u64, u64, u64),
    /// First OS version no longer served. `None` means open-ended.
    pub max: Option<(u64, u64, u64)>,
    pub query: &'static str,
    pub headers: &'static [&'static str],
}

impl SchemaVariant {
    pub fn covers(&self, version: &Version) -> bool {
        let min = Version::new(self.min.0, self.min.1, self.min.2);
        if *version < min {
            return false;
        }
        match self.max {
            Some((major, minor, patch)) => *version < Version::new(major, minor, patch),
            None => true,
        }
    }
}

/// First variant whose range covers `version`.
pub fn select_variant<'a>(variants: &'a [SchemaVariant], version: &Version) -> Option<&'a SchemaVariant> {
    variants.iter().find(|v| v.covers(version))
}

pub fn variant_by_label<'a>(variants: &'a [SchemaVariant], label: &str) -> Option<&'a SchemaVariant> {
    variants.iter().find(|v| v.label == label)
}

/// Runs the variant's query and labels the columns with its headers.
pub fn extract(conn: &Connection, variant: &SchemaVariant) -> Result<ArtifactTable> {
    query_table(conn, variant.query, variant.headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANTS: &[SchemaVariant] = &[
        SchemaVariant {
            label: "old",
            min: (11, 0, 0),
            max: Some((14, 0, 0)),
            query: "SELECT 1",
            headers: &["one"],
        },
        SchemaVariant {
            label: "new",
            min: (14, 0, 0),
            max: None,
            query: "SELECT 1, 2",
            headers: &["one", "two"],
        },
    ];

    #[test]
    fn test_parse_os_version() {
        assert_eq!(parse_os_version("18"), Some(Version::new(18, 0, 0)));
        assert_eq!(parse_os_version("14.2"), Some(Version::new(14, 2, 0)));
        assert_eq!(parse_os_version("10.3.4"), Some(Version::new(10, 3, 4)));
        assert_eq!(parse_os_version("17.4.1b"), Some(Version::new(17, 4, 1)));
        assert_eq!(parse_os_version("unknown"), None);
        assert_eq!(parse_os_version(""), None);
    }

    #[test]
    fn test_select_variant_ranges() {
        let pick = |v: &str| select_variant(VARIANTS, &parse_os_version(v).unwrap()).map(|v| v.label);

        assert_eq!(pick("10.3.4"), None);
        assert_eq!(pick("11"), Some("old"));
        assert_eq!(pick("13.7"), Some("old"));
        assert_eq!(pick("14"), Some("new"));
        assert_eq!(pick("18.1"), Some("new"));
    }

    #[test]
    fn test_extract_uses_paired_headers() {
        let conn = Connection::open_in_memory().unwrap();
        let table = extract(&conn, variant_by_label(VARIANTS, "new").unwrap()).unwrap();

        assert_eq!(table.headers, vec!["one", "two"]);
        assert_eq!(table.rows, vec![vec!["1", "2"]]);
    }
}
