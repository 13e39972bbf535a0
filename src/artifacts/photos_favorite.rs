//! Favorite assets from PhotoData/Photos.sqlite (iOS 11 and later).
//!
//! One row per favorited ZASSET record. The asset table was renamed from
//! ZGENERICASSET in iOS 14, iOS 15 added the syndication identifier and
//! iOS 18 replaced the master fingerprint with stable hashes.

use crate::plugin::{ArtifactMetadata, ArtifactPlugin, ArtifactTable, PluginDescriptor, RunContext};
use crate::schema::{self, parse_os_version, SchemaVariant};
use crate::sqlite;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::info;

const KEY: &str = "Ph7-Favorite-PhDaPsql";

const QUERY_IOS11: &str = "
    SELECT
    DateTime(zAsset.ZMODIFICATIONDATE + 978307200, 'UNIXEPOCH'),
    CASE zAsset.ZFAVORITE
        WHEN 0 THEN '0-Asset Not Favorite-0'
        WHEN 1 THEN '1-Asset Favorite-1'
    END,
    zAsset.ZDIRECTORY,
    zAsset.ZFILENAME,
    zAddAssetAttr.ZORIGINALFILENAME,
    zCldMast.ZORIGINALFILENAME,
    zCldMast.ZIMPORTSESSIONID,
    zAsset.Z_PK,
    zAddAssetAttr.Z_PK,
    zAsset.ZUUID,
    zAddAssetAttr.ZMASTERFINGERPRINT
    FROM ZGENERICASSET zAsset
        LEFT JOIN ZADDITIONALASSETATTRIBUTES zAddAssetAttr ON zAddAssetAttr.Z_PK = zAsset.ZADDITIONALATTRIBUTES
        LEFT JOIN ZCLOUDMASTER zCldMast ON zAsset.ZMASTER = zCldMast.Z_PK
    WHERE zAsset.ZFAVORITE = 1
    ORDER BY zAsset.ZMODIFICATIONDATE";

const QUERY_IOS14: &str = "
    SELECT
    DateTime(zAsset.ZMODIFICATIONDATE + 978307200, 'UNIXEPOCH'),
    CASE zAsset.ZFAVORITE
        WHEN 0 THEN '0-Asset Not Favorite-0'
        WHEN 1 THEN '1-Asset Favorite-1'
    END,
    zAsset.ZDIRECTORY,
    zAsset.ZFILENAME,
    zAddAssetAttr.ZORIGINALFILENAME,
    zCldMast.ZORIGINALFILENAME,
    zCldMast.ZIMPORTSESSIONID,
    zAsset.Z_PK,
    zAddAssetAttr.Z_PK,
    zAsset.ZUUID,
    zAddAssetAttr.ZMASTERFINGERPRINT
    FROM ZASSET zAsset
        LEFT JOIN ZADDITIONALASSETATTRIBUTES zAddAssetAttr ON zAddAssetAttr.Z_PK = zAsset.ZADDITIONALATTRIBUTES
        LEFT JOIN ZCLOUDMASTER zCldMast ON zAsset.ZMASTER = zCldMast.Z_PK
    WHERE zAsset.ZFAVORITE = 1
    ORDER BY zAsset.ZMODIFICATIONDATE";

const QUERY_IOS15: &str = "
    SELECT
    DateTime(zAsset.ZMODIFICATIONDATE + 978307200, 'UNIXEPOCH'),
    CASE zAsset.ZFAVORITE
        WHEN 0 THEN '0-Asset Not Favorite-0'
        WHEN 1 THEN '1-Asset Favorite-1'
    END,
    zAsset.ZDIRECTORY,
    zAsset.ZFILENAME,
    zAddAssetAttr.ZORIGINALFILENAME,
    zCldMast.ZORIGINALFILENAME,
    zCldMast.ZIMPORTSESSIONID,
    zAddAssetAttr.ZSYNDICATIONIDENTIFIER,
    zAsset.Z_PK,
    zAddAssetAttr.Z_PK,
    zAsset.ZUUID,
    zAddAssetAttr.ZMASTERFINGERPRINT
    FROM ZASSET zAsset
        LEFT JOIN ZADDITIONALASSETATTRIBUTES zAddAssetAttr ON zAddAssetAttr.Z_PK = zAsset.ZADDITIONALATTRIBUTES
        LEFT JOIN ZCLOUDMASTER zCldMast ON zAsset.ZMASTER = zCldMast.Z_PK
    WHERE zAsset.ZFAVORITE = 1
    ORDER BY zAsset.ZMODIFICATIONDATE";

const QUERY_IOS18: &str = "
    SELECT
    DateTime(zAsset.ZMODIFICATIONDATE + 978307200, 'UNIXEPOCH'),
    CASE zAsset.ZFAVORITE
        WHEN 0 THEN '0-Asset Not Favorite-0'
        WHEN 1 THEN '1-Asset Favorite-1'
    END,
    zAsset.ZDIRECTORY,
    zAsset.ZFILENAME,
    zAddAssetAttr.ZORIGINALFILENAME,
    zCldMast.ZORIGINALFILENAME,
    zCldMast.ZIMPORTSESSIONID,
    zAddAssetAttr.ZSYNDICATIONIDENTIFIER,
    zAsset.Z_PK,
    zAddAssetAttr.Z_PK,
    zAsset.ZUUID,
    zAddAssetAttr.ZORIGINALSTABLEHASH,
    zAddAssetAttr.ZADJUSTEDSTABLEHASH
    FROM ZASSET zAsset
        LEFT JOIN ZADDITIONALASSETATTRIBUTES zAddAssetAttr ON zAddAssetAttr.Z_PK = zAsset.ZADDITIONALATTRIBUTES
        LEFT JOIN ZCLOUDMASTER zCldMast ON zAsset.ZMASTER = zCldMast.Z_PK
    WHERE zAsset.ZFAVORITE = 1
    ORDER BY zAsset.ZMODIFICATIONDATE";

const HEADERS_IOS11_14: &[&str] = &[
    "zAsset-Modification Date",
    "zAsset-Favorite",
    "zAsset-Directory-Path",
    "zAsset-Filename",
    "zAddAssetAttr- Original Filename",
    "zCldMast- Original Filename",
    "zCldMast-Import Session ID- AirDrop-StillTesting",
    "zAsset-zPK",
    "zAddAssetAttr-zPK",
    "zAsset-UUID = store.cloudphotodb",
    "zAddAssetAttr-Master Fingerprint",
];

const HEADERS_IOS15: &[&str] = &[
    "zAsset-Modification Date-0",
    "zAsset-Favorite-1",
    "zAsset-Directory-Path-2",
    "zAsset-Filename-3",
    "zAddAssetAttr- Original Filename-4",
    "zCldMast- Original Filename-5",
    "zCldMast-Import Session ID- AirDrop-StillTesting-6",
    "zAddAssetAttr- Syndication Identifier-SWY-Files-7",
    "zAsset-zPK-8",
    "zAddAssetAttr-zPK-9",
    "zAsset-UUID = store.cloudphotodb-10",
    "zAddAssetAttr-Master Fingerprint-11",
];

const HEADERS_IOS18: &[&str] = &[
    "zAsset-Modification Date-0",
    "zAsset-Favorite-1",
    "zAsset-Directory-Path-2",
    "zAsset-Filename-3",
    "zAddAssetAttr- Original Filename-4",
    "zCldMast- Original Filename-5",
    "zCldMast-Import Session ID- AirDrop-StillTesting-6",
    "zAddAssetAttr- Syndication Identifier-SWY-Files-7",
    "zAsset-zPK-8",
    "zAddAssetAttr-zPK-9",
    "zAsset-UUID = store.cloudphotodb-10",
    "zAddAssetAttr-Original Stable Hash-iOS18-11",
    "zAddAssetAttr.Adjusted Stable Hash-iOS18-12",
];

pub(crate) const VARIANTS: &[SchemaVariant] = &[
    SchemaVariant {
        label: "iOS 11-13",
        min: (11, 0, 0),
        max: Some((14, 0, 0)),
        query: QUERY_IOS11,
        headers: HEADERS_IOS11_14,
    },
    SchemaVariant {
        label: "iOS 14",
        min: (14, 0, 0),
        max: Some((15, 0, 0)),
        query: QUERY_IOS14,
        headers: HEADERS_IOS11_14,
    },
    SchemaVariant {
        label: "iOS 15-17",
        min: (15, 0, 0),
        max: Some((18, 0, 0)),
        query: QUERY_IOS15,
        headers: HEADERS_IOS15,
    },
    SchemaVariant {
        label: "iOS 18",
        min: (18, 0, 0),
        max: None,
        query: QUERY_IOS18,
        headers: HEADERS_IOS18,
    },
];

pub struct PhotosFavorite {
    descriptor: PluginDescriptor,
}

impl PhotosFavorite {
    pub fn new() -> Self {
        let descriptor = PluginDescriptor::new(
            "photos_favorite",
            KEY,
            "PhDaPL Photos.sqlite Ph7 Favorite Assets",
            "Photos.sqlite-B-Interaction_Artifacts",
            &["*/PhotoData/Photos.sqlite*"],
        )
        .with_metadata(ArtifactMetadata {
            description: Some(
                "Parses basic asset record data from PhotoData-Photos.sqlite for favorite assets \
                 and supports iOS 11-18. The results contain one record per ZASSET table Z_PK value."
                    .to_string(),
            ),
            author: Some("Scott Koenig https://theforensicscooter.com/".to_string()),
            version: Some("2.0".to_string()),
            date: Some("2024-06-12".to_string()),
            requirements: Some("Acquisition that contains PhotoData-Photos.sqlite".to_string()),
            notes: None,
        })
        .with_timeline();

        Self { descriptor }
    }
}

impl Default for PhotosFavorite {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the variant from the device version, or by probing the schema.
fn detect_variant(conn: &Connection, os_version: Option<&str>) -> Result<Option<&'static SchemaVariant>> {
    if let Some(version) = os_version.and_then(parse_os_version) {
        return Ok(schema::select_variant(VARIANTS, &version));
    }

    let label = if sqlite::table_exists(conn, "ZGENERICASSET")? {
        "iOS 11-13"
    } else if sqlite::column_exists(conn, "ZADDITIONALASSETATTRIBUTES", "ZORIGINALSTABLEHASH")? {
        "iOS 18"
    } else if sqlite::column_exists(conn, "ZADDITIONALASSETATTRIBUTES", "ZSYNDICATIONIDENTIFIER")? {
        "iOS 15-17"
    } else {
        "iOS 14"
    };

    Ok(schema::variant_by_label(VARIANTS, label))
}

impl ArtifactPlugin for PhotosFavorite {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn run(&self, files: &[PathBuf], ctx: &RunContext<'_>) -> Result<ArtifactTable> {
        let Some(db_path) = files
            .iter()
            .find(|f| f.to_string_lossy().ends_with(".sqlite"))
        else {
            info!("No Photos.sqlite database among {} resolved files", files.len());
            return Ok(ArtifactTable::empty());
        };

        let conn = sqlite::open_readonly(db_path)?;

        let Some(variant) = detect_variant(&conn, ctx.os_version)? else {
            info!(
                "Unsupported version for PhotoData-Photos.sqlite favorite assets from iOS {}",
                ctx.os_version.unwrap_or("unknown")
            );
            return Ok(ArtifactTable::empty());
        };

        let table = schema::extract(&conn, variant)
            .with_context(|| format!("Favorite asset query ({}) failed", variant.label))?;

        if table.is_empty() {
            info!("No data available for PhotoData-Photos.sqlite Favorite Assets");
        }

        Ok(table.with_source(db_path).with_description(format!(
            "Favorite assets from PhotoData-Photos.sqlite ({}). One record per ZASSET table Z_PK value.",
            variant.label
        )))
    }
}
