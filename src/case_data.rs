//! Case metadata shown on the report banner.

use crate::error::{LeappError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Marker stored in the `leapp` key of a case data file.
pub const CASE_DATA_MARKER: &str = "case_data";

/// Recognised case data fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CaseField {
    CaseNumber,
    Agency,
    AgencyLogo,
    AgencyLogoMimetype,
    AgencyLogoBase64,
    Examiner,
}

impl CaseField {
    pub const ALL: [CaseField; 6] = [
        CaseField::CaseNumber,
        CaseField::Agency,
        CaseField::AgencyLogo,
        CaseField::AgencyLogoMimetype,
        CaseField::AgencyLogoBase64,
        CaseField::Examiner,
    ];

    /// Key used in the case data file.
    pub fn key(&self) -> &'static str {
        match self {
            CaseField::CaseNumber => "Case Number",
            CaseField::Agency => "Agency",
            CaseField::AgencyLogo => "Agency Logo",
            CaseField::AgencyLogoMimetype => "Agency Logo mimetype",
            CaseField::AgencyLogoBase64 => "Agency Logo base64",
            CaseField::Examiner => "Examiner",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }

    /// Fields printed as text on the banner. Logo fields are rendered as an image.
    fn is_banner_text(&self) -> bool {
        matches!(
            self,
            CaseField::CaseNumber | CaseField::Agency | CaseField::Examiner
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CaseDataFile {
    leapp: String,
    #[serde(default)]
    case_data_values: BTreeMap<String, String>,
}

/// Case number, agency, logo and examiner for the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseData {
    values: BTreeMap<CaseField, String>,
}

impl CaseData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a case data file into a fresh value.
    pub fn read(path: &Path) -> Result<Self> {
        let mut data = Self::new();
        data.load(path)?;
        Ok(data)
    }

    pub fn get(&self, field: CaseField) -> Option<&str> {
        self.values.get(&field).map(|v| v.as_str())
    }

    /// Sets a field. An empty value clears it.
    pub fn set(&mut self, field: CaseField, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Text fields for the report banner, in display order.
    pub fn banner(&self) -> Vec<(&'static str, &str)> {
        self.values
            .iter()
            .filter(|(field, _)| field.is_banner_text())
            .map(|(field, value)| (field.key(), value.as_str()))
            .collect()
    }

    /// Logo as a `data:` URI, when one is embedded.
    pub fn logo_data_uri(&self) -> Option<String> {
        let mimetype = self.get(CaseField::AgencyLogoMimetype)?;
        let body = self.get(CaseField::AgencyLogoBase64)?;
        Some(format!("data:{};base64,{}", mimetype, body))
    }

    /// Embeds an agency logo image.
    pub fn set_agency_logo(&mut self, path: &Path) -> Result<()> {
        let mimetype = image_mimetype(path).ok_or_else(|| {
            LeappError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Unsupported logo image type: {:?}", path),
            ))
        })?;
        let bytes = fs::read(path)?;

        self.set(CaseField::AgencyLogo, path.to_string_lossy());
        self.set(CaseField::AgencyLogoMimetype, mimetype);
        self.set(CaseField::AgencyLogoBase64, STANDARD.encode(bytes));
        Ok(())
    }

    /// Merges recognised fields from a case data file. Unknown keys are ignored.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let format_error = |reason: String| LeappError::CaseDataFormat {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| format_error(e.to_string()))?;
        let file: CaseDataFile =
            serde_json::from_str(&content).map_err(|e| format_error(e.to_string()))?;

        if file.leapp != CASE_DATA_MARKER {
            return Err(format_error(format!(
                "expected marker {:?}, found {:?}",
                CASE_DATA_MARKER, file.leapp
            )));
        }

        for (key, value) in file.case_data_values {
            match CaseField::from_key(&key) {
                Some(field) => self.set(field, value),
                None => debug!("Ignoring unknown case data field {:?}", key),
            }
        }

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = CaseDataFile {
            leapp: CASE_DATA_MARKER.to_string(),
            case_data_values: self
                .values
                .iter()
                .map(|(field, value)| (field.key().to_string(), value.clone()))
                .collect(),
        };

        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

fn image_mimetype(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_string_lossy().to_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.json");

        let mut data = CaseData::new();
        data.set(CaseField::CaseNumber, "2024-001");
        data.set(CaseField::Agency, "Test PD");
        data.set(CaseField::Examiner, "J. Doe");
        data.save(&path).unwrap();

        let loaded = CaseData::read(&path).unwrap();
        assert_eq!(loaded, data);
        assert_eq!(loaded.get(CaseField::CaseNumber), Some("2024-001"));
        assert_eq!(loaded.get(CaseField::Agency), Some("Test PD"));
        assert_eq!(loaded.get(CaseField::Examiner), Some("J. Doe"));
    }

    #[test]
    fn test_unknown_keys_ignored_and_merged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.json");
        fs::write(
            &path,
            r#"{"leapp": "case_data", "case_data_values": {"Examiner": "A. Smith", "Badge": "42"}}"#,
        )
        .unwrap();

        let mut data = CaseData::new();
        data.set(CaseField::CaseNumber, "7");
        data.load(&path).unwrap();

        assert_eq!(data.get(CaseField::Examiner), Some("A. Smith"));
        assert_eq!(data.get(CaseField::CaseNumber), Some("7"));
        assert_eq!(data.banner().len(), 2);
    }

    #[test]
    fn test_wrong_marker_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.json");
        fs::write(&path, r#"{"leapp": "profile", "case_data_values": {}}"#).unwrap();

        assert!(matches!(
            CaseData::read(&path),
            Err(LeappError::CaseDataFormat { .. })
        ));
    }

    #[test]
    fn test_agency_logo_embedding() {
        let dir = TempDir::new().unwrap();
        let logo = dir.path().join("logo.PNG");
        fs::write(&logo, b"abc").unwrap();

        let mut data = CaseData::new();
        data.set_agency_logo(&logo).unwrap();

        assert_eq!(data.get(CaseField::AgencyLogoMimetype), Some("image/png"));
        assert_eq!(data.logo_data_uri().unwrap(), "data:image/png;base64,YWJj");
        assert!(data.banner().is_empty());

        assert!(data.set_agency_logo(&dir.path().join("logo.txt")).is_err());
    }

    #[test]
    fn test_clear() {
        let mut data = CaseData::new();
        data.set(CaseField::Agency, "Test PD");
        data.clear();
        assert!(data.is_empty());
    }
}
