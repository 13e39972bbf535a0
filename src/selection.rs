//! Plugin selection and profile persistence.
//!
//! Selection refers to plugins by identity only. Filtering changes what a
//! front-end shows, never what is selected.

use crate::error::{LeappError, Result};
use crate::registry::Catalogue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Marker stored in the `leapp` key of a profile file.
pub const PROFILE_MARKER: &str = "profile";

/// Current profile format version.
pub const PROFILE_FORMAT_VERSION: u32 = 1;

/// Plugins left disabled in a fresh selection because they are slow.
pub const DEFAULT_EXCLUDED: &[&str] = &[];

/// Selection flag plus the display fields a front-end needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEntry {
    pub enabled: bool,
    pub category: String,
    pub name: String,
}

/// On-disk profile format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub leapp: String,
    pub format_version: u32,
    pub plugins: Vec<String>,
}

impl Profile {
    pub fn new(plugins: Vec<String>) -> Self {
        Self {
            leapp: PROFILE_MARKER.to_string(),
            format_version: PROFILE_FORMAT_VERSION,
            plugins,
        }
    }

    /// Reads and validates a profile file.
    pub fn read(path: &Path) -> Result<Self> {
        let format_error = |reason: String| LeappError::ProfileFormat {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| format_error(e.to_string()))?;
        let profile: Profile =
            serde_json::from_str(&content).map_err(|e| format_error(e.to_string()))?;

        if profile.leapp != PROFILE_MARKER {
            return Err(format_error(format!(
                "expected marker {:?}, found {:?}",
                PROFILE_MARKER, profile.leapp
            )));
        }
        if profile.format_version != PROFILE_FORMAT_VERSION {
            return Err(format_error(format!(
                "unsupported format version {}",
                profile.format_version
            )));
        }

        Ok(profile)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Which plugins are enabled for the next run.
///
/// Every catalogue identity has an entry for the lifetime of the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    entries: BTreeMap<String, SelectionEntry>,
    order: Vec<String>,
}

impl SelectionState {
    /// All plugins enabled except those named in `exclude_by_default`.
    pub fn initialize(catalogue: &Catalogue, exclude_by_default: &[&str]) -> Self {
        let mut entries = BTreeMap::new();
        let mut order = Vec::with_capacity(catalogue.len());

        for d in catalogue.descriptors() {
            let enabled = !exclude_by_default.contains(&d.identity.as_str());
            entries.insert(
                d.identity.clone(),
                SelectionEntry {
                    enabled,
                    category: d.category.clone(),
                    name: d.name.clone(),
                },
            );
            order.push(d.identity.clone());
        }

        Self { entries, order }
    }

    /// Sets one plugin's flag. Returns false for an unknown identity.
    pub fn toggle(&mut self, identity: &str, enabled: bool) -> bool {
        match self.entries.get_mut(identity) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        self.set_all(true);
    }

    pub fn deselect_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, enabled: bool) {
        for entry in self.entries.values_mut() {
            entry.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, identity: &str) -> bool {
        self.entries.get(identity).map(|e| e.enabled).unwrap_or(false)
    }

    pub fn entry(&self, identity: &str) -> Option<&SelectionEntry> {
        self.entries.get(identity)
    }

    /// Identities whose category or name contains `text`, case-insensitively,
    /// in catalogue order.
    pub fn filter(&self, text: &str) -> Vec<String> {
        let needle = text.trim().to_lowercase();

        self.order
            .iter()
            .filter(|identity| {
                if needle.is_empty() {
                    return true;
                }
                let entry = &self.entries[identity.as_str()];
                format!("{} {}", entry.category, entry.name)
                    .to_lowercase()
                    .contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// The current working set.
    pub fn selected(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// The working set in catalogue order.
    pub fn selected_in_order(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.is_enabled(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save_profile(&self, path: &Path) -> Result<()> {
        Profile::new(self.selected_in_order()).write(path)?;
        info!("Profile saved to {:?}", path);
        Ok(())
    }

    /// Replaces the selection with the profile's plugins.
    ///
    /// Leaves the state untouched on any error. Identities unknown to the
    /// catalogue are dropped. Returns how many identities were applied.
    pub fn load_profile(&mut self, path: &Path) -> Result<usize> {
        let profile = Profile::read(path)?;
        Ok(self.apply_profile(&profile))
    }

    pub fn apply_profile(&mut self, profile: &Profile) -> usize {
        self.deselect_all();

        let mut applied = 0;
        for identity in &profile.plugins {
            if self.toggle(identity, true) {
                applied += 1;
            } else {
                debug!("Profile references unknown plugin {}", identity);
            }
        }

        applied
    }
}
