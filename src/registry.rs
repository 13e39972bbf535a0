//! Plugin registry for the extraction engine.
//!
//! Plugins are registered explicitly from a compiled-in table (see
//! [`crate::artifacts::builtin_plugins`]) instead of being discovered by
//! scanning a source directory at runtime.
//!
//! # Validation
//!
//! Each plugin must carry a name, a category and at least one well-formed
//! search pattern. A plugin that fails validation is logged and left out of
//! the catalogue; the rest of the table still loads. Two plugins with the same
//! identity make the whole catalogue unusable and fail the build, even when
//! one of them would have been rejected.
//!
//! # Ordering
//!
//! Iteration is sorted by category, then name. Report grouping and execution
//! order both follow it.

use crate::error::{LeappError, Result};
use crate::plugin::{ArtifactPlugin, PluginDescriptor};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// The full set of registered plugins.
pub struct Catalogue {
    plugins: Vec<Box<dyn ArtifactPlugin>>,
    index: HashMap<String, usize>,
    rejected: Vec<(String, String)>,
}

impl Catalogue {
    /// Builds the catalogue from the compiled-in plugin table.
    pub fn discover() -> Result<Self> {
        Self::from_plugins(crate::artifacts::builtin_plugins())
    }

    /// Builds a catalogue from an arbitrary plugin set.
    pub fn from_plugins(candidates: Vec<Box<dyn ArtifactPlugin>>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(candidates.len());
        for plugin in &candidates {
            let identity = plugin.descriptor().identity.as_str();
            if !identity.trim().is_empty() && !seen.insert(identity) {
                return Err(LeappError::DuplicateIdentity(identity.to_string()));
            }
        }

        let mut plugins: Vec<Box<dyn ArtifactPlugin>> = Vec::with_capacity(candidates.len());
        let mut rejected = Vec::new();

        for plugin in candidates {
            match validate_descriptor(plugin.descriptor()) {
                Ok(()) => plugins.push(plugin),
                Err(e) => {
                    warn!("Skipping plugin: {}", e);
                    if let LeappError::Discovery { identity, reason } = e {
                        rejected.push((identity, reason));
                    }
                }
            }
        }

        plugins.sort_by(|a, b| sort_key(a.descriptor()).cmp(&sort_key(b.descriptor())));

        let mut index = HashMap::with_capacity(plugins.len());
        for (position, plugin) in plugins.iter().enumerate() {
            let identity = plugin.descriptor().identity.clone();
            if index.insert(identity.clone(), position).is_some() {
                return Err(LeappError::DuplicateIdentity(identity));
            }
        }

        debug!(
            "Registered {} plugins ({} rejected)",
            plugins.len(),
            rejected.len()
        );

        Ok(Self {
            plugins,
            index,
            rejected,
        })
    }

    /// Looks up a plugin by identity.
    pub fn get(&self, identity: &str) -> Option<&dyn ArtifactPlugin> {
        self.index
            .get(identity)
            .map(|&position| self.plugins[position].as_ref())
    }

    pub fn descriptor(&self, identity: &str) -> Option<&PluginDescriptor> {
        self.get(identity).map(|p| p.descriptor())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    /// Iterates plugins in catalogue order (category, then name).
    pub fn iter(&self) -> impl Iterator<Item = &dyn ArtifactPlugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.iter().map(|p| p.descriptor())
    }

    /// Identities in catalogue order.
    pub fn identities(&self) -> Vec<String> {
        self.descriptors().map(|d| d.identity.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins excluded at registration, with the reason.
    pub fn rejected(&self) -> &[(String, String)] {
        &self.rejected
    }
}

fn sort_key(d: &PluginDescriptor) -> (String, String, &str) {
    (d.category.to_lowercase(), d.name.to_lowercase(), d.identity.as_str())
}

fn validate_descriptor(d: &PluginDescriptor) -> Result<()> {
    let fail = |reason: &str| LeappError::Discovery {
        identity: d.identity.clone(),
        reason: reason.to_string(),
    };

    if d.identity.trim().is_empty() {
        return Err(fail("missing identity"));
    }
    if d.name.trim().is_empty() {
        return Err(fail("missing name"));
    }
    if d.category.trim().is_empty() {
        return Err(fail("missing category"));
    }
    if d.search_patterns.is_empty() {
        return Err(fail("no search patterns"));
    }

    for pattern in &d.search_patterns {
        if pattern.trim().is_empty() {
            return Err(fail("empty search pattern"));
        }
        if let Err(e) = glob::Pattern::new(pattern) {
            return Err(fail(&format!("bad search pattern {:?}: {}", pattern, e)));
        }
    }

    Ok(())
}
