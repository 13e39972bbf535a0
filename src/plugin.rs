//! Plugin contract shared by every artifact parser.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Informational fields carried by a plugin. No execution effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub description: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub requirements: Option<String>,
    pub notes: Option<String>,
}

/// How the aggregator should treat a plugin's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHints {
    /// Output is too large for the HTML report; meant for an external viewer.
    pub lava_only: bool,
    /// First column is a timestamp; rows go to the shared timeline.
    pub timeline: bool,
}

/// Static description of one artifact parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub identity: String,
    pub name: String,
    pub category: String,
    pub search_patterns: Vec<String>,
    pub metadata: ArtifactMetadata,
    pub output: OutputHints,
}

impl PluginDescriptor {
    /// Identity is `<module>.<key>`, so two modules may reuse an artifact key.
    pub fn new(
        module: &str,
        key: &str,
        name: impl Into<String>,
        category: impl Into<String>,
        search_patterns: &[&str],
    ) -> Self {
        Self {
            identity: format!("{}.{}", module, key),
            name: name.into(),
            category: category.into(),
            search_patterns: search_patterns.iter().map(|p| p.to_string()).collect(),
            metadata: ArtifactMetadata::default(),
            output: OutputHints::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ArtifactMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timeline(mut self) -> Self {
        self.output.timeline = true;
        self
    }

    pub fn with_lava_only(mut self) -> Self {
        self.output.lava_only = true;
        self
    }

    /// File-system safe form of the identity, used for fragment files.
    /// Names may repeat across categories; identities may not.
    pub fn file_stem(&self) -> String {
        sanitize_file_name(&self.identity)
    }
}

/// Replace characters that are unsafe in file names on any platform.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        String::from("_")
    } else {
        cleaned
    }
}

/// Everything a plugin receives besides its resolved files.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    /// Folder the plugin may write extra material (media, exports) into.
    /// Not created up front; a plugin that writes here creates it.
    pub report_folder: &'a Path,
    /// Root of the extraction, read-only.
    pub input_root: &'a Path,
    pub wrap_text: bool,
    /// Offset string handed through to timestamp formatting, e.g. `"UTC"` or `"+02:00"`.
    pub timezone_offset: &'a str,
    /// Device OS version when known, e.g. `"17.4"`.
    pub os_version: Option<&'a str>,
}

/// Tabular output of a plugin. An empty table means "no data".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Source file the rows were read from.
    pub source: Option<PathBuf>,
    pub description: Option<String>,
}

impl ArtifactTable {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Table for a plugin that found nothing to report.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trait every artifact parser implements.
///
/// `run` signals failure only through `Err`; "no data" is an empty table.
pub trait ArtifactPlugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    fn run(&self, files: &[PathBuf], ctx: &RunContext<'_>) -> anyhow::Result<ArtifactTable>;
}

type EntryPoint =
    dyn Fn(&[PathBuf], &RunContext<'_>) -> anyhow::Result<ArtifactTable> + Send + Sync;

/// Plugin backed by a plain function or closure.
pub struct FnPlugin {
    descriptor: PluginDescriptor,
    entry: Box<EntryPoint>,
}

impl FnPlugin {
    pub fn new<F>(descriptor: PluginDescriptor, entry: F) -> Self
    where
        F: Fn(&[PathBuf], &RunContext<'_>) -> anyhow::Result<ArtifactTable> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            entry: Box::new(entry),
        }
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("identity", &self.descriptor.identity)
            .finish()
    }
}

impl ArtifactPlugin for FnPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn run(&self, files: &[PathBuf], ctx: &RunContext<'_>) -> anyhow::Result<ArtifactTable> {
        (self.entry)(files, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_module_qualified() {
        let d = PluginDescriptor::new("photos", "Ph7-Favorite", "Favorites", "Photos", &["*/a.db"]);
        assert_eq!(d.identity, "photos.Ph7-Favorite");
        assert_eq!(d.search_patterns, vec!["*/a.db".to_string()]);
        assert!(!d.output.timeline);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_file_name("  "), "_");
        assert_eq!(sanitize_file_name("Ph7 Favorite Assets"), "Ph7 Favorite Assets");
    }

    #[test]
    fn test_fn_plugin_delegates() {
        let d = PluginDescriptor::new("m", "k", "n", "c", &["*"]);
        let plugin = FnPlugin::new(d, |files, _ctx| {
            let mut table = ArtifactTable::new(&["count"]);
            table.push_row(vec![files.len().to_string()]);
            Ok(table)
        });

        let ctx = RunContext {
            report_folder: Path::new("/tmp/out"),
            input_root: Path::new("/tmp/in"),
            wrap_text: false,
            timezone_offset: "UTC",
            os_version: None,
        };
        let table = plugin.run(&[PathBuf::from("x")], &ctx).unwrap();
        assert_eq!(table.rows, vec![vec!["1".to_string()]]);
    }
}
