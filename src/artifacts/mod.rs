//! Compiled-in artifact parsers.
//!
//! Adding a parser means adding a module here and one line to
//! [`builtin_plugins`].

pub mod photos_favorite;

pub use photos_favorite::PhotosFavorite;

use crate::plugin::ArtifactPlugin;

/// The plugin table handed to [`crate::Catalogue::discover`].
pub fn builtin_plugins() -> Vec<Box<dyn ArtifactPlugin>> {
    vec![Box::new(PhotosFavorite::new())]
}
