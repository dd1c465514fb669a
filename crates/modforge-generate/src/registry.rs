//! Anchor-based registry updates.
//!
//! Each registry file carries anchor comments (`// @modforge:<name>`). New
//! entries are inserted on their own line right above the anchor, indented
//! like it. An entry whose identifier already appears is left alone.

use std::path::Path;

use regex::Regex;

use crate::errors::{GenerateError, Result};

pub const MODULES_ANCHOR: &str = "// @modforge:modules";
pub const ROUTES_ANCHOR: &str = "// @modforge:routes";
pub const ENTITIES_ANCHOR: &str = "// @modforge:entities";
pub const MIGRATIONS_ANCHOR: &str = "// @modforge:migrations";

/// Contents of a module registry that does not exist yet.
pub const MODULE_REGISTRY_SCAFFOLD: &str = "\
// Module registry maintained by modforge.
use axum::Router;

use crate::state::AppState;

// @modforge:modules

pub fn router() -> Router<AppState> {
    Router::new()
        // @modforge:routes
}
";

pub const ENTITY_REGISTRY_SCAFFOLD: &str = "\
// Entity registry maintained by modforge.
// @modforge:entities
";

pub const MIGRATION_REGISTRY_SCAFFOLD: &str = "\
// Migration registry maintained by modforge, in apply order.
pub const MIGRATIONS: &[&str] = &[
    // @modforge:migrations
];
";

/// A line to insert above an anchor, unless `identifier` already matches.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub anchor: &'static str,
    pub line: String,
    pub identifier: Regex,
}

impl RegistryEntry {
    pub fn module(module: &str) -> Result<Self> {
        Ok(Self {
            anchor: MODULES_ANCHOR,
            line: format!("pub mod {module};"),
            identifier: Regex::new(&format!(r"\bmod\s+{}\s*;", regex::escape(module)))?,
        })
    }

    pub fn routes(module: &str) -> Result<Self> {
        Ok(Self {
            anchor: ROUTES_ANCHOR,
            line: format!(".merge({module}::router())"),
            identifier: Regex::new(&format!(r"\b{}::router\b", regex::escape(module)))?,
        })
    }

    pub fn entity(module: &str, class_name: &str) -> Result<Self> {
        Ok(Self {
            anchor: ENTITIES_ANCHOR,
            line: format!("pub use crate::modules::{module}::entity::{class_name};"),
            identifier: Regex::new(&format!(
                r"\b{}::entity::{}\b",
                regex::escape(module),
                regex::escape(class_name)
            ))?,
        })
    }

    pub fn migration(name: &str) -> Result<Self> {
        Ok(Self {
            anchor: MIGRATIONS_ANCHOR,
            line: format!("\"{name}\","),
            identifier: Regex::new(&format!("\"{}\"", regex::escape(name)))?,
        })
    }
}

/// Insert `entry` into `contents`.
///
/// Returns `Ok(None)` when the identifier is already present and
/// [`GenerateError::MissingAnchor`] when the anchor line cannot be found.
pub fn insert_entry(path: &Path, contents: &str, entry: &RegistryEntry) -> Result<Option<String>> {
    if entry.identifier.is_match(contents) {
        return Ok(None);
    }

    let mut output = String::with_capacity(contents.len() + entry.line.len() + 8);
    let mut inserted = false;
    for line in contents.split_inclusive('\n') {
        if !inserted && line.trim() == entry.anchor {
            let indent: String = line.chars().take_while(|ch| ch.is_whitespace()).collect();
            output.push_str(&indent);
            output.push_str(&entry.line);
            output.push('\n');
            inserted = true;
        }
        output.push_str(line);
    }

    if !inserted {
        return Err(GenerateError::MissingAnchor {
            path: path.to_path_buf(),
            anchor: entry.anchor.to_string(),
        });
    }
    Ok(Some(output))
}
