use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use modforge_schema::DEFAULT_PHONE_REGION;
use serde::{Deserialize, Serialize};

/// Options for the generation engine.
///
/// Every directory and registry path is relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Project root the generated module is written into.
    pub root: PathBuf,
    /// Directory holding one sub-directory per module.
    pub modules_dir: PathBuf,
    /// Directory for migration scripts.
    pub migrations_dir: PathBuf,
    /// Directory for seed scripts.
    pub seeds_dir: PathBuf,
    /// Module-composition registry (`pub mod ...;` plus route merging).
    pub module_registry: PathBuf,
    /// Entity registry listing every record type.
    pub entity_registry: PathBuf,
    /// Migration registry listing migration names in apply order.
    pub migration_registry: PathBuf,
    /// Entity referenced by operator columns.
    pub user_entity: String,
    /// Role granted every permission of a new module by the seed script.
    pub super_admin_role: String,
    /// Region whose format local phone number fields are validated against.
    pub phone_region: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            modules_dir: PathBuf::from("src/modules"),
            migrations_dir: PathBuf::from("migrations"),
            seeds_dir: PathBuf::from("seeds"),
            module_registry: PathBuf::from("src/modules/mod.rs"),
            entity_registry: PathBuf::from("src/entities.rs"),
            migration_registry: PathBuf::from("src/migrations.rs"),
            user_entity: "User".to_string(),
            super_admin_role: "Super Admin".to_string(),
            phone_region: DEFAULT_PHONE_REGION.to_string(),
        }
    }
}

impl GenerateOptions {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Absolute (root-joined) form of a configured relative path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.root.join(&self.modules_dir).join(module)
    }
}

/// Structured generation issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl GenerationIssue {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            module: None,
            artifact: None,
        }
    }

    pub fn in_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    pub fn for_artifact(mut self, artifact: &str) -> Self {
        self.artifact = Some(artifact.to_string());
        self
    }
}

/// Relation mirrored onto another module during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WiredRelation {
    pub field: String,
    pub target_module: String,
    pub inverse_property: String,
}

/// Report for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub module: String,
    pub migration: String,
    /// Files written by the commit, relative to the project root.
    pub files_written: Vec<PathBuf>,
    pub wired: Vec<WiredRelation>,
    /// Registries that received a new entry (already present ones are skipped).
    pub registries_updated: Vec<PathBuf>,
    pub duration_ms: u64,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn new(run_id: String, module: String) -> Self {
        Self {
            run_id,
            module,
            ..Self::default()
        }
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }
}
