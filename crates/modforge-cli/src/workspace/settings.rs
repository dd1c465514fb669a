use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use modforge_core::{ColumnType, EntitySummary, KeyColumn, RuntimeType, StorageType};
use modforge_generate::GenerateOptions;
use modforge_schema::{DEFAULT_PHONE_REGION, ValidationOptions};
use serde::{Deserialize, Serialize};

use super::atomic::write_bytes_atomic;
use super::{WorkspacePaths, WorkspaceResult};

/// Project settings stored in `modforge.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModforgeSettings {
    pub modules_dir: PathBuf,
    pub migrations_dir: PathBuf,
    pub seeds_dir: PathBuf,
    pub module_registry: PathBuf,
    pub entity_registry: PathBuf,
    pub migration_registry: PathBuf,
    pub phone_region: String,
    pub user_entity: String,
    pub super_admin_role: String,
    pub pipeline: PipelineSettings,
    /// Entities that exist in the project but were not generated by modforge.
    pub entities: Vec<EntitySummary>,
}

/// Post-generation commands as argv lists. An empty list skips the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub build: Vec<String>,
    pub format: Vec<String>,
    pub migrate: Vec<String>,
    pub seed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Build,
    Format,
    Migrate,
    Seed,
}

impl PipelineStep {
    pub const ORDER: [PipelineStep; 4] = [
        PipelineStep::Build,
        PipelineStep::Format,
        PipelineStep::Migrate,
        PipelineStep::Seed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Build => "build",
            PipelineStep::Format => "format",
            PipelineStep::Migrate => "migrate",
            PipelineStep::Seed => "seed",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineSettings {
    pub fn command(&self, step: PipelineStep) -> &[String] {
        match step {
            PipelineStep::Build => &self.build,
            PipelineStep::Format => &self.format,
            PipelineStep::Migrate => &self.migrate,
            PipelineStep::Seed => &self.seed,
        }
    }

    /// A pipeline that runs nothing.
    pub fn disabled() -> Self {
        Self {
            build: Vec::new(),
            format: Vec::new(),
            migrate: Vec::new(),
            seed: Vec::new(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let argv = |parts: &[&str]| parts.iter().map(|part| part.to_string()).collect();
        Self {
            build: argv(&["cargo", "build"]),
            format: argv(&["cargo", "fmt"]),
            migrate: argv(&["sqlx", "migrate", "run"]),
            seed: Vec::new(),
        }
    }
}

impl Default for ModforgeSettings {
    fn default() -> Self {
        let generate = GenerateOptions::default();
        Self {
            modules_dir: generate.modules_dir,
            migrations_dir: generate.migrations_dir,
            seeds_dir: generate.seeds_dir,
            module_registry: generate.module_registry,
            entity_registry: generate.entity_registry,
            migration_registry: generate.migration_registry,
            phone_region: DEFAULT_PHONE_REGION.to_string(),
            user_entity: generate.user_entity,
            super_admin_role: generate.super_admin_role,
            pipeline: PipelineSettings::default(),
            entities: vec![default_user()],
        }
    }
}

fn default_user() -> EntitySummary {
    EntitySummary {
        class_name: "User".to_string(),
        module: "user".to_string(),
        table: "user".to_string(),
        primary_keys: vec![KeyColumn {
            property: "id".to_string(),
            column: "id".to_string(),
            column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
        }],
        public_names: BTreeSet::from(["id".to_string(), "email".to_string(), "name".to_string()]),
    }
}

impl ModforgeSettings {
    pub fn generate_options(&self, root: PathBuf) -> GenerateOptions {
        GenerateOptions {
            root,
            modules_dir: self.modules_dir.clone(),
            migrations_dir: self.migrations_dir.clone(),
            seeds_dir: self.seeds_dir.clone(),
            module_registry: self.module_registry.clone(),
            entity_registry: self.entity_registry.clone(),
            migration_registry: self.migration_registry.clone(),
            user_entity: self.user_entity.clone(),
            super_admin_role: self.super_admin_role.clone(),
            phone_region: self.phone_region.clone(),
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            phone_region: self.phone_region.clone(),
            user_entity: self.user_entity.clone(),
        }
    }
}

pub fn load_or_create_settings(paths: &WorkspacePaths) -> WorkspaceResult<ModforgeSettings> {
    let path = paths.settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: ModforgeSettings = toml::from_str(&content)?;
        return Ok(settings);
    }

    let settings = ModforgeSettings::default();
    save_settings(paths, &settings)?;
    Ok(settings)
}

pub fn save_settings(paths: &WorkspacePaths, settings: &ModforgeSettings) -> WorkspaceResult<()> {
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(&paths.settings_path(), encoded.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_are_created_then_reloaded() {
        let root = std::env::temp_dir().join(format!("modforge_settings_{}", uuid::Uuid::new_v4()));
        let paths = WorkspacePaths::new(root);
        paths.ensure_dirs().unwrap();

        let mut created = load_or_create_settings(&paths).unwrap();
        assert!(paths.settings_path().exists());
        assert_eq!(created.entities[0].class_name, "User");

        created.phone_region = "US".to_string();
        created.pipeline.seed = vec!["mysql".to_string(), "-e".to_string(), "SELECT 1".to_string()];
        save_settings(&paths, &created).unwrap();

        let loaded = load_or_create_settings(&paths).unwrap();
        assert_eq!(loaded.phone_region, "US");
        assert_eq!(loaded.pipeline.command(PipelineStep::Seed).len(), 3);
        assert_eq!(loaded.entities, created.entities);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings: ModforgeSettings = toml::from_str(
            r#"
modules_dir = "app/modules"

[pipeline]
build = []
"#,
        )
        .unwrap();
        assert_eq!(settings.modules_dir, PathBuf::from("app/modules"));
        assert!(settings.pipeline.build.is_empty());
        assert_eq!(settings.pipeline.format, vec!["cargo", "fmt"]);
        assert_eq!(settings.user_entity, "User");
    }
}
