//! Artifact rendering from a [`ModuleModel`].
//!
//! Generated sources target an axum + sqlx (MySQL) host crate which provides
//! `crate::state::AppState` (with a `pool`), `crate::error::ApiError`,
//! `crate::pagination::ListQuery` and, for operator columns,
//! `crate::auth::Actor`.

mod dto;
mod entity;
mod permissions;
mod repository;
mod routes;
mod sql;

use std::fmt;
use std::path::PathBuf;

use modforge_core::naming::{pascal, rust_ident};
use modforge_core::{ColumnType, KeyColumn};
use tracing::warn;

use crate::errors::{GenerateError, Result};
use crate::model::{GenerateOptions, GenerationIssue};
use crate::module::{MODULE_MODEL_FILE, ModuleModel};

pub use permissions::{PERMISSION_ACTIONS, permission_slug};
pub use sql::migration_name;

pub const GENERATED_HEADER: &str =
    "// @generated by modforge from module.json; changes here are overwritten.\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    ModuleRoot,
    Entity,
    Repository,
    Dto,
    Routes,
    Permissions,
    Model,
    Migration,
    Seed,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::ModuleRoot => "module_root",
            ArtifactKind::Entity => "entity",
            ArtifactKind::Repository => "repository",
            ArtifactKind::Dto => "dto",
            ArtifactKind::Routes => "routes",
            ArtifactKind::Permissions => "permissions",
            ArtifactKind::Model => "model",
            ArtifactKind::Migration => "migration",
            ArtifactKind::Seed => "seed",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered file, relative to the project root.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub contents: String,
}

/// Renders module artifacts. Failures are per artifact: a broken artifact
/// is reported and skipped while the others still render.
#[derive(Debug, Clone)]
pub struct Renderer<'a> {
    options: &'a GenerateOptions,
}

/// Rendered artifacts plus the issues of those that failed.
#[derive(Debug, Default)]
pub struct Rendered {
    pub artifacts: Vec<Artifact>,
    pub issues: Vec<GenerationIssue>,
}

impl Rendered {
    fn push(&mut self, model: &ModuleModel, kind: ArtifactKind, path: PathBuf, result: Result<String>) {
        match result {
            Ok(contents) => self.artifacts.push(Artifact {
                kind,
                path,
                contents,
            }),
            Err(err) => {
                warn!(
                    module = %model.entity.module,
                    artifact = %kind,
                    error = %err,
                    "artifact render failed"
                );
                self.issues.push(
                    GenerationIssue::warning("render_failed", err.to_string())
                        .in_module(&model.entity.module)
                        .for_artifact(kind.as_str()),
                );
            }
        }
    }
}

impl<'a> Renderer<'a> {
    pub fn new(options: &'a GenerateOptions) -> Self {
        Self { options }
    }

    /// Source files and the persisted model of a module.
    pub fn module_sources(&self, model: &ModuleModel) -> Rendered {
        let dir = self.options.modules_dir.join(&model.entity.module);
        let mut rendered = Rendered::default();
        rendered.push(model, ArtifactKind::ModuleRoot, dir.join("mod.rs"), render_module_root(model));
        rendered.push(model, ArtifactKind::Entity, dir.join("entity.rs"), entity::render(model));
        rendered.push(
            model,
            ArtifactKind::Repository,
            dir.join("repository.rs"),
            repository::render(model),
        );
        rendered.push(
            model,
            ArtifactKind::Dto,
            dir.join("dto.rs"),
            dto::render(model, &self.options.phone_region),
        );
        rendered.push(model, ArtifactKind::Routes, dir.join("routes.rs"), routes::render(model));
        rendered.push(
            model,
            ArtifactKind::Permissions,
            dir.join("permissions.rs"),
            permissions::render(model),
        );
        rendered.push(model, ArtifactKind::Model, dir.join(MODULE_MODEL_FILE), model.to_json());
        rendered
    }

    /// Migration and, when enabled, the permission seed of a new module.
    pub fn scripts(&self, model: &ModuleModel) -> Rendered {
        let mut rendered = Rendered::default();
        rendered.push(
            model,
            ArtifactKind::Migration,
            self.options
                .migrations_dir
                .join(format!("{}.sql", model.migration)),
            sql::render_migration(model),
        );
        if model.creation.with_seed {
            rendered.push(
                model,
                ArtifactKind::Seed,
                self.options
                    .seeds_dir
                    .join(format!("{}_permissions.sql", model.entity.module)),
                sql::render_seed(model, &self.options.super_admin_role),
            );
        }
        rendered
    }
}

fn render_module_root(model: &ModuleModel) -> Result<String> {
    let mut out = String::from(GENERATED_HEADER);
    out.push_str(&format!("//! {} module.\n\n", model.entity.class_name));
    for module in ["dto", "entity", "permissions", "repository", "routes"] {
        out.push_str(&format!("pub mod {module};\n"));
    }
    out.push_str("\npub use routes::router;\n");
    Ok(out)
}

fn render_error(artifact: ArtifactKind, message: impl Into<String>) -> GenerateError {
    GenerateError::Render {
        artifact: artifact.to_string(),
        message: message.into(),
    }
}

/// Rust type of a key tuple; a single key is used bare.
fn key_type(keys: &[KeyColumn], artifact: ArtifactKind) -> Result<String> {
    match keys {
        [] => Err(render_error(artifact, "entity has no primary key")),
        [key] => Ok(column_rust_type(&key.column_type, "")),
        keys => {
            let parts: Vec<String> = keys
                .iter()
                .map(|key| column_rust_type(&key.column_type, ""))
                .collect();
            Ok(format!("({})", parts.join(", ")))
        }
    }
}

fn column_rust_type(column_type: &ColumnType, enum_name: &str) -> String {
    column_type
        .runtime
        .rust_type()
        .map_or_else(|| enum_name.to_string(), str::to_string)
}

/// `a = ? AND b = ?`, optionally qualified by a table alias.
fn key_predicate<'k>(columns: impl IntoIterator<Item = &'k str>, alias: Option<&str>) -> String {
    columns
        .into_iter()
        .map(|column| match alias {
            Some(alias) => format!("{alias}.{column} = ?"),
            None => format!("{column} = ?"),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `.bind(..)` calls for a key value expression of `arity` parts.
fn bind_key(arity: usize, expr: &str) -> String {
    if arity == 1 {
        format!(".bind({expr})")
    } else {
        (0..arity)
            .map(|idx| format!(".bind({expr}.{idx})"))
            .collect::<Vec<_>>()
            .concat()
    }
}

/// Struct field name for an entity property.
fn field_ident(property: &str) -> String {
    rust_ident(property)
}

fn enum_name(model: &ModuleModel, property: &str) -> String {
    format!("{}{}", model.entity.class_name, pascal(property))
}

/// Variant identifier for an enum value such as `IN_PROGRESS` or `2fa`.
fn variant_ident(value: &str) -> String {
    let ident = pascal(value);
    match ident.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => ident,
        Some(_) => format!("V{ident}"),
        None => "Empty".to_string(),
    }
}

fn quote_str_list<'s>(values: impl IntoIterator<Item = &'s str>) -> String {
    values
        .into_iter()
        .map(|value| format!("{value:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use modforge_core::{RuntimeType, StorageType};

    use super::*;

    fn key(column: &str, runtime: RuntimeType, storage: StorageType) -> KeyColumn {
        KeyColumn {
            property: column.to_string(),
            column: column.to_string(),
            column_type: ColumnType::new(runtime, storage),
        }
    }

    #[test]
    fn composite_keys_render_as_tuples() {
        let keys = vec![
            key("db_name", RuntimeType::I64, StorageType::BigInt),
            key("my_id", RuntimeType::I32, StorageType::Int),
        ];
        assert_eq!(key_type(&keys, ArtifactKind::Entity).unwrap(), "(i64, i32)");
        assert_eq!(bind_key(2, "key"), ".bind(key.0).bind(key.1)");
        assert_eq!(
            key_predicate(["db_name", "my_id"], Some("t")),
            "t.db_name = ? AND t.my_id = ?"
        );
        assert!(key_type(&[], ArtifactKind::Entity).is_err());
    }

    #[test]
    fn enum_variants_are_identifiers() {
        assert_eq!(variant_ident("IN_PROGRESS"), "InProgress");
        assert_eq!(variant_ident("2fa"), "V2fa");
    }
}
