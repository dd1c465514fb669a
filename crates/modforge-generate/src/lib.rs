//! Module generation engine for modforge.
//!
//! This crate turns a validated [`modforge_core::GenerationJob`] into the
//! sources of a module, mirrors its relations onto the modules they point
//! at and registers it with the project, writing everything as one staged
//! change set.

pub mod changeset;
pub mod engine;
pub mod errors;
pub mod model;
pub mod module;
pub mod registry;
pub mod render;
pub mod wiring;

pub use changeset::ChangeSet;
pub use engine::{GenerationEngine, GenerationResult};
pub use errors::{GenerateError, Result};
pub use model::{GenerateOptions, GenerationIssue, GenerationReport, WiredRelation};
pub use module::{ColumnModel, ColumnSource, ModuleModel, RelationModel, load_models};
pub use render::{Artifact, ArtifactKind, PERMISSION_ACTIONS, Renderer, permission_slug};
