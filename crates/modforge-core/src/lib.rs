//! Core contracts and helpers for modforge.
//!
//! This crate defines the generation request contract, the normalized job
//! model, the type taxonomy and naming rules shared by the validator, the
//! generator and the CLI. It also ships the many-to-many reconciliation
//! runtime that generated access layers call into.

pub mod catalog;
pub mod constraints;
pub mod descriptor;
pub mod error;
pub mod job;
pub mod naming;
pub mod relation;
pub mod types;

pub use catalog::{EntityCatalog, EntitySummary, KeyColumn};
pub use constraints::{ReferentialAction, RelationKind};
pub use descriptor::{
    CreationConfig, FieldDescriptor, GenerateRequest, IndexDescriptor, JoinColumnDescriptor,
    JoinTableDescriptor, PrimaryFieldDescriptor, PrimaryRuntime, PrimarySubtype,
    RelationDescriptor, SubtypeOptionsDescriptor,
};
pub use error::{Error, Result};
pub use job::{
    DefaultValue, FieldKind, FieldSpec, ForeignKeyColumn, GenerationJob, IndexSpec,
    JoinColumnSpec, JoinTableSpec, PasswordPolicy, PrimaryKeySpec, RelationJoin, RelationSpec,
};
pub use naming::{EntityNames, derive_foreign_keys, pluralize};
pub use relation::{RelationStore, RelationSync, SyncError, SyncSide, reconcile, sync_many_to_many};
pub use types::{ColumnType, RuntimeType, StorageType, Subtype, TypeCategory, quote_sql};

/// Current contract version for generation requests and module models.
pub const CONTRACT_VERSION: &str = "0.1";
