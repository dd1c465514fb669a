use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use modforge_core::{ColumnType, EntitySummary, KeyColumn, RelationKind, RuntimeType, StorageType};
use modforge_generate::module::build_catalog;
use modforge_generate::{
    GenerateError, GenerateOptions, GenerationEngine, GenerationResult, ModuleModel, load_models,
};
use modforge_schema::{ValidationOptions, request_schema_value, validate_request};
use serde_json::{Value, json};

fn project() -> PathBuf {
    let root = std::env::temp_dir().join(format!("modforge_generate_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create project dir");
    root
}

fn user() -> EntitySummary {
    EntitySummary {
        class_name: "User".to_string(),
        module: "user".to_string(),
        table: "user".to_string(),
        primary_keys: vec![KeyColumn {
            property: "id".to_string(),
            column: "id".to_string(),
            column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
        }],
        public_names: BTreeSet::from(["id".to_string(), "email".to_string()]),
    }
}

fn generate(root: &Path, request: Value) -> Result<GenerationResult, GenerateError> {
    generate_with(GenerateOptions::with_root(root), request)
}

/// Validates against the default options but renders with `options`.
fn generate_with(options: GenerateOptions, request: Value) -> Result<GenerationResult, GenerateError> {
    let models = load_models(&options.resolve(&options.modules_dir)).expect("load models");
    let external = vec![user()];
    let catalog = build_catalog(external.clone(), &models);
    let schema = request_schema_value().expect("request schema");
    let validated = validate_request(&request, &schema, &catalog, &ValidationOptions::default())
        .unwrap_or_else(|report| panic!("invalid request: {:?}", report.messages()));
    GenerationEngine::new(options).run(&validated.job, &external)
}

fn tag_request() -> Value {
    json!({
        "name": "tag",
        "fields": [{
            "name": "label",
            "type": "String",
            "subtype_options": { "subtype": "varchar", "length": 40 }
        }]
    })
}

fn post_request() -> Value {
    json!({
        "name": "post",
        "fields": [
            {
                "name": "title",
                "type": "String",
                "subtype_options": { "subtype": "varchar", "length": 120 }
            },
            {
                "name": "tags",
                "type": "Relation",
                "relation": { "type": "ManyToMany", "target": "Tag", "is_array": true }
            }
        ]
    })
}

fn contact_request() -> Value {
    json!({
        "name": "contact",
        "fields": [{
            "name": "mobile",
            "type": "PhoneNumber",
            "subtype_options": { "subtype": "localPhoneNumber" }
        }]
    })
}

fn unsupported_region(root: &Path) -> GenerateOptions {
    GenerateOptions {
        phone_region: "ZZ".to_string(),
        ..GenerateOptions::with_root(root)
    }
}

fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative))
        .unwrap_or_else(|err| panic!("read {relative}: {err}"))
}

#[test]
fn new_module_writes_sources_scripts_and_registries() {
    let root = project();
    let result = generate(&root, tag_request()).expect("generate tag");

    for file in ["mod.rs", "entity.rs", "repository.rs", "dto.rs", "routes.rs", "permissions.rs", "module.json"] {
        assert!(root.join("src/modules/tag").join(file).exists(), "missing {file}");
    }
    let migration = root
        .join("migrations")
        .join(format!("{}.sql", result.report.migration));
    let sql = std::fs::read_to_string(migration).expect("migration");
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS `tag`"));
    assert!(sql.contains("`label` VARCHAR(40) NOT NULL"));
    assert!(sql.contains("`deleted_at` TIMESTAMP NULL"));

    let seed = read(&root, "seeds/tag_permissions.sql");
    assert!(seed.contains("'admin::Tag::findAll'"));
    assert!(seed.contains("r.`name` = 'Super Admin'"));

    assert!(read(&root, "src/modules/mod.rs").contains("pub mod tag;"));
    assert!(read(&root, "src/modules/mod.rs").contains(".merge(tag::router())"));
    assert!(read(&root, "src/entities.rs").contains("pub use crate::modules::tag::entity::Tag;"));
    assert!(read(&root, "src/migrations.rs").contains(&format!("\"{}\",", result.report.migration)));
    assert_eq!(result.report.registries_updated.len(), 3);
    assert!(result.report.warnings.is_empty());
}

#[test]
fn many_to_many_is_mirrored_onto_the_target_module() {
    let root = project();
    generate(&root, tag_request()).expect("generate tag");
    let result = generate(&root, post_request()).expect("generate post");

    assert_eq!(result.report.wired.len(), 1);
    assert_eq!(result.report.wired[0].target_module, "tag");
    assert_eq!(result.report.wired[0].inverse_property, "posts");

    let tag = ModuleModel::load(&root.join("src/modules/tag/module.json")).expect("tag model");
    let posts = tag.relation("posts").expect("mirrored relation");
    assert_eq!(posts.kind, RelationKind::ManyToMany);
    assert!(!posts.owner);
    assert!(tag.sync_relations.contains(&"posts".to_string()));
    assert!(tag.imports.contains("Post"));

    assert!(read(&root, "src/modules/tag/routes.rs").contains("\"/tags/{id}/posts\""));
    assert!(read(&root, "src/modules/post/routes.rs").contains("\"/posts/{id}/tags\""));
    assert!(read(&root, "src/modules/post/repository.rs").contains("PostTagsStore"));

    let sql = read(&root, &format!("migrations/{}.sql", result.report.migration));
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS `post_tags_map`"));
}

#[test]
fn regenerating_a_module_changes_nothing() {
    let root = project();
    generate(&root, tag_request()).expect("generate tag");
    let first = generate(&root, post_request()).expect("first run");
    let second = generate(&root, post_request()).expect("second run");

    assert_eq!(first.report.migration, second.report.migration);
    assert!(second.report.registries_updated.is_empty());
    assert!(second.report.files_written.is_empty());
    assert!(second.report.wired.is_empty());

    let registry = read(&root, "src/modules/mod.rs");
    assert_eq!(registry.matches("pub mod post;").count(), 1);
    assert_eq!(registry.matches(".merge(post::router())").count(), 1);
    let migrations = std::fs::read_dir(root.join("migrations")).expect("migrations").count();
    assert_eq!(migrations, 2);
}

#[test]
fn missing_anchor_discards_every_write() {
    let root = project();
    std::fs::create_dir_all(root.join("src")).expect("src dir");
    std::fs::write(root.join("src/entities.rs"), "// hand written\n").expect("registry");

    let err = generate(&root, tag_request()).unwrap_err();
    assert!(matches!(err, GenerateError::MissingAnchor { .. }), "{err}");
    assert!(!root.join("src/modules/tag").exists());
    assert!(!root.join("migrations").exists());
    assert_eq!(read(&root, "src/entities.rs"), "// hand written\n");
}

#[test]
fn external_targets_are_reported_not_wired() {
    let root = project();
    let result = generate(
        &root,
        json!({
            "name": "audit",
            "fields": [{
                "name": "authors",
                "type": "Relation",
                "relation": { "type": "ManyToMany", "target": "User", "is_array": true }
            }]
        }),
    )
    .expect("generate audit");

    assert!(result.report.wired.is_empty());
    assert_eq!(result.report.warnings_by_code.get("wiring_skipped"), Some(&1));
    assert!(root.join("src/modules/audit/module.json").exists());
    assert!(!root.join("src/modules/user").exists());
}

#[test]
fn one_to_many_places_foreign_keys_on_the_target() {
    let root = project();
    generate(&root, tag_request()).expect("generate tag");
    let result = generate(
        &root,
        json!({
            "name": "post",
            "fields": [{
                "name": "tags",
                "type": "Relation",
                "relation": { "type": "OneToMany", "target": "Tag", "is_array": true }
            }]
        }),
    )
    .expect("generate post");

    assert_eq!(result.report.wired.len(), 1);
    assert_eq!(result.report.wired[0].inverse_property, "post");

    let tag = ModuleModel::load(&root.join("src/modules/tag/module.json")).expect("tag model");
    let post = tag.relation("post").expect("mirrored relation");
    assert_eq!(post.kind, RelationKind::ManyToOne);
    assert_eq!(post.foreign_keys[0].column, "post_id");
    assert!(tag.columns.iter().any(|column| column.column == "post_id"));
    assert!(read(&root, "src/modules/tag/entity.rs").contains("post_id"));

    let sql = read(&root, &format!("migrations/{}.sql", result.report.migration));
    assert!(sql.contains("ALTER TABLE `tag`"));
    assert!(sql.contains("ADD COLUMN `post_id` BIGINT NULL"));
    assert!(sql.contains("FOREIGN KEY (`post_id`) REFERENCES `post` (`id`)"));
}

#[test]
fn uuid_keys_are_binary_and_generated_by_the_repository() {
    let root = project();
    let result = generate(
        &root,
        json!({
            "name": "session",
            "primary_fields": [{ "name": "id", "type": "string" }],
            "fields": [{
                "name": "label",
                "type": "String",
                "subtype_options": { "subtype": "varchar", "length": 40 }
            }]
        }),
    )
    .expect("generate session");

    let sql = read(&root, &format!("migrations/{}.sql", result.report.migration));
    assert!(sql.contains("`id` BINARY(16) NOT NULL"));
    assert!(!sql.contains("AUTO_INCREMENT"));
    assert!(read(&root, "src/modules/session/entity.rs").contains("uuid::Uuid"));
    assert!(read(&root, "src/modules/session/repository.rs").contains("uuid::Uuid::new_v4()"));
}

#[test]
fn failed_artifact_is_reported_and_the_rest_is_written() {
    let root = project();
    let result = generate_with(unsupported_region(&root), contact_request()).expect("generate contact");

    assert_eq!(result.report.warnings_by_code.get("render_failed"), Some(&1));
    let issue = &result.report.warnings[0];
    assert_eq!(issue.artifact.as_deref(), Some("dto"));
    assert!(issue.message.contains("ZZ"));

    let dir = root.join("src/modules/contact");
    assert!(!dir.join("dto.rs").exists());
    for file in ["mod.rs", "entity.rs", "repository.rs", "routes.rs", "permissions.rs", "module.json"] {
        assert!(dir.join(file).exists(), "missing {file}");
    }
    assert!(root.join(format!("migrations/{}.sql", result.report.migration)).exists());
    assert!(read(&root, "src/modules/mod.rs").contains("pub mod contact;"));
}

#[test]
fn failed_wiring_is_reported_and_the_owner_is_written() {
    let root = project();
    generate(&root, contact_request()).expect("generate contact");
    let before = read(&root, "src/modules/contact/module.json");

    let result = generate_with(
        unsupported_region(&root),
        json!({
            "name": "campaign",
            "fields": [{
                "name": "contacts",
                "type": "Relation",
                "relation": { "type": "ManyToMany", "target": "Contact", "is_array": true }
            }]
        }),
    )
    .expect("generate campaign");

    assert!(result.report.wired.is_empty());
    assert_eq!(result.report.warnings_by_code.get("wiring_failed"), Some(&1));
    assert_eq!(read(&root, "src/modules/contact/module.json"), before);

    let campaign = ModuleModel::load(&root.join("src/modules/campaign/module.json")).expect("campaign model");
    assert!(campaign.relation("contacts").is_some());
    assert!(read(&root, "src/modules/campaign/routes.rs").contains("\"/campaigns/{id}/contacts\""));
    assert!(read(&root, "src/modules/mod.rs").contains("pub mod campaign;"));
}
