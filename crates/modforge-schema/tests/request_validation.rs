use std::collections::BTreeSet;

use modforge_core::{
    ColumnType, EntityCatalog, EntitySummary, FieldKind, KeyColumn, RelationJoin, RuntimeType,
    StorageType,
};
use modforge_schema::{
    ValidatedRequest, ValidationOptions, ValidationReport, request_schema_value, validate_request,
};
use serde_json::{Value, json};

fn key(column: &str, runtime: RuntimeType, storage: StorageType) -> KeyColumn {
    KeyColumn {
        property: column.to_string(),
        column: column.to_string(),
        column_type: ColumnType::new(runtime, storage),
    }
}

fn entity(class_name: &str, keys: Vec<KeyColumn>, public: &[&str]) -> EntitySummary {
    EntitySummary {
        class_name: class_name.to_string(),
        module: class_name.to_lowercase(),
        table: class_name.to_lowercase(),
        primary_keys: keys,
        public_names: public.iter().map(|name| name.to_string()).collect::<BTreeSet<_>>(),
    }
}

fn catalog() -> EntityCatalog {
    let id = || key("id", RuntimeType::I64, StorageType::BigInt);
    [
        entity("User", vec![id()], &["id", "email"]),
        entity("Customer", vec![id()], &["id", "name", "invoices"]),
        entity("Tag", vec![id()], &["id", "label"]),
        entity(
            "Pizza",
            vec![
                key("db_name", RuntimeType::I64, StorageType::BigInt),
                key("my_id", RuntimeType::I32, StorageType::Int),
            ],
            &["dbName", "myId", "name"],
        ),
    ]
    .into_iter()
    .collect()
}

fn validate(request: Value) -> Result<ValidatedRequest, ValidationReport> {
    let schema = request_schema_value().expect("request schema");
    validate_request(&request, &schema, &catalog(), &ValidationOptions::default())
}

fn request_with(fields: Value) -> Value {
    json!({ "name": "invoice", "fields": fields })
}

fn enum_field(default: &str) -> Value {
    json!({
        "name": "status",
        "type": "Enum",
        "subtype_options": {
            "subtype": "enum",
            "values": ["DRAFT", "SENT", "PAID"],
            "default": default
        }
    })
}

#[test]
fn enum_default_must_be_a_permitted_value() {
    let validated = validate(request_with(json!([enum_field("SENT")]))).expect("SENT accepted");
    match &validated.job.fields[0].kind {
        FieldKind::Enum { default, .. } => assert_eq!(default.as_deref(), Some("SENT")),
        other => panic!("unexpected kind {other:?}"),
    }

    let report = validate(request_with(json!([enum_field("VOID")]))).unwrap_err();
    assert!(report.has_error_at("/fields/0/subtype_options/default"));
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn password_bounds_are_between_four_and_twenty() {
    let report = validate(request_with(json!([{
        "name": "secret",
        "type": "Password",
        "subtype_options": { "subtype": "password", "min_length": 3, "max_length": 12 }
    }])))
    .unwrap_err();
    assert!(report.has_error_at("/fields/0/subtype_options/min_length"));

    let report = validate(request_with(json!([{
        "name": "secret",
        "type": "Password",
        "subtype_options": { "subtype": "password", "min_length": 6, "max_length": 21 }
    }])))
    .unwrap_err();
    assert!(report.has_error_at("/fields/0/subtype_options/max_length"));

    let validated = validate(request_with(json!([{
        "name": "secret",
        "type": "Password",
        "subtype_options": {
            "subtype": "password",
            "min_length": 6,
            "max_length": 12,
            "require_special": false,
            "default": "Welcome1"
        }
    }])))
    .expect("valid password field");
    match &validated.job.fields[0].kind {
        FieldKind::Password { policy, .. } => {
            assert_eq!((policy.min_length, policy.max_length), (6, 12));
            assert!(!policy.require_special);
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn password_knobs_are_rejected_on_other_subtypes() {
    let report = validate(request_with(json!([{
        "name": "title",
        "type": "String",
        "subtype_options": { "subtype": "varchar", "length": 80, "min_length": 4 }
    }])))
    .unwrap_err();
    assert!(report.has_error_at("/fields/0/subtype_options/min_length"));
}

#[test]
fn decimal_default_follows_the_decimal_grammar() {
    let decimal = |default: &str| {
        request_with(json!([{
            "name": "total",
            "type": "Number",
            "subtype_options": { "subtype": "decimal", "m": 10, "d": 2, "default": default }
        }]))
    };

    assert!(validate(decimal("12345678.99")).is_ok());
    let report = validate(decimal("abc")).unwrap_err();
    assert!(report.has_error_at("/fields/0/subtype_options/default"));
}

#[test]
fn subtype_must_belong_to_the_category() {
    let report = validate(request_with(json!([{
        "name": "title",
        "type": "String",
        "subtype_options": { "subtype": "text", "length": 10 }
    }])))
    .unwrap_err();
    let issue = &report.errors[0];
    assert_eq!(issue.path, "/fields/0/subtype_options/subtype");
    assert_eq!(
        issue.message,
        "subtype must be one of [varchar, char] for type \"String\""
    );
}

#[test]
fn many_to_one_derives_foreign_key_from_field_name() {
    let validated = validate(request_with(json!([{
        "name": "billingCustomer",
        "type": "Relation",
        "relation": { "type": "ManyToOne", "target": "Customer", "inverse_side": "invoices" }
    }])))
    .expect("valid relation");

    let relation = validated.job.fields[0].relation().expect("relation");
    assert_eq!(relation.foreign_keys.len(), 1);
    assert_eq!(relation.foreign_keys[0].column, "billing_customer_id");
    assert_eq!(relation.foreign_keys[0].property, "billingCustomerId");
    assert_eq!(relation.target_module, "customer");
}

#[test]
fn composite_target_yields_one_column_per_key() {
    let validated = validate(request_with(json!([{
        "name": "pizza",
        "type": "Relation",
        "relation": { "type": "ManyToOne", "target": "Pizza" }
    }])))
    .expect("valid relation");

    let relation = validated.job.fields[0].relation().expect("relation");
    let columns: Vec<&str> = relation
        .foreign_keys
        .iter()
        .map(|key| key.column.as_str())
        .collect();
    assert_eq!(columns, vec!["pizza_db_name", "pizza_my_id"]);
}

#[test]
fn many_to_many_resolves_default_join_table() {
    let validated = validate(request_with(json!([{
        "name": "tags",
        "type": "Relation",
        "relation": { "type": "ManyToMany", "target": "Tag", "is_array": true }
    }])))
    .expect("valid relation");

    let relation = validated.job.fields[0].relation().expect("relation");
    let RelationJoin::Table(table) = &relation.join else {
        panic!("expected join table, got {:?}", relation.join);
    };
    assert_eq!(table.name, "invoice_tags_map");
    assert_eq!(table.join_columns[0].column, "invoice_id");
    assert_eq!(table.inverse_join_columns[0].column, "tag_id");
    assert!(validated.warnings.is_empty());
}

#[test]
fn relation_issues_are_reported_together() {
    let report = validate(request_with(json!([
        {
            "name": "owner",
            "type": "Relation",
            "relation": { "type": "ManyToOne", "target": "Ghost" }
        },
        {
            "name": "customer",
            "type": "Relation",
            "relation": { "type": "OneToOne", "target": "Customer", "inverse_side": "secret" }
        },
        {
            "name": "buyer",
            "type": "Relation",
            "relation": {
                "type": "ManyToOne",
                "target": "Customer",
                "join_table": { "name": "nope" }
            }
        }
    ])))
    .unwrap_err();

    assert!(report.has_error_at("/fields/0/relation/target"));
    assert!(report.has_error_at("/fields/1/relation/inverse_side"));
    assert!(report.has_error_at("/fields/2/relation/join_table"));
}

#[test]
fn index_lists_invalid_names_and_allowed_set() {
    let mut request = request_with(json!([
        {
            "name": "title",
            "type": "String",
            "subtype_options": { "subtype": "varchar", "length": 120 }
        },
        {
            "name": "customer",
            "type": "Relation",
            "relation": { "type": "ManyToOne", "target": "Customer" }
        },
        {
            "name": "tags",
            "type": "Relation",
            "relation": { "type": "ManyToMany", "target": "Tag", "is_array": true }
        }
    ]));
    request["indices"] = json!([
        { "name": "idx_bad", "fields": ["title", "tags", "nope"] }
    ]);

    let report = validate(request.clone()).unwrap_err();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "/indices/0/fields");
    assert_eq!(
        report.errors[0].message,
        "invalid index fields [tags, nope]; allowed fields are [id, title, customer_id]"
    );

    request["indices"] = json!([
        { "name": "idx_customer_title", "fields": ["customer_id", "title"], "unique": true }
    ]);
    let validated = validate(request).expect("valid index");
    let index = &validated.job.indices[0];
    assert_eq!(index.columns, vec!["customer_id", "title"]);
    assert_eq!(index.properties, vec!["customerId", "title"]);
    assert!(index.unique);
}

#[test]
fn structural_violations_short_circuit_rule_checks() {
    let report = validate(json!({
        "name": "invoice",
        "fields": [
            { "name": "title", "type": "Strang" }
        ],
        "colour": "blue"
    }))
    .unwrap_err();

    assert!(!report.errors.is_empty());
    assert!(
        report
            .errors
            .iter()
            .all(|issue| issue.code == "schema_violation")
    );
}

#[test]
fn primary_key_type_must_match_dtype() {
    let report = validate(json!({
        "name": "invoice",
        "fields": [],
        "primary_fields": [{ "name": "code", "type": "number", "dtype": "uuid" }]
    }))
    .unwrap_err();
    assert!(report.has_error_at("/primary_fields/0/dtype"));

    let validated = validate(json!({
        "name": "invoice",
        "fields": [],
        "primary_fields": [{ "name": "code", "type": "string", "dtype": "uuid" }]
    }))
    .expect("uuid key");
    let key = &validated.job.primary_keys[0];
    assert_eq!(key.column_type.runtime, RuntimeType::Uuid);
    assert!(key.generated);
}

#[test]
fn lifecycle_columns_cannot_be_redeclared() {
    let report = validate(request_with(json!([{
        "name": "createdAt",
        "type": "DateTime",
        "subtype_options": { "subtype": "timestamp" }
    }])))
    .unwrap_err();
    assert_eq!(report.errors[0].code, "column_conflict");
}
