use std::collections::{BTreeMap, BTreeSet};

use jsonschema::JSONSchema;
use modforge_core::naming::{self, column_name, is_identifier, property_name};
use modforge_core::{
    ColumnType, CreationConfig, DefaultValue, EntityCatalog, EntityNames, EntitySummary,
    FieldDescriptor, FieldKind, FieldSpec, ForeignKeyColumn, GenerateRequest, GenerationJob,
    IndexDescriptor, IndexSpec, JoinColumnSpec, JoinTableSpec, PasswordPolicy,
    PrimaryFieldDescriptor, PrimaryKeySpec, PrimaryRuntime, PrimarySubtype, ReferentialAction,
    RelationDescriptor, RelationJoin, RelationKind, RelationSpec, RuntimeType, StorageType,
    Subtype, SubtypeOptionsDescriptor, TypeCategory,
};
use serde_json::Value;

use crate::defaults::{DEFAULT_PHONE_REGION, DefaultContext, DefaultRules};
use crate::errors::{IssueSeverity, SchemaError, ValidationIssue, ValidationReport};

const MAX_VALUES: usize = 10;
const PASSWORD_BOUND_MIN: i64 = 4;
const PASSWORD_BOUND_MAX: i64 = 20;
const MAX_VARCHAR_LENGTH: i64 = 65_535;
const MAX_CHAR_LENGTH: i64 = 255;
const MAX_DECIMAL_PRECISION: i64 = 65;
const MAX_DECIMAL_SCALE: i64 = 30;

/// Knobs that are not part of the request itself.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Region used for `localPhoneNumber` defaults.
    pub phone_region: String,
    /// Entity referenced by operator (`created_by`...) columns.
    pub user_entity: String,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            phone_region: DEFAULT_PHONE_REGION.to_string(),
            user_entity: "User".to_string(),
        }
    }
}

/// Normalized job with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub request: GenerateRequest,
    pub job: GenerationJob,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a request JSON document against the request JSON Schema.
pub fn validate_request_json(
    request_json: &Value,
    request_schema: &Value,
) -> Result<ValidationReport, SchemaError> {
    let compiled =
        JSONSchema::compile(request_schema).map_err(|err| SchemaError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(request_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate the request end-to-end, returning the normalized job or every
/// issue found.
pub fn validate_request(
    request_json: &Value,
    request_schema: &Value,
    catalog: &EntityCatalog,
    options: &ValidationOptions,
) -> Result<ValidatedRequest, ValidationReport> {
    let structural = match validate_request_json(request_json, request_schema) {
        Ok(report) => report,
        Err(err) => return Err(single_issue("schema_validation_error", err.to_string())),
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let request: GenerateRequest = match serde_json::from_value(request_json.clone()) {
        Ok(request) => request,
        Err(err) => return Err(single_issue("invalid_request_json", err.to_string())),
    };

    validate_descriptor(request, catalog, options)
}

/// Apply the rule checks to an already parsed request.
pub fn validate_descriptor(
    request: GenerateRequest,
    catalog: &EntityCatalog,
    options: &ValidationOptions,
) -> Result<ValidatedRequest, ValidationReport> {
    let rules = match DefaultRules::new(&options.phone_region) {
        Ok(rules) => rules,
        Err(err) => return Err(single_issue("validator_configuration", err.to_string())),
    };

    let mut normalizer = Normalizer {
        catalog,
        rules: &rules,
        options,
        report: ValidationReport::default(),
    };
    let job = normalizer.normalize(&request);
    let report = normalizer.report;

    match job {
        Some(job) if report.is_ok() => Ok(ValidatedRequest {
            request,
            job,
            warnings: report.warnings,
        }),
        _ => Err(report),
    }
}

fn single_issue(code: &str, message: String) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.push_error(ValidationIssue::error(code, "/", message));
    report
}

struct Normalizer<'a> {
    catalog: &'a EntityCatalog,
    rules: &'a DefaultRules,
    options: &'a ValidationOptions,
    report: ValidationReport,
}

impl Normalizer<'_> {
    fn normalize(&mut self, request: &GenerateRequest) -> Option<GenerationJob> {
        let entity = match EntityNames::new(&request.name) {
            Ok(entity) => Some(entity),
            Err(err) => {
                self.error("invalid_name", "/name", err.to_string());
                None
            }
        };

        if let Some(entity) = &entity
            && self.catalog.contains(&entity.class_name)
        {
            self.report.push_warning(ValidationIssue::warning(
                "entity_exists",
                "/name",
                format!(
                    "entity '{}' already exists and will be regenerated",
                    entity.class_name
                ),
            ));
        }

        let primary_keys = self.primary_keys(&request.primary_fields);

        let mut fields = Vec::with_capacity(request.fields.len());
        for (idx, field) in request.fields.iter().enumerate() {
            if let Some(spec) = self.field(idx, field, entity.as_ref(), &primary_keys) {
                fields.push((idx, spec));
            }
        }

        self.check_creation(&request.creation_config);
        self.check_collisions(&primary_keys, &fields, &request.creation_config);

        let addressable = self.addressable_columns(request, &primary_keys);
        let indices = self.indices(&request.indices, &addressable);

        let entity = entity?;
        if !self.report.is_ok() {
            return None;
        }

        Some(GenerationJob {
            entity,
            primary_keys,
            fields: fields.into_iter().map(|(_, spec)| spec).collect(),
            creation: request.creation_config.clone(),
            indices,
        })
    }

    fn primary_keys(&mut self, descriptors: &[PrimaryFieldDescriptor]) -> Vec<PrimaryKeySpec> {
        if descriptors.is_empty() {
            return vec![PrimaryKeySpec {
                property: "id".to_string(),
                column: "id".to_string(),
                column_type: ColumnType::new(RuntimeType::I64, StorageType::BigInt),
                generated: true,
            }];
        }

        let composite = descriptors.len() > 1;
        let mut seen = BTreeSet::new();
        let mut keys = Vec::with_capacity(descriptors.len());
        for (idx, descriptor) in descriptors.iter().enumerate() {
            let path = format!("/primary_fields/{idx}");
            if !is_identifier(&descriptor.name) {
                self.error(
                    "invalid_name",
                    format!("{path}/name"),
                    format!("'{}' is not a valid field name", descriptor.name),
                );
                continue;
            }

            let dtype = match (descriptor.runtime, descriptor.dtype) {
                (None, None) | (Some(PrimaryRuntime::Number), None) => PrimarySubtype::Int,
                (Some(PrimaryRuntime::String), None) => PrimarySubtype::Uuid,
                (None, Some(dtype)) => dtype,
                (Some(PrimaryRuntime::String), Some(PrimarySubtype::Uuid)) => PrimarySubtype::Uuid,
                (
                    Some(PrimaryRuntime::Number),
                    Some(dtype @ (PrimarySubtype::Int | PrimarySubtype::BigInt)),
                ) => dtype,
                (Some(runtime), Some(dtype)) => {
                    self.error(
                        "primary_type_mismatch",
                        format!("{path}/dtype"),
                        format!(
                            "dtype '{}' does not match type '{}'",
                            primary_subtype_name(dtype),
                            primary_runtime_name(runtime)
                        ),
                    );
                    continue;
                }
            };

            let column = column_name(&descriptor.name, descriptor.db_name.as_deref());
            if !seen.insert(column.clone()) {
                self.error(
                    "duplicate_primary_field",
                    format!("{path}/name"),
                    format!("primary key column '{column}' is declared twice"),
                );
                continue;
            }

            let (column_type, generated) = match dtype {
                PrimarySubtype::Uuid => (
                    ColumnType::for_subtype(Subtype::Uuid, &Default::default()),
                    true,
                ),
                PrimarySubtype::Int => (ColumnType::new(RuntimeType::I32, StorageType::Int), !composite),
                PrimarySubtype::BigInt => (
                    ColumnType::new(RuntimeType::I64, StorageType::BigInt),
                    !composite,
                ),
            };
            keys.push(PrimaryKeySpec {
                property: property_name(&descriptor.name),
                column,
                column_type,
                generated,
            });
        }
        keys
    }

    fn field(
        &mut self,
        idx: usize,
        descriptor: &FieldDescriptor,
        entity: Option<&EntityNames>,
        primary_keys: &[PrimaryKeySpec],
    ) -> Option<FieldSpec> {
        let path = format!("/fields/{idx}");
        if !is_identifier(&descriptor.name) {
            self.error(
                "invalid_name",
                format!("{path}/name"),
                format!("'{}' is not a valid field name", descriptor.name),
            );
            return None;
        }

        let property = property_name(&descriptor.name);
        let column = column_name(&descriptor.name, descriptor.db_name.as_deref());

        if descriptor.category == TypeCategory::Relation {
            if descriptor.subtype_options.is_some() {
                self.error(
                    "option_not_applicable",
                    format!("{path}/subtype_options"),
                    "subtype_options are not allowed for Relation fields",
                );
            }
            let Some(relation) = &descriptor.relation else {
                self.error(
                    "relation_required",
                    format!("{path}/relation"),
                    "relation options are required for Relation fields",
                );
                return None;
            };
            let spec = self.relation(&path, descriptor, relation, entity, primary_keys)?;
            return Some(FieldSpec {
                name: descriptor.name.clone(),
                property,
                column,
                nullable: spec.nullable,
                unique: descriptor.unique.unwrap_or(false),
                kind: FieldKind::Relation(spec),
            });
        }

        if descriptor.relation.is_some() {
            self.error(
                "option_not_applicable",
                format!("{path}/relation"),
                "relation options are only allowed for Relation fields",
            );
        }
        let Some(options) = &descriptor.subtype_options else {
            self.error(
                "subtype_options_required",
                format!("{path}/subtype_options"),
                format!(
                    "subtype_options are required for type \"{}\"",
                    descriptor.category
                ),
            );
            return None;
        };

        let kind = self.scalar_kind(&format!("{path}/subtype_options"), descriptor.category, options)?;
        Some(FieldSpec {
            name: descriptor.name.clone(),
            property,
            column,
            nullable: descriptor.nullable.unwrap_or(false),
            unique: descriptor.unique.unwrap_or(false),
            kind,
        })
    }

    fn scalar_kind(
        &mut self,
        path: &str,
        category: TypeCategory,
        options: &SubtypeOptionsDescriptor,
    ) -> Option<FieldKind> {
        let errors_before = self.report.errors.len();

        let subtype = options.subtype.as_deref().and_then(Subtype::parse);
        let subtype = match subtype {
            Some(subtype) if category.allows(subtype) => subtype,
            _ => {
                let allowed: Vec<&str> = category
                    .allowed_subtypes()
                    .iter()
                    .map(|subtype| subtype.as_str())
                    .collect();
                self.error(
                    "subtype_not_allowed",
                    format!("{path}/subtype"),
                    format!(
                        "subtype must be one of [{}] for type \"{category}\"",
                        allowed.join(", ")
                    ),
                );
                return None;
            }
        };

        let length = self.length(path, category, subtype, options.length);
        let (precision, scale) = self.precision(path, subtype, options.m, options.d);
        let policy = self.password_policy(path, subtype, options);
        let values = self.values(path, category, options.values.as_deref());

        if self.report.errors.len() > errors_before {
            return None;
        }

        let default = match &options.default {
            None | Some(Value::Null) => None,
            Some(value) => {
                let context = DefaultContext {
                    values: values.as_deref().unwrap_or(&[]),
                    length,
                    precision,
                    scale,
                    policy: policy.as_ref(),
                };
                match self.rules.check(subtype, value, &context) {
                    Ok(default) => Some(default),
                    Err(message) => {
                        self.error(
                            "invalid_default",
                            format!("{path}/default"),
                            format!("invalid default value for subtype \"{subtype}\": {message}"),
                        );
                        return None;
                    }
                }
            }
        };

        let text_default = match &default {
            Some(DefaultValue::Text(text)) => Some(text.clone()),
            _ => None,
        };

        let kind = match category {
            TypeCategory::String => FieldKind::String {
                subtype,
                length: length.unwrap_or(modforge_core::types::DEFAULT_VARCHAR_LENGTH),
                default: text_default,
            },
            TypeCategory::Text => FieldKind::Text {
                subtype,
                default: text_default,
            },
            TypeCategory::Boolean => FieldKind::Boolean {
                default: match default {
                    Some(DefaultValue::Bool(value)) => Some(value),
                    _ => None,
                },
            },
            TypeCategory::Json => FieldKind::Json,
            TypeCategory::Enum => FieldKind::Enum {
                values: values.unwrap_or_default(),
                default: text_default,
            },
            TypeCategory::Set => FieldKind::Set {
                values: values.unwrap_or_default(),
                default: match default {
                    Some(DefaultValue::List(items)) => Some(items),
                    _ => None,
                },
            },
            TypeCategory::Uid => FieldKind::Uid { subtype },
            TypeCategory::DateTime => FieldKind::DateTime { subtype, default },
            TypeCategory::Number => FieldKind::Number {
                subtype,
                precision,
                scale,
                default,
            },
            TypeCategory::Email => FieldKind::Email {
                default: text_default,
            },
            TypeCategory::Password => FieldKind::Password {
                policy: policy.unwrap_or_default(),
                default: text_default,
            },
            TypeCategory::PhoneNumber => FieldKind::PhoneNumber {
                subtype,
                default: text_default,
            },
            TypeCategory::Relation => return None,
        };
        Some(kind)
    }

    fn length(
        &mut self,
        path: &str,
        category: TypeCategory,
        subtype: Subtype,
        length: Option<i64>,
    ) -> Option<u32> {
        let Some(length) = length else {
            if category == TypeCategory::String {
                self.error(
                    "length_required",
                    format!("{path}/length"),
                    "length is required for String fields",
                );
            }
            return None;
        };

        if !subtype.accepts_length() {
            self.error(
                "option_not_applicable",
                format!("{path}/length"),
                format!("length is only allowed for subtypes [char, varchar], not \"{subtype}\""),
            );
            return None;
        }

        let max = if subtype == Subtype::Char {
            MAX_CHAR_LENGTH
        } else {
            MAX_VARCHAR_LENGTH
        };
        self.bounded(&format!("{path}/length"), "length", length, 1, max)
    }

    fn precision(
        &mut self,
        path: &str,
        subtype: Subtype,
        m: Option<i64>,
        d: Option<i64>,
    ) -> (Option<u32>, Option<u32>) {
        if m.is_none() && d.is_none() {
            return (None, None);
        }
        if !subtype.accepts_precision() {
            let key = if m.is_some() { "m" } else { "d" };
            self.error(
                "option_not_applicable",
                format!("{path}/{key}"),
                format!("m and d are only allowed for subtype decimal, not \"{subtype}\""),
            );
            return (None, None);
        }

        let precision =
            m.and_then(|m| self.bounded(&format!("{path}/m"), "m", m, 1, MAX_DECIMAL_PRECISION));
        let scale = d.and_then(|d| self.bounded(&format!("{path}/d"), "d", d, 0, MAX_DECIMAL_SCALE));
        let effective_precision =
            precision.unwrap_or(modforge_core::types::DEFAULT_DECIMAL_PRECISION);
        if let Some(scale) = scale
            && scale > effective_precision
        {
            self.error(
                "invalid_scale",
                format!("{path}/d"),
                format!("d ({scale}) must not exceed m ({effective_precision})"),
            );
        }
        (precision, scale)
    }

    fn password_policy(
        &mut self,
        path: &str,
        subtype: Subtype,
        options: &SubtypeOptionsDescriptor,
    ) -> Option<PasswordPolicy> {
        let declared = [
            ("min_length", options.min_length.is_some()),
            ("max_length", options.max_length.is_some()),
            ("require_digit", options.require_digit.is_some()),
            ("require_special", options.require_special.is_some()),
        ];

        if subtype != Subtype::Password {
            for (key, present) in declared {
                if present {
                    self.error(
                        "option_not_applicable",
                        format!("{path}/{key}"),
                        format!("{key} is only allowed for subtype password"),
                    );
                }
            }
            return None;
        }

        let mut policy = PasswordPolicy::default();
        if let Some(min) = options.min_length {
            let min = self.bounded(
                &format!("{path}/min_length"),
                "min_length",
                min,
                PASSWORD_BOUND_MIN,
                PASSWORD_BOUND_MAX,
            );
            policy.min_length = min.unwrap_or(policy.min_length);
        }
        if let Some(max) = options.max_length {
            let max = self.bounded(
                &format!("{path}/max_length"),
                "max_length",
                max,
                PASSWORD_BOUND_MIN,
                PASSWORD_BOUND_MAX,
            );
            policy.max_length = max.unwrap_or(policy.max_length);
        }
        if policy.min_length > policy.max_length {
            self.error(
                "invalid_password_bounds",
                format!("{path}/min_length"),
                format!(
                    "min_length ({}) must not exceed max_length ({})",
                    policy.min_length, policy.max_length
                ),
            );
        }
        policy.require_digit = options.require_digit.unwrap_or(true);
        policy.require_special = options.require_special.unwrap_or(true);
        Some(policy)
    }

    fn values(
        &mut self,
        path: &str,
        category: TypeCategory,
        values: Option<&[String]>,
    ) -> Option<Vec<String>> {
        let values_path = format!("{path}/values");
        let enumerated = matches!(category, TypeCategory::Enum | TypeCategory::Set);

        if !enumerated {
            if values.is_some() {
                self.error(
                    "option_not_applicable",
                    values_path,
                    "values are only allowed for subtypes [enum, simple-array]",
                );
            }
            return None;
        }

        let Some(values) = values else {
            self.error(
                "values_required",
                values_path,
                format!("values are required for type \"{category}\""),
            );
            return None;
        };

        let errors_before = self.report.errors.len();
        if values.is_empty() {
            self.error("values_empty", &values_path, "values must not be empty");
        }
        if values.len() > MAX_VALUES {
            self.error(
                "values_too_many",
                &values_path,
                format!("values must contain no more than {MAX_VALUES} elements"),
            );
        }
        let mut seen = BTreeSet::new();
        for (idx, value) in values.iter().enumerate() {
            if value.trim().is_empty() {
                self.error(
                    "values_blank",
                    format!("{values_path}/{idx}"),
                    "values must not contain blank entries",
                );
            } else if !seen.insert(value.as_str()) {
                self.error(
                    "values_not_unique",
                    format!("{values_path}/{idx}"),
                    format!("value '{value}' is listed more than once"),
                );
            }
        }

        (self.report.errors.len() == errors_before).then(|| values.to_vec())
    }

    fn relation(
        &mut self,
        path: &str,
        field: &FieldDescriptor,
        descriptor: &RelationDescriptor,
        entity: Option<&EntityNames>,
        primary_keys: &[PrimaryKeySpec],
    ) -> Option<RelationSpec> {
        let path = format!("{path}/relation");
        let errors_before = self.report.errors.len();
        let kind = descriptor.kind;

        let target = self.catalog.get(&descriptor.target);
        if target.is_none() {
            let known: Vec<&str> = self.catalog.names().collect();
            self.report.push_error(
                ValidationIssue::error(
                    "unknown_target",
                    format!("{path}/target"),
                    format!("target entity '{}' does not exist", descriptor.target),
                )
                .with_hint(format!("known entities: [{}]", known.join(", "))),
            );
        }

        if let (Some(inverse), Some(target)) = (&descriptor.inverse_side, target)
            && !target.public_names.contains(inverse)
        {
            let known: Vec<&str> = target.public_names.iter().map(String::as_str).collect();
            self.report.push_error(
                ValidationIssue::error(
                    "unknown_inverse_side",
                    format!("{path}/inverse_side"),
                    format!(
                        "'{inverse}' is not a public field or relation of '{}'",
                        target.class_name
                    ),
                )
                .with_hint(format!("public names: [{}]", known.join(", "))),
            );
        }

        if descriptor.join_table.is_some() && kind != RelationKind::ManyToMany {
            self.error(
                "join_table_not_allowed",
                format!("{path}/join_table"),
                "join_table must not be defined unless relation type is \"ManyToMany\"",
            );
        }
        if descriptor.join_column.is_some() && kind == RelationKind::ManyToMany {
            self.error(
                "join_column_not_allowed",
                format!("{path}/join_column"),
                "join_column must not be defined for relation type \"ManyToMany\"",
            );
        }
        if descriptor.join_column.is_some() && kind == RelationKind::OneToMany {
            self.report.push_warning(ValidationIssue::warning(
                "join_column_ignored",
                format!("{path}/join_column"),
                "join_column is ignored for OneToMany; the target owns the foreign key",
            ));
        }

        let set_null = [
            ("on_delete", descriptor.on_delete),
            ("on_update", descriptor.on_update),
        ];
        for (key, action) in set_null {
            if action == Some(ReferentialAction::SetNull) && !descriptor.nullable {
                self.error(
                    "set_null_not_nullable",
                    format!("{path}/{key}"),
                    format!("{key} SET NULL requires a nullable relation"),
                );
            }
        }

        if descriptor.uni_directional && kind.requires_inverse() {
            self.report.push_warning(ValidationIssue::warning(
                "uni_directional_ignored",
                format!("{path}/uni_directional"),
                format!("{kind} relations are always wired on the target"),
            ));
        }
        if descriptor.is_array != kind.is_collection() {
            self.report.push_warning(ValidationIssue::warning(
                "is_array_mismatch",
                format!("{path}/is_array"),
                format!("is_array is derived from the relation type {kind}"),
            ));
        }

        let target = target?;
        let entity = entity?;
        if self.report.errors.len() > errors_before {
            return None;
        }

        let join_column = descriptor.join_column.as_ref().map(|join| JoinColumnSpec {
            name: join.name.clone(),
            referenced_column: join.referenced_column_name.clone(),
        });

        let foreign_keys = if kind.owns_join_column() {
            naming::derive_foreign_keys(&field.name, join_column.as_ref(), target)
        } else {
            Vec::new()
        };

        let join = if kind == RelationKind::ManyToMany {
            RelationJoin::Table(join_table(
                entity,
                primary_keys,
                &field.name,
                descriptor,
                target,
            ))
        } else if kind.owns_join_column() {
            join_column.map_or(RelationJoin::None, RelationJoin::Column)
        } else {
            RelationJoin::None
        };

        Some(RelationSpec {
            kind,
            target: target.class_name.clone(),
            target_module: target.module.clone(),
            inverse_side: descriptor.inverse_side.clone(),
            bidirectional: !descriptor.uni_directional,
            is_array: kind.is_collection(),
            join,
            cascade: descriptor.cascade,
            on_delete: descriptor.on_delete,
            on_update: descriptor.on_update,
            nullable: descriptor.nullable,
            foreign_keys,
        })
    }

    fn check_creation(&mut self, creation: &CreationConfig) {
        if creation.operator && !self.catalog.contains(&self.options.user_entity) {
            self.error(
                "operator_requires_user",
                "/creation_config/operator",
                format!(
                    "operator columns need the '{}' entity to exist",
                    self.options.user_entity
                ),
            );
        }
    }

    fn check_collisions(
        &mut self,
        primary_keys: &[PrimaryKeySpec],
        fields: &[(usize, FieldSpec)],
        creation: &CreationConfig,
    ) {
        let mut columns: BTreeMap<String, String> = BTreeMap::new();
        for key in primary_keys {
            columns.insert(key.column.clone(), "primary key".to_string());
        }
        for column in lifecycle_columns(creation, self.catalog.get(&self.options.user_entity)) {
            columns.insert(column, "lifecycle column".to_string());
        }

        let mut properties: BTreeSet<String> =
            primary_keys.iter().map(|key| key.property.clone()).collect();
        for (idx, field) in fields {
            let path = format!("/fields/{idx}");
            if !properties.insert(field.property.clone()) {
                self.error(
                    "duplicate_field",
                    format!("{path}/name"),
                    format!("field '{}' is declared more than once", field.property),
                );
            }

            let owned: Vec<String> = match &field.kind {
                FieldKind::Relation(relation) => relation
                    .foreign_keys
                    .iter()
                    .map(|key| key.column.clone())
                    .collect(),
                _ => vec![field.column.clone()],
            };
            for column in owned {
                if let Some(owner) = columns.get(&column) {
                    self.error(
                        "column_conflict",
                        path.clone(),
                        format!("column '{column}' collides with an existing {owner}"),
                    );
                } else {
                    columns.insert(column, format!("field '{}'", field.name));
                }
            }
        }
    }

    /// Storage names an index may reference, paired with their property names.
    fn addressable_columns(
        &self,
        request: &GenerateRequest,
        primary_keys: &[PrimaryKeySpec],
    ) -> Vec<(String, String)> {
        let mut addressable: Vec<(String, String)> = if primary_keys.is_empty() {
            vec![("id".to_string(), "id".to_string())]
        } else {
            primary_keys
                .iter()
                .map(|key| (key.column.clone(), key.property.clone()))
                .collect()
        };

        for field in &request.fields {
            match &field.relation {
                Some(relation) if field.category == TypeCategory::Relation => {
                    if !relation.kind.owns_join_column() {
                        continue;
                    }
                    let Some(target) = self.catalog.get(&relation.target) else {
                        continue;
                    };
                    let join_column = relation.join_column.as_ref().map(|join| JoinColumnSpec {
                        name: join.name.clone(),
                        referenced_column: join.referenced_column_name.clone(),
                    });
                    addressable.extend(
                        naming::derive_foreign_keys(&field.name, join_column.as_ref(), target)
                            .into_iter()
                            .map(|key| (key.column, key.property)),
                    );
                }
                _ if field.category == TypeCategory::Relation => {}
                _ => addressable.push((
                    column_name(&field.name, field.db_name.as_deref()),
                    property_name(&field.name),
                )),
            }
        }
        addressable
    }

    fn indices(
        &mut self,
        descriptors: &[IndexDescriptor],
        addressable: &[(String, String)],
    ) -> Vec<IndexSpec> {
        let lookup: BTreeMap<&str, &str> = addressable
            .iter()
            .map(|(column, property)| (column.as_str(), property.as_str()))
            .collect();
        let allowed: Vec<&str> = addressable.iter().map(|(column, _)| column.as_str()).collect();

        let mut names = BTreeSet::new();
        let mut indices = Vec::with_capacity(descriptors.len());
        for (idx, descriptor) in descriptors.iter().enumerate() {
            let path = format!("/indices/{idx}");
            if descriptor.name.trim().is_empty() {
                self.error("index_name_empty", format!("{path}/name"), "index name must not be empty");
                continue;
            }
            if !names.insert(descriptor.name.as_str()) {
                self.error(
                    "duplicate_index",
                    format!("{path}/name"),
                    format!("index '{}' is declared more than once", descriptor.name),
                );
                continue;
            }
            if descriptor.fields.is_empty() {
                self.error(
                    "index_fields_empty",
                    format!("{path}/fields"),
                    "index must reference at least one field",
                );
                continue;
            }

            let mut invalid: Vec<&str> = Vec::new();
            for field in &descriptor.fields {
                if !lookup.contains_key(field.as_str()) && !invalid.contains(&field.as_str()) {
                    invalid.push(field);
                }
            }
            if !invalid.is_empty() {
                self.error(
                    "index_unknown_fields",
                    format!("{path}/fields"),
                    format!(
                        "invalid index fields [{}]; allowed fields are [{}]",
                        invalid.join(", "),
                        allowed.join(", ")
                    ),
                );
                continue;
            }

            indices.push(IndexSpec {
                name: descriptor.name.clone(),
                columns: descriptor.fields.clone(),
                properties: descriptor
                    .fields
                    .iter()
                    .filter_map(|field| lookup.get(field.as_str()))
                    .map(|property| property.to_string())
                    .collect(),
                unique: descriptor.unique,
            });
        }
        indices
    }

    fn bounded(&mut self, path: &str, key: &str, value: i64, min: i64, max: i64) -> Option<u32> {
        if value < min || value > max {
            self.error(
                "out_of_range",
                path,
                format!("{key} must be between {min} and {max}"),
            );
            return None;
        }
        u32::try_from(value).ok()
    }

    fn error(&mut self, code: &str, path: impl Into<String>, message: impl Into<String>) {
        self.report
            .push_error(ValidationIssue::error(code, path, message));
    }
}

/// Join table of a many-to-many relation: explicit names win, otherwise
/// `<table>_<field>_map` with `<lowercase entity>_<key column>` columns.
fn join_table(
    entity: &EntityNames,
    primary_keys: &[PrimaryKeySpec],
    field_name: &str,
    descriptor: &RelationDescriptor,
    target: &EntitySummary,
) -> JoinTableSpec {
    let options = descriptor.join_table.clone().unwrap_or_default();
    let name = options
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("{}_{}_map", entity.table, column_name(field_name, None)));

    let owner_prefix = entity.class_name.to_lowercase();
    let join_columns = map_columns(
        &owner_prefix,
        primary_keys
            .iter()
            .map(|key| (key.column.as_str(), &key.column_type)),
        options.join_column.as_ref(),
    );

    let target_prefix = target.class_name.to_lowercase();
    let inverse_join_columns = map_columns(
        &target_prefix,
        target
            .primary_keys
            .iter()
            .map(|key| (key.column.as_str(), &key.column_type)),
        options.inverse_join_column.as_ref(),
    );

    JoinTableSpec {
        name,
        join_columns,
        inverse_join_columns,
    }
}

fn map_columns<'k>(
    prefix: &str,
    keys: impl Iterator<Item = (&'k str, &'k ColumnType)>,
    explicit: Option<&modforge_core::JoinColumnDescriptor>,
) -> Vec<ForeignKeyColumn> {
    let keys: Vec<(&str, &ColumnType)> = keys.collect();
    let single = keys.len() == 1;
    keys.into_iter()
        .map(|(key_column, column_type)| {
            let explicit = explicit.filter(|_| single);
            let column = explicit
                .and_then(|join| join.name.clone())
                .unwrap_or_else(|| format!("{prefix}_{key_column}"));
            let referenced_column = explicit
                .and_then(|join| join.referenced_column_name.clone())
                .unwrap_or_else(|| key_column.to_string());
            ForeignKeyColumn {
                property: property_name(&column),
                column,
                referenced_column,
                column_type: column_type.clone(),
            }
        })
        .collect()
}

/// Columns added by the lifecycle options.
pub fn lifecycle_columns(creation: &CreationConfig, user: Option<&EntitySummary>) -> Vec<String> {
    let mut columns = Vec::new();
    if creation.with_timestamps {
        columns.push("created_at".to_string());
        columns.push("updated_at".to_string());
    }
    if creation.with_soft_delete {
        columns.push("deleted_at".to_string());
    }
    if creation.operator
        && let Some(user) = user
    {
        for field in ["createdBy", "updatedBy", "deletedBy"] {
            columns.extend(
                naming::derive_foreign_keys(field, None, user)
                    .into_iter()
                    .map(|key| key.column),
            );
        }
    }
    columns
}

fn primary_runtime_name(runtime: PrimaryRuntime) -> &'static str {
    match runtime {
        PrimaryRuntime::String => "string",
        PrimaryRuntime::Number => "number",
    }
}

fn primary_subtype_name(dtype: PrimarySubtype) -> &'static str {
    match dtype {
        PrimarySubtype::Int => "int",
        PrimarySubtype::BigInt => "bigint",
        PrimarySubtype::Uuid => "uuid",
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
