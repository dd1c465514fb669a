use std::fmt::Write;

use super::repository::{store_name, target_entity_path};
use super::{ArtifactKind, GENERATED_HEADER, render_error};
use crate::errors::Result;
use crate::module::ModuleModel;

pub(super) fn render(model: &ModuleModel) -> Result<String> {
    let class = &model.entity.class_name;
    let base = format!("/{}", model.entity.route);
    let member = format!(
        "{base}/{}",
        model
            .primary_keys
            .iter()
            .map(|key| format!("{{{}}}", key.column))
            .collect::<Vec<_>>()
            .join("/")
    );
    let soft_delete = model.creation.with_soft_delete;
    let operator = model.creation.operator;
    let actor_arg = if operator {
        "    Extension(actor): Extension<Actor>,\n"
    } else {
        ""
    };
    let actor_value = if operator { ", actor.id" } else { "" };

    let mut sync = Vec::new();
    for property in &model.sync_relations {
        let relation = model.relation(property).ok_or_else(|| {
            render_error(
                ArtifactKind::Routes,
                format!("sync relation '{property}' is not a relation of {class}"),
            )
        })?;
        sync.push(relation);
    }

    let mut out = String::from(GENERATED_HEADER);
    writeln!(out, "//! {class} routing surface.")?;
    writeln!(out)?;
    writeln!(out, "use axum::extract::{{Path, Query, State}};")?;
    writeln!(out, "use axum::http::StatusCode;")?;
    let mut routing = vec!["get"];
    if soft_delete {
        routing.extend(["delete", "patch"]);
    }
    if !sync.is_empty() {
        routing.push("put");
    }
    writeln!(out, "use axum::routing::{{{}}};", routing.join(", "))?;
    if operator {
        writeln!(out, "use axum::{{Extension, Json, Router}};")?;
    } else {
        writeln!(out, "use axum::{{Json, Router}};")?;
    }
    if !sync.is_empty() {
        writeln!(out, "use modforge_core::{{RelationSync, sync_many_to_many}};")?;
    }
    writeln!(out, "use validator::Validate;")?;
    writeln!(out)?;
    if operator {
        writeln!(out, "use crate::auth::Actor;")?;
    }
    writeln!(out, "use crate::error::ApiError;")?;
    writeln!(out, "use crate::pagination::ListQuery;")?;
    writeln!(out, "use crate::state::AppState;")?;
    writeln!(out)?;
    writeln!(out, "use super::dto::{{Create{class}Dto, Update{class}Dto}};")?;
    writeln!(out, "use super::entity::{{{class}, {class}Key}};")?;
    let mut repository_items = vec![format!("{class}Repository")];
    repository_items.extend(sync.iter().map(|relation| store_name(model, relation)));
    writeln!(
        out,
        "use super::repository::{{{}}};",
        repository_items.join(", ")
    )?;

    writeln!(out)?;
    writeln!(out, "pub fn router() -> Router<AppState> {{")?;
    writeln!(out, "    Router::new()")?;
    writeln!(out, "        .route({base:?}, get(find_all).post(create))")?;
    if soft_delete {
        writeln!(
            out,
            "        .route({member:?}, get(find_one).patch(update).delete(soft_delete))"
        )?;
        writeln!(
            out,
            "        .route({:?}, patch(rollback))",
            format!("{member}/rollback")
        )?;
        writeln!(
            out,
            "        .route({:?}, delete(hard_delete))",
            format!("{member}/permanent")
        )?;
    } else {
        writeln!(
            out,
            "        .route({member:?}, get(find_one).patch(update).delete(hard_delete))"
        )?;
    }
    for relation in &sync {
        writeln!(
            out,
            "        .route({:?}, put(sync_{}))",
            format!("{member}/{}", relation.property),
            handler_suffix(&relation.property)
        )?;
    }
    writeln!(out, "}}")?;

    writeln!(out)?;
    writeln!(out, "async fn find_all(")?;
    writeln!(out, "    State(state): State<AppState>,")?;
    writeln!(out, "    Query(query): Query<ListQuery>,")?;
    writeln!(out, ") -> Result<Json<Vec<{class}>>, ApiError> {{")?;
    writeln!(
        out,
        "    let records = {class}Repository::new(state.pool.clone()).find_all(&query).await?;"
    )?;
    writeln!(out, "    Ok(Json(records))")?;
    writeln!(out, "}}")?;

    writeln!(out)?;
    writeln!(out, "async fn find_one(")?;
    writeln!(out, "    State(state): State<AppState>,")?;
    writeln!(out, "    Path(key): Path<{class}Key>,")?;
    writeln!(out, ") -> Result<Json<{class}>, ApiError> {{")?;
    writeln!(out, "    {class}Repository::new(state.pool.clone())")?;
    writeln!(out, "        .find_one(key)")?;
    writeln!(out, "        .await?")?;
    writeln!(out, "        .map(Json)")?;
    writeln!(out, "        .ok_or(ApiError::NotFound)")?;
    writeln!(out, "}}")?;

    writeln!(out)?;
    writeln!(out, "async fn create(")?;
    writeln!(out, "    State(state): State<AppState>,")?;
    write!(out, "{actor_arg}")?;
    writeln!(out, "    Json(input): Json<Create{class}Dto>,")?;
    writeln!(out, ") -> Result<(StatusCode, Json<{class}>), ApiError> {{")?;
    writeln!(out, "    input.validate()?;")?;
    writeln!(
        out,
        "    let record = {class}Repository::new(state.pool.clone()).create(input{actor_value}).await?;"
    )?;
    writeln!(out, "    Ok((StatusCode::CREATED, Json(record)))")?;
    writeln!(out, "}}")?;

    writeln!(out)?;
    writeln!(out, "async fn update(")?;
    writeln!(out, "    State(state): State<AppState>,")?;
    writeln!(out, "    Path(key): Path<{class}Key>,")?;
    write!(out, "{actor_arg}")?;
    writeln!(out, "    Json(input): Json<Update{class}Dto>,")?;
    writeln!(out, ") -> Result<Json<{class}>, ApiError> {{")?;
    writeln!(out, "    input.validate()?;")?;
    writeln!(out, "    {class}Repository::new(state.pool.clone())")?;
    writeln!(out, "        .update(key, input{actor_value})")?;
    writeln!(out, "        .await?")?;
    writeln!(out, "        .map(Json)")?;
    writeln!(out, "        .ok_or(ApiError::NotFound)")?;
    writeln!(out, "}}")?;

    if soft_delete {
        render_status_handler(&mut out, class, "soft_delete", actor_arg, actor_value)?;
        render_status_handler(&mut out, class, "rollback", "", "")?;
    }
    render_status_handler(&mut out, class, "hard_delete", "", "")?;

    for relation in &sync {
        let path = target_entity_path(model, relation);
        let target = &relation.target;
        writeln!(out)?;
        writeln!(out, "async fn sync_{}(", handler_suffix(&relation.property))?;
        writeln!(out, "    State(state): State<AppState>,")?;
        writeln!(out, "    Path(key): Path<{class}Key>,")?;
        writeln!(
            out,
            "    Json(request): Json<RelationSync<{path}::{target}Key>>,"
        )?;
        writeln!(out, ") -> Result<Json<Vec<{path}::{target}>>, ApiError> {{")?;
        writeln!(
            out,
            "    let store = {}::new(&state.pool);",
            store_name(model, relation)
        )?;
        writeln!(
            out,
            "    let related = sync_many_to_many(&store, &key, &request).await?;"
        )?;
        writeln!(out, "    Ok(Json(related))")?;
        writeln!(out, "}}")?;
    }
    Ok(out)
}

fn handler_suffix(property: &str) -> String {
    modforge_core::naming::rust_ident(property)
        .trim_start_matches("r#")
        .to_string()
}

fn render_status_handler(
    out: &mut String,
    class: &str,
    action: &str,
    actor_arg: &str,
    actor_value: &str,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "async fn {action}(")?;
    writeln!(out, "    State(state): State<AppState>,")?;
    writeln!(out, "    Path(key): Path<{class}Key>,")?;
    write!(out, "{actor_arg}")?;
    writeln!(out, ") -> Result<StatusCode, ApiError> {{")?;
    writeln!(
        out,
        "    if {class}Repository::new(state.pool.clone()).{action}(key{actor_value}).await? {{"
    )?;
    writeln!(out, "        Ok(StatusCode::NO_CONTENT)")?;
    writeln!(out, "    }} else {{")?;
    writeln!(out, "        Err(ApiError::NotFound)")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}
