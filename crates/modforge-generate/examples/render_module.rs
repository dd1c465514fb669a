//! Print the artifacts a descriptor would produce, without writing them.
//!
//! `cargo run -p modforge-generate --example render_module -- request.json`

use std::error::Error;

use modforge_core::EntityCatalog;
use modforge_generate::{GenerateOptions, ModuleModel, Renderer};
use modforge_schema::{ValidationOptions, request_schema_value, validate_request};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: render_module <request.json>")?;
    let request: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    let catalog = EntityCatalog::default();
    let validated = validate_request(
        &request,
        &request_schema_value()?,
        &catalog,
        &ValidationOptions::default(),
    )
    .map_err(|report| report.messages().join("\n"))?;

    let options = GenerateOptions::default();
    let model = ModuleModel::from_job(&validated.job, &catalog, &options.user_entity, "preview")?;
    let renderer = Renderer::new(&options);
    let mut rendered = renderer.module_sources(&model);
    rendered.artifacts.extend(renderer.scripts(&model).artifacts);

    for artifact in rendered.artifacts {
        println!("==> {} ({})", artifact.path.display(), artifact.kind);
        println!("{}", artifact.contents);
    }
    for issue in rendered.issues {
        eprintln!("{}: {}", issue.code, issue.message);
    }
    Ok(())
}
