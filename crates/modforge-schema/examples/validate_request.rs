use std::env;
use std::path::{Path, PathBuf};

use modforge_core::{EntityCatalog, EntitySummary};
use modforge_schema::{
    ValidationOptions, ValidationReport, request_schema_value, validate_request,
};
use serde_json::Value;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut request_path: Option<PathBuf> = None;
    let mut catalog_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--catalog" => {
                catalog_path = args.next().map(PathBuf::from);
            }
            _ => {
                if request_path.is_none() {
                    request_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let request_path = request_path.ok_or("missing request path")?;
    let request_json = load_json(&request_path)?;
    let catalog: EntityCatalog = match catalog_path {
        Some(path) => serde_json::from_value::<Vec<EntitySummary>>(load_json(&path)?)?
            .into_iter()
            .collect(),
        None => EntityCatalog::new(),
    };

    let schema = request_schema_value()?;
    let validated = match validate_request(
        &request_json,
        &schema,
        &catalog,
        &ValidationOptions::default(),
    ) {
        Ok(validated) => validated,
        Err(report) => {
            eprintln!("request validation failed");
            print_report(&report);
            std::process::exit(1);
        }
    };

    if !validated.warnings.is_empty() {
        eprintln!("request validated with warnings:");
        print_report(&ValidationReport {
            errors: Vec::new(),
            warnings: validated.warnings,
        });
    } else {
        println!("request for '{}' validated successfully", validated.job.entity.class_name);
    }

    Ok(())
}

fn load_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let json = serde_json::from_str(&contents)?;
    Ok(json)
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        eprintln!("error {} {}: {}", issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
    for issue in &report.warnings {
        eprintln!("warning {} {}: {}", issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
}
