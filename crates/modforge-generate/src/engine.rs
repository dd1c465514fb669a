use std::path::PathBuf;
use std::time::Instant;

use modforge_core::{EntitySummary, GenerationJob};
use tracing::{info, warn};

use crate::changeset::ChangeSet;
use crate::errors::Result;
use crate::model::{GenerateOptions, GenerationReport};
use crate::module::{ModuleModel, build_catalog, load_models};
use crate::registry::{
    ENTITY_REGISTRY_SCAFFOLD, MIGRATION_REGISTRY_SCAFFOLD, MODULE_REGISTRY_SCAFFOLD, RegistryEntry,
};
use crate::render::{Renderer, migration_name};
use crate::wiring::{relations_to_wire, wire_relations};

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub report: GenerationReport,
    pub model: ModuleModel,
}

/// Entry point for turning a validated job into module sources.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Render, wire and register the module of `job`.
    ///
    /// `external` lists entities the project declares outside of modforge
    /// (the operator `User`, for instance). Nothing is written when a
    /// registry cannot be updated.
    pub fn run(&self, job: &GenerationJob, external: &[EntitySummary]) -> Result<GenerationResult> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let module = job.entity.module.clone();
        info!(
            run_id = %run_id,
            module = %module,
            fields = job.fields.len(),
            "generation started"
        );

        match self.generate(&run_id, job, external) {
            Ok(mut result) => {
                result.report.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    module = %module,
                    files = result.report.files_written.len(),
                    wired = result.report.wired.len(),
                    warnings = result.report.warnings.len(),
                    duration_ms = result.report.duration_ms,
                    "generation completed"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(run_id = %run_id, module = %module, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    fn generate(
        &self,
        run_id: &str,
        job: &GenerationJob,
        external: &[EntitySummary],
    ) -> Result<GenerationResult> {
        let options = &self.options;
        let existing = load_models(&options.resolve(&options.modules_dir))?;
        let catalog = build_catalog(external.iter().cloned(), &existing);
        let previous = existing
            .iter()
            .find(|model| model.entity.module == job.entity.module);

        let migration = previous.map_or_else(
            || migration_name(&job.entity.module, chrono::Utc::now()),
            |model| model.migration.clone(),
        );
        let mut model = ModuleModel::from_job(job, &catalog, &options.user_entity, &migration)?;
        if let Some(previous) = previous {
            model.carry_over(previous);
            info!(module = %model.entity.module, "regenerating existing module");
        }

        let mut report = GenerationReport::new(run_id.to_string(), model.entity.module.clone());
        report.migration = model.migration.clone();

        let renderer = Renderer::new(options);
        let mut changes = ChangeSet::new(&options.root);

        let wiring = wire_relations(
            &renderer,
            &mut model,
            &relations_to_wire(job),
            &existing,
            &mut changes,
        );
        report.wired = wiring.wired;
        for issue in wiring.issues {
            report.record_warning(issue);
        }

        let mut rendered = renderer.module_sources(&model);
        if previous.is_none() {
            let scripts = renderer.scripts(&model);
            rendered.artifacts.extend(scripts.artifacts);
            rendered.issues.extend(scripts.issues);
        }
        for issue in rendered.issues {
            report.record_warning(issue);
        }
        for artifact in rendered.artifacts {
            changes.stage(artifact.path, artifact.contents);
        }

        let registries: [(&PathBuf, &str, RegistryEntry); 4] = [
            (
                &options.module_registry,
                MODULE_REGISTRY_SCAFFOLD,
                RegistryEntry::module(&model.entity.module)?,
            ),
            (
                &options.module_registry,
                MODULE_REGISTRY_SCAFFOLD,
                RegistryEntry::routes(&model.entity.module)?,
            ),
            (
                &options.entity_registry,
                ENTITY_REGISTRY_SCAFFOLD,
                RegistryEntry::entity(&model.entity.module, &model.entity.class_name)?,
            ),
            (
                &options.migration_registry,
                MIGRATION_REGISTRY_SCAFFOLD,
                RegistryEntry::migration(&model.migration)?,
            ),
        ];
        for (relative, scaffold, entry) in &registries {
            if changes.stage_registry(relative, scaffold, entry)?
                && !report.registries_updated.contains(*relative)
            {
                report.registries_updated.push((*relative).clone());
            }
        }

        info!(
            run_id = %run_id,
            module = %model.entity.module,
            staged = changes.len(),
            "committing change set"
        );
        report.files_written = changes.commit()?;
        Ok(GenerationResult { report, model })
    }
}
