//! Plan artifact layout.
//!
//! A plan lives at `<root>/<application>/<environment>/`:
//!
//! ```text
//! manifest.json            ordered steps of the deployment
//! 01-<resource>/main.tf    one artifact directory per step
//! ```
//!
//! Writing is idempotent per identity: a second run replaces the manifest and
//! artifact files in place instead of adding steps. Artifacts of another
//! recipe left by an earlier run are removed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{DeploymentIdentity, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Infrastructure-as-code flavour of a step's artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeKind {
    #[default]
    Terraform,
    Bicep,
}

impl RecipeKind {
    pub const ALL: [RecipeKind; 2] = [RecipeKind::Terraform, RecipeKind::Bicep];

    pub fn artifact_file(&self) -> &'static str {
        match self {
            RecipeKind::Terraform => "main.tf",
            RecipeKind::Bicep => "main.bicep",
        }
    }

    fn render_stub(&self, identity: &DeploymentIdentity) -> String {
        let app = &identity.application;
        let env = &identity.environment;
        match self {
            RecipeKind::Terraform => format!(
                "# Deployment stub for {app} in {env}.\n\
                 module \"{app}\" {{\n  \
                   source      = \"./modules/application\"\n  \
                   application = \"{app}\"\n  \
                   environment = \"{env}\"\n\
                 }}\n"
            ),
            RecipeKind::Bicep => format!(
                "// Deployment stub for {app} in {env}.\n\
                 param application string = '{app}'\n\
                 param environment string = '{env}'\n"
            ),
        }
    }
}

/// One ordered step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based position in the plan.
    pub order: u32,
    pub resource_name: String,
    pub resource_type: String,
    pub recipe_kind: RecipeKind,
    /// Relative to the manifest's directory.
    pub artifact_directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanManifest {
    pub application: String,
    pub environment: String,
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<PlanStep>,
}

impl PlanManifest {
    /// Single-step plan deploying the application itself.
    pub fn for_application(identity: &DeploymentIdentity, recipe: RecipeKind) -> Self {
        let step = PlanStep {
            order: 1,
            resource_name: identity.application.clone(),
            resource_type: "application".to_string(),
            recipe_kind: recipe,
            artifact_directory: step_directory(1, &identity.application),
        };
        Self {
            application: identity.application.clone(),
            environment: identity.environment.clone(),
            generated_at: Utc::now(),
            steps: vec![step],
        }
    }
}

/// Directory holding the plan for `identity`.
pub fn plan_dir(root: &Path, identity: &DeploymentIdentity) -> PathBuf {
    root.join(&identity.application).join(&identity.environment)
}

pub fn manifest_path(root: &Path, identity: &DeploymentIdentity) -> PathBuf {
    plan_dir(root, identity).join(MANIFEST_FILE)
}

/// Write (or overwrite) the plan for one identity.
pub fn write_plan(
    root: &Path,
    identity: &DeploymentIdentity,
    recipe: RecipeKind,
) -> Result<PlanManifest> {
    let dir = plan_dir(root, identity);
    fs::create_dir_all(&dir)?;

    let manifest = PlanManifest::for_application(identity, recipe);
    for step in &manifest.steps {
        let artifact_dir = dir.join(&step.artifact_directory);
        fs::create_dir_all(&artifact_dir)?;
        for other in RecipeKind::ALL.iter().filter(|kind| **kind != step.recipe_kind) {
            remove_if_present(&artifact_dir.join(other.artifact_file()))?;
        }
        let artifact = artifact_dir.join(step.recipe_kind.artifact_file());
        fs::write(&artifact, step.recipe_kind.render_stub(identity))?;
        debug!(path = %artifact.display(), "wrote plan artifact");
    }

    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(dir.join(MANIFEST_FILE), json)?;
    info!(event = "plan.written", identity = %identity, steps = manifest.steps.len());
    Ok(manifest)
}

/// Write one independent plan per application for `environment`.
pub fn write_plans(
    root: &Path,
    applications: &[String],
    environment: &str,
    recipe: RecipeKind,
) -> Result<Vec<(DeploymentIdentity, PlanManifest)>> {
    applications
        .iter()
        .map(|app| {
            let identity = DeploymentIdentity::new(app.as_str(), environment)?;
            let manifest = write_plan(root, &identity, recipe)?;
            Ok((identity, manifest))
        })
        .collect()
}

pub fn read_manifest(root: &Path, identity: &DeploymentIdentity) -> Result<PlanManifest> {
    let content = fs::read_to_string(manifest_path(root, identity))?;
    Ok(serde_json::from_str(&content)?)
}

/// Application directories under `root`, sorted. A missing root has none.
pub fn discover_applications(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut apps = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with('.') {
            apps.push(name);
        }
    }
    apps.sort();
    Ok(apps)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale plan artifact");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn step_directory(order: u32, resource_name: &str) -> String {
    format!("{order:02}-{resource_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_single_step() {
        let identity = DeploymentIdentity::new("api", "prod").unwrap();
        let manifest = PlanManifest::for_application(&identity, RecipeKind::Terraform);
        assert_eq!(manifest.steps.len(), 1);
        assert_eq!(manifest.steps[0].order, 1);
        assert_eq!(manifest.steps[0].artifact_directory, "01-api");
    }

    #[test]
    fn test_recipe_artifact_files() {
        assert_eq!(RecipeKind::Terraform.artifact_file(), "main.tf");
        assert_eq!(RecipeKind::Bicep.artifact_file(), "main.bicep");
    }

    #[test]
    fn test_stub_mentions_identity() {
        let identity = DeploymentIdentity::new("web", "staging").unwrap();
        let stub = RecipeKind::Terraform.render_stub(&identity);
        assert!(stub.contains("module \"web\""));
        assert!(stub.contains("environment = \"staging\""));
    }

    #[test]
    fn test_discover_missing_root() {
        let apps = discover_applications(Path::new("/nonexistent/shipwright/plans")).unwrap();
        assert!(apps.is_empty());
    }
}
