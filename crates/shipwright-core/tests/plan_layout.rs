//! Plan artifact layout on disk.

use std::fs;

use shipwright_core::plan::{manifest_path, plan_dir, MANIFEST_FILE};
use shipwright_core::{
    discover_applications, read_manifest, write_plan, write_plans, DeploymentIdentity,
    RecipeKind,
};
use tempfile::TempDir;

fn apps(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_one_plan_per_application() {
    let tmp = TempDir::new().unwrap();

    let written = write_plans(tmp.path(), &apps(&["a", "b"]), "prod", RecipeKind::Terraform)
        .expect("write plans");

    assert_eq!(written.len(), 2);
    for (identity, manifest) in &written {
        assert_eq!(manifest.steps.len(), 1);
        assert_eq!(manifest.steps[0].order, 1);
        assert_eq!(manifest.application, identity.application);
        assert_eq!(manifest.environment, "prod");

        let dir = plan_dir(tmp.path(), identity);
        assert!(dir.join(MANIFEST_FILE).is_file());
        let artifact = dir
            .join(&manifest.steps[0].artifact_directory)
            .join("main.tf");
        assert!(artifact.is_file(), "missing {}", artifact.display());
    }

    assert_eq!(discover_applications(tmp.path()).unwrap(), apps(&["a", "b"]));
}

#[test]
fn test_rewrite_replaces_instead_of_appending() {
    let tmp = TempDir::new().unwrap();
    let identity = DeploymentIdentity::new("api", "staging").unwrap();

    write_plan(tmp.path(), &identity, RecipeKind::Terraform).unwrap();
    write_plan(tmp.path(), &identity, RecipeKind::Terraform).unwrap();

    let manifest = read_manifest(tmp.path(), &identity).unwrap();
    assert_eq!(manifest.steps.len(), 1);

    let step_dirs: Vec<_> = fs::read_dir(plan_dir(tmp.path(), &identity))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    assert_eq!(step_dirs.len(), 1);
}

#[test]
fn test_recipe_switch_removes_stale_artifact() {
    let tmp = TempDir::new().unwrap();
    let identity = DeploymentIdentity::new("api", "prod").unwrap();

    let first = write_plan(tmp.path(), &identity, RecipeKind::Terraform).unwrap();
    let step_dir = plan_dir(tmp.path(), &identity).join(&first.steps[0].artifact_directory);
    assert!(step_dir.join("main.tf").is_file());

    write_plan(tmp.path(), &identity, RecipeKind::Bicep).unwrap();

    assert!(!step_dir.join("main.tf").exists());
    assert!(step_dir.join("main.bicep").is_file());
    let files: Vec<_> = fs::read_dir(&step_dir).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_manifest_roundtrips_recipe_kind() {
    let tmp = TempDir::new().unwrap();
    let identity = DeploymentIdentity::new("web", "dev").unwrap();

    let written = write_plan(tmp.path(), &identity, RecipeKind::Bicep).unwrap();
    let read = read_manifest(tmp.path(), &identity).unwrap();

    assert_eq!(read, written);
    assert_eq!(read.steps[0].recipe_kind, RecipeKind::Bicep);
    let raw = fs::read_to_string(manifest_path(tmp.path(), &identity)).unwrap();
    assert!(raw.contains("\"recipe_kind\": \"bicep\""));
}

#[test]
fn test_invalid_application_name_rejected() {
    let tmp = TempDir::new().unwrap();
    let err = write_plans(tmp.path(), &apps(&["ok", "bad/name"]), "prod", RecipeKind::Terraform)
        .unwrap_err();
    assert!(err.to_string().contains("bad/name"));
}

#[test]
fn test_discover_skips_hidden_and_files() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join(".git")).unwrap();
    fs::create_dir(tmp.path().join("zeta")).unwrap();
    fs::create_dir(tmp.path().join("alpha")).unwrap();
    fs::write(tmp.path().join("README.md"), "plans").unwrap();

    assert_eq!(
        discover_applications(tmp.path()).unwrap(),
        apps(&["alpha", "zeta"])
    );
}
