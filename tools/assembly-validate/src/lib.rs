//! Consistency checks over a cloud assembly directory.
//!
//! The manifest must parse; each artifact's template must exist, be a JSON
//! object with `Resources`, and hash to the manifest value; dependencies must
//! name artifacts of the assembly; every `Fn::ImportValue` must match an
//! export of one of the importing stack's dependencies; and the directory
//! holds no template the manifest does not list.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use jci_synth::{AssemblyManifest, ASSEMBLY_VERSION, MANIFEST_FILE};
use jci_template::{import_names, TemplateHash};
use serde_json::Value;
use walkdir::WalkDir;

const TEMPLATE_SUFFIX: &str = ".template.json";

/// What a successful validation covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub templates: usize,
    pub imports: usize,
}

fn read_template(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("invalid JSON: {}", path.display()))?;
    if !value.is_object() {
        return Err(anyhow!("expected JSON object at top-level: {}", path.display()));
    }
    if !value.get("Resources").is_some_and(Value::is_object) {
        return Err(anyhow!("template has no Resources: {}", path.display()));
    }
    Ok(value)
}

fn export_names(template: &Value) -> BTreeSet<String> {
    template
        .get("Outputs")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|outputs| outputs.values())
        .filter_map(|o| o.pointer("/Export/Name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn template_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMPLATE_SUFFIX))
        })
        .collect();
    files.sort();
    files
}

/// Validate the assembly in `dir`.
pub fn validate(dir: &Path) -> Result<Report> {
    let manifest = AssemblyManifest::load(dir)
        .with_context(|| format!("failed to load {}", dir.join(MANIFEST_FILE).display()))?;
    if manifest.version != ASSEMBLY_VERSION {
        return Err(anyhow!(
            "unsupported assembly version {} (expected {})",
            manifest.version,
            ASSEMBLY_VERSION
        ));
    }

    let mut templates = BTreeMap::new();
    for artifact in &manifest.artifacts {
        let path = dir.join(&artifact.properties.template_file);
        let template = read_template(&path)?;
        let hash = TemplateHash::from_json(&template);
        if hash != artifact.template_hash {
            return Err(anyhow!(
                "template of {} changed since synthesis:\n  manifest: {}\n  file:     {}",
                artifact.id,
                artifact.template_hash,
                hash
            ));
        }
        templates.insert(artifact.id.clone(), template);
    }

    let mut imports = 0;
    for artifact in &manifest.artifacts {
        let mut available = BTreeSet::new();
        for dependency in &artifact.dependencies {
            let producer = templates.get(dependency).ok_or_else(|| {
                anyhow!("{} depends on unknown stack {}", artifact.id, dependency)
            })?;
            available.extend(export_names(producer));
        }

        let template = templates
            .get(&artifact.id)
            .ok_or_else(|| anyhow!("template of {} was not loaded", artifact.id))?;
        for import in import_names(template) {
            if !available.contains(&import) {
                return Err(anyhow!(
                    "{} imports {} but none of its dependencies export it",
                    artifact.id,
                    import
                ));
            }
            imports += 1;
        }
    }

    let listed: BTreeSet<&str> = manifest
        .artifacts
        .iter()
        .map(|a| a.properties.template_file.as_str())
        .collect();
    for path in template_files(dir) {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !listed.contains(name) {
            return Err(anyhow!("template not in manifest: {}", path.display()));
        }
    }

    Ok(Report {
        templates: templates.len(),
        imports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_assembly(dir: &Path, templates: &[(&str, Value, Vec<&str>)]) {
        let artifacts: Vec<Value> = templates
            .iter()
            .map(|(id, template, deps)| {
                std::fs::write(
                    dir.join(format!("{id}{TEMPLATE_SUFFIX}")),
                    serde_json::to_string_pretty(template).unwrap(),
                )
                .unwrap();
                json!({
                    "id": id,
                    "type": "aws:cloudformation:stack",
                    "environment": "aws://unknown-account/unknown-region",
                    "properties": { "templateFile": format!("{id}{TEMPLATE_SUFFIX}") },
                    "dependencies": deps,
                    "templateHash": TemplateHash::from_json(template)
                })
            })
            .collect();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&json!({ "version": "1", "artifacts": artifacts })).unwrap(),
        )
        .unwrap();
    }

    fn producer() -> Value {
        json!({
            "Resources": { "vpc": { "Type": "AWS::EC2::VPC" } },
            "Outputs": { "out": { "Value": { "Ref": "vpc" }, "Export": { "Name": "A:vpc" } } }
        })
    }

    fn consumer(import: &str) -> Value {
        json!({
            "Resources": {
                "sg": {
                    "Type": "AWS::EC2::SecurityGroup",
                    "Properties": { "VpcId": { "Fn::ImportValue": import } }
                }
            }
        })
    }

    #[test]
    fn test_valid_assembly() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            &[("A", producer(), vec![]), ("B", consumer("A:vpc"), vec!["A"])],
        );
        let report = validate(dir.path()).unwrap();
        assert_eq!(report, Report { templates: 2, imports: 1 });
    }

    #[test]
    fn test_unresolved_import() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            &[("A", producer(), vec![]), ("B", consumer("A:subnet"), vec!["A"])],
        );
        let err = validate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("A:subnet"));
    }

    #[test]
    fn test_import_without_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &[("A", producer(), vec![]), ("B", consumer("A:vpc"), vec![])]);
        assert!(validate(dir.path()).is_err());
    }

    #[test]
    fn test_edited_template() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &[("A", producer(), vec![])]);
        std::fs::write(
            dir.path().join("A.template.json"),
            r#"{ "Resources": { "vpc": { "Type": "AWS::EC2::Subnet" } } }"#,
        )
        .unwrap();
        let err = validate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("changed since synthesis"));
    }

    #[test]
    fn test_orphan_template() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &[("A", producer(), vec![])]);
        std::fs::write(dir.path().join("Old.template.json"), "{}").unwrap();
        let err = validate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not in manifest"));
    }

    #[test]
    fn test_missing_resources() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &[("A", json!({ "Outputs": {} }), vec![])]);
        assert!(validate(dir.path()).is_err());
    }
}
