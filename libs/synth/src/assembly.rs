//! Cloud assembly: the synthesized templates plus a manifest.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jci_id::StackName;
use jci_template::{Template, TemplateHash};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Environment, Stack, SynthError};

/// Manifest file name inside the assembly directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest format version.
pub const ASSEMBLY_VERSION: &str = "1";

/// Artifact type of a CloudFormation stack.
const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Provider name for zone lookups.
const AZ_PROVIDER: &str = "availability-zones";

/// A context lookup synthesis needed but could not find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingContext {
    pub key: String,
    pub provider: String,
    pub props: BTreeMap<String, String>,
}

impl MissingContext {
    pub(crate) fn availability_zones(account: &str, region: &str) -> Self {
        let mut props = BTreeMap::new();
        props.insert("account".to_string(), account.to_string());
        props.insert("region".to_string(), region.to_string());
        Self {
            key: crate::Context::availability_zones_key(account, region),
            provider: AZ_PROVIDER.to_string(),
            props,
        }
    }
}

/// One synthesized stack.
#[derive(Debug, Clone)]
pub struct StackArtifact {
    pub name: StackName,
    pub environment: Environment,
    pub template: Template,
    pub template_hash: TemplateHash,
    pub dependencies: Vec<String>,
    pub termination_protection: bool,
}

impl StackArtifact {
    pub(crate) fn new(stack: &Stack, template: Template) -> Self {
        Self {
            name: stack.name().clone(),
            environment: stack.environment().clone(),
            template_hash: template.fingerprint(),
            template,
            dependencies: stack.dependencies().iter().cloned().collect(),
            termination_protection: stack.termination_protection(),
        }
    }

    /// File name of the template inside the assembly.
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

/// Result of synthesizing an app.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    stacks: Vec<StackArtifact>,
    missing: Vec<MissingContext>,
}

impl CloudAssembly {
    pub(crate) fn new(stacks: Vec<StackArtifact>, missing: Vec<MissingContext>) -> Self {
        Self { stacks, missing }
    }

    /// Stacks in deployment order.
    pub fn stacks(&self) -> &[StackArtifact] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name.as_str() == name)
    }

    /// Context lookups that synthesis fell back on.
    pub fn missing(&self) -> &[MissingContext] {
        &self.missing
    }

    /// Manifest describing the assembly.
    pub fn manifest(&self) -> AssemblyManifest {
        AssemblyManifest {
            version: ASSEMBLY_VERSION.to_string(),
            artifacts: self
                .stacks
                .iter()
                .map(|s| ManifestArtifact {
                    id: s.name.to_string(),
                    artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                    environment: s.environment.to_string(),
                    properties: ArtifactProperties {
                        template_file: s.template_file(),
                        termination_protection: s.termination_protection,
                    },
                    dependencies: s.dependencies.clone(),
                    template_hash: s.template_hash.clone(),
                })
                .collect(),
            missing: self.missing.clone(),
        }
    }

    /// Write every template and the manifest into `dir`.
    pub fn write(&self, dir: &Path) -> Result<AssemblyManifest, SynthError> {
        fs::create_dir_all(dir).map_err(|e| SynthError::io(dir, e))?;

        for stack in &self.stacks {
            let path = dir.join(stack.template_file());
            let json = stack.template.to_json_pretty()?;
            fs::write(&path, json).map_err(|e| SynthError::io(&path, e))?;
        }

        let manifest = self.manifest();
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)
            .map_err(|e| SynthError::io(&path, e))?;

        info!(
            dir = %dir.display(),
            stacks = self.stacks.len(),
            missing_context = self.missing.len(),
            "cloud assembly written"
        );
        Ok(manifest)
    }
}

/// `manifest.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyManifest {
    pub version: String,

    pub artifacts: Vec<ManifestArtifact>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingContext>,
}

impl AssemblyManifest {
    /// Read the manifest of an assembly directory.
    pub fn load(dir: &Path) -> Result<Self, SynthError> {
        let path = dir.join(MANIFEST_FILE);
        let contents = fs::read_to_string(&path).map_err(|e| SynthError::io(&path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn artifact(&self, id: &str) -> Option<&ManifestArtifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }
}

/// One artifact entry of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestArtifact {
    pub id: String,

    #[serde(rename = "type")]
    pub artifact_type: String,

    /// `aws://<account>/<region>`.
    pub environment: String,

    pub properties: ArtifactProperties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    pub template_hash: TemplateHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    pub template_file: String,

    #[serde(default)]
    pub termination_protection: bool,
}
