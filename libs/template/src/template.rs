//! Template sections: resources, parameters and outputs.

use std::collections::{BTreeMap, BTreeSet};

use jci_id::{ExportName, LogicalId};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::expr::{collect_references, Reference};
use crate::{Expr, TemplateError, TemplateHash};

/// A resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Resource type (e.g., `AWS::EC2::VPC`).
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<Value>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Resource {
    /// Create a resource of the given type with no properties.
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties: Map::new(),
            depends_on: BTreeSet::new(),
            update_policy: None,
            metadata: Map::new(),
        }
    }

    /// Replace the property map.
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Set one property.
    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Append to a list-valued property, creating it if needed.
    pub fn push_property(&mut self, key: &str, value: impl Into<Value>) {
        let entry = self
            .properties
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value.into()),
            other => *other = Value::Array(vec![other.take(), value.into()]),
        }
    }

    /// Add an explicit dependency.
    pub fn add_dependency(&mut self, logical_id: impl AsRef<str>) {
        self.depends_on.insert(logical_id.as_ref().to_string());
    }

    /// Read one property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// Create a parameter of the given type.
    pub fn new(parameter_type: &str) -> Self {
        Self {
            parameter_type: parameter_type.to_string(),
            default: None,
            description: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Export block of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    pub name: ExportName,
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Expr,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

impl Output {
    /// Create an output for a value.
    pub fn new(value: Expr) -> Self {
        Self {
            value,
            description: None,
            export: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Export the value under a name other stacks can import.
    pub fn with_export(mut self, name: ExportName) -> Self {
        self.export = Some(Export { name });
        self
    }

    /// The export name, if exported.
    pub fn export_name(&self) -> Option<&ExportName> {
        self.export.as_ref().map(|e| &e.name)
    }
}

/// A CloudFormation template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,

    resources: BTreeMap<String, Resource>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,
}

impl Template {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Template description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Add a resource under a new logical id.
    pub fn add_resource(&mut self, id: &LogicalId, resource: Resource) -> Result<(), TemplateError> {
        if self.resources.contains_key(id.as_str()) || self.parameters.contains_key(id.as_str()) {
            return Err(TemplateError::DuplicateLogicalId {
                section: "Resources",
                id: id.to_string(),
            });
        }
        self.resources.insert(id.to_string(), resource);
        Ok(())
    }

    /// Add a parameter.
    ///
    /// Declaring an identical parameter twice is a no-op and returns `false`.
    pub fn add_parameter(&mut self, id: &LogicalId, parameter: Parameter) -> Result<bool, TemplateError> {
        if self.resources.contains_key(id.as_str()) {
            return Err(TemplateError::DuplicateLogicalId {
                section: "Parameters",
                id: id.to_string(),
            });
        }
        match self.parameters.get(id.as_str()) {
            Some(existing) if *existing == parameter => Ok(false),
            Some(_) => Err(TemplateError::ParameterConflict(id.to_string())),
            None => {
                self.parameters.insert(id.to_string(), parameter);
                Ok(true)
            }
        }
    }

    /// Add an output.
    pub fn add_output(&mut self, id: &LogicalId, output: Output) -> Result<(), TemplateError> {
        if self.outputs.contains_key(id.as_str()) {
            return Err(TemplateError::DuplicateLogicalId {
                section: "Outputs",
                id: id.to_string(),
            });
        }
        self.outputs.insert(id.to_string(), output);
        Ok(())
    }

    /// Look up a resource.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Look up a resource for modification.
    pub fn resource_mut(&mut self, id: &str) -> Result<&mut Resource, TemplateError> {
        self.resources
            .get_mut(id)
            .ok_or_else(|| TemplateError::UnknownLogicalId(id.to_string()))
    }

    /// All resources keyed by logical id.
    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    /// Resources of one type.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
            .map(|(id, r)| (id.as_str(), r))
    }

    /// All parameters keyed by logical id.
    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    /// Look up an output.
    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs.get(id)
    }

    /// All outputs keyed by logical id.
    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Names imported through `Fn::ImportValue`.
    pub fn imports(&self) -> Vec<String> {
        crate::import_names(&self.to_value())
    }

    /// Check that every reference points at a declared logical id.
    pub fn validate(&self) -> Result<(), TemplateError> {
        for (id, resource) in &self.resources {
            for dep in &resource.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(TemplateError::DanglingReference {
                        from: id.clone(),
                        target: dep.clone(),
                    });
                }
            }

            let mut refs = Vec::new();
            for value in resource.properties.values() {
                collect_references(value, &mut refs);
            }
            self.check_references(id, &refs)?;
        }

        for (id, output) in &self.outputs {
            let mut refs = Vec::new();
            collect_references(&output.value.to_value(), &mut refs);
            self.check_references(id, &refs)?;
        }

        Ok(())
    }

    fn check_references(&self, from: &str, refs: &[Reference]) -> Result<(), TemplateError> {
        for reference in refs {
            let (target, known) = match reference {
                Reference::Ref(target) => (
                    target,
                    self.resources.contains_key(target) || self.parameters.contains_key(target),
                ),
                Reference::GetAtt(target) => (target, self.resources.contains_key(target)),
            };
            if !known {
                return Err(TemplateError::DanglingReference {
                    from: from.to_string(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Render the template as JSON.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Pretty-printed JSON, as written to the cloud assembly.
    pub fn to_json_pretty(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// YAML rendering for display.
    pub fn to_yaml(&self) -> Result<String, TemplateError> {
        Ok(serde_yaml::to_string(&self.to_value())?)
    }

    /// Deterministic content hash.
    pub fn fingerprint(&self) -> TemplateHash {
        TemplateHash::from_json(&self.to_value())
    }
}
