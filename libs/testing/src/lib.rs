//! Test helpers for synthesized templates.
//!
//! Assertions panic with the offending template fragment so a failing test
//! shows what was actually generated.

use jci_template::Template;
use serde_json::{Map, Value};

/// Returns true when every key in `expected` is present in `actual` with a
/// matching value. Objects are compared as subsets; arrays must contain a
/// matching element for every expected element, in order.
pub fn is_subset(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| is_subset(value, a))),
        (Value::Array(expected), Value::Array(actual)) => {
            let mut remaining = actual.iter();
            expected
                .iter()
                .all(|e| remaining.by_ref().any(|a| is_subset(e, a)))
        }
        _ => expected == actual,
    }
}

/// Read-only view of a template for assertions.
pub struct TemplateAssertions {
    json: Value,
}

impl TemplateAssertions {
    pub fn from_template(template: &Template) -> Self {
        Self {
            json: template.to_value(),
        }
    }

    pub fn from_json(json: Value) -> Self {
        Self { json }
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    fn section(&self, name: &str) -> Map<String, Value> {
        self.json
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// `(logical id, resource)` pairs of the given type.
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(String, Value)> {
        self.section("Resources")
            .into_iter()
            .filter(|(_, r)| r.get("Type").and_then(Value::as_str) == Some(resource_type))
            .collect()
    }

    /// Resources of the given type whose `Properties` contain `properties`.
    pub fn find_resources(&self, resource_type: &str, properties: &Value) -> Vec<(String, Value)> {
        self.resources_of_type(resource_type)
            .into_iter()
            .filter(|(_, r)| {
                let actual = r.get("Properties").cloned().unwrap_or(Value::Object(Map::new()));
                is_subset(properties, &actual)
            })
            .collect()
    }

    pub fn resource_count_is(&self, resource_type: &str, count: usize) {
        let found = self.resources_of_type(resource_type);
        assert_eq!(
            found.len(),
            count,
            "expected {count} {resource_type} resources, found {}: {:#?}",
            found.len(),
            found.iter().map(|(id, _)| id).collect::<Vec<_>>()
        );
    }

    pub fn has_resource_properties(&self, resource_type: &str, properties: Value) {
        assert!(
            !self.find_resources(resource_type, &properties).is_empty(),
            "no {resource_type} matches {properties:#}; candidates: {:#}",
            Value::Array(
                self.resources_of_type(resource_type)
                    .into_iter()
                    .map(|(_, r)| r)
                    .collect()
            )
        );
    }

    /// Like [`Self::has_resource_properties`] but matches the whole resource
    /// body, including `DependsOn` and `UpdatePolicy`.
    pub fn has_resource(&self, resource_type: &str, body: Value) {
        let found = self
            .resources_of_type(resource_type)
            .into_iter()
            .any(|(_, r)| is_subset(&body, &r));
        assert!(found, "no {resource_type} resource matches {body:#}");
    }

    /// The single resource of a type; panics if there are none or several.
    pub fn only_resource(&self, resource_type: &str) -> (String, Value) {
        let mut found = self.resources_of_type(resource_type);
        assert_eq!(found.len(), 1, "expected exactly one {resource_type}");
        found.remove(0)
    }

    pub fn output(&self, logical_id: &str) -> Option<Value> {
        self.section("Outputs").get(logical_id).cloned()
    }

    pub fn has_output(&self, logical_id: &str, body: Value) {
        let actual = self
            .output(logical_id)
            .unwrap_or_else(|| panic!("no output {logical_id}"));
        assert!(
            is_subset(&body, &actual),
            "output {logical_id} is {actual:#}, expected {body:#}"
        );
    }

    pub fn parameter(&self, logical_id: &str) -> Option<Value> {
        self.section("Parameters").get(logical_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subset_objects_and_arrays() {
        let actual = json!({ "A": 1, "B": [{ "X": 1, "Y": 2 }, { "X": 3 }], "C": "c" });
        assert!(is_subset(&json!({ "A": 1 }), &actual));
        assert!(is_subset(&json!({ "B": [{ "X": 3 }] }), &actual));
        assert!(is_subset(&json!({ "B": [{ "X": 1 }, { "X": 3 }] }), &actual));
        assert!(!is_subset(&json!({ "B": [{ "X": 3 }, { "X": 1 }] }), &actual));
        assert!(!is_subset(&json!({ "D": 1 }), &actual));
        assert!(!is_subset(&json!({ "A": "1" }), &actual));
    }

    #[test]
    fn test_counts_and_outputs() {
        let assertions = TemplateAssertions::from_json(json!({
            "Resources": {
                "a": { "Type": "AWS::EC2::VPC", "Properties": { "CidrBlock": "10.0.0.0/16" } },
                "b": { "Type": "AWS::EC2::Subnet" }
            },
            "Outputs": { "url": { "Value": "x" } }
        }));
        assertions.resource_count_is("AWS::EC2::VPC", 1);
        assertions.resource_count_is("AWS::EC2::Host", 0);
        assertions.has_resource_properties("AWS::EC2::VPC", json!({ "CidrBlock": "10.0.0.0/16" }));
        assertions.has_resource_properties("AWS::EC2::Subnet", json!({}));
        assertions.has_output("url", json!({ "Value": "x" }));
        assert!(assertions.output("missing").is_none());
    }
}
