use jci_id::ConstructPath;
use serde_json::{json, Value};

/// `Tags` list with a `Name` tag set to the construct path.
pub(crate) fn name_tags(path: &ConstructPath) -> Value {
    json!([{ "Key": "Name", "Value": path.to_string() }])
}
