//! Synthesis context: cached lookups that make templates environment-specific.

use std::collections::BTreeMap;
use std::path::Path;

use jci_networking::select_zones;
use jci_template::Expr;
use serde_json::Value;

use crate::{Environment, SynthError};

/// Number of zones assumed when the real list is unknown.
const AGNOSTIC_ZONE_COUNT: usize = 2;

/// Key/value lookups loaded from a context file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object of lookups. A missing file is an empty context.
    pub fn load(path: &Path) -> Result<Self, SynthError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| SynthError::io(path, e))?;
        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| SynthError::Context(format!("{}: {}", path.display(), e)))?;
        Self::from_json(value)
    }

    /// Build from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, SynthError> {
        match value {
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            other => Err(SynthError::Context(format!(
                "expected a JSON object, found {}",
                other
            ))),
        }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a value.
    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lookup key for the zones of an account and region.
    pub fn availability_zones_key(account: &str, region: &str) -> String {
        format!("availability-zones:account={}:region={}", account, region)
    }

    /// Zones recorded for a concrete environment.
    pub fn availability_zones(&self, env: &Environment) -> Option<Vec<String>> {
        let (Some(account), Some(region)) = (&env.account, &env.region) else {
            return None;
        };
        let zones = self.get(&Self::availability_zones_key(account, region))?;
        let zones: Vec<String> = zones
            .as_array()?
            .iter()
            .filter_map(|z| z.as_str().map(str::to_string))
            .collect();
        (!zones.is_empty()).then_some(zones)
    }
}

/// Availability zones a stack can place subnets in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityZones {
    /// Zone names known at synthesis time.
    Named(Vec<String>),
    /// Only the count is known; names resolve at deploy time.
    Agnostic(usize),
}

impl AvailabilityZones {
    /// The fallback used when zone names are unknown.
    pub fn agnostic() -> Self {
        AvailabilityZones::Agnostic(AGNOSTIC_ZONE_COUNT)
    }

    /// Number of zones.
    pub fn len(&self) -> usize {
        match self {
            AvailabilityZones::Named(zones) => zones.len(),
            AvailabilityZones::Agnostic(count) => *count,
        }
    }

    /// True if there are no zones.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep at most `max` zones.
    pub fn limit(self, max: usize) -> Self {
        match self {
            AvailabilityZones::Named(zones) => {
                AvailabilityZones::Named(select_zones(&zones, max))
            }
            AvailabilityZones::Agnostic(count) => AvailabilityZones::Agnostic(count.min(max)),
        }
    }

    /// Template value for the zone at `index`.
    pub fn expr(&self, index: usize) -> Expr {
        match self {
            AvailabilityZones::Named(zones) => match zones.get(index) {
                Some(zone) => Expr::string(zone),
                None => Expr::select(index, Expr::azs_of_current_region()),
            },
            AvailabilityZones::Agnostic(_) => Expr::select(index, Expr::azs_of_current_region()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with_zones() -> Context {
        Context::from_json(json!({
            "availability-zones:account=123456789012:region=us-east-1":
                ["us-east-1a", "us-east-1b", "us-east-1c"]
        }))
        .unwrap()
    }

    #[test]
    fn test_zones_for_concrete_environment() {
        let ctx = context_with_zones();
        let zones = ctx.availability_zones(&Environment::new("123456789012", "us-east-1"));
        assert_eq!(zones.map(|z| z.len()), Some(3));
    }

    #[test]
    fn test_zones_unknown_for_other_region_or_agnostic() {
        let ctx = context_with_zones();
        assert!(ctx
            .availability_zones(&Environment::new("123456789012", "eu-west-1"))
            .is_none());
        assert!(ctx.availability_zones(&Environment::agnostic()).is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            Context::from_json(json!(["a"])),
            Err(SynthError::Context(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::load(&dir.path().join("cdk.context.json")).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdk.context.json");
        std::fs::write(&path, r#"{"some-key": "value"}"#).unwrap();
        let ctx = Context::load(&path).unwrap();
        assert_eq!(ctx.get("some-key"), Some(&json!("value")));
    }

    #[test]
    fn test_zone_expressions() {
        let named = AvailabilityZones::Named(vec!["us-east-1a".into(), "us-east-1b".into()]);
        assert_eq!(named.expr(1), Expr::string("us-east-1b"));

        let agnostic = AvailabilityZones::agnostic();
        assert_eq!(
            agnostic.expr(0).to_value(),
            json!({ "Fn::Select": [0, { "Fn::GetAZs": "" }] })
        );
        assert_eq!(agnostic.len(), 2);
    }

    #[test]
    fn test_limit() {
        let named = AvailabilityZones::Named(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(named.limit(2).len(), 2);
        assert_eq!(AvailabilityZones::agnostic().limit(99).len(), 2);
        assert_eq!(AvailabilityZones::agnostic().limit(1).len(), 1);
    }
}
