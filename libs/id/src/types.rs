//! Validated names and construct paths.
//!
//! Names that CloudFormation interprets (stack names, export names) are
//! checked against the service limits when they are created, so a bad name
//! fails at synthesis rather than at deploy time.

use crate::define_name;
use crate::{IdError, LogicalId};

// =============================================================================
// Validators
// =============================================================================

fn check_len(kind: &'static str, s: &str, max: usize) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    let len = s.chars().count();
    if len > max {
        return Err(IdError::TooLong {
            kind,
            value: s.to_string(),
            len,
            max,
        });
    }
    Ok(())
}

fn invalid(kind: &'static str, s: &str, character: char) -> IdError {
    IdError::InvalidCharacter {
        kind,
        value: s.to_string(),
        character,
    }
}

/// Stack names: letter first, then alphanumerics or hyphens, at most 128.
fn validate_stack_name(kind: &'static str, s: &str) -> Result<(), IdError> {
    check_len(kind, s, 128)?;
    let mut chars = s.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() {
            return Err(invalid(kind, s, first));
        }
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '-')) {
        return Err(invalid(kind, s, bad));
    }
    Ok(())
}

/// Export names: alphanumerics, colons and hyphens, at most 255.
fn validate_export_name(kind: &'static str, s: &str) -> Result<(), IdError> {
    check_len(kind, s, 255)?;
    if let Some(bad) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == ':' || *c == '-'))
    {
        return Err(invalid(kind, s, bad));
    }
    Ok(())
}

/// Construct ids: any non-empty string without a path separator.
fn validate_construct_id(kind: &'static str, s: &str) -> Result<(), IdError> {
    check_len(kind, s, 255)?;
    if s.contains('/') {
        return Err(invalid(kind, s, '/'));
    }
    Ok(())
}

// =============================================================================
// Names
// =============================================================================

define_name!(StackName, "stack name", validate_stack_name);
define_name!(ExportName, "export name", validate_export_name);
define_name!(ConstructId, "construct id", validate_construct_id);

// =============================================================================
// Construct Paths
// =============================================================================

/// Location of a construct in the tree, rooted at its stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstructPath {
    components: Vec<String>,
}

impl ConstructPath {
    /// Path of a stack itself.
    #[must_use]
    pub fn root(stack: &StackName) -> Self {
        Self {
            components: vec![stack.to_string()],
        }
    }

    /// Returns the path of a child construct.
    pub fn child(&self, id: &str) -> Result<Self, IdError> {
        let id = ConstructId::parse(id)?;
        let mut components = self.components.clone();
        components.push(id.to_string());
        Ok(Self { components })
    }

    /// All components including the stack name.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Components below the stack root.
    pub fn below_root(&self) -> &[String] {
        self.components.get(1..).unwrap_or(&[])
    }

    /// Name of the stack this path belongs to.
    pub fn stack(&self) -> &str {
        self.components.first().map(String::as_str).unwrap_or("")
    }

    /// The last component (the construct's own id).
    pub fn id(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    /// Derives the CloudFormation logical id for this path.
    pub fn logical_id(&self) -> Result<LogicalId, IdError> {
        LogicalId::from_components(self.below_root())
    }
}

impl std::fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("JenkinsStack")]
    #[case("JenkinsMacAgentStack")]
    #[case("jenkins-prod-1")]
    fn test_stack_name_valid(#[case] name: &str) {
        assert!(StackName::parse(name).is_ok());
    }

    #[rstest]
    #[case("", IdError::Empty)]
    #[case("1stack", invalid("stack name", "1stack", '1'))]
    #[case("jenkins_stack", invalid("stack name", "jenkins_stack", '_'))]
    fn test_stack_name_invalid(#[case] name: &str, #[case] expected: IdError) {
        assert_eq!(StackName::parse(name).unwrap_err(), expected);
    }

    #[test]
    fn test_stack_name_too_long() {
        let name = "a".repeat(129);
        assert!(matches!(
            StackName::parse(&name).unwrap_err(),
            IdError::TooLong { len: 129, max: 128, .. }
        ));
    }

    #[test]
    fn test_export_name_allows_colon() {
        let name = ExportName::parse("JenkinsStack:ExportsOutputRefmacvpc1A2B3C4D").unwrap();
        assert_eq!(name.as_str(), "JenkinsStack:ExportsOutputRefmacvpc1A2B3C4D");
        assert!(ExportName::parse("lb url").is_err());
    }

    #[test]
    fn test_construct_id_rejects_separator() {
        assert!(ConstructId::parse("mac-vpc").is_ok());
        assert!(matches!(
            ConstructId::parse("mac/vpc").unwrap_err(),
            IdError::InvalidCharacter { character: '/', .. }
        ));
    }

    #[test]
    fn test_path_display_and_components() {
        let stack = StackName::parse("JenkinsStack").unwrap();
        let path = ConstructPath::root(&stack)
            .child("mac-vpc")
            .unwrap()
            .child("Resource")
            .unwrap();

        assert_eq!(path.to_string(), "JenkinsStack/mac-vpc/Resource");
        assert_eq!(path.stack(), "JenkinsStack");
        assert_eq!(path.id(), "Resource");
        assert_eq!(path.below_root(), ["mac-vpc", "Resource"]);
    }

    #[test]
    fn test_name_json_roundtrip() {
        let name = StackName::parse("JenkinsStack").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"JenkinsStack\"");
        let parsed: StackName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);

        let bad: Result<StackName, _> = serde_json::from_str("\"9lives\"");
        assert!(bad.is_err());
    }
}
