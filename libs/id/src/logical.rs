//! CloudFormation logical ids derived from construct paths.

use sha2::{Digest, Sha256};

use crate::IdError;

/// Path component that is dropped from both the hash and the human part.
const HIDDEN_ID: &str = "Default";

/// Path component that is kept in the hash but hidden from the human part.
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";

/// Maximum length of a CloudFormation logical id.
const MAX_ID_LEN: usize = 255;

/// Maximum length of the human-readable part.
const MAX_HUMAN_LEN: usize = 240;

/// Number of hex characters of the path hash.
const HASH_LEN: usize = 8;

/// A CloudFormation logical id (alphanumeric, at most 255 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derives a logical id from path components below a stack.
    pub fn from_components<S: AsRef<str>>(components: &[S]) -> Result<Self, IdError> {
        let components: Vec<&str> = components
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| *c != HIDDEN_ID)
            .collect();

        if components.is_empty() {
            return Err(IdError::EmptyPath);
        }

        if let [only] = components.as_slice() {
            let top_level = remove_non_alphanumeric(only);
            if top_level.is_empty() {
                return Err(IdError::InvalidFormat {
                    message: format!("'{}' has no alphanumeric characters", only),
                });
            }
            if top_level.len() <= MAX_ID_LEN {
                return Ok(Self(top_level));
            }
        }

        let hash = path_hash(&components);
        let human: String = remove_dupes(&components)
            .into_iter()
            .filter(|c| *c != HIDDEN_FROM_HUMAN_ID)
            .map(remove_non_alphanumeric)
            .collect::<String>()
            .chars()
            .take(MAX_HUMAN_LEN)
            .collect();

        Ok(Self(format!("{}{}", human, hash)))
    }

    /// Wraps an already-computed logical id after checking its format.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.len() > MAX_ID_LEN {
            return Err(IdError::TooLong {
                kind: "logical id",
                value: s.to_string(),
                len: s.len(),
                max: MAX_ID_LEN,
            });
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(IdError::InvalidCharacter {
                kind: "logical id",
                value: s.to_string(),
                character: bad,
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Upper-case hex prefix of the SHA-256 of the joined path.
fn path_hash(components: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(components.join("/").as_bytes());
    let digest = hex::encode_upper(hasher.finalize());
    digest[..HASH_LEN].to_string()
}

fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Drops a component when its predecessor already ends with it
/// (`Subnet1/Subnet1` or `PublicSubnet/Subnet` style repetition).
fn remove_dupes<'a>(components: &[&'a str]) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::with_capacity(components.len());
    for component in components {
        match out.last() {
            Some(prev) if prev.ends_with(*component) => {}
            _ => out.push(*component),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_top_level_keeps_name() {
        let id = LogicalId::from_components(&["loadbalancer-url-output"]).unwrap();
        assert_eq!(id.as_str(), "loadbalancerurloutput");
    }

    #[test]
    fn test_nested_gets_hash() {
        let id = LogicalId::from_components(&["mac-vpc", "Resource"]).unwrap();
        assert!(id.as_str().starts_with("macvpc"));
        assert_eq!(id.as_str().len(), "macvpc".len() + HASH_LEN);
        assert!(id.as_str()["macvpc".len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_default_is_hidden() {
        let with_default = LogicalId::from_components(&["jenkins-sg", "Default"]).unwrap();
        let without = LogicalId::from_components(&["jenkins-sg"]).unwrap();
        assert_eq!(with_default, without);
    }

    #[test]
    fn test_resource_hidden_from_human_part_only() {
        let a = LogicalId::from_components(&["alb-jenkins", "Resource"]).unwrap();
        let b = LogicalId::from_components(&["alb-jenkins", "Other"]).unwrap();
        assert!(a.as_str().starts_with("albjenkins"));
        assert!(!a.as_str().contains("Resource"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_suffix_removed() {
        let id = LogicalId::from_components(&["mac-vpc", "PublicSubnet1", "Subnet1"]).unwrap();
        assert!(id.as_str().starts_with("macvpcPublicSubnet1"));
        assert!(!id.as_str().starts_with("macvpcPublicSubnet1Subnet1"));
    }

    #[test]
    fn test_empty_path_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(LogicalId::from_components(&empty), Err(IdError::EmptyPath));
        assert_eq!(
            LogicalId::from_components(&["Default"]),
            Err(IdError::EmptyPath)
        );
    }

    #[test]
    fn test_parse_rejects_symbols() {
        assert!(LogicalId::parse("macvpc1234ABCD").is_ok());
        assert!(LogicalId::parse("mac-vpc").is_err());
    }

    proptest! {
        #[test]
        fn prop_logical_ids_are_alphanumeric(
            components in prop::collection::vec("[a-z][a-zA-Z0-9-]{0,20}", 1..5)
        ) {
            let id = LogicalId::from_components(&components).unwrap();
            prop_assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
            prop_assert!(id.as_str().len() <= MAX_ID_LEN);
        }

        #[test]
        fn prop_logical_ids_are_deterministic(
            components in prop::collection::vec("[a-z][a-zA-Z0-9]{0,12}", 2..5)
        ) {
            let a = LogicalId::from_components(&components).unwrap();
            let b = LogicalId::from_components(&components).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
