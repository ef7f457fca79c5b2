//! IAM roles, instance profiles and managed policies.

use jci_id::{ConstructPath, LogicalId};
use jci_synth::{Attr, Stack};
use jci_template::{Expr, Pseudo, Resource};
use serde_json::{json, Value};

use crate::tags::name_tags;
use crate::ConstructError;

/// A provider-maintained permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedPolicy {
    name: String,
}

impl ManagedPolicy {
    /// An AWS managed policy by name (e.g., `AmazonSSMManagedInstanceCore`).
    pub fn aws_managed(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `arn:${AWS::Partition}:iam::aws:policy/<name>`.
    pub fn arn(&self) -> Expr {
        Expr::join(
            "",
            vec![
                Expr::string("arn:"),
                Expr::pseudo(Pseudo::Partition),
                Expr::string(format!(":iam::aws:policy/{}", self.name)),
            ],
        )
    }
}

/// An IAM role assumed by an AWS service.
#[derive(Debug, Clone)]
pub struct Role {
    path: ConstructPath,
    logical_id: LogicalId,
    role_name: Attr,
    arn: Attr,
}

impl Role {
    /// Create a role assumable by `service` (e.g., `ec2.amazonaws.com`).
    pub fn for_service(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        service: &str,
    ) -> Result<Self, ConstructError> {
        let path = scope.child(id)?;
        let mut resource = Resource::new("AWS::IAM::Role");
        resource.set_property(
            "AssumeRolePolicyDocument",
            json!({
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": service }
                }],
                "Version": "2012-10-17"
            }),
        );
        resource.set_property("Tags", name_tags(scope));
        let logical_id = stack.add_resource(&path, resource)?;

        Ok(Self {
            role_name: stack.ref_attr(&logical_id),
            arn: stack.get_att(&logical_id, "Arn"),
            path,
            logical_id,
        })
    }

    /// Attach a managed policy. Attaching the same policy twice is a no-op.
    pub fn add_managed_policy(
        &self,
        stack: &mut Stack,
        policy: &ManagedPolicy,
    ) -> Result<(), ConstructError> {
        let arn = Value::from(policy.arn());
        let resource = stack.resource_mut(&self.logical_id)?;
        let attached = match resource.property("ManagedPolicyArns") {
            Some(Value::Array(arns)) => arns.contains(&arn),
            _ => false,
        };
        if !attached {
            resource.push_property("ManagedPolicyArns", arn);
        }
        Ok(())
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the role (its name).
    pub fn role_name(&self) -> &Attr {
        &self.role_name
    }

    pub fn arn(&self) -> &Attr {
        &self.arn
    }
}

/// Instance profile wrapping a role for EC2.
#[derive(Debug, Clone)]
pub struct InstanceProfile {
    logical_id: LogicalId,
    name: Attr,
    arn: Attr,
}

impl InstanceProfile {
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        role: &Role,
    ) -> Result<Self, ConstructError> {
        let path = scope.child(id)?;
        let role_name = stack.resolve(role.role_name())?;
        let mut resource = Resource::new("AWS::IAM::InstanceProfile");
        resource.set_property("Roles", json!([Value::from(role_name)]));
        let logical_id = stack.add_resource(&path, resource)?;

        Ok(Self {
            name: stack.ref_attr(&logical_id),
            arn: stack.get_att(&logical_id, "Arn"),
            logical_id,
        })
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the profile (its name).
    pub fn name(&self) -> &Attr {
        &self.name
    }

    pub fn arn(&self) -> &Attr {
        &self.arn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jci_synth::{App, Context, StackProps};

    #[test]
    fn test_managed_policy_arn() {
        let arn = ManagedPolicy::aws_managed("AmazonSSMManagedInstanceCore").arn();
        assert_eq!(
            arn.to_value(),
            json!({ "Fn::Join": ["", [
                "arn:",
                { "Ref": "AWS::Partition" },
                ":iam::aws:policy/AmazonSSMManagedInstanceCore"
            ]] })
        );
    }

    #[test]
    fn test_role_and_profile() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let scope = stack.path().child("fleet").unwrap();
        let role = Role::for_service(stack, &scope, "InstanceRole", "ec2.amazonaws.com").unwrap();
        let policy = ManagedPolicy::aws_managed("AmazonSSMManagedInstanceCore");
        role.add_managed_policy(stack, &policy).unwrap();
        role.add_managed_policy(stack, &policy).unwrap();
        let profile = InstanceProfile::new(stack, &scope, "InstanceProfile", &role).unwrap();

        let template = stack.template();
        let role_resource = template.resource(role.logical_id().as_str()).unwrap();
        assert_eq!(
            role_resource.property("ManagedPolicyArns"),
            Some(&json!([Value::from(policy.arn())]))
        );
        assert_eq!(
            role_resource.property("AssumeRolePolicyDocument").unwrap()["Statement"][0]
                ["Principal"]["Service"],
            json!("ec2.amazonaws.com")
        );

        let profile_resource = template.resource(profile.logical_id().as_str()).unwrap();
        assert_eq!(
            profile_resource.property("Roles"),
            Some(&json!([{ "Ref": role.logical_id().as_str() }]))
        );
    }
}
