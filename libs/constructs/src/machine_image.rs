//! Machine images resolved from SSM public parameters at deploy time.

use jci_id::LogicalId;
use jci_synth::Stack;
use jci_template::{Expr, Parameter};
use serde::{Deserialize, Serialize};

use crate::ConstructError;

/// Parameter type that makes CloudFormation resolve an image id from SSM.
const IMAGE_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

/// Latest Amazon Linux 2 (standard edition, x86_64, gp2 root).
const AMAZON_LINUX_2_PARAMETER: &str =
    "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2";

/// Operating system family of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Linux,
    #[serde(rename = "macos")]
    MacOs,
}

/// An image id looked up through an SSM parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineImage {
    parameter_name: String,
    os: OsType,
}

impl MachineImage {
    /// Amazon Linux 2, standard edition.
    pub fn amazon_linux_2() -> Self {
        Self::from_ssm_parameter(AMAZON_LINUX_2_PARAMETER, OsType::Linux)
    }

    /// Any image published under an SSM parameter.
    pub fn from_ssm_parameter(parameter_name: &str, os: OsType) -> Self {
        Self {
            parameter_name: parameter_name.to_string(),
            os,
        }
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn os(&self) -> OsType {
        self.os
    }

    /// Logical id of the template parameter holding the image id.
    pub fn parameter_logical_id(&self) -> Result<LogicalId, ConstructError> {
        Ok(LogicalId::from_components(&[
            "SsmParameterValue",
            self.parameter_name.as_str(),
            "Parameter",
        ])?)
    }

    /// Declare the image parameter in the stack (once) and return its `Ref`.
    pub fn image_id(&self, stack: &mut Stack) -> Result<Expr, ConstructError> {
        let id = self.parameter_logical_id()?;
        let parameter = Parameter::new(IMAGE_PARAMETER_TYPE).with_default(&self.parameter_name);
        let id = stack.add_parameter(id.as_str(), parameter)?;
        Ok(Expr::reference(&id))
    }
}
