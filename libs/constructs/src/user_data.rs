//! Boot-time scripts handed to instances.

use jci_template::Expr;

use crate::OsType;

/// A shell script run once by the instance at first boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    shebang: String,
    commands: Vec<String>,
}

impl UserData {
    /// Bash script for Linux instances.
    pub fn for_linux() -> Self {
        Self::custom("#!/bin/bash")
    }

    /// Shell script for macOS instances.
    pub fn for_macos() -> Self {
        Self::custom("#!/bin/zsh")
    }

    /// Script for the given operating system.
    pub fn for_os(os: OsType) -> Self {
        match os {
            OsType::Linux => Self::for_linux(),
            OsType::MacOs => Self::for_macos(),
        }
    }

    /// Script with an arbitrary interpreter line.
    pub fn custom(shebang: &str) -> Self {
        Self {
            shebang: shebang.to_string(),
            commands: Vec::new(),
        }
    }

    /// Append commands, each rendered on its own line(s) as given.
    pub fn add_commands<I, S>(&mut self, commands: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// The full script text.
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.commands.len() + 1);
        lines.push(self.shebang.as_str());
        lines.extend(self.commands.iter().map(String::as_str));
        lines.join("\n")
    }

    /// `Fn::Base64` of the script, as launch templates and instances expect.
    pub fn to_expr(&self) -> Expr {
        Expr::base64(Expr::string(self.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render() {
        let mut user_data = UserData::for_linux();
        user_data.add_commands(["yum upgrade -y", "systemctl start jenkins"]);
        assert_eq!(
            user_data.render(),
            "#!/bin/bash\nyum upgrade -y\nsystemctl start jenkins"
        );
    }

    #[test]
    fn test_empty_script_is_just_shebang() {
        assert_eq!(UserData::for_macos().render(), "#!/bin/zsh");
    }

    #[test]
    fn test_expr_is_base64() {
        let mut user_data = UserData::for_linux();
        user_data.add_commands(["echo hi"]);
        assert_eq!(
            user_data.to_expr().to_value(),
            json!({ "Fn::Base64": "#!/bin/bash\necho hi" })
        );
    }
}
