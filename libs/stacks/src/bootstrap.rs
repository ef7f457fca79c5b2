//! Boot-time scripts for the controller and the build agent.

use jci_constructs::UserData;

/// Installs Java 11, Git and Jenkins on Amazon Linux 2, then starts Jenkins.
/// Runs on every first boot, so a replaced instance is provisioned again.
pub const CONTROLLER_COMMANDS: &[&str] = &[
    "amazon-linux-extras install epel -y",
    "wget -O /etc/yum.repos.d/jenkins.repo https://pkg.jenkins.io/redhat-stable/jenkins.repo",
    "rpm --import https://pkg.jenkins.io/redhat-stable/jenkins.io.key",
    "yum upgrade -y",
    "yum install java-11-amazon-corretto-headless jenkins git -y",
    "systemctl daemon-reload",
    "systemctl start jenkins",
    "systemctl status jenkins",
];

/// Homebrew ships with the EC2 macOS images, owned by `ec2-user`.
const BREW: &str = "/opt/homebrew/bin/brew";

/// Installs the JDK and Git an inbound Jenkins agent needs.
pub fn agent_commands() -> Vec<String> {
    vec![
        format!("su - ec2-user -c '{BREW} update'"),
        format!("su - ec2-user -c '{BREW} install openjdk@11 git'"),
        "ln -sfn /opt/homebrew/opt/openjdk@11/libexec/openjdk.jdk /Library/Java/JavaVirtualMachines/openjdk-11.jdk".to_string(),
        "/usr/libexec/java_home -v 11".to_string(),
    ]
}

pub fn controller_user_data() -> UserData {
    let mut user_data = UserData::for_linux();
    user_data.add_commands(CONTROLLER_COMMANDS.iter().copied());
    user_data
}

pub fn agent_user_data() -> UserData {
    let mut user_data = UserData::for_macos();
    user_data.add_commands(agent_commands());
    user_data
}
