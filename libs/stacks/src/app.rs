//! Composition of the controller and agent stacks into one app.

use jci_synth::{App, Context, Environment, StackProps};
use tracing::info;

use crate::agent::{JenkinsMacAgentStack, JenkinsMacAgentStackProps};
use crate::controller::{JenkinsStack, JenkinsStackProps};
use crate::settings::AppSettings;
use crate::StacksError;

pub const CONTROLLER_STACK: &str = "JenkinsStack";
pub const AGENT_STACK: &str = "JenkinsMacAgentStack";

/// The built app and handles to its stacks.
#[derive(Debug)]
pub struct JenkinsApp {
    pub app: App,
    pub controller: JenkinsStack,
    pub agent: Option<JenkinsMacAgentStack>,
}

/// Build the controller stack, then the agent stack when enabled. Both
/// deploy to `env`.
pub fn build_app(
    settings: &AppSettings,
    env: Environment,
    context: Context,
) -> Result<JenkinsApp, StacksError> {
    info!(environment = %env, "building app");
    let mut app = App::new(context);

    let stack_props = StackProps {
        env,
        ..StackProps::default()
    };

    let controller = JenkinsStack::new(
        &mut app,
        CONTROLLER_STACK,
        JenkinsStackProps::from_settings(&settings.controller, stack_props.clone()),
    )?;

    let agent = if settings.agent.enabled {
        Some(JenkinsMacAgentStack::new(
            &mut app,
            AGENT_STACK,
            &controller,
            JenkinsMacAgentStackProps::from_settings(&settings.agent, stack_props),
        )?)
    } else {
        None
    };

    Ok(JenkinsApp {
        app,
        controller,
        agent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_stacks_in_order() {
        let built = build_app(&AppSettings::default(), Environment::agnostic(), Context::new())
            .unwrap();
        let names: Vec<_> = built
            .app
            .stacks()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec![CONTROLLER_STACK, AGENT_STACK]);
        assert!(built.agent.is_some());
    }

    #[test]
    fn test_agent_disabled() {
        let mut settings = AppSettings::default();
        settings.agent.enabled = false;
        let built = build_app(&settings, Environment::agnostic(), Context::new()).unwrap();
        assert_eq!(built.app.stacks().len(), 1);
        assert!(built.agent.is_none());
    }

    #[test]
    fn test_environment_applied_to_both() {
        let env = Environment::new("123456789012", "us-east-1");
        let built = build_app(&AppSettings::default(), env.clone(), Context::new()).unwrap();
        assert!(built.app.stacks().iter().all(|s| *s.environment() == env));
    }
}
