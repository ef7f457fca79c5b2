//! The app: an ordered set of stacks synthesized together.

use std::sync::atomic::{AtomicU64, Ordering};

use jci_id::StackName;
use jci_template::{Output, Template};
use tracing::info;

use crate::assembly::{CloudAssembly, MissingContext, StackArtifact};
use crate::{Context, Stack, StackProps, SynthError};

static NEXT_APP_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a stack: the app it belongs to and its construction index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId {
    app: u64,
    index: usize,
}

impl StackId {
    /// The owning app.
    pub fn app(&self) -> u64 {
        self.app
    }

    /// Position in construction order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "app{}/stack{}", self.app, self.index)
    }
}

/// Root of a synthesis: owns stacks in construction order.
#[derive(Debug)]
pub struct App {
    id: u64,
    context: Context,
    stacks: Vec<Stack>,
}

impl App {
    /// Create an app. Every app gets a process-wide unique id.
    pub fn new(context: Context) -> Self {
        Self {
            id: NEXT_APP_ID.fetch_add(1, Ordering::Relaxed),
            context,
            stacks: Vec::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Add a stack after every existing one.
    pub fn new_stack(&mut self, name: &str, props: StackProps) -> Result<&mut Stack, SynthError> {
        let name = StackName::parse(name)?;
        if self.stacks.iter().any(|s| *s.name() == name) {
            return Err(SynthError::DuplicateStack(name.to_string()));
        }
        let id = StackId {
            app: self.id,
            index: self.stacks.len(),
        };
        self.stacks
            .push(Stack::new(id, name, props, self.context.clone()));
        self.stacks
            .last_mut()
            .ok_or_else(|| SynthError::UnknownStack(id.to_string()))
    }

    /// True if the id names a stack of this app.
    pub fn contains(&self, id: StackId) -> bool {
        id.app == self.id && id.index < self.stacks.len()
    }

    pub fn stack(&self, id: StackId) -> Result<&Stack, SynthError> {
        if id.app != self.id {
            return Err(SynthError::UnknownStack(id.to_string()));
        }
        self.stacks
            .get(id.index)
            .ok_or_else(|| SynthError::UnknownStack(id.to_string()))
    }

    pub fn stack_mut(&mut self, id: StackId) -> Result<&mut Stack, SynthError> {
        if id.app != self.id {
            return Err(SynthError::UnknownStack(id.to_string()));
        }
        self.stacks
            .get_mut(id.index)
            .ok_or_else(|| SynthError::UnknownStack(id.to_string()))
    }

    pub fn stack_by_name(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name().as_str() == name)
    }

    /// Stacks in construction order.
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Produce the cloud assembly.
    ///
    /// Producers gain the export outputs their consumers asked for, then
    /// every template is validated and fingerprinted.
    pub fn synth(&self) -> Result<CloudAssembly, SynthError> {
        let mut templates: Vec<Template> = self.stacks.iter().map(|s| s.template().clone()).collect();

        for consumer in &self.stacks {
            for request in consumer.exports() {
                let producer = templates
                    .get_mut(request.producer.index)
                    .ok_or_else(|| SynthError::UnknownStack(request.producer.to_string()))?;
                if producer.output(request.output_id.as_str()).is_none() {
                    producer.add_output(
                        &request.output_id,
                        Output::new(request.value.clone()).with_export(request.export.clone()),
                    )?;
                }
            }
        }

        let mut artifacts = Vec::with_capacity(self.stacks.len());
        for (stack, template) in self.stacks.iter().zip(templates) {
            template.validate()?;
            let artifact = StackArtifact::new(stack, template);
            info!(
                stack = %artifact.name,
                environment = %artifact.environment,
                resources = artifact.template.resources().len(),
                hash = %artifact.template_hash,
                "stack synthesized"
            );
            artifacts.push(artifact);
        }

        let mut missing: Vec<MissingContext> = Vec::new();
        for entry in self.stacks.iter().flat_map(|s| s.missing_context()) {
            if !missing.iter().any(|m| m.key == entry.key) {
                missing.push(entry.clone());
            }
        }

        Ok(CloudAssembly::new(artifacts, missing))
    }
}
