use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::PipelineContext;
use super::error::StepError;
use crate::steps;

/// The fixed stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepName {
    Clone,
    Scan,
    SetupI18n,
    Transform,
    Translate,
    CommitPush,
    OpenPr,
}

impl StepName {
    /// Execution order. Scaffolding runs before rewriting so the rewritten
    /// layout and page land at their localized paths.
    pub const ORDER: [StepName; 7] = [
        StepName::Clone,
        StepName::Scan,
        StepName::SetupI18n,
        StepName::Transform,
        StepName::Translate,
        StepName::CommitPush,
        StepName::OpenPr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Clone => "clone",
            StepName::Scan => "scan",
            StepName::SetupI18n => "setup-i18n",
            StepName::Transform => "transform",
            StepName::Translate => "translate",
            StepName::CommitPush => "commit-push",
            StepName::OpenPr => "open-pr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of a run. Steps mutate the context and write their own job logs.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> StepName;

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError>;
}

/// Steps keyed by name. The runner asks for each name in [`StepName::ORDER`].
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<StepName, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven production steps.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(steps::CloneStep));
        registry.register(Arc::new(steps::ScanStep));
        registry.register(Arc::new(steps::SetupI18nStep));
        registry.register(Arc::new(steps::TransformStep));
        registry.register(Arc::new(steps::TranslateStep));
        registry.register(Arc::new(steps::CommitPushStep));
        registry.register(Arc::new(steps::OpenPrStep));
        registry
    }

    /// Adds a step, replacing any step registered under the same name.
    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.insert(step.name(), step);
    }

    /// Builder form of [`register`](Self::register).
    pub fn replace(mut self, step: Arc<dyn Step>) -> Self {
        self.register(step);
        self
    }

    pub fn get(&self, name: StepName) -> Option<&Arc<dyn Step>> {
        self.steps.get(&name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
