//! Step-classified errors for the reconstitution pipeline.

use std::fmt;

/// One of the five pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Reset,
    Squash,
    Migrate,
    CreateSuperuser,
    Import,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Reset => "reset",
            Step::Squash => "squash",
            Step::Migrate => "migrate",
            Step::CreateSuperuser => "createsuperuser",
            Step::Import => "import",
        }
    }

    /// 1-based position in the pipeline, for progress output.
    pub fn position(&self) -> usize {
        match self {
            Step::Reset => 1,
            Step::Squash => 2,
            Step::Migrate => 3,
            Step::CreateSuperuser => 4,
            Step::Import => 5,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure, tagged with the step that produced it.
///
/// There is no recovery anywhere in the pipeline: the first error aborts the
/// run and is surfaced to the operator as-is.
#[derive(Debug)]
pub struct ProvisionError {
    pub step: Step,
    pub message: String,
    pub path: Option<String>,
    pub source: Option<anyhow::Error>,
}

impl ProvisionError {
    pub fn new(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    pub fn from_anyhow(step: Step, err: anyhow::Error) -> Self {
        Self::new(step, err.to_string()).with_source(err)
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} failed: {}", self.step, self.message)?;
        if let Some(path) = &self.path {
            write!(f, " ({})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(err) => Some(&**err),
            None => None,
        }
    }
}
