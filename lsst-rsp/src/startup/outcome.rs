use super::error::StartupError;

/// Result of a single startup step.
///
/// `Degraded` steps are folded into the abnormal startup state and the sequence goes on;
/// `Fatal` stops it before the Lab is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Degraded(StartupError),
    Fatal(StartupError),
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok)
    }
}

impl From<Result<(), StartupError>> for StepOutcome {
    fn from(result: Result<(), StartupError>) -> Self {
        match result {
            Ok(()) => StepOutcome::Ok,
            Err(err) => StepOutcome::Degraded(err),
        }
    }
}
