use serde::{Deserialize, Serialize};

/// Steps of the intake wizard, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Type,
    Details,
    Location,
    Photos,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Type,
        WizardStep::Details,
        WizardStep::Location,
        WizardStep::Photos,
        WizardStep::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStep::Type => "type",
            WizardStep::Details => "details",
            WizardStep::Location => "location",
            WizardStep::Photos => "photos",
            WizardStep::Review => "review",
        }
    }
}

/// 0-based cursor over [`WizardStep::ALL`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WizardState {
    current_step: usize,
}

impl WizardState {
    pub fn last_index() -> usize {
        WizardStep::ALL.len() - 1
    }

    /// Cursor at `index`, clamped into the valid range
    pub fn at(index: i64) -> Self {
        Self {
            current_step: index.clamp(0, Self::last_index() as i64) as usize,
        }
    }

    pub fn index(&self) -> usize {
        self.current_step
    }

    pub fn step(&self) -> WizardStep {
        WizardStep::ALL[self.current_step.min(Self::last_index())]
    }

    pub fn is_last(&self) -> bool {
        self.current_step >= Self::last_index()
    }

    pub fn next(&self) -> Self {
        Self::at(self.current_step as i64 + 1)
    }

    pub fn previous(&self) -> Self {
        Self::at(self.current_step as i64 - 1)
    }
}
