//! Active-scenario state
//!
//! One tag restricts matching to mocks carrying it (plus untagged mocks).
//! An empty tag means unrestricted. Survives catalog swaps.

use parking_lot::RwLock;

/// Currently active scenario tag
#[derive(Debug, Default)]
pub struct ScenarioState {
    active: RwLock<String>,
}

impl ScenarioState {
    /// Create with no restriction
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an initial scenario already active
    pub fn with_initial(tag: impl Into<String>) -> Self {
        Self {
            active: RwLock::new(tag.into()),
        }
    }

    /// The active tag, empty when unrestricted
    pub fn active(&self) -> String {
        self.active.read().clone()
    }

    /// Activate a scenario
    pub fn set(&self, tag: impl Into<String>) {
        *self.active.write() = tag.into();
    }

    /// Remove the restriction
    pub fn clear(&self) {
        self.active.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear() {
        let state = ScenarioState::new();
        assert_eq!(state.active(), "");
        state.set("happy_path");
        assert_eq!(state.active(), "happy_path");
        state.clear();
        assert_eq!(state.active(), "");
    }

    #[test]
    fn initial_scenario() {
        let state = ScenarioState::with_initial("error_state");
        assert_eq!(state.active(), "error_state");
    }
}
