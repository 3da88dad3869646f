use thiserror::Error;

/// Failures raised while loading a behavior spec.
///
/// These abort loading of that one spec; nothing here is fatal to the
/// process and none of them can occur while ticking.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("behavior spec is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("behavior spec has no initial state")]
    MissingInitialState,

    #[error("initial state '{initial}' is not declared in states")]
    UnknownInitialState { initial: String },

    #[error("unknown action '{name}' in state '{state}'")]
    UnknownAction { state: String, name: String },

    #[error("action '{action}' in state '{state}' expects {expected}")]
    InvalidActionArgument {
        state: String,
        action: String,
        expected: &'static str,
    },

    #[error("malformed action entry in state '{state}': {reason}")]
    MalformedAction { state: String, reason: String },

    #[error("malformed transitions for state '{state}': {reason}")]
    MalformedTransitions { state: String, reason: String },

    #[error("unknown checker '{name}'")]
    UnknownChecker { name: String },

    #[error("unknown phase condition '{name}' in phase '{phase}'")]
    UnknownPhaseCondition { phase: String, name: String },

    #[error("phase condition '{name}' in phase '{phase}' expects {expected}")]
    InvalidPhaseCondition {
        phase: String,
        name: String,
        expected: &'static str,
    },
}

/// Failures decoding a single action entry against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("unknown action '{name}'")]
    Unknown { name: String },

    #[error("action '{name}' expects {expected}")]
    InvalidArgument { name: String, expected: &'static str },
}

impl SpecError {
    /// Attach the owning state to an action decoding failure.
    pub fn from_action(state: &str, err: ActionError) -> Self {
        match err {
            ActionError::Unknown { name } => SpecError::UnknownAction {
                state: state.to_string(),
                name,
            },
            ActionError::InvalidArgument { name, expected } => SpecError::InvalidActionArgument {
                state: state.to_string(),
                action: name,
                expected,
            },
        }
    }
}
