/// Stream engine state machine.
///
/// State transitions:
/// ```text
/// idle → opened → running → cancelling → closed
///                    ↓
///                 draining → closed
/// ```
/// `draining` is entered when the device reports it closed underneath a
/// running loop; the caller has to reopen to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Opened,
    Running,
    Draining,
    Cancelling,
    Closed,
}

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Opened | Self::Running | Self::Draining | Self::Cancelling)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(StreamState::Idle.is_idle());
        assert!(!StreamState::Idle.is_open());
        assert!(StreamState::Opened.is_open());
        assert!(StreamState::Running.is_running());
        assert!(StreamState::Draining.is_open());
        assert!(StreamState::Closed.is_terminal());
        assert!(!StreamState::Cancelling.is_terminal());
    }
}
