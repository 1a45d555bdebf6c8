use std::time::Duration;

use tokio::time::Instant;

/// "Is the user still typing" flag with an idle timeout.
///
/// Every input re-arms the deadline; once it passes without input the flag
/// drops back to false.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Record local input.
    pub fn touch(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    /// Whether input happened within the timeout.
    pub fn is_active(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                self.deadline = None;
                false
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.deadline = None;
    }
}
