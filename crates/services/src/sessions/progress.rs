/// Lifecycle phase of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Questions loaded, nothing answered yet.
    Created,
    InProgress,
    /// Every question has been answered.
    Completed,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: u32,
    pub correct: u32,
    pub streak: u32,
    pub remaining: usize,
    pub phase: SessionPhase,
}

impl SessionProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }
}
