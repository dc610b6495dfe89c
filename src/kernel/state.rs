use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JobState {
    Idle = 0,
    Submitting = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
}

impl JobState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => JobState::Submitting,
            2 => JobState::Running,
            3 => JobState::Succeeded,
            4 => JobState::Failed,
            _ => JobState::Idle,
        }
    }

    /// A job is in flight; new starts are refused.
    pub fn is_busy(self) -> bool {
        matches!(self, JobState::Submitting | JobState::Running)
    }
}

/// The single source of truth for "is a job active". Every transition is a CAS,
/// so a UI start and a worker finish can never interleave into a double run.
#[derive(Debug)]
pub struct JobStateCell {
    raw: AtomicU8,
}

impl Default for JobStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStateCell {
    pub fn new() -> Self {
        Self {
            raw: AtomicU8::new(JobState::Idle as u8),
        }
    }

    pub fn load(&self) -> JobState {
        JobState::from_u8(self.raw.load(Ordering::Acquire))
    }

    /// Idle/Succeeded/Failed -> Submitting. On refusal returns the busy state observed.
    pub fn try_begin(&self) -> Result<JobState, JobState> {
        let mut current = self.load();
        loop {
            if current.is_busy() {
                return Err(current);
            }
            match self.raw.compare_exchange(
                current as u8,
                JobState::Submitting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current),
                Err(actual) => current = JobState::from_u8(actual),
            }
        }
    }

    /// Moves `from` -> `to` only if the cell still holds `from`.
    pub fn transition(&self, from: JobState, to: JobState) -> bool {
        self.raw
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Submitting -> Running. No-op if already running.
    pub fn mark_running(&self) -> bool {
        self.transition(JobState::Submitting, JobState::Running) || self.load() == JobState::Running
    }

    /// Ends the in-flight job with `outcome`. Returns false if no job was in flight.
    pub fn finish(&self, outcome: JobState) -> bool {
        debug_assert!(matches!(outcome, JobState::Succeeded | JobState::Failed));
        self.transition(JobState::Running, outcome) || self.transition(JobState::Submitting, outcome)
    }
}
