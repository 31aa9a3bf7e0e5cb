use crate::error::CoreError;
use crate::types::JobState;

/// Events driving an anchoring job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// A worker picked the job up.
    Start,
    /// All anchoring steps succeeded.
    Complete,
    /// An attempt failed and another is allowed.
    Retry,
    /// The last allowed attempt failed.
    Abandon,
}

/// Valid transitions:
/// - Queued → Running (Start)
/// - Running → Done (Complete)
/// - Running → Queued (Retry)
/// - Running → Failed (Abandon)
pub struct JobStateMachine;

impl JobStateMachine {
    pub fn transition(current: JobState, event: JobEvent) -> Result<JobState, CoreError> {
        let new_state = match (current, event) {
            (JobState::Queued, JobEvent::Start) => JobState::Running,
            (JobState::Running, JobEvent::Complete) => JobState::Done,
            (JobState::Running, JobEvent::Retry) => JobState::Queued,
            (JobState::Running, JobEvent::Abandon) => JobState::Failed,
            _ => {
                let target = match event {
                    JobEvent::Start => JobState::Running,
                    JobEvent::Complete => JobState::Done,
                    JobEvent::Retry => JobState::Queued,
                    JobEvent::Abandon => JobState::Failed,
                };
                return Err(CoreError::InvalidJobTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "job state transition"
        );

        Ok(new_state)
    }

    pub fn can_transition(current: JobState, event: JobEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_cycle_then_complete() {
        let s = JobStateMachine::transition(JobState::Queued, JobEvent::Start).unwrap();
        let s = JobStateMachine::transition(s, JobEvent::Retry).unwrap();
        assert_eq!(s, JobState::Queued);
        let s = JobStateMachine::transition(s, JobEvent::Start).unwrap();
        let s = JobStateMachine::transition(s, JobEvent::Complete).unwrap();
        assert_eq!(s, JobState::Done);
    }

    #[test]
    fn test_abandon() {
        let s = JobStateMachine::transition(JobState::Running, JobEvent::Abandon).unwrap();
        assert_eq!(s, JobState::Failed);
        assert!(s.is_final());
    }

    #[test]
    fn test_cannot_complete_queued_job() {
        assert!(!JobStateMachine::can_transition(
            JobState::Queued,
            JobEvent::Complete
        ));
    }

    #[test]
    fn test_done_is_terminal() {
        for event in [
            JobEvent::Start,
            JobEvent::Complete,
            JobEvent::Retry,
            JobEvent::Abandon,
        ] {
            assert!(JobStateMachine::transition(JobState::Done, event).is_err());
        }
    }
}
