//! Iteration lifecycle state machine
//!
//! planned -> current -> complete, one hop at a time, never backwards. At most
//! one iteration may be current. The functions here only decide; persisting
//! the new status and timestamps is the caller's job.

use crate::error::{Error, Result, TransitionReason};
use crate::models::{Iteration, IterationStatus};

/// Outcome of an accepted transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target status equals the current one; nothing to write
    Unchanged,
    /// Status moves forward one stage
    Advance {
        from: IterationStatus,
        to: IterationStatus,
    },
}

/// Validates a single status hop for iteration `number`.
pub fn check_transition(
    number: u32,
    from: IterationStatus,
    to: IterationStatus,
) -> Result<Transition> {
    use IterationStatus::*;

    let reason = match (from, to) {
        (a, b) if a == b => return Ok(Transition::Unchanged),
        (Planned, Current) | (Current, Complete) => return Ok(Transition::Advance { from, to }),
        (Complete, _) => TransitionReason::Terminal,
        (Planned, Complete) => TransitionReason::SkipStage,
        _ => TransitionReason::Backward,
    };

    Err(Error::InvalidTransition {
        number,
        from,
        to,
        reason,
    })
}

/// Decides whether `iteration` may become current.
///
/// `lookup_current` returns the project's current iteration, or `None` when
/// there is none (the normal state). It is only consulted when the hop
/// itself is legal.
pub fn can_start_iteration<F>(iteration: &Iteration, lookup_current: F) -> Result<Transition>
where
    F: FnOnce() -> Result<Option<Iteration>>,
{
    let transition = check_transition(
        iteration.number,
        iteration.status,
        IterationStatus::Current,
    )?;
    if transition == Transition::Unchanged {
        return Ok(transition);
    }

    if let Some(current) = lookup_current()? {
        if current.number != iteration.number {
            return Err(Error::IterationAlreadyCurrent {
                number: iteration.number,
                current: current.number,
            });
        }
    }
    Ok(transition)
}

/// Decides whether `iteration` may be completed.
pub fn can_complete_iteration(iteration: &Iteration) -> Result<Transition> {
    check_transition(
        iteration.number,
        iteration.status,
        IterationStatus::Complete,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Utc;

    fn iteration(number: u32, status: IterationStatus) -> Iteration {
        let now = Utc::now();
        Iteration {
            number,
            name: format!("Iteration {}", number),
            goal: String::new(),
            deliverable: String::new(),
            status,
            rank: 500,
            task_ids: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn reason_of(err: Error) -> TransitionReason {
        match err {
            Error::InvalidTransition { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_forward_hops_are_legal() {
        use IterationStatus::*;
        assert_eq!(
            check_transition(1, Planned, Current).unwrap(),
            Transition::Advance {
                from: Planned,
                to: Current
            }
        );
        assert!(matches!(
            check_transition(1, Current, Complete).unwrap(),
            Transition::Advance { .. }
        ));
    }

    #[test]
    fn test_same_state_is_noop() {
        use IterationStatus::*;
        for s in [Planned, Current, Complete] {
            assert_eq!(check_transition(1, s, s).unwrap(), Transition::Unchanged);
        }
    }

    #[test]
    fn test_illegal_hops_name_the_reason() {
        use IterationStatus::*;
        assert_eq!(
            reason_of(check_transition(1, Planned, Complete).unwrap_err()),
            TransitionReason::SkipStage
        );
        assert_eq!(
            reason_of(check_transition(1, Current, Planned).unwrap_err()),
            TransitionReason::Backward
        );
        assert_eq!(
            reason_of(check_transition(1, Complete, Planned).unwrap_err()),
            TransitionReason::Terminal
        );
        assert_eq!(
            reason_of(check_transition(1, Complete, Current).unwrap_err()),
            TransitionReason::Terminal
        );
    }

    #[test]
    fn test_start_with_no_current_iteration() {
        let it = iteration(1, IterationStatus::Planned);
        assert!(matches!(
            can_start_iteration(&it, || Ok(None)).unwrap(),
            Transition::Advance { .. }
        ));
    }

    #[test]
    fn test_start_blocked_by_other_current() {
        let it = iteration(2, IterationStatus::Planned);
        let err = can_start_iteration(&it, || Ok(Some(iteration(1, IterationStatus::Current))))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(
            err,
            Error::IterationAlreadyCurrent {
                number: 2,
                current: 1
            }
        ));
    }

    #[test]
    fn test_start_current_iteration_is_noop_without_lookup() {
        let it = iteration(1, IterationStatus::Current);
        let result = can_start_iteration(&it, || panic!("lookup must not run"));
        assert_eq!(result.unwrap(), Transition::Unchanged);
    }

    #[test]
    fn test_start_complete_iteration_fails() {
        let it = iteration(1, IterationStatus::Complete);
        let err = can_start_iteration(&it, || Ok(None)).unwrap_err();
        assert_eq!(reason_of(err), TransitionReason::Terminal);
    }

    #[test]
    fn test_complete_requires_current() {
        let planned = iteration(1, IterationStatus::Planned);
        assert_eq!(
            reason_of(can_complete_iteration(&planned).unwrap_err()),
            TransitionReason::SkipStage
        );

        let current = iteration(1, IterationStatus::Current);
        assert!(matches!(
            can_complete_iteration(&current).unwrap(),
            Transition::Advance { .. }
        ));

        let done = iteration(1, IterationStatus::Complete);
        assert_eq!(can_complete_iteration(&done).unwrap(), Transition::Unchanged);
    }
}
