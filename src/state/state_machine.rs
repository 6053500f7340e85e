//! Pure transition table for the race lifecycle.
//!
//! The store applies transitions as guarded conditional updates; this module
//! is the single source of truth for which source statuses each event may
//! fire from, and for the forward-only reconciliation rule clients use when
//! row-change notifications arrive late or twice.

use thiserror::Error;

use crate::dao::models::RaceStatus;

/// Events that can be applied to a race row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceEvent {
    /// The public-queue roster reached the join trigger.
    CapacityReached,
    /// Host/admin requested an immediate start.
    Start,
    /// The race is over.
    End,
    /// Host returns a finished race to the waiting pool.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the race was in when the invalid event was received.
    pub from: RaceStatus,
    /// The event that cannot be applied from this status.
    pub event: RaceEvent,
}

/// Statuses an event is allowed to fire from. These slices double as the
/// store-side guard filters for conditional row updates.
pub fn allowed_sources(event: RaceEvent) -> &'static [RaceStatus] {
    match event {
        RaceEvent::CapacityReached => &[RaceStatus::Waiting],
        RaceEvent::Start => &[RaceStatus::Waiting, RaceStatus::Starting],
        RaceEvent::End => &[RaceStatus::Waiting, RaceStatus::Starting, RaceStatus::Active],
        RaceEvent::Reset => &[RaceStatus::Finished],
    }
}

/// Compute the status an event transitions to, validating the source status.
pub fn advance(from: RaceStatus, event: RaceEvent) -> Result<RaceStatus, InvalidTransition> {
    if !allowed_sources(event).contains(&from) {
        return Err(InvalidTransition { from, event });
    }

    Ok(match event {
        RaceEvent::CapacityReached => RaceStatus::Starting,
        RaceEvent::Start => RaceStatus::Active,
        RaceEvent::End => RaceStatus::Finished,
        RaceEvent::Reset => RaceStatus::Waiting,
    })
}

/// Merge an observed status into a client's local one. Duplicate and
/// out-of-order notifications never move the local state backward; the only
/// backward move is an explicit reset (waiting observed after finished).
pub fn reconcile(local: RaceStatus, observed: RaceStatus) -> RaceStatus {
    if local == RaceStatus::Finished && observed == RaceStatus::Waiting {
        return RaceStatus::Waiting;
    }
    if rank(observed) > rank(local) {
        observed
    } else {
        local
    }
}

fn rank(status: RaceStatus) -> u8 {
    match status {
        RaceStatus::Waiting => 0,
        RaceStatus::Starting => 1,
        RaceStatus::Active => 2,
        RaceStatus::Finished => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_through_race() {
        assert_eq!(
            advance(RaceStatus::Waiting, RaceEvent::CapacityReached),
            Ok(RaceStatus::Starting)
        );
        assert_eq!(
            advance(RaceStatus::Starting, RaceEvent::Start),
            Ok(RaceStatus::Active)
        );
        assert_eq!(
            advance(RaceStatus::Active, RaceEvent::End),
            Ok(RaceStatus::Finished)
        );
        assert_eq!(
            advance(RaceStatus::Finished, RaceEvent::Reset),
            Ok(RaceStatus::Waiting)
        );
    }

    #[test]
    fn host_can_start_straight_from_waiting() {
        assert_eq!(
            advance(RaceStatus::Waiting, RaceEvent::Start),
            Ok(RaceStatus::Active)
        );
    }

    #[test]
    fn starting_an_active_race_is_invalid() {
        let err = advance(RaceStatus::Active, RaceEvent::Start).unwrap_err();
        assert_eq!(err.from, RaceStatus::Active);
        assert_eq!(err.event, RaceEvent::Start);
    }

    #[test]
    fn starting_a_finished_race_is_invalid() {
        assert!(advance(RaceStatus::Finished, RaceEvent::Start).is_err());
    }

    #[test]
    fn ending_is_valid_unless_already_finished() {
        for from in [RaceStatus::Waiting, RaceStatus::Starting, RaceStatus::Active] {
            assert_eq!(advance(from, RaceEvent::End), Ok(RaceStatus::Finished));
        }
        assert!(advance(RaceStatus::Finished, RaceEvent::End).is_err());
    }

    #[test]
    fn reset_only_from_finished() {
        assert_eq!(
            advance(RaceStatus::Finished, RaceEvent::Reset),
            Ok(RaceStatus::Waiting)
        );
        for from in [RaceStatus::Waiting, RaceStatus::Starting, RaceStatus::Active] {
            assert!(advance(from, RaceEvent::Reset).is_err());
        }
    }

    #[test]
    fn reconcile_ignores_duplicates_and_stale_notifications() {
        assert_eq!(
            reconcile(RaceStatus::Active, RaceStatus::Active),
            RaceStatus::Active
        );
        // A late `starting` notification after `active` was observed.
        assert_eq!(
            reconcile(RaceStatus::Active, RaceStatus::Starting),
            RaceStatus::Active
        );
        assert_eq!(
            reconcile(RaceStatus::Starting, RaceStatus::Waiting),
            RaceStatus::Starting
        );
    }

    #[test]
    fn reconcile_advances_forward() {
        assert_eq!(
            reconcile(RaceStatus::Waiting, RaceStatus::Starting),
            RaceStatus::Starting
        );
        assert_eq!(
            reconcile(RaceStatus::Starting, RaceStatus::Finished),
            RaceStatus::Finished
        );
    }

    #[test]
    fn reconcile_accepts_explicit_reset() {
        assert_eq!(
            reconcile(RaceStatus::Finished, RaceStatus::Waiting),
            RaceStatus::Waiting
        );
        // Waiting observed while active is stale, not a reset.
        assert_eq!(
            reconcile(RaceStatus::Active, RaceStatus::Waiting),
            RaceStatus::Active
        );
    }
}
