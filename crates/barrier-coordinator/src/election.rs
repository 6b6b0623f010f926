use crate::state::ShutdownReason;

/// The action a peer should take given whether it coordinated a job
/// before and after a replica change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionAction {
    /// Wasn't coordinating, now is: spin up a loop.
    Start,
    /// Was coordinating, no longer is: stop the loop.
    Stop(ShutdownReason),
    /// Still coordinating and the allocation changed: forward the new
    /// replica through `allocation-ch`.
    Forward,
    /// Nothing changed that this peer needs to act on.
    Noop,
}

/// `(¬started?, start?) -> start`, `(started?, ¬start?) -> stop`; when
/// this peer remains the coordinator and `allocation_changed`, forward
/// the new replica instead.
pub fn decide(started: bool, start: bool, allocation_changed: bool) -> ElectionAction {
    match (started, start) {
        (false, true) => ElectionAction::Start,
        (true, false) => ElectionAction::Stop(ShutdownReason::Rescheduled),
        (true, true) if allocation_changed => ElectionAction::Forward,
        _ => ElectionAction::Noop,
    }
}
