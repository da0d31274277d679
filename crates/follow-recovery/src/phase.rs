//! Run phases and the timers that drive them.

use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Collecting records from relays
    Listening,
    /// Building and signing the merged record
    Finalizing,
    /// Sending the signed record to write relays
    Publishing,
    /// Waiting for relay acknowledgements
    Draining,
    Terminated,
}

impl Phase {
    /// The only phase that may follow this one.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Listening => Some(Phase::Finalizing),
            Phase::Finalizing => Some(Phase::Publishing),
            Phase::Publishing => Some(Phase::Draining),
            Phase::Draining => Some(Phase::Terminated),
            Phase::Terminated => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Listening => "listening",
            Phase::Finalizing => "finalizing",
            Phase::Publishing => "publishing",
            Phase::Draining => "draining",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("illegal phase transition from {from} to {to}")]
    IllegalTransition { from: Phase, to: Phase },
    #[error("no phase follows {0}")]
    Exhausted(Phase),
}

/// How long the two timed phases last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    pub collection_window: Duration,
    pub drain_window: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            collection_window: Duration::from_secs(30),
            drain_window: Duration::from_secs(10),
        }
    }
}

/// Tracks the current phase and refuses anything but the next one in line.
#[derive(Debug)]
pub struct PhaseController {
    phase: Phase,
    entered_at: Instant,
    started_at: Instant,
}

impl PhaseController {
    pub fn new() -> Self {
        let now = Instant::now();
        info!("Phase: {}", Phase::Listening);
        Self {
            phase: Phase::Listening,
            entered_at: now,
            started_at: now,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transition(&mut self, to: Phase) -> Result<(), PhaseError> {
        if self.phase.next() != Some(to) {
            return Err(PhaseError::IllegalTransition {
                from: self.phase,
                to,
            });
        }

        info!(
            "Phase: {} -> {} (after {:?} in {}, {:?} total)",
            self.phase,
            to,
            self.entered_at.elapsed(),
            self.phase,
            self.started_at.elapsed()
        );
        self.phase = to;
        self.entered_at = Instant::now();
        Ok(())
    }

    /// Move to the next phase and return it.
    pub fn advance(&mut self) -> Result<Phase, PhaseError> {
        let to = self.phase.next().ok_or(PhaseError::Exhausted(self.phase))?;
        self.transition(to)?;
        Ok(to)
    }
}

impl Default for PhaseController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order() {
        let mut controller = PhaseController::new();
        assert_eq!(controller.phase(), Phase::Listening);

        let mut seen = vec![controller.phase()];
        while let Ok(phase) = controller.advance() {
            seen.push(phase);
        }

        assert_eq!(
            seen,
            vec![
                Phase::Listening,
                Phase::Finalizing,
                Phase::Publishing,
                Phase::Draining,
                Phase::Terminated,
            ]
        );
        assert_eq!(
            controller.advance(),
            Err(PhaseError::Exhausted(Phase::Terminated))
        );
    }

    #[test]
    fn skipping_or_reentering_is_rejected() {
        let mut controller = PhaseController::new();
        assert_eq!(
            controller.transition(Phase::Publishing),
            Err(PhaseError::IllegalTransition {
                from: Phase::Listening,
                to: Phase::Publishing,
            })
        );
        assert!(controller.transition(Phase::Listening).is_err());
        assert_eq!(controller.phase(), Phase::Listening);

        controller.transition(Phase::Finalizing).unwrap();
        assert!(controller.transition(Phase::Listening).is_err());
    }

    #[test]
    fn default_timings() {
        let timings = PhaseTimings::default();
        assert_eq!(timings.collection_window, Duration::from_secs(30));
        assert_eq!(timings.drain_window, Duration::from_secs(10));
    }
}
