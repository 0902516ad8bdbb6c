//! Two-step arm/confirm gate for destructive batch runs.
//!
//! When the host offers no modal confirmation capability, the session falls
//! back to this gate: the first press arms it, a second press inside the
//! arming window authorizes the run. An armed gate that is not confirmed in
//! time lapses back to idle; expiry is checked lazily on the next press,
//! which is observably equivalent to a reset timer.

use std::time::{Duration, Instant};

/// How long an armed gate stays confirmable.
pub const ARM_WINDOW: Duration = Duration::from_millis(5000);

/// Outcome of a confirm press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePress {
    /// The gate is now armed; the caller should tell the user to press again.
    Armed,
    /// The second press landed in time; the run is authorized.
    Authorized,
}

/// The arming state machine. Pure and clock-injected so tests control time.
#[derive(Debug)]
pub struct ConfirmationGate {
    armed_at: Option<Instant>,
    window: Duration,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::with_window(ARM_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            armed_at: None,
            window,
        }
    }

    /// Registers a confirm press at `now`.
    ///
    /// Arms the gate when idle (or when a previous arm has lapsed), and
    /// authorizes exactly once when pressed again inside the window.
    pub fn press(&mut self, now: Instant) -> GatePress {
        match self.armed_at {
            Some(armed_at) if now.duration_since(armed_at) <= self.window => {
                self.armed_at = None;
                GatePress::Authorized
            }
            _ => {
                self.armed_at = Some(now);
                GatePress::Armed
            }
        }
    }

    /// Drops any pending arm, e.g. when a run starts through another path.
    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self, now: Instant) -> bool {
        matches!(self.armed_at, Some(armed_at) if now.duration_since(armed_at) <= self.window)
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_presses_inside_window_authorize_once() {
        let mut gate = ConfirmationGate::new();
        let base = Instant::now();

        assert_eq!(gate.press(base), GatePress::Armed);
        assert_eq!(
            gate.press(base + Duration::from_millis(100)),
            GatePress::Authorized
        );

        // The authorization is consumed; a further press re-arms.
        assert_eq!(
            gate.press(base + Duration::from_millis(200)),
            GatePress::Armed
        );
    }

    #[test]
    fn test_lapsed_arm_requires_arming_again() {
        let mut gate = ConfirmationGate::new();
        let base = Instant::now();

        assert_eq!(gate.press(base), GatePress::Armed);

        let after_window = base + ARM_WINDOW + Duration::from_millis(1);
        assert_eq!(gate.press(after_window), GatePress::Armed);
        assert_eq!(
            gate.press(after_window + Duration::from_millis(10)),
            GatePress::Authorized
        );
    }

    #[test]
    fn test_press_exactly_at_window_edge_still_authorizes() {
        let mut gate = ConfirmationGate::new();
        let base = Instant::now();

        gate.press(base);
        assert_eq!(gate.press(base + ARM_WINDOW), GatePress::Authorized);
    }

    #[test]
    fn test_disarm_resets_to_idle() {
        let mut gate = ConfirmationGate::new();
        let base = Instant::now();

        gate.press(base);
        gate.disarm();

        assert!(!gate.is_armed(base + Duration::from_millis(1)));
        assert_eq!(
            gate.press(base + Duration::from_millis(2)),
            GatePress::Armed
        );
    }

    #[test]
    fn test_is_armed_reflects_expiry() {
        let mut gate = ConfirmationGate::with_window(Duration::from_millis(50));
        let base = Instant::now();

        gate.press(base);
        assert!(gate.is_armed(base + Duration::from_millis(10)));
        assert!(!gate.is_armed(base + Duration::from_millis(100)));
    }
}
