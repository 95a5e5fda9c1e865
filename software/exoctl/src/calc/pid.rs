//! Per-joint tracking error with two-sample derivative and integral terms

use crate::config::PidGains;

/// Error terms for one joint at one step
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PidTerms {
    /// `x_ref - x(t)`
    pub error: f64,
    /// `(e(t) - e(t-1)) / dt`
    pub derivative: f64,
    /// `(e(t) + e(t-1)) * dt`
    pub integral: f64,
}

impl PidTerms {
    /// `kp*e + kv*D + ki*I`
    pub fn output(&self, gains: &PidGains) -> f64 {
        gains.kp * self.error + gains.kv * self.derivative + gains.ki * self.integral
    }
}

/// Evaluate the error terms from a reference, a measurement, and the previous error.
///
/// The integral only spans the current and previous samples. It is not a running sum,
/// so a constant error produces a constant integral term rather than a growing one.
pub fn pid_terms(reference: f64, measured: f64, previous_error: f64, dt_s: f64) -> PidTerms {
    let error = reference - measured;
    PidTerms {
        error,
        derivative: (error - previous_error) / dt_s,
        integral: (error + previous_error) * dt_s,
    }
}

/// Persistent per-joint state carried between steps
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PidState {
    previous_error: Option<f64>,
}

impl PidState {
    /// Unseeded state; the first evaluation seeds it
    pub fn new() -> Self {
        Self::default()
    }

    /// State as if a step with error `e` had already been evaluated
    pub fn with_previous_error(e: f64) -> Self {
        Self {
            previous_error: Some(e),
        }
    }

    pub fn previous_error(&self) -> Option<f64> {
        self.previous_error
    }
}

/// Tracks one joint toward a fixed reference angle.
///
/// Before the first evaluation, the previous error is taken to be `x_ref - 0`,
/// i.e. as though the joint had been measured at zero. Unless the joint actually
/// starts at zero, this produces a derivative kick of `-x(0) / dt` on the first step.
#[derive(Clone, Debug)]
pub struct JointErrorTracker {
    reference: f64,
    dt_s: f64,
    state: PidState,
}

impl JointErrorTracker {
    pub fn new(reference: f64, dt_s: f64) -> Self {
        Self::with_state(reference, dt_s, PidState::new())
    }

    pub fn with_state(reference: f64, dt_s: f64, state: PidState) -> Self {
        Self {
            reference,
            dt_s,
            state,
        }
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn state(&self) -> PidState {
        self.state
    }

    /// Evaluate the terms for a new measurement and store the new error
    pub fn update(&mut self, measured: f64) -> PidTerms {
        let previous_error = self.state.previous_error.unwrap_or(self.reference);
        let terms = pid_terms(self.reference, measured, previous_error, self.dt_s);
        self.state.previous_error = Some(terms.error);
        terms
    }

    /// Forget the previous error so the next update is seeded again
    pub fn reset(&mut self) {
        self.state = PidState::new();
    }
}
