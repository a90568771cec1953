//! Power squelch with attack/decay hysteresis (component D).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquelchState {
    Mute,
    Attack,
    Unmute,
    Decay,
}

/// Single-pole IIR power estimator gated by a four-state hysteresis machine.
///
/// `ATTACK`/`DECAY` exist to debounce power estimates that wobble around the
/// threshold: once a transition starts it runs for exactly `ramp` samples
/// before the gate actually flips, unless `ramp` is zero, in which case the
/// gate flips immediately on every threshold crossing.
#[derive(Debug, Clone, Copy)]
pub struct PowerSquelch {
    alpha: f64,
    threshold_linear: f64,
    threshold_db: f64,
    ramp: u32,
    power: f64,
    counter: u32,
    state: SquelchState,
    changed: bool,
}

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

impl PowerSquelch {
    pub fn new(alpha: f64, threshold_db: f64, ramp: u32) -> Self {
        Self {
            alpha,
            threshold_linear: db_to_linear(threshold_db),
            threshold_db,
            ramp,
            power: 0.0,
            counter: 0,
            state: SquelchState::Mute,
            changed: false,
        }
    }

    /// Feed one linear power sample (e.g. `re*re + im*im`) through the gate.
    pub fn process(&mut self, power_sample: f64) {
        self.power += self.alpha * (power_sample - self.power);
        let below = self.power < self.threshold_linear;

        self.state = match self.state {
            SquelchState::Mute if !below && self.ramp == 0 => {
                self.changed = true;
                SquelchState::Unmute
            }
            SquelchState::Mute if !below => {
                self.counter = 1;
                SquelchState::Attack
            }
            SquelchState::Mute => SquelchState::Mute,

            SquelchState::Attack if self.counter >= self.ramp => {
                self.changed = true;
                SquelchState::Unmute
            }
            SquelchState::Attack => {
                self.counter += 1;
                SquelchState::Attack
            }

            SquelchState::Unmute if below && self.ramp == 0 => {
                self.changed = true;
                SquelchState::Mute
            }
            SquelchState::Unmute if below => {
                self.counter = self.ramp - 1;
                SquelchState::Decay
            }
            SquelchState::Unmute => SquelchState::Unmute,

            SquelchState::Decay if self.counter == 0 => {
                self.changed = true;
                SquelchState::Mute
            }
            SquelchState::Decay => {
                self.counter -= 1;
                SquelchState::Decay
            }
        };
    }

    /// Treat `ATTACK` as still muted (not yet confirmed open) and `DECAY` as
    /// still unmuted (hang time before the gate actually closes).
    pub fn is_muted(&self) -> bool {
        matches!(self.state, SquelchState::Mute | SquelchState::Attack)
    }

    pub fn state(&self) -> SquelchState {
        self.state
    }

    /// Sticky one-shot flag, set whenever the gate flips open or closed.
    /// Cleared by reading it.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn power_db(&self) -> f64 {
        if self.power <= 0.0 {
            f64::NEG_INFINITY
        } else {
            10.0 * self.power.log10()
        }
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    pub fn reset(&mut self) {
        self.power = 0.0;
        self.counter = 0;
        self.state = SquelchState::Mute;
        self.changed = false;
    }
}
