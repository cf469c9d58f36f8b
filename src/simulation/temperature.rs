// src/simulation/temperature.rs
use super::approach;

/// Heater/cooler model. Without a target the value holds where it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Temperature {
    per_tick: f64,
    current: f64,
    target: Option<f64>,
}

impl Temperature {
    pub fn new(per_tick: f64, current: f64) -> Self {
        Self {
            per_tick,
            current,
            target: None,
        }
    }

    pub fn tick(&mut self) {
        if let Some(target) = self.target {
            self.current = approach(self.current, target, self.per_tick);
        }
    }

    pub fn set_target(&mut self, target: Option<f64>) {
        self.target = target;
    }

    /// Drops the target and settles immediately at `value`.
    pub fn deactivate(&mut self, value: f64) {
        self.target = None;
        self.current = value;
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> Option<f64> {
        self.target
    }

    pub fn per_tick(&self) -> f64 {
        self.per_tick
    }

    pub fn at_target(&self) -> bool {
        self.target == Some(self.current)
    }
}

/// Temperature with a hold countdown that only runs once the target is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureWithHold {
    temperature: Temperature,
    total_hold: Option<f64>,
    hold: Option<f64>,
}

impl TemperatureWithHold {
    pub fn new(per_tick: f64, current: f64) -> Self {
        Self {
            temperature: Temperature::new(per_tick, current),
            total_hold: None,
            hold: None,
        }
    }

    pub fn tick(&mut self) {
        self.temperature.tick();
        if self.temperature.at_target() {
            if let Some(hold) = self.hold {
                self.hold = Some((hold - 1.0).max(0.0));
            }
        }
    }

    pub fn set_target(&mut self, target: Option<f64>) {
        self.temperature.set_target(target);
    }

    pub fn set_hold(&mut self, hold: f64) {
        self.total_hold = Some(hold);
        self.hold = Some(hold);
    }

    /// Deactivating the block also cancels any pending hold.
    pub fn deactivate(&mut self, value: f64) {
        self.temperature.deactivate(value);
        self.total_hold = None;
        self.hold = None;
    }

    pub fn current(&self) -> f64 {
        self.temperature.current()
    }

    pub fn target(&self) -> Option<f64> {
        self.temperature.target()
    }

    pub fn per_tick(&self) -> f64 {
        self.temperature.per_tick()
    }

    pub fn at_target(&self) -> bool {
        self.temperature.at_target()
    }

    pub fn time_remaining(&self) -> Option<f64> {
        self.hold
    }

    pub fn total_hold(&self) -> Option<f64> {
        self.total_hold
    }
}
