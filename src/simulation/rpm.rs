// src/simulation/rpm.rs
use super::approach;

/// Shaker speed model. Without a target the speed coasts down to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Rpm {
    per_tick: f64,
    current: f64,
    target: Option<f64>,
}

impl Rpm {
    pub fn new(per_tick: f64, current: f64) -> Self {
        Self {
            per_tick,
            current,
            target: None,
        }
    }

    pub fn tick(&mut self) {
        let target = self.target.unwrap_or(0.0);
        self.current = approach(self.current, target, self.per_tick);
    }

    pub fn set_target(&mut self, target: Option<f64>) {
        self.target = target;
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Temperature;

    #[test]
    fn test_spin_up() {
        let mut rpm = Rpm::new(100.0, 0.0);
        rpm.set_target(Some(250.0));
        rpm.tick();
        assert_eq!(rpm.current(), 100.0);
        rpm.tick();
        assert_eq!(rpm.current(), 200.0);
        rpm.tick();
        assert_eq!(rpm.current(), 250.0);
    }

    #[test]
    fn test_spin_down_to_lower_target() {
        let mut rpm = Rpm::new(100.0, 500.0);
        rpm.set_target(Some(200.0));
        let mut readings = Vec::new();
        for _ in 0..5 {
            rpm.tick();
            readings.push(rpm.current());
        }
        assert_eq!(readings, vec![400.0, 300.0, 200.0, 200.0, 200.0]);
        // never undershoots the target on the way down
        assert!(readings.windows(2).all(|w| w[1] <= w[0] && w[1] >= 200.0));
    }

    #[test]
    fn test_idle_decays_to_zero() {
        let mut rpm = Rpm::new(100.0, 250.0);
        rpm.tick();
        assert_eq!(rpm.current(), 150.0);
        rpm.tick();
        assert_eq!(rpm.current(), 50.0);
        rpm.tick();
        assert_eq!(rpm.current(), 0.0);
        rpm.tick();
        assert_eq!(rpm.current(), 0.0);
        assert_eq!(rpm.target(), None);
    }

    #[test]
    fn test_idle_asymmetry_with_temperature() {
        let mut rpm = Rpm::new(10.0, 40.0);
        let mut temp = Temperature::new(10.0, 40.0);
        rpm.tick();
        temp.tick();
        assert_eq!(rpm.current(), 30.0);
        assert_eq!(temp.current(), 40.0);
    }

    #[test]
    fn test_deactivate_resets() {
        let mut rpm = Rpm::new(100.0, 0.0);
        rpm.set_target(Some(500.0));
        rpm.tick();
        rpm.deactivate(0.0);
        assert_eq!(rpm.current(), 0.0);
        assert_eq!(rpm.target(), None);
    }
}
