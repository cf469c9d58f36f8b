//! Tick-driven models of the physical quantities a module reports.
//!
//! Nothing here reads a clock. The emulators advance a simulator by one
//! step each time the matching quantity is polled.

pub mod rpm;
pub mod temperature;

pub use rpm::Rpm;
pub use temperature::{Temperature, TemperatureWithHold};

/// Ambient temperature a deactivated heater settles at.
pub const TEMPERATURE_ROOM: f64 = 23.0;

/// Moves `current` one step toward `target`, snapping once within a step.
pub(crate) fn approach(current: f64, target: f64, per_tick: f64) -> f64 {
    let diff = target - current;
    if diff.abs() < per_tick {
        target
    } else {
        current + per_tick.copysign(diff)
    }
}
