//! Echo width to distance conversion.
//!
//! Sound covers one inch out and back in about 148 µs, and one centimetre in
//! about 58 µs.  These helpers are for log output and configuration in
//! physical units; control decisions stay in timer ticks.

use corridor_types::Ticks;

/// Round-trip echo time per inch of range, in microseconds.
pub const MICROS_PER_INCH: f64 = 148.0;

/// Round-trip echo time per centimetre of range, in microseconds.
pub const MICROS_PER_CM: f64 = 58.0;

fn ticks_to_micros(ticks: Ticks, clock_hz: u32) -> f64 {
    if clock_hz == 0 {
        return 0.0;
    }
    f64::from(ticks) / f64::from(clock_hz) * 1_000_000.0
}

pub fn ticks_to_inches(ticks: Ticks, clock_hz: u32) -> f64 {
    ticks_to_micros(ticks, clock_hz) / MICROS_PER_INCH
}

pub fn ticks_to_centimeters(ticks: Ticks, clock_hz: u32) -> f64 {
    ticks_to_micros(ticks, clock_hz) / MICROS_PER_CM
}

/// Echo width, rounded to the nearest tick, for a target `inches` away.
pub fn inches_to_ticks(inches: f64, clock_hz: u32) -> Ticks {
    let ticks = inches * MICROS_PER_INCH * f64::from(clock_hz) / 1_000_000.0;
    ticks.round().clamp(0.0, f64::from(Ticks::MAX)) as Ticks
}
