//! # Fill Percentage
//!
//! The sensor hangs under the lid looking down, so a short distance means a
//! full bin. Readings are clamped to the container height before conversion,
//! and anything inside the sensor's near field counts as full.

/// Lid-to-bottom distance of the receptacle in centimeters
pub const CONTAINER_HEIGHT_CM: f64 = 32.0;

/// Below this distance the surface is too close to resolve; treat as full
pub const NEAR_FIELD_CM: f64 = 10.0;

/// Fill percentage (0-100) for a distance reading in our container.
pub fn percent_full(reading_cm: f64) -> u8 {
    percent_full_in(reading_cm, CONTAINER_HEIGHT_CM)
}

/// Fill percentage (0-100) for a distance reading in a container of
/// `height_cm`. Non-increasing in `reading_cm`.
pub fn percent_full_in(reading_cm: f64, height_cm: f64) -> u8 {
    // NaN means no usable reading: report empty rather than full
    let reading = if reading_cm.is_nan() {
        height_cm
    } else {
        reading_cm.clamp(0.0, height_cm)
    };
    if reading < NEAR_FIELD_CM {
        return 100;
    }
    let percent = ((height_cm - reading) / height_cm * 100.0).round_ties_even();
    percent.clamp(0.0, 100.0) as u8
}
