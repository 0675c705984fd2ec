//! Linear rescaling of a band to 8 bits

/// Stretches a band linearly onto 0..=255 using its own min and max
///
/// NaN and infinite samples are ignored when finding the range and map
/// to 0. A constant band, or one without any finite sample, becomes all
/// zeros.
pub fn rescale_to_byte(band: &[f32]) -> Vec<u8> {
    let (min, max) = match finite_range(band) {
        Some((min, max)) if max > min => (min, max),
        _ => return vec![0; band.len()],
    };

    let range = (max - min) as f64;
    band.iter()
        .map(|&v| {
            if v.is_finite() {
                ((v - min) as f64 / range * 255.0) as u8
            } else {
                0
            }
        })
        .collect()
}

/// Range of the finite samples, if there are any
pub fn finite_range(band: &[f32]) -> Option<(f32, f32)> {
    band.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
