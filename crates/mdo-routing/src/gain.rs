//! Gain helpers

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Energy-average (RMS) of per-device linear trims.
///
/// `sqrt((g1² + ... + gn²) / n)`. Louder trims weigh more than under an
/// arithmetic mean: trims of 1.0 and 2.0 compose to ~1.581, not 1.5.
/// An empty list composes to unity.
pub fn compose_device_gains(gains: &[f32]) -> f32 {
    if gains.is_empty() {
        return 1.0;
    }
    let energy: f32 = gains.iter().map(|g| g * g).sum();
    (energy / gains.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_to_linear() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-20.0), 0.1, epsilon = 1e-6);
        assert_relative_eq!(db_to_linear(6.0206), 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_energy_average() {
        assert_relative_eq!(compose_device_gains(&[1.0, 2.0]), 1.5811, epsilon = 1e-4);
        assert_relative_eq!(compose_device_gains(&[0.5]), 0.5);
        assert_relative_eq!(compose_device_gains(&[]), 1.0);
    }

    #[test]
    fn test_never_below_arithmetic_mean() {
        let trims = [db_to_linear(-6.0), db_to_linear(6.0)];
        let composed = compose_device_gains(&trims);
        let arithmetic = (trims[0] + trims[1]) / 2.0;
        assert!(composed > arithmetic);
        assert_relative_eq!(
            composed,
            ((trims[0] * trims[0] + trims[1] * trims[1]) / 2.0).sqrt(),
            epsilon = 1e-6
        );
    }
}
