//! Oscillatory quantities stored as two words.

use nalgebra::Complex;

/// Magnitude and phase angle (degrees) to a complex value
pub fn polar_to_real_imag(magnitude: f64, phase_deg: f64) -> Complex<f64> {
    Complex::from_polar(magnitude, phase_deg.to_radians())
}

/// Interpret a stored word pair as (real, imag) or (magnitude, phase).
pub fn to_complex(a: f32, b: f32, magnitude_phase: bool) -> Complex<f64> {
    let (a, b) = (f64::from(a), f64::from(b));
    if magnitude_phase {
        polar_to_real_imag(a, b)
    } else {
        Complex::new(a, b)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn real_imag_passes_through() {
        let c = to_complex(1.5, -2.0, false);
        assert_eq!(c, Complex::new(1.5, -2.0));
    }

    #[test]
    fn phase_is_in_degrees() {
        let c = to_complex(2.0, 90.0, true);
        assert_relative_eq!(c.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.im, 2.0, epsilon = 1e-12);

        let c = polar_to_real_imag(1.0, 180.0);
        assert_relative_eq!(c.re, -1.0, epsilon = 1e-12);
    }
}
