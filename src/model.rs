//! Two-parameter logistic (2PL) response model.
//!
//! Pure functions relating latent ability to item outcomes. Everything
//! downstream (estimation, selection, mislabel detection) is built on
//! these three curves.

use std::f64::consts::SQRT_2;

use statrs::function::erf::erf;

/// Floor keeping probabilities away from exact 0/1 before logs.
const P_FLOOR: f64 = 1e-12;

/// P(correct | theta) = 1 / (1 + exp(-a * (theta - b))).
///
/// Strictly increasing in `theta` whenever `discrimination > 0`.
pub fn probability(theta: f64, discrimination: f64, difficulty: f64) -> f64 {
    1.0 / (1.0 + (-discrimination * (theta - difficulty)).exp())
}

/// Fisher information contributed by an item at ability `theta`:
/// I(theta) = a^2 * P * (1 - P).
///
/// Peaks where the item difficulty matches the ability, which is what
/// makes maximum-information selection adaptive.
pub fn information(theta: f64, discrimination: f64, difficulty: f64) -> f64 {
    let p = probability(theta, discrimination, difficulty);
    discrimination * discrimination * p * (1.0 - p)
}

/// Bernoulli log-likelihood of an observed outcome `x` in [0, 1]:
/// x * ln(P) + (1 - x) * ln(1 - P).
///
/// For binary `x` this is the standard 2PL likelihood; fractional `x`
/// (graded correctness from a rubric or judge) generalizes it to the
/// cross-entropy form. Probabilities are clamped away from 0/1 so the
/// graded form stays finite.
pub fn log_likelihood(theta: f64, discrimination: f64, difficulty: f64, correctness: f64) -> f64 {
    let p = probability(theta, discrimination, difficulty).clamp(P_FLOOR, 1.0 - P_FLOOR);
    correctness * p.ln() + (1.0 - correctness) * (1.0 - p).ln()
}

pub(crate) fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_is_half_at_difficulty() {
        for a in [0.5, 1.0, 2.5] {
            for b in [-2.0, 0.0, 1.3] {
                assert!((probability(b, a, b) - 0.5).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn probability_strictly_increasing_in_theta() {
        for a in [0.3, 1.0, 1.8, 3.0] {
            for b in [-2.0, -0.5, 0.0, 1.0, 2.5] {
                let mut prev = probability(-6.0, a, b);
                let mut theta = -6.0 + 0.25;
                while theta <= 6.0 {
                    let p = probability(theta, a, b);
                    assert!(p > prev, "not increasing at theta={theta}, a={a}, b={b}");
                    prev = p;
                    theta += 0.25;
                }
            }
        }
    }

    #[test]
    fn information_peaks_where_difficulty_matches_ability() {
        let a = 1.5;
        let b = 0.7;
        let at_peak = information(b, a, b);
        for offset in [0.5, 1.0, 2.0] {
            assert!(information(b - offset, a, b) < at_peak);
            assert!(information(b + offset, a, b) < at_peak);
        }
        // At the peak P = 0.5, so I = a^2 / 4.
        assert!((at_peak - a * a / 4.0).abs() < 1e-12);
    }

    #[test]
    fn graded_log_likelihood_interpolates_binary_endpoints() {
        let (theta, a, b) = (0.4, 1.2, -0.3);
        let ll0 = log_likelihood(theta, a, b, 0.0);
        let ll1 = log_likelihood(theta, a, b, 1.0);
        let ll_half = log_likelihood(theta, a, b, 0.5);
        assert!((ll_half - 0.5 * (ll0 + ll1)).abs() < 1e-12);
    }

    #[test]
    fn log_likelihood_finite_at_extreme_theta() {
        assert!(log_likelihood(50.0, 2.0, 0.0, 0.0).is_finite());
        assert!(log_likelihood(-50.0, 2.0, 0.0, 1.0).is_finite());
    }

    #[test]
    fn normal_cdf_matches_known_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.959964) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(-1.959964) - 0.025).abs() < 1e-6);
    }
}
