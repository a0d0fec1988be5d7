//! Pairwise statistical comparison of ability estimates.
//!
//! A two-sided z-test on the difference of two independent ability
//! estimates. Batch post-processing only; it reads finalized
//! [`AbilityEstimate`] records and holds no state.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::model::normal_cdf;
use crate::session::AbilityEstimate;

pub const DEFAULT_ALPHA: f64 = 0.05;

/// Coarse reading of the ability gap, on the original half-theta band.
/// `significant` is the statistical statement; this is for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonVerdict {
    SubjectABetter,
    SubjectBBetter,
    Similar,
}

/// Result of comparing two subjects' abilities.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub subject_a_id: String,
    pub subject_b_id: String,
    pub theta_diff: f64,
    pub combined_se: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub significant: bool,
    pub verdict: ComparisonVerdict,
}

/// Compare two ability estimates at significance level `alpha`.
///
/// `z = (theta_a - theta_b) / sqrt(se_a^2 + se_b^2)`, significant when
/// `|z|` exceeds the two-sided normal critical value. A zero combined
/// standard error is degenerate and reported as significant with an
/// infinite z carrying the sign of the difference (positive for a zero
/// difference) and p = 0, rather than raising a division error.
pub fn compare(a: &AbilityEstimate, b: &AbilityEstimate, alpha: f64) -> ComparisonResult {
    let theta_diff = a.theta - b.theta;
    let combined_se = (a.standard_error * a.standard_error
        + b.standard_error * b.standard_error)
        .sqrt();

    let (z_score, p_value, significant) = if combined_se <= 0.0 {
        let sign = if theta_diff < 0.0 { -1.0 } else { 1.0 };
        (sign * f64::INFINITY, 0.0, true)
    } else {
        let z = theta_diff / combined_se;
        let critical = Normal::new(0.0, 1.0)
            .expect("standard normal parameters are valid")
            .inverse_cdf(1.0 - alpha / 2.0);
        let p = 2.0 * (1.0 - normal_cdf(z.abs()));
        (z, p, z.abs() > critical)
    };

    let verdict = if theta_diff > 0.5 {
        ComparisonVerdict::SubjectABetter
    } else if theta_diff < -0.5 {
        ComparisonVerdict::SubjectBBetter
    } else {
        ComparisonVerdict::Similar
    };

    ComparisonResult {
        subject_a_id: a.subject_id.clone(),
        subject_b_id: b.subject_id.clone(),
        theta_diff,
        combined_se,
        z_score,
        p_value,
        significant,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RunStatus;

    fn estimate(id: &str, theta: f64, se: f64) -> AbilityEstimate {
        AbilityEstimate {
            subject_id: id.to_string(),
            theta,
            standard_error: se,
            items_administered: Vec::new(),
            confidence_interval: (theta - 1.96 * se, theta + 1.96 * se),
            status: RunStatus::Completed,
        }
    }

    #[test]
    fn clearly_separated_estimates_are_significant() {
        let result = compare(
            &estimate("a", 1.5, 0.3),
            &estimate("b", 0.2, 0.3),
            DEFAULT_ALPHA,
        );
        assert!((result.theta_diff - 1.3).abs() < 1e-12);
        assert!((result.z_score - 3.0641).abs() < 1e-3);
        assert!(result.significant);
        assert!(result.p_value < 0.01);
        assert_eq!(result.verdict, ComparisonVerdict::SubjectABetter);
    }

    #[test]
    fn overlapping_estimates_are_not_significant() {
        let result = compare(
            &estimate("a", 0.4, 0.4),
            &estimate("b", 0.1, 0.4),
            DEFAULT_ALPHA,
        );
        assert!(!result.significant);
        assert!(result.p_value > 0.05);
        assert_eq!(result.verdict, ComparisonVerdict::Similar);
    }

    #[test]
    fn comparison_is_antisymmetric() {
        let a = estimate("a", 1.0, 0.2);
        let b = estimate("b", 0.3, 0.25);
        let ab = compare(&a, &b, DEFAULT_ALPHA);
        let ba = compare(&b, &a, DEFAULT_ALPHA);
        assert!((ab.z_score + ba.z_score).abs() < 1e-12);
        assert_eq!(ab.significant, ba.significant);
    }

    #[test]
    fn zero_standard_errors_degenerate_to_infinite_z() {
        let result = compare(
            &estimate("a", 0.8, 0.0),
            &estimate("b", 0.2, 0.0),
            DEFAULT_ALPHA,
        );
        assert!(result.z_score.is_infinite() && result.z_score > 0.0);
        assert!(result.significant);
        assert_eq!(result.p_value, 0.0);

        let reversed = compare(
            &estimate("a", 0.2, 0.0),
            &estimate("b", 0.8, 0.0),
            DEFAULT_ALPHA,
        );
        assert!(reversed.z_score.is_infinite() && reversed.z_score < 0.0);
    }

    #[test]
    fn stricter_alpha_requires_larger_gap() {
        let a = estimate("a", 0.7, 0.25);
        let b = estimate("b", 0.0, 0.25);
        assert!(compare(&a, &b, 0.05).significant);
        assert!(!compare(&a, &b, 0.001).significant);
    }
}
