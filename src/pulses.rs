//! Pulse shape summarisation.
//!
//! Every particle carries one raw waveform per detector channel. Waveforms
//! have variable length, so each is reduced to a fixed number of polynomial
//! coefficients:
//!
//! 1. normalise to `[0, 1]` (a constant waveform becomes all zeros);
//! 2. place the samples evenly on `[0, 1]`;
//! 3. least-squares fit a polynomial of degree `n - 1`, solved in the
//!    scaled domain `[-1, 1]` and converted back to the power basis on `[0, 1]`.
//!
//! Coefficients are emitted in ascending power as `object_<channel>_p<k>`.

use log::debug;

use crate::json::Particle;
use crate::table::FeatureRow;

/// Errors from pulse summarisation
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// The requested coefficient count is below one
    #[error("Number of polynomial coefficients must be at least 1, got {0}")]
    InvalidCoefficientCount(usize),
}

/// Scale a waveform to `[0, 1]`. Constant waveforms map to zeros.
pub fn normalise(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if !(range > 0.0) || !range.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Least-squares polynomial coefficients (ascending power) of `values`
/// sampled evenly on `[0, 1]`.
///
/// Always returns `n_coefficients` values; waveforms with fewer points are
/// fitted at degree `len - 1` and padded with zeros.
pub fn fit_polynomial(values: &[f64], n_coefficients: usize) -> Result<Vec<f64>, PulseError> {
    if n_coefficients < 1 {
        return Err(PulseError::InvalidCoefficientCount(n_coefficients));
    }
    let mut coefficients = vec![0.0; n_coefficients];
    if values.is_empty() {
        return Ok(coefficients);
    }

    let m = values.len();
    let terms = n_coefficients.min(m);

    // Sample positions mapped from [0, 1] onto [-1, 1]
    let t: Vec<f64> = (0..m)
        .map(|i| {
            if m == 1 {
                -1.0
            } else {
                2.0 * i as f64 / (m - 1) as f64 - 1.0
            }
        })
        .collect();

    let scaled = solve_least_squares(&vandermonde(&t, terms), values.to_vec(), terms);
    let unscaled = from_scaled_domain(&scaled);
    coefficients[..terms].copy_from_slice(&unscaled);
    Ok(coefficients)
}

/// Row-major `m x terms` matrix of powers of `t`
fn vandermonde(t: &[f64], terms: usize) -> Vec<Vec<f64>> {
    t.iter()
        .map(|&ti| {
            let mut row = Vec::with_capacity(terms);
            let mut power = 1.0;
            for _ in 0..terms {
                row.push(power);
                power *= ti;
            }
            row
        })
        .collect()
}

/// Solve `min |A x - b|` by Householder QR. Columns that turn out linearly
/// dependent get a zero coefficient.
fn solve_least_squares(a: &[Vec<f64>], mut b: Vec<f64>, n: usize) -> Vec<f64> {
    let m = a.len();
    let mut r: Vec<Vec<f64>> = a.to_vec();

    for k in 0..n.min(m) {
        let norm = (k..m).map(|i| r[i][k] * r[i][k]).sum::<f64>().sqrt();
        if norm == 0.0 {
            continue;
        }
        let alpha = if r[k][k] > 0.0 { -norm } else { norm };

        let mut v: Vec<f64> = (k..m).map(|i| r[i][k]).collect();
        v[0] -= alpha;
        let v_norm2: f64 = v.iter().map(|x| x * x).sum();
        if v_norm2 == 0.0 {
            continue;
        }

        for j in k..n {
            let s: f64 = v.iter().enumerate().map(|(i, vi)| vi * r[k + i][j]).sum();
            let factor = 2.0 * s / v_norm2;
            for (i, vi) in v.iter().enumerate() {
                r[k + i][j] -= factor * vi;
            }
        }
        let s: f64 = v.iter().enumerate().map(|(i, vi)| vi * b[k + i]).sum();
        let factor = 2.0 * s / v_norm2;
        for (i, vi) in v.iter().enumerate() {
            b[k + i] -= factor * vi;
        }
    }

    let mut x = vec![0.0; n];
    let scale = (0..n.min(m)).map(|k| r[k][k].abs()).fold(0.0, f64::max);
    for k in (0..n.min(m)).rev() {
        let diag = r[k][k];
        if diag.abs() <= scale * 1e-12 {
            continue;
        }
        let tail: f64 = (k + 1..n).map(|j| r[k][j] * x[j]).sum();
        x[k] = (b[k] - tail) / diag;
    }
    x
}

/// Rewrite `sum c_k t^k` with `t = 2x - 1` as `sum d_j x^j`.
fn from_scaled_domain(scaled: &[f64]) -> Vec<f64> {
    let n = scaled.len();
    let mut out = vec![0.0; n];
    for (k, &c) in scaled.iter().enumerate() {
        // (2x - 1)^k = sum_j C(k, j) 2^j (-1)^(k - j) x^j
        let mut binomial = 1.0;
        for j in 0..=k {
            let sign = if (k - j) % 2 == 0 { 1.0 } else { -1.0 };
            out[j] += c * binomial * 2f64.powi(j as i32) * sign;
            binomial = binomial * (k - j) as f64 / (j + 1) as f64;
        }
    }
    out
}

/// Summarise the waveforms of one particle.
///
/// Channels without a description or without values are ignored; a particle
/// with no usable channel yields `None`.
pub fn summarise_particle(
    sample_id: &str,
    particle: &Particle,
    n_poly: usize,
) -> Result<Option<FeatureRow>, PulseError> {
    let mut row = FeatureRow::keyed("sample_id", sample_id);
    row.set("object_id", particle.object_id(sample_id));

    let mut channels = 0;
    for shape in &particle.pulse_shapes {
        let Some(description) = shape.description.as_deref() else {
            continue;
        };
        if shape.values.is_empty() {
            continue;
        }

        let coefficients = fit_polynomial(&normalise(&shape.values), n_poly)?;
        for (k, value) in coefficients.into_iter().enumerate() {
            row.set(&format!("object_{}_p{}", description, k), value);
        }
        channels += 1;
    }

    if channels == 0 {
        debug!("No pulse shapes for particle {}", particle.key());
        return Ok(None);
    }
    Ok(Some(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn eval(coefficients: &[f64], x: f64) -> f64 {
        coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    #[test]
    fn test_normalise_range() {
        assert_eq!(normalise(&[2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(normalise(&[5.0, 5.0, 5.0]), vec![0.0, 0.0, 0.0]);
        assert!(normalise(&[]).is_empty());
    }

    #[test]
    fn test_recovers_polynomial_coefficients() {
        let truth = [0.5, -1.0, 3.0, 0.25, -2.0, 1.5, 0.0, 0.75, -0.5, 0.1];
        let values: Vec<f64> = (0..40).map(|i| eval(&truth, i as f64 / 39.0)).collect();

        let fitted = fit_polynomial(&values, truth.len()).unwrap();
        for (f, t) in fitted.iter().zip(truth) {
            assert!((f - t).abs() < 1e-6, "fitted {:?}", fitted);
        }
    }

    #[test]
    fn test_exact_line() {
        let fitted = fit_polynomial(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert!((fitted[0] - 1.0).abs() < 1e-12);
        assert!((fitted[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_waveform_is_padded() {
        let fitted = fit_polynomial(&[0.0, 1.0, 0.0], 10).unwrap();
        assert_eq!(fitted.len(), 10);
        assert!(fitted[3..].iter().all(|&c| c == 0.0));
        // Parabola through (0,0), (0.5,1), (1,0): 4x - 4x^2
        assert!((fitted[1] - 4.0).abs() < 1e-9);
        assert!((fitted[2] + 4.0).abs() < 1e-9);

        let single = fit_polynomial(&[0.7], 3).unwrap();
        assert_eq!(single, vec![0.7, 0.0, 0.0]);
    }

    #[test]
    fn test_invalid_count() {
        assert!(matches!(
            fit_polynomial(&[1.0], 0),
            Err(PulseError::InvalidCoefficientCount(0))
        ));
    }

    #[test]
    fn test_summarise_particle_columns() {
        let particle: Particle = serde_json::from_value(json!({
            "particleId": 12,
            "pulseShapes": [
                {"description": "FWS", "values": [1.0, 3.0, 2.0, 1.0]},
                {"description": "SWS", "values": []},
                {"values": [1.0, 2.0]}
            ]
        }))
        .unwrap();

        let row = summarise_particle("s", &particle, 3).unwrap().unwrap();
        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["sample_id", "object_id", "object_FWS_p0", "object_FWS_p1", "object_FWS_p2"]
        );
        assert_eq!(row.get("object_id").and_then(|c| c.as_str()), Some("s_12"));
    }

    #[test]
    fn test_particle_without_pulses_is_omitted() {
        let particle: Particle = serde_json::from_value(json!({"particleId": 1})).unwrap();
        assert!(summarise_particle("s", &particle, 10).unwrap().is_none());
    }

    proptest! {
        #[test]
        fn test_normalised_values_in_unit_range(values in prop::collection::vec(-1e6f64..1e6, 1..64)) {
            let normalised = normalise(&values);
            prop_assert_eq!(normalised.len(), values.len());
            prop_assert!(normalised.iter().all(|v| (0.0..=1.0).contains(v)));
        }

        #[test]
        fn test_constant_waveform_is_zero(value in -1e6f64..1e6, len in 1usize..64) {
            let normalised = normalise(&vec![value; len]);
            prop_assert!(normalised.iter().all(|&v| v == 0.0));
            let fitted = fit_polynomial(&normalised, 10).unwrap();
            prop_assert!(fitted.iter().all(|c| c.abs() < 1e-12));
        }
    }
}
