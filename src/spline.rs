//! Natural cubic spline interpolation over scalar samples
//!
//! The launch classifier fits altitude over elapsed seconds and watches the
//! first derivative to decide when a climb has ended, so the interpolator
//! exposes first and second derivatives at arbitrary t in addition to the
//! value itself.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplineError {
    #[error("cubic spline interpolation needs at least two samples")]
    InsufficientSamples,
    #[error("spline abscissae must be strictly increasing")]
    NonMonotonicAbscissae,
}

/// Natural cubic spline through `(xs[i], ys[i])` knots.
///
/// "Natural" boundary conditions: the second derivative vanishes at both end
/// knots. With exactly two samples the spline degenerates to the connecting
/// line. Evaluation outside the fitted range extrapolates with the boundary
/// segment's polynomial.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn fit(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, SplineError> {
        let n = xs.len();
        if n < 2 || ys.len() != n {
            return Err(SplineError::InsufficientSamples);
        }
        if !xs.windows(2).all(|w| w[0] < w[1]) {
            return Err(SplineError::NonMonotonicAbscissae);
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            // Tridiagonal system for the interior second derivatives,
            // solved with the Thomas algorithm. Natural boundary conditions
            // fix m[0] = m[n-1] = 0.
            let mut sub = vec![0.0; n];
            let mut diag = vec![0.0; n];
            let mut sup = vec![0.0; n];
            let mut rhs = vec![0.0; n];

            for i in 1..n - 1 {
                let h0 = xs[i] - xs[i - 1];
                let h1 = xs[i + 1] - xs[i];
                sub[i] = h0;
                diag[i] = 2.0 * (h0 + h1);
                sup[i] = h1;
                rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
            }

            for i in 2..n - 1 {
                let w = sub[i] / diag[i - 1];
                diag[i] -= w * sup[i - 1];
                rhs[i] -= w * rhs[i - 1];
            }

            m[n - 2] = rhs[n - 2] / diag[n - 2];
            for i in (1..n - 2).rev() {
                m[i] = (rhs[i] - sup[i] * m[i + 1]) / diag[i];
            }
        }

        Ok(Self { xs, ys, m })
    }

    /// Index of the segment whose polynomial covers `t`, clamped to the
    /// outermost segments for extrapolation
    fn segment(&self, t: f64) -> usize {
        let n = self.xs.len();
        match self.xs.partition_point(|&x| x <= t) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        }
    }

    /// Interpolated value at `t`
    pub fn value(&self, t: f64) -> f64 {
        let i = self.segment(t);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;

        m0 * (x1 - t).powi(3) / (6.0 * h)
            + m1 * (t - x0).powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * (x1 - t)
            + (y1 / h - m1 * h / 6.0) * (t - x0)
    }

    /// First derivative at `t`
    pub fn derivative(&self, t: f64) -> f64 {
        let i = self.segment(t);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;

        -m0 * (x1 - t).powi(2) / (2.0 * h) + m1 * (t - x0).powi(2) / (2.0 * h)
            - (y0 / h - m0 * h / 6.0)
            + (y1 / h - m1 * h / 6.0)
    }

    /// Second derivative at `t`
    pub fn second_derivative(&self, t: f64) -> f64 {
        let i = self.segment(t);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;

        m0 * (x1 - t) / h + m1 * (t - x0) / h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_insufficient_samples() {
        assert_eq!(
            CubicSpline::fit(vec![1.0], vec![2.0]).unwrap_err(),
            SplineError::InsufficientSamples
        );
        assert_eq!(
            CubicSpline::fit(vec![], vec![]).unwrap_err(),
            SplineError::InsufficientSamples
        );
    }

    #[test]
    fn rejects_unsorted_abscissae() {
        assert_eq!(
            CubicSpline::fit(vec![0.0, 2.0, 1.0], vec![0.0, 1.0, 2.0]).unwrap_err(),
            SplineError::NonMonotonicAbscissae
        );
        assert_eq!(
            CubicSpline::fit(vec![0.0, 0.0], vec![0.0, 1.0]).unwrap_err(),
            SplineError::NonMonotonicAbscissae
        );
    }

    #[test]
    fn two_samples_degenerate_to_a_line() {
        let s = CubicSpline::fit(vec![0.0, 10.0], vec![0.0, 50.0]).unwrap();
        assert!((s.value(5.0) - 25.0).abs() < 1e-9);
        assert!((s.derivative(0.0) - 5.0).abs() < 1e-9);
        assert!((s.derivative(10.0) - 5.0).abs() < 1e-9);
        assert!(s.second_derivative(5.0).abs() < 1e-9);
    }

    #[test]
    fn interpolates_through_the_knots() {
        let xs = vec![0.0, 1.0, 2.5, 4.0, 6.0];
        let ys = vec![0.0, 40.0, 180.0, 330.0, 400.0];
        let s = CubicSpline::fit(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((s.value(*x) - y).abs() < 1e-6, "knot at x={}", x);
        }
    }

    #[test]
    fn derivative_tracks_a_linear_climb() {
        // 50 m/s climb sampled every second
        let xs: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 50.0 * x).collect();
        let s = CubicSpline::fit(xs, ys).unwrap();
        assert!((s.derivative(4.0) - 50.0).abs() < 1e-6);
        assert!((s.derivative(8.0) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn derivative_turns_negative_when_the_climb_ends() {
        // Climb to 400 m, then sink slightly — the winch-release signature
        let xs: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let ys = vec![
            0.0, 50.0, 100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0, 400.0, 398.0, 394.0,
        ];
        let s = CubicSpline::fit(xs, ys).unwrap();
        assert!(s.derivative(4.0) > 0.0);
        assert!(s.derivative(11.0) < 0.0);
    }

    #[test]
    fn natural_boundary_conditions() {
        let xs = vec![0.0, 1.0, 2.0, 3.0];
        let ys = vec![0.0, 2.0, 1.0, 3.0];
        let s = CubicSpline::fit(xs, ys).unwrap();
        assert!(s.second_derivative(0.0).abs() < 1e-9);
        assert!(s.second_derivative(3.0).abs() < 1e-9);
    }
}
