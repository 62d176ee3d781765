//! Least-squares fit of a 1D Gaussian profile.
//!
//! The model is `a * exp(-(x - mu)^2 / (2 * sigma^2))`. Parameters are estimated
//! with Levenberg-Marquardt on the 3x3 normal equations, starting from a guess
//! read off the data (peak height, peak position, width above half maximum).
//! A step is accepted when the actual cost reduction is a sufficient fraction of
//! the reduction predicted by the linearized model.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

/// Ratio between the full width at half maximum and the standard deviation.
pub const FWHM_PER_SIGMA: f64 = 2.355;

const MIN_SAMPLES: usize = 3;
const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;
const MIN_GAIN_RATIO: f64 = 1e-4;

/// Gaussian profile parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub amplitude: f64,
    pub mean: f64,
    pub std: f64,
}

impl Gaussian {
    /// Evaluates the profile at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let d = x - self.mean;
        self.amplitude * (-d * d / (2.0 * self.std * self.std)).exp()
    }

    /// Full width at half maximum, `2.355 * |sigma|`.
    pub fn fwhm(&self) -> f64 {
        FWHM_PER_SIGMA * self.std.abs()
    }

    fn from_vector(p: &Vector3<f64>) -> Self {
        Gaussian {
            amplitude: p[0],
            mean: p[1],
            std: p[2],
        }
    }

    fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.amplitude, self.mean, self.std)
    }
}

/// Successful fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    pub params: Gaussian,
    /// Sum of squared residuals at the solution.
    pub cost: f64,
    pub iterations: usize,
}

/// Why a fit produced no parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Fewer samples than model parameters, or `x` and `y` differ in length.
    #[error("ill-posed fit: {provided} samples for {required} parameters")]
    TooFewSamples { required: usize, provided: usize },

    /// The data, or the residuals at the starting point, are not finite.
    #[error("ill-posed fit: non-finite data or residuals")]
    NonFinite,

    /// The optimizer ran out of iterations or damping.
    #[error("fit did not converge after {iterations} iterations")]
    NonConvergent { iterations: usize },
}

impl FitError {
    /// Whether the problem itself is ill-posed, as opposed to a failed optimization.
    pub fn is_ill_posed(&self) -> bool {
        matches!(self, FitError::TooFewSamples { .. } | FitError::NonFinite)
    }
}

/// Stopping criteria of [`fit_gaussian`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Hard cap on optimizer iterations; exhausting it is a non-convergence.
    pub max_iterations: usize,
    /// Relative decrease of the cost, actual and predicted, below which the fit
    /// has converged.
    pub ftol: f64,
    /// Relative step length below which the fit has converged.
    pub xtol: f64,
    /// Gradient magnitude below which the fit has converged.
    pub gtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-14,
        }
    }
}

/// Starting point: highest sample, its position, and a width from the samples
/// above half of the peak.
pub fn initial_guess(x: &[f64], y: &[f64]) -> Gaussian {
    let (peak_idx, peak) = y
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best });
    let n = x.len();
    let spacing = if n > 1 {
        ((x[n - 1] - x[0]) / (n - 1) as f64).abs()
    } else {
        1.0
    };
    let above_half = y.iter().filter(|&&v| v >= 0.5 * peak).count();
    let std = (above_half as f64 * spacing / FWHM_PER_SIGMA).max(0.5 * spacing);
    Gaussian {
        amplitude: peak,
        mean: x[peak_idx],
        std,
    }
}

fn cost(x: &[f64], y: &[f64], p: &Vector3<f64>) -> f64 {
    let model = Gaussian::from_vector(p);
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| (model.eval(xi) - yi).powi(2))
        .sum()
}

/// `J^T J` and `J^T r` for residuals `r = model - y`.
fn normal_equations(x: &[f64], y: &[f64], p: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let (a, mu, sigma) = (p[0], p[1], p[2]);
    let mut jtj = Matrix3::<f64>::zeros();
    let mut jtr = Vector3::<f64>::zeros();
    for (&xi, &yi) in x.iter().zip(y) {
        let d = xi - mu;
        let e = (-d * d / (2.0 * sigma * sigma)).exp();
        let j = Vector3::new(
            e,
            a * e * d / (sigma * sigma),
            a * e * d * d / (sigma * sigma * sigma),
        );
        let r = a * e - yi;
        jtj += j * j.transpose();
        jtr += j * r;
    }
    (jtj, jtr)
}

/// Fits a Gaussian to the samples `(x[i], y[i])`.
///
/// # Errors
/// - [`FitError::TooFewSamples`] / [`FitError::NonFinite`]: the problem is ill-posed.
/// - [`FitError::NonConvergent`]: the iteration cap was reached, the damping blew up,
///   or the optimizer wandered into non-finite territory.
pub fn fit_gaussian(x: &[f64], y: &[f64], options: &FitOptions) -> Result<GaussianFit, FitError> {
    if x.len() != y.len() || x.len() < MIN_SAMPLES {
        return Err(FitError::TooFewSamples {
            required: MIN_SAMPLES,
            provided: x.len().min(y.len()),
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let mut p = initial_guess(x, y).to_vector();
    let mut current_cost = cost(x, y, &p);
    if !current_cost.is_finite() {
        return Err(FitError::NonFinite);
    }

    let converged = |p: Vector3<f64>, cost: f64, iterations: usize| GaussianFit {
        params: Gaussian::from_vector(&p),
        cost,
        iterations,
    };

    let mut lambda = INITIAL_DAMPING;
    for iteration in 1..=options.max_iterations {
        let (jtj, jtr) = normal_equations(x, y, &p);
        if jtj.iter().chain(jtr.iter()).any(|v| !v.is_finite()) {
            return Err(FitError::NonConvergent { iterations: iteration });
        }
        if jtr.amax() <= options.gtol {
            return Ok(converged(p, current_cost, iteration));
        }

        let mut damped = jtj;
        for i in 0..3 {
            damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
        }
        let step = damped.lu().solve(&(-jtr)).filter(|s| s.iter().all(|v| v.is_finite()));

        let Some(step) = step else {
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                return Err(FitError::NonConvergent { iterations: iteration });
            }
            continue;
        };

        let small_step = step.norm() <= options.xtol * (p.norm() + options.xtol);
        let candidate = p + step;
        let candidate_cost = cost(x, y, &candidate);

        // gain ratio: actual over predicted (linearized) reduction
        let predicted = -(2.0 * step.dot(&jtr) + step.dot(&(jtj * step)));
        let actual = current_cost - candidate_cost;
        let gain = if predicted > 0.0 { actual / predicted } else { f64::NAN };

        if candidate_cost.is_finite() && gain > MIN_GAIN_RATIO {
            let tolerance = options.ftol * current_cost;
            let small_decrease = actual <= tolerance && predicted <= tolerance;
            p = candidate;
            current_cost = candidate_cost;
            if small_decrease || small_step {
                return Ok(converged(p, current_cost, iteration));
            }
            if gain > 0.75 {
                lambda = (lambda / 10.0).max(MIN_DAMPING);
            } else if gain < 0.25 {
                lambda *= 2.0;
            }
        } else {
            if small_step {
                return Ok(converged(p, current_cost, iteration));
            }
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                return Err(FitError::NonConvergent { iterations: iteration });
            }
        }
    }

    Err(FitError::NonConvergent {
        iterations: options.max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn samples(model: &Gaussian, n: usize) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y = x.iter().map(|&xi| model.eval(xi)).collect();
        (x, y)
    }

    #[test]
    fn recovers_noiseless_gaussian() {
        let truth = Gaussian {
            amplitude: 1.0,
            mean: 11.3,
            std: 2.2,
        };
        let (x, y) = samples(&truth, 25);
        let fit = fit_gaussian(&x, &y, &FitOptions::default()).unwrap();
        assert_abs_diff_eq!(fit.params.mean, truth.mean, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.params.std.abs(), truth.std, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.params.amplitude, truth.amplitude, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.params.fwhm(), 2.355 * 2.2, epsilon = 1e-3);
    }

    #[test]
    fn recovers_narrow_peak_near_the_edge() {
        let truth = Gaussian {
            amplitude: 1.0,
            mean: 2.0,
            std: 1.0,
        };
        let (x, y) = samples(&truth, 12);
        let fit = fit_gaussian(&x, &y, &FitOptions::default()).unwrap();
        assert_abs_diff_eq!(fit.params.mean, 2.0, epsilon = 1e-3);
    }

    #[test]
    fn noisy_profile_improves_on_the_initial_guess() {
        let truth = Gaussian {
            amplitude: 1.0,
            mean: 6.4,
            std: 1.8,
        };
        let (x, mut y) = samples(&truth, 15);
        for (i, v) in y.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 0.03 } else { -0.02 };
        }
        let start = initial_guess(&x, &y);
        let start_cost = cost(&x, &y, &start.to_vector());
        let fit = fit_gaussian(&x, &y, &FitOptions::default()).unwrap();
        assert!(fit.cost < start_cost);
        assert_abs_diff_eq!(fit.params.mean, truth.mean, epsilon = 0.1);
        assert!(fit.iterations < 200);
    }

    #[test]
    fn initial_guess_reads_the_peak() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.1, 0.6, 1.0, 0.6, 0.1];
        let guess = initial_guess(&x, &y);
        assert_eq!(guess.mean, 2.0);
        assert_eq!(guess.amplitude, 1.0);
        assert_abs_diff_eq!(guess.std, 3.0 / FWHM_PER_SIGMA, epsilon = 1e-12);
    }

    #[test]
    fn ill_posed_inputs() {
        let err = fit_gaussian(&[0.0, 1.0], &[1.0, 0.5], &FitOptions::default()).unwrap_err();
        assert!(err.is_ill_posed());

        let err = fit_gaussian(&[0.0, 1.0, 2.0], &[0.2, f64::NAN, 0.3], &FitOptions::default())
            .unwrap_err();
        assert_eq!(err, FitError::NonFinite);
        assert!(err.is_ill_posed());
    }

    #[test]
    fn iteration_cap_surfaces_non_convergence() {
        let truth = Gaussian {
            amplitude: 1.0,
            mean: 7.6,
            std: 3.1,
        };
        let (x, mut y) = samples(&truth, 20);
        y[0] = 0.4;
        let options = FitOptions {
            max_iterations: 1,
            ..Default::default()
        };
        let err = fit_gaussian(&x, &y, &options).unwrap_err();
        assert_eq!(err, FitError::NonConvergent { iterations: 1 });
        assert!(!err.is_ill_posed());
    }

    #[test]
    fn constant_profile_is_not_a_clean_peak() {
        let x: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y = vec![1.0; 25];
        match fit_gaussian(&x, &y, &FitOptions::default()) {
            Ok(fit) => assert!(fit.params.fwhm() > 20.0),
            Err(err) => assert!(matches!(err, FitError::NonConvergent { .. })),
        }
    }
}
