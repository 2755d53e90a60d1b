//! MAP estimation by iteratively reweighted least squares.
//!
//! The solver minimizes a robust data-fidelity term plus a weighted
//! regularization term. The outer IRLS loop re-derives per-pixel weights
//! from residual magnitudes, approximating an L1 data norm; each outer
//! iteration then solves the reweighted normal equations
//!
//! ```text
//! (sum_i At W_i A + lambda Rt R) x = sum_i At W_i y_i
//! ```
//!
//! with a matrix-free conjugate-gradient inner loop built on the image
//! model's forward/adjoint pair. Hitting an iteration cap is a normal
//! terminal state, never an error.

use log::{debug, info};

use crate::error::{Result, SuperResError};
use crate::float_trait::SrFloat;
use crate::image::ImageData;
use crate::model::ImageModel;
use crate::regularization::Regularizer;

// Compiled-in defaults. Adaptive adjustment always recomputes thresholds
// from these values, which keeps the adjustment idempotent.
const DEFAULT_MAX_SOLVER_ITERATIONS: usize = 50;
const DEFAULT_SOLVER_CONVERGENCE_THRESHOLD: f64 = 1e-6;
const DEFAULT_MAX_IRLS_ITERATIONS: usize = 20;
const DEFAULT_IRLS_COST_DIFFERENCE_THRESHOLD: f64 = 1e-5;

/// Stabilizing floor for the reweighting division. Residuals below this
/// magnitude are treated as exactly this large; tunable, never a failure.
const DEFAULT_IRLS_WEIGHT_EPSILON: f64 = 1e-6;

/// Inner-loop (linear solve) configuration shared by MAP solvers.
#[derive(Debug, Clone)]
pub struct MapSolverOptions<F: SrFloat> {
    /// Iteration cap for the inner conjugate-gradient solve.
    pub max_num_solver_iterations: usize,
    /// Inner solve stops early once the residual norm of the normal
    /// equations drops below this threshold.
    pub solver_convergence_threshold: F,
    /// Regularization weight lambda. Zero disables the regularization term.
    pub regularization_parameter: F,
}

impl<F: SrFloat> Default for MapSolverOptions<F> {
    fn default() -> Self {
        Self {
            max_num_solver_iterations: DEFAULT_MAX_SOLVER_ITERATIONS,
            solver_convergence_threshold: F::from_f64_c(DEFAULT_SOLVER_CONVERGENCE_THRESHOLD),
            regularization_parameter: F::zero(),
        }
    }
}

impl<F: SrFloat> MapSolverOptions<F> {
    /// Recompute the inner convergence threshold proportionally to problem
    /// size. Derived from the compiled-in default rather than the current
    /// value, so repeated calls with the same inputs give the same result.
    pub fn adjust_thresholds_adaptively(
        &mut self,
        num_parameters: usize,
        regularization_parameter_sum: f64,
    ) {
        let scale = (num_parameters as f64).sqrt() * (1.0 + regularization_parameter_sum);
        self.solver_convergence_threshold =
            F::from_f64_c(DEFAULT_SOLVER_CONVERGENCE_THRESHOLD * scale);
    }
}

/// Full configuration for the IRLS MAP solver.
#[derive(Debug, Clone)]
pub struct IrlsMapSolverOptions<F: SrFloat> {
    /// Inner-loop configuration.
    pub map_options: MapSolverOptions<F>,
    /// Outer-loop iteration cap. Each outer iteration runs its own inner
    /// conjugate-gradient solve bounded by `max_num_solver_iterations`.
    pub max_num_irls_iterations: usize,
    /// Outer loop stops once the cost change between consecutive outer
    /// iterations falls below this threshold.
    pub irls_cost_difference_threshold: F,
    /// Floor applied to residual magnitudes in the reweighting division.
    pub irls_weight_epsilon: F,
}

impl<F: SrFloat> Default for IrlsMapSolverOptions<F> {
    fn default() -> Self {
        Self {
            map_options: MapSolverOptions::default(),
            max_num_irls_iterations: DEFAULT_MAX_IRLS_ITERATIONS,
            irls_cost_difference_threshold: F::from_f64_c(DEFAULT_IRLS_COST_DIFFERENCE_THRESHOLD),
            irls_weight_epsilon: F::from_f64_c(DEFAULT_IRLS_WEIGHT_EPSILON),
        }
    }
}

impl<F: SrFloat> IrlsMapSolverOptions<F> {
    /// Recompute both convergence thresholds proportionally to problem
    /// size. Idempotent for fixed inputs.
    pub fn adjust_thresholds_adaptively(
        &mut self,
        num_parameters: usize,
        regularization_parameter_sum: f64,
    ) {
        self.map_options
            .adjust_thresholds_adaptively(num_parameters, regularization_parameter_sum);
        let scale = num_parameters as f64 * (1.0 + regularization_parameter_sum);
        self.irls_cost_difference_threshold =
            F::from_f64_c(DEFAULT_IRLS_COST_DIFFERENCE_THRESHOLD * scale);
    }
}

/// Terminal state of a solve. Both outcomes return the current estimate;
/// `MaxIterationsReached` reports an incomplete convergence, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The outer cost difference dropped below the convergence threshold.
    Converged,
    /// The outer iteration cap was reached first.
    MaxIterationsReached,
}

/// Outcome of [`MapSolver::solve`].
#[derive(Debug, Clone)]
pub struct SolveResult<F: SrFloat> {
    /// Final high-resolution estimate.
    pub estimate: ImageData<F>,
    /// How the outer loop terminated.
    pub status: SolveStatus,
    /// Number of outer iterations executed.
    pub num_iterations: usize,
    /// Objective cost at termination.
    pub final_cost: f64,
}

/// Contract shared by MAP solvers: drive an initial high-resolution
/// estimate to the objective's minimizer.
pub trait MapSolver<F: SrFloat> {
    /// Run the optimization starting from `initial_estimate`.
    fn solve(&self, initial_estimate: &ImageData<F>) -> Result<SolveResult<F>>;
}

/// IRLS implementation of the MAP objective.
///
/// The image model and the observation set are shared read-only inputs for
/// the duration of a solve; the solver exclusively owns its working copy of
/// the estimate. The solve is synchronous and deterministic for fixed
/// inputs and configuration.
pub struct IrlsMapSolver<'a, F: SrFloat> {
    options: IrlsMapSolverOptions<F>,
    model: &'a ImageModel<F>,
    observations: &'a [ImageData<F>],
    regularizer: Option<Box<dyn Regularizer<F>>>,
    print_solver_output: bool,
}

impl<'a, F: SrFloat> IrlsMapSolver<'a, F> {
    /// Create a solver over a degradation model and its observation set.
    ///
    /// All observations must be non-empty and share one geometry and
    /// channel count.
    pub fn new(
        options: IrlsMapSolverOptions<F>,
        model: &'a ImageModel<F>,
        observations: &'a [ImageData<F>],
    ) -> Result<Self> {
        if observations.is_empty() {
            return Err(SuperResError::EmptyImage);
        }
        let first = &observations[0];
        if first.is_empty() {
            return Err(SuperResError::EmptyImage);
        }
        for observation in &observations[1..] {
            if observation.image_size() != first.image_size() {
                return Err(SuperResError::dimension_mismatch(
                    first.image_size(),
                    observation.image_size(),
                ));
            }
            if observation.num_channels() != first.num_channels() {
                return Err(SuperResError::ChannelCountMismatch {
                    expected: first.num_channels(),
                    got: observation.num_channels(),
                });
            }
        }
        Ok(Self {
            options,
            model,
            observations,
            regularizer: None,
            print_solver_output: true,
        })
    }

    /// Attach a regularization operator, weighted by
    /// `regularization_parameter` in the options.
    pub fn with_regularizer(mut self, regularizer: Box<dyn Regularizer<F>>) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    /// Toggle progress reporting. A pure observer effect; never changes the
    /// numerical result.
    pub fn with_progress_output(mut self, print_solver_output: bool) -> Self {
        self.print_solver_output = print_solver_output;
        self
    }

    /// Solver configuration in effect.
    pub fn options(&self) -> &IrlsMapSolverOptions<F> {
        &self.options
    }

    // Forward pass: flatten model(x) for observation `index`.
    fn forward(&self, estimate: &ImageData<F>, index: usize) -> Result<Vec<F>> {
        Ok(self.model.apply_to_image(estimate, index)?.to_pixel_vec())
    }

    // Adjoint pass: back-project an observation-sized flat vector into
    // estimate space.
    fn adjoint(&self, data: &[F], index: usize) -> Result<Vec<F>> {
        let first = &self.observations[0];
        let lr = ImageData::from_pixels(data, first.image_size(), first.num_channels())?;
        Ok(self.model.apply_transpose_to_image(&lr, index)?.to_pixel_vec())
    }

    // Apply the regularizer channel by channel, returning the concatenated
    // residual vector, or None when no regularizer is attached.
    fn regularizer_residuals(&self, estimate: &[F], pixels_per_channel: usize) -> Option<Vec<F>> {
        let regularizer = self.regularizer.as_ref()?;
        let mut residuals = Vec::new();
        for channel in estimate.chunks_exact(pixels_per_channel) {
            residuals.extend(regularizer.apply(channel));
        }
        Some(residuals)
    }

    fn regularizer_transpose(&self, residuals: &[F]) -> Option<Vec<F>> {
        let regularizer = self.regularizer.as_ref()?;
        let per_channel = regularizer.num_residuals();
        let mut out = Vec::new();
        for chunk in residuals.chunks_exact(per_channel) {
            out.extend(regularizer.apply_transpose(chunk));
        }
        Some(out)
    }

    // Normal-equation operator: v -> sum_i At W_i A v + lambda Rt R v.
    fn normal_operator(
        &self,
        v: &[F],
        weights: &[Vec<F>],
        geometry: &EstimateGeometry,
    ) -> Result<Vec<F>> {
        let image = ImageData::from_pixels(v, geometry.size, geometry.num_channels)?;
        let mut accum = vec![F::zero(); v.len()];
        for (index, w) in weights.iter().enumerate() {
            let mut simulated = self.forward(&image, index)?;
            for (s, wi) in simulated.iter_mut().zip(w.iter()) {
                *s *= *wi;
            }
            let projected = self.adjoint(&simulated, index)?;
            for (a, p) in accum.iter_mut().zip(projected.iter()) {
                *a += *p;
            }
        }
        let lambda = self.options.map_options.regularization_parameter;
        if lambda > F::zero() {
            if let Some(reg_residuals) = self.regularizer_residuals(v, geometry.pixels_per_channel)
            {
                if let Some(back) = self.regularizer_transpose(&reg_residuals) {
                    for (a, r) in accum.iter_mut().zip(back.iter()) {
                        *a += lambda * *r;
                    }
                }
            }
        }
        Ok(accum)
    }

    // Objective cost under the current weights: the reweighted data term
    // plus the regularization energy.
    fn compute_cost(&self, residuals: &[Vec<F>], weights: &[Vec<F>], estimate: &[F], pixels_per_channel: usize) -> f64 {
        let mut cost = 0.0;
        for (r, w) in residuals.iter().zip(weights.iter()) {
            for (ri, wi) in r.iter().zip(w.iter()) {
                let rf = ri.to_f64().unwrap_or(0.0);
                let wf = wi.to_f64().unwrap_or(0.0);
                cost += wf * rf * rf;
            }
        }
        let lambda = self
            .options
            .map_options
            .regularization_parameter
            .to_f64()
            .unwrap_or(0.0);
        if lambda > 0.0 {
            if let Some(reg_residuals) = self.regularizer_residuals(estimate, pixels_per_channel) {
                let energy: f64 = reg_residuals
                    .iter()
                    .map(|r| {
                        let v = r.to_f64().unwrap_or(0.0);
                        v * v
                    })
                    .sum();
                cost += lambda * energy;
            }
        }
        cost
    }
}

struct EstimateGeometry {
    size: (usize, usize),
    num_channels: usize,
    pixels_per_channel: usize,
}

impl<F: SrFloat> MapSolver<F> for IrlsMapSolver<'_, F> {
    fn solve(&self, initial_estimate: &ImageData<F>) -> Result<SolveResult<F>> {
        if initial_estimate.is_empty() {
            return Err(SuperResError::EmptyImage);
        }
        let first_obs = &self.observations[0];
        if initial_estimate.num_channels() != first_obs.num_channels() {
            return Err(SuperResError::ChannelCountMismatch {
                expected: first_obs.num_channels(),
                got: initial_estimate.num_channels(),
            });
        }
        // One forward pass up front verifies that the model maps the
        // estimate geometry onto the observation geometry.
        let simulated = self.model.apply_to_image(initial_estimate, 0)?;
        if simulated.image_size() != first_obs.image_size() {
            return Err(SuperResError::dimension_mismatch(
                first_obs.image_size(),
                simulated.image_size(),
            ));
        }

        let geometry = EstimateGeometry {
            size: initial_estimate.image_size(),
            num_channels: initial_estimate.num_channels(),
            pixels_per_channel: initial_estimate.num_pixels(),
        };
        let observation_vecs: Vec<Vec<F>> =
            self.observations.iter().map(|o| o.to_pixel_vec()).collect();

        let mut estimate = initial_estimate.to_pixel_vec();
        let epsilon = self.options.irls_weight_epsilon;
        let mut previous_cost: Option<f64> = None;
        let mut status = SolveStatus::MaxIterationsReached;
        let mut final_cost = 0.0;
        let mut iterations = 0;

        for outer in 0..self.options.max_num_irls_iterations {
            iterations = outer + 1;
            let estimate_image =
                ImageData::from_pixels(&estimate, geometry.size, geometry.num_channels)?;

            // 1. Residuals per observation.
            let mut residuals = Vec::with_capacity(self.observations.len());
            for (index, observation) in observation_vecs.iter().enumerate() {
                let mut simulated = self.forward(&estimate_image, index)?;
                for (s, o) in simulated.iter_mut().zip(observation.iter()) {
                    *s -= *o;
                }
                residuals.push(simulated);
            }

            // 2. Robust reweighting: w = 1 / max(|r|, epsilon). Large
            // residuals are downweighted relative to a quadratic loss.
            let weights: Vec<Vec<F>> = residuals
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|ri| F::one() / ri.abs().max(epsilon))
                        .collect()
                })
                .collect();

            // 3. Right-hand side of the weighted normal equations:
            //    b = sum_i At W_i y_i.
            let mut rhs = vec![F::zero(); estimate.len()];
            for (index, observation) in observation_vecs.iter().enumerate() {
                let weighted: Vec<F> = observation
                    .iter()
                    .zip(weights[index].iter())
                    .map(|(o, w)| *o * *w)
                    .collect();
                let projected = self.adjoint(&weighted, index)?;
                for (b, p) in rhs.iter_mut().zip(projected.iter()) {
                    *b += *p;
                }
            }

            // 4. Inner conjugate-gradient solve, warm-started from the
            //    current estimate.
            let (solution, inner_iterations) = conjugate_gradient(
                |v| self.normal_operator(v, &weights, &geometry),
                &rhs,
                estimate.clone(),
                self.options.map_options.max_num_solver_iterations,
                self.options.map_options.solver_convergence_threshold,
            )?;
            estimate = solution;

            // 5. Outer objective cost, evaluated at the updated estimate
            //    under the current weights.
            let updated_image =
                ImageData::from_pixels(&estimate, geometry.size, geometry.num_channels)?;
            let mut updated_residuals = Vec::with_capacity(self.observations.len());
            for (index, observation) in observation_vecs.iter().enumerate() {
                let mut simulated = self.forward(&updated_image, index)?;
                for (s, o) in simulated.iter_mut().zip(observation.iter()) {
                    *s -= *o;
                }
                updated_residuals.push(simulated);
            }
            let cost = self.compute_cost(
                &updated_residuals,
                &weights,
                &estimate,
                geometry.pixels_per_channel,
            );
            final_cost = cost;
            if self.print_solver_output {
                info!(
                    "IRLS iteration {iterations}: cost = {cost:.6e} ({inner_iterations} inner CG iterations)"
                );
            }

            if let Some(previous) = previous_cost {
                let difference = (previous - cost).abs();
                let threshold = self
                    .options
                    .irls_cost_difference_threshold
                    .to_f64()
                    .unwrap_or(0.0);
                if difference < threshold {
                    status = SolveStatus::Converged;
                    break;
                }
            }
            previous_cost = Some(cost);
        }

        if self.print_solver_output {
            match status {
                SolveStatus::Converged => {
                    debug!("IRLS converged after {iterations} outer iterations");
                }
                SolveStatus::MaxIterationsReached => {
                    info!(
                        "IRLS stopped at the outer iteration cap ({}) without \
                         meeting the cost difference threshold",
                        self.options.max_num_irls_iterations
                    );
                }
            }
        }

        Ok(SolveResult {
            estimate: ImageData::from_pixels(&estimate, geometry.size, geometry.num_channels)?,
            status,
            num_iterations: iterations,
            final_cost,
        })
    }
}

/// Matrix-free conjugate gradient on the normal equations M x = b.
///
/// Returns the solution and the number of iterations performed. Stops early
/// when the residual norm drops below `tolerance` or the search direction
/// loses positive curvature.
fn conjugate_gradient<F, M>(
    matvec: M,
    b: &[F],
    x0: Vec<F>,
    max_iterations: usize,
    tolerance: F,
) -> Result<(Vec<F>, usize)>
where
    F: SrFloat,
    M: Fn(&[F]) -> Result<Vec<F>>,
{
    let mut x = x0;
    let mx = matvec(&x)?;
    let mut r: Vec<F> = b.iter().zip(mx.iter()).map(|(bi, mi)| *bi - *mi).collect();
    let mut p = r.clone();
    let mut rs_old = dot(&r, &r);

    if rs_old.sqrt() < tolerance {
        return Ok((x, 0));
    }

    let mut iterations = 0;
    for _ in 0..max_iterations {
        iterations += 1;
        let mp = matvec(&p)?;
        let curvature = dot(&p, &mp);
        if curvature <= F::zero() {
            // Numerical loss of positive definiteness; keep the current
            // iterate rather than stepping along an invalid direction.
            break;
        }
        let alpha = rs_old / curvature;
        for (xi, pi) in x.iter_mut().zip(p.iter()) {
            *xi += alpha * *pi;
        }
        for (ri, mi) in r.iter_mut().zip(mp.iter()) {
            *ri -= alpha * *mi;
        }
        let rs_new = dot(&r, &r);
        if rs_new.sqrt() < tolerance {
            break;
        }
        let beta = rs_new / rs_old;
        for (pi, ri) in p.iter_mut().zip(r.iter()) {
            *pi = *ri + beta * *pi;
        }
        rs_old = rs_new;
    }
    Ok((x, iterations))
}

#[inline]
fn dot<F: SrFloat>(a: &[F], b: &[F]) -> F {
    a.iter().zip(b.iter()).map(|(x, y)| *x * *y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownsamplingOperator;
    use crate::regularization::TotalVariationRegularizer;
    use ndarray::{array, Array2};

    fn hr_channel() -> Array2<f64> {
        array![
            [0.1, 0.2, 0.3, 0.4],
            [0.5, 0.6, 0.7, 0.8],
            [0.9, 1.0, 0.0, 0.2],
            [0.4, 0.6, 0.8, 1.0]
        ]
    }

    fn one_stage_model(scale: f64) -> ImageModel<f64> {
        let mut model = ImageModel::new();
        model.add_operator(Box::new(DownsamplingOperator::new(scale).unwrap()));
        model
    }

    #[test]
    fn test_options_defaults() {
        let options: IrlsMapSolverOptions<f64> = IrlsMapSolverOptions::default();
        assert_eq!(options.max_num_irls_iterations, 20);
        assert!((options.irls_cost_difference_threshold - 1e-5).abs() < 1e-18);
        assert_eq!(options.map_options.max_num_solver_iterations, 50);
        assert!((options.map_options.solver_convergence_threshold - 1e-6).abs() < 1e-18);
        assert_eq!(options.map_options.regularization_parameter, 0.0);
    }

    #[test]
    fn test_adjust_thresholds_adaptively_is_idempotent() {
        let mut options: IrlsMapSolverOptions<f64> = IrlsMapSolverOptions::default();
        options.adjust_thresholds_adaptively(1024, 0.5);
        let inner_once = options.map_options.solver_convergence_threshold;
        let outer_once = options.irls_cost_difference_threshold;

        options.adjust_thresholds_adaptively(1024, 0.5);
        assert_eq!(options.map_options.solver_convergence_threshold, inner_once);
        assert_eq!(options.irls_cost_difference_threshold, outer_once);

        // The scaling itself is proportional to problem size.
        assert!((inner_once - 1e-6 * 32.0 * 1.5).abs() < 1e-15);
        assert!((outer_once - 1e-5 * 1024.0 * 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_solver_rejects_inconsistent_observations() {
        let model = one_stage_model(2.0);
        let observations = vec![
            ImageData::from_channel(Array2::from_elem((2, 2), 0.5)),
            ImageData::from_channel(Array2::from_elem((3, 3), 0.5)),
        ];
        assert!(
            IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations).is_err()
        );

        let empty: Vec<ImageData<f64>> = Vec::new();
        assert!(IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &empty).is_err());
    }

    #[test]
    fn test_solver_rejects_mismatched_initial_estimate() {
        let model = one_stage_model(2.0);
        let observations = vec![ImageData::from_channel(Array2::from_elem((2, 2), 0.5))];
        let solver = IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations)
            .unwrap()
            .with_progress_output(false);

        // 5x5 HR estimate degrades to 3x3, not the 2x2 the observation has.
        let bad_estimate = ImageData::from_channel(Array2::from_elem((5, 5), 0.5));
        assert!(solver.solve(&bad_estimate).is_err());
    }

    #[test]
    fn test_noiseless_solve_converges_immediately() {
        let hr = ImageData::from_channel(hr_channel());
        let model = one_stage_model(2.0);
        let observations = vec![model.apply_to_image(&hr, 0).unwrap()];

        let solver = IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations)
            .unwrap()
            .with_progress_output(false);

        // Starting from the ground truth, the residual is zero from the
        // first iteration and the cost difference vanishes right away.
        let result = solver.solve(&hr).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert!(result.num_iterations <= 3);
        assert!(result.final_cost < 1e-9);

        let estimate = result.estimate;
        assert_eq!(estimate.image_size(), (4, 4));
        for i in 0..16 {
            assert!((estimate.pixel_value(0, i) - hr.pixel_value(0, i)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_solve_improves_a_perturbed_estimate() {
        let hr = ImageData::from_channel(hr_channel());
        let model = one_stage_model(2.0);
        let observations = vec![model.apply_to_image(&hr, 0).unwrap()];

        let solver = IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations)
            .unwrap()
            .with_progress_output(false);

        // Start away from the truth and verify the data term shrinks.
        let initial = hr.multiplied_by(0.5);
        let initial_residual = {
            let simulated = model.apply_to_image(&initial, 0).unwrap();
            let mut total = 0.0;
            for i in 0..4 {
                let d = simulated.pixel_value(0, i) - observations[0].pixel_value(0, i);
                total += d * d;
            }
            total
        };

        let result = solver.solve(&initial).unwrap();
        let final_residual = {
            let simulated = model.apply_to_image(&result.estimate, 0).unwrap();
            let mut total = 0.0;
            for i in 0..4 {
                let d = simulated.pixel_value(0, i) - observations[0].pixel_value(0, i);
                total += d * d;
            }
            total
        };
        assert!(final_residual < initial_residual);
    }

    #[test]
    fn test_max_iterations_is_a_normal_termination() {
        let hr = ImageData::from_channel(hr_channel());
        let model = one_stage_model(2.0);
        let observations = vec![model.apply_to_image(&hr, 0).unwrap()];

        let options = IrlsMapSolverOptions::<f64> {
            max_num_irls_iterations: 1,
            // Strict inequality means a zero threshold is never met.
            irls_cost_difference_threshold: 0.0,
            ..IrlsMapSolverOptions::default()
        };
        let solver = IrlsMapSolver::new(options, &model, &observations)
            .unwrap()
            .with_progress_output(false);

        let initial = hr.multiplied_by(0.5);
        let result = solver.solve(&initial).unwrap();
        assert_eq!(result.status, SolveStatus::MaxIterationsReached);
        assert_eq!(result.num_iterations, 1);
    }

    #[test]
    fn test_regularized_solve_runs_and_converges() {
        let hr = ImageData::from_channel(hr_channel());
        let model = one_stage_model(2.0);
        let observations = vec![model.apply_to_image(&hr, 0).unwrap()];

        let options = IrlsMapSolverOptions::<f64> {
            map_options: MapSolverOptions {
                regularization_parameter: 1e-3,
                ..MapSolverOptions::default()
            },
            ..IrlsMapSolverOptions::default()
        };
        let solver = IrlsMapSolver::new(options, &model, &observations)
            .unwrap()
            .with_regularizer(Box::new(TotalVariationRegularizer::new(4, 4)))
            .with_progress_output(false);

        let result = solver.solve(&hr).unwrap();
        assert!(matches!(
            result.status,
            SolveStatus::Converged | SolveStatus::MaxIterationsReached
        ));
        assert_eq!(result.estimate.image_size(), (4, 4));
    }

    #[test]
    fn test_multiple_observations_share_geometry() {
        let hr = ImageData::from_channel(hr_channel());
        let model = one_stage_model(2.0);
        let observations = vec![
            model.apply_to_image(&hr, 0).unwrap(),
            model.apply_to_image(&hr, 1).unwrap(),
        ];

        let solver = IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations)
            .unwrap()
            .with_progress_output(false);
        let result = solver.solve(&hr).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
    }

    #[test]
    fn test_conjugate_gradient_solves_small_system() {
        // M = [[4, 1], [1, 3]], b = [1, 2].
        let matvec = |v: &[f64]| -> Result<Vec<f64>> {
            Ok(vec![4.0 * v[0] + v[1], v[0] + 3.0 * v[1]])
        };
        let b = [1.0, 2.0];
        let (x, _) = conjugate_gradient(matvec, &b, vec![0.0, 0.0], 50, 1e-12).unwrap();
        // Exact solution of the 2x2 system.
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-9);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-9);
    }
}
