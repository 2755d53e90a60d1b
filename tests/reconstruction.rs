use ndarray::Array2;
use superres_core::{
    ColorSpace, DownsamplingOperator, ImageData, ImageModel, InterpolationMode, IrlsMapSolver,
    IrlsMapSolverOptions, MapSolver, ResizeTarget, SolveStatus, TotalVariationRegularizer,
};

/// Helper: smooth synthetic high-resolution channel with distinct values.
fn synthetic_channel(rows: usize, cols: usize, phase: f64) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        0.5 + 0.4 * ((r as f64 * 0.7 + c as f64 * 0.3 + phase).sin())
    })
}

fn two_stage_model() -> ImageModel<f64> {
    let mut model = ImageModel::new();
    model.add_operator(Box::new(DownsamplingOperator::new(2.0).unwrap()));
    model.add_operator(Box::new(DownsamplingOperator::new(2.0).unwrap()));
    model
}

// ---------------------------------------------------------------------------
// Degradation chain geometry: a two-stage model with combined scale 4 maps
// an 8x8 estimate onto 2x2 observations, and the transpose chain maps back.
// ---------------------------------------------------------------------------

#[test]
fn chain_geometry_round_trip() {
    let model = two_stage_model();
    assert!((model.combined_scale() - 4.0).abs() < 1e-12);

    let hr = ImageData::from_channel(synthetic_channel(8, 8, 0.0));
    let lr = model.apply_to_image(&hr, 0).unwrap();
    assert_eq!(lr.image_size(), (2, 2));

    let back = model.apply_transpose_to_image(&lr, 0).unwrap();
    assert_eq!(back.image_size(), (8, 8));
}

// ---------------------------------------------------------------------------
// End-to-end solve: noiseless observations from a known truth, solver
// started at the truth, must converge right away and keep the estimate.
// ---------------------------------------------------------------------------

#[test]
fn noiseless_multi_frame_solve_converges() {
    let truth = ImageData::from_channel(synthetic_channel(8, 8, 0.0));
    let model = two_stage_model();
    let observations: Vec<ImageData<f64>> = (0..3)
        .map(|index| model.apply_to_image(&truth, index).unwrap())
        .collect();

    let solver = IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations)
        .unwrap()
        .with_progress_output(false);

    let result = solver.solve(&truth).unwrap();
    assert_eq!(result.status, SolveStatus::Converged);
    assert!(result.final_cost < 1e-9);
    for i in 0..64 {
        assert!((result.estimate.pixel_value(0, i) - truth.pixel_value(0, i)).abs() < 1e-6);
    }
}

// ---------------------------------------------------------------------------
// Regularized solve from a degraded starting point must reduce the data
// misfit relative to the initial estimate.
// ---------------------------------------------------------------------------

#[test]
fn regularized_solve_reduces_data_misfit() {
    let truth = ImageData::from_channel(synthetic_channel(8, 8, 0.0));
    let mut model = ImageModel::new();
    model.add_operator(Box::new(DownsamplingOperator::new(2.0).unwrap()));
    let observations = vec![model.apply_to_image(&truth, 0).unwrap()];

    let mut options = IrlsMapSolverOptions::<f64>::default();
    options.map_options.regularization_parameter = 1e-4;
    let solver = IrlsMapSolver::new(options, &model, &observations)
        .unwrap()
        .with_regularizer(Box::new(TotalVariationRegularizer::new(8, 8)))
        .with_progress_output(false);

    // Start from a blurry upsample of the observation, the usual cheap
    // initialization in practice.
    let mut initial = observations[0].clone();
    initial
        .resize(ResizeTarget::Scale(2.0), InterpolationMode::Linear)
        .unwrap();

    let misfit = |estimate: &ImageData<f64>| -> f64 {
        let simulated = model.apply_to_image(estimate, 0).unwrap();
        let mut total = 0.0;
        for i in 0..simulated.num_pixels() {
            let d = simulated.pixel_value(0, i) - observations[0].pixel_value(0, i);
            total += d * d;
        }
        total
    };

    let before = misfit(&initial);
    let result = solver.solve(&initial).unwrap();
    let after = misfit(&result.estimate);
    assert!(after <= before);
    assert_eq!(result.estimate.image_size(), (8, 8));
}

// ---------------------------------------------------------------------------
// Luminance-only pipeline: solve on luma, then re-attach chroma from the
// low-resolution color reference, mirroring the usual color workflow.
// ---------------------------------------------------------------------------

#[test]
fn luminance_solve_with_color_reattachment() {
    // Build a 3-channel HR color image.
    let mut color_truth = ImageData::new();
    for phase in [0.0, 1.3, 2.6] {
        color_truth
            .add_channel(synthetic_channel(8, 8, phase))
            .unwrap();
    }

    // Low-resolution color reference (what a camera actually captured).
    let mut model = ImageModel::new();
    model.add_operator(Box::new(DownsamplingOperator::new(2.0).unwrap()));
    let mut lr_color = model.apply_to_image(&color_truth, 0).unwrap();
    lr_color.change_color_space(ColorSpace::YCrCb, false).unwrap();

    // Solve on the luma channel only.
    let mut luma_truth = color_truth.clone();
    luma_truth.change_color_space(ColorSpace::YCrCb, true).unwrap();
    assert_eq!(luma_truth.num_channels(), 1);

    let observations = vec![model.apply_to_image(&luma_truth, 0).unwrap()];
    let solver = IrlsMapSolver::new(IrlsMapSolverOptions::default(), &model, &observations)
        .unwrap()
        .with_progress_output(false);
    let result = solver.solve(&luma_truth).unwrap();
    assert_eq!(result.status, SolveStatus::Converged);

    // Reattach chroma from the low-resolution reference and convert back.
    let mut reconstructed = result.estimate;
    reconstructed.interpolate_color_from(&lr_color).unwrap();
    assert_eq!(reconstructed.num_channels(), 3);
    assert_eq!(reconstructed.color_space(), ColorSpace::YCrCb);

    reconstructed.change_color_space(ColorSpace::Rgb, false).unwrap();
    assert_eq!(reconstructed.num_channels(), 3);
    assert_eq!(reconstructed.image_size(), (8, 8));

    // Luma was preserved through the solve, so the reconstruction should
    // track the truth loosely even with interpolated chroma.
    let mut truth_luma = color_truth.clone();
    truth_luma.change_color_space(ColorSpace::YCrCb, true).unwrap();
    let mut rec_luma = reconstructed.clone();
    rec_luma.change_color_space(ColorSpace::YCrCb, true).unwrap();
    for i in 0..64 {
        assert!((rec_luma.pixel_value(0, i) - truth_luma.pixel_value(0, i)).abs() < 0.05);
    }
}
