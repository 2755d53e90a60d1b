//! Forward degradation model and its adjoint.
//!
//! An [`ImageModel`] is an ordered chain of degradation operators that maps
//! a high-resolution image to a simulated low-resolution observation. Each
//! operator must also expose its mathematical transpose; the solver applies
//! the transposed chain in reverse stage order to back-project residuals
//! from observation space into estimate space. Adjoint consistency is the
//! correctness contract the whole optimization depends on.

use crate::error::{Result, SuperResError};
use crate::float_trait::SrFloat;
use crate::image::ImageData;
use crate::resize::{InterpolationMode, ResizeTarget};

/// One stage of the degradation chain.
///
/// `observation_index` identifies which low-resolution observation the chain
/// is generating, so per-frame stages (e.g. motion) can vary while sharing
/// one model. Stages without per-frame state ignore it.
pub trait DegradationOperator<F: SrFloat>: Send + Sync {
    /// Apply the forward (degrading) transform in place.
    fn apply(&self, image: &mut ImageData<F>, observation_index: usize) -> Result<()>;

    /// Apply the transpose of the forward transform in place.
    fn apply_transpose(&self, image: &mut ImageData<F>, observation_index: usize) -> Result<()>;

    /// Resolution reduction contributed by this stage (1.0 if none).
    fn scale(&self) -> f64;
}

/// Resolution-reducing resampling stage.
///
/// Forward: area-averaging downsample by `1/scale`, which aliases
/// information the way real optics and sensors do. Transpose: zero-pad
/// (additive) upsample by `scale`, the exact transpose used for gradient
/// back-projection. The two deliberately use different interpolation
/// policies; substituting area averaging into the transpose direction would
/// silently corrupt every gradient the solver computes.
#[derive(Debug, Clone, Copy)]
pub struct DownsamplingOperator {
    scale: f64,
}

impl DownsamplingOperator {
    /// Construct with a scale factor >= 1.0. Degradation reduces or
    /// preserves resolution, never upsamples.
    pub fn new(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale < 1.0 {
            return Err(SuperResError::InvalidScale { scale });
        }
        Ok(Self { scale })
    }
}

impl<F: SrFloat> DegradationOperator<F> for DownsamplingOperator {
    fn apply(&self, image: &mut ImageData<F>, _observation_index: usize) -> Result<()> {
        image.resize(ResizeTarget::Scale(1.0 / self.scale), InterpolationMode::Area)
    }

    fn apply_transpose(&self, image: &mut ImageData<F>, _observation_index: usize) -> Result<()> {
        image.resize(ResizeTarget::Scale(self.scale), InterpolationMode::Additive)
    }

    fn scale(&self) -> f64 {
        self.scale
    }
}

/// Ordered composition of degradation stages.
pub struct ImageModel<F: SrFloat> {
    operators: Vec<Box<dyn DegradationOperator<F>>>,
}

impl<F: SrFloat> Default for ImageModel<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: SrFloat> ImageModel<F> {
    /// Create an empty model with no stages.
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
        }
    }

    /// Append a stage to the end of the chain. Registration order is the
    /// forward application order.
    pub fn add_operator(&mut self, operator: Box<dyn DegradationOperator<F>>) {
        self.operators.push(operator);
    }

    /// Number of registered stages.
    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }

    /// Product of stage scale factors. An HR image of size S run through
    /// the forward chain yields size S / combined_scale.
    pub fn combined_scale(&self) -> f64 {
        self.operators.iter().map(|op| op.scale()).product()
    }

    /// Apply the forward chain in registration order, in place.
    pub fn apply_in_place(&self, image: &mut ImageData<F>, observation_index: usize) -> Result<()> {
        for operator in &self.operators {
            operator.apply(image, observation_index)?;
        }
        Ok(())
    }

    /// Apply the forward chain to a copy, producing the simulated
    /// low-resolution observation.
    pub fn apply_to_image(
        &self,
        image: &ImageData<F>,
        observation_index: usize,
    ) -> Result<ImageData<F>> {
        let mut degraded = image.clone();
        self.apply_in_place(&mut degraded, observation_index)?;
        Ok(degraded)
    }

    /// Apply the transposed chain in reverse stage order, in place. Turns an
    /// observation-sized residual into an estimate-sized contribution.
    pub fn apply_transpose_in_place(
        &self,
        image: &mut ImageData<F>,
        observation_index: usize,
    ) -> Result<()> {
        for operator in self.operators.iter().rev() {
            operator.apply_transpose(image, observation_index)?;
        }
        Ok(())
    }

    /// Apply the transposed chain to a copy.
    pub fn apply_transpose_to_image(
        &self,
        image: &ImageData<F>,
        observation_index: usize,
    ) -> Result<ImageData<F>> {
        let mut projected = image.clone();
        self.apply_transpose_in_place(&mut projected, observation_index)?;
        Ok(projected)
    }
}
