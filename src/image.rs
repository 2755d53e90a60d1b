//! Multi-channel image container used throughout the solver core.
//!
//! An [`ImageData`] is an ordered sequence of same-sized 2D channel planes
//! with row-major flat pixel indexing. Pixel intensities are nominally in
//! [0, 1] unless the image was constructed with the `Raw` convention; the
//! container never rescales on its own. Cloning performs a deep copy of all
//! channel data.

use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rayon::prelude::*;

use crate::color::{rgb_to_ycrcb, ycrcb_to_rgb, ColorSpace};
use crate::error::{Result, SuperResError};
use crate::float_trait::SrFloat;
use crate::resize::{resize_channel, InterpolationMode, ResizeTarget};

/// Intensity convention recorded at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Values are nominally in [0, 1].
    #[default]
    Normalized,
    /// Values carry arbitrary magnitudes (e.g. residuals, gradients).
    Raw,
}

/// Multi-channel 2D image with shared geometry across channels.
#[derive(Debug, Clone)]
pub struct ImageData<F: SrFloat> {
    channels: Vec<Array2<F>>,
    rows: usize,
    cols: usize,
    normalization: Normalization,
    color_space: ColorSpace,
}

impl<F: SrFloat> Default for ImageData<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: SrFloat> ImageData<F> {
    /// Create an empty image with zero channels and 0x0 geometry.
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            rows: 0,
            cols: 0,
            normalization: Normalization::Normalized,
            color_space: ColorSpace::Rgb,
        }
    }

    /// Create a single-channel image from a channel plane, assuming
    /// normalized [0, 1] intensities.
    pub fn from_channel(channel: Array2<F>) -> Self {
        Self::from_channel_with(channel, Normalization::Normalized)
    }

    /// Create a single-channel image carrying raw (un-normalized) values.
    pub fn from_channel_raw(channel: Array2<F>) -> Self {
        Self::from_channel_with(channel, Normalization::Raw)
    }

    fn from_channel_with(channel: Array2<F>, normalization: Normalization) -> Self {
        let (rows, cols) = channel.dim();
        Self {
            channels: vec![channel],
            rows,
            cols,
            normalization,
            color_space: ColorSpace::Rgb,
        }
    }

    /// Build a multi-channel image from a channel-major flat pixel array.
    /// The data is copied; mutating the image never touches the source.
    pub fn from_pixels(
        pixels: &[F],
        (rows, cols): (usize, usize),
        num_channels: usize,
    ) -> Result<Self> {
        let per_channel = rows * cols;
        if per_channel == 0 || num_channels == 0 {
            return Err(SuperResError::EmptyImage);
        }
        let expected = per_channel * num_channels;
        if pixels.len() != expected {
            return Err(SuperResError::PixelBufferMismatch {
                expected,
                got: pixels.len(),
                rows,
                cols,
                num_channels,
            });
        }
        let mut channels = Vec::with_capacity(num_channels);
        for chunk in pixels.chunks_exact(per_channel) {
            // chunks_exact guarantees the length matches the geometry.
            let plane = Array2::from_shape_vec((rows, cols), chunk.to_vec())
                .map_err(|_| SuperResError::PixelBufferMismatch {
                    expected: per_channel,
                    got: chunk.len(),
                    rows,
                    cols,
                    num_channels,
                })?;
            channels.push(plane);
        }
        Ok(Self {
            channels,
            rows,
            cols,
            normalization: Normalization::Raw,
            color_space: ColorSpace::Rgb,
        })
    }

    /// Number of channel planes.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Shared (rows, cols) geometry of every channel.
    pub fn image_size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Pixels per channel.
    pub fn num_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// True when the image holds no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Intensity convention recorded at construction.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Current color representation of the channel planes.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Append a channel plane. The first channel fixes the image geometry;
    /// later channels must match it exactly.
    pub fn add_channel(&mut self, channel: Array2<F>) -> Result<()> {
        let (rows, cols) = channel.dim();
        if self.channels.is_empty() {
            self.rows = rows;
            self.cols = cols;
        } else if (rows, cols) != (self.rows, self.cols) {
            return Err(SuperResError::dimension_mismatch(
                (self.rows, self.cols),
                (rows, cols),
            ));
        }
        self.channels.push(channel);
        Ok(())
    }

    /// Append a channel from a row-major flat slice. The data is copied.
    pub fn add_channel_from_slice(&mut self, data: &[F], (rows, cols): (usize, usize)) -> Result<()> {
        if data.len() != rows * cols {
            return Err(SuperResError::PixelBufferMismatch {
                expected: rows * cols,
                got: data.len(),
                rows,
                cols,
                num_channels: 1,
            });
        }
        let plane = Array2::from_shape_vec((rows, cols), data.to_vec()).map_err(|_| {
            SuperResError::PixelBufferMismatch {
                expected: rows * cols,
                got: data.len(),
                rows,
                cols,
                num_channels: 1,
            }
        })?;
        self.add_channel(plane)
    }

    /// Read a pixel by channel and row-major flat index.
    ///
    /// Panics on out-of-range access in debug builds; use
    /// [`ImageData::try_pixel_value`] for checked access.
    pub fn pixel_value(&self, channel: usize, flat_index: usize) -> F {
        debug_assert!(channel < self.channels.len());
        debug_assert!(flat_index < self.num_pixels());
        self.channels[channel][[flat_index / self.cols, flat_index % self.cols]]
    }

    /// Checked pixel read.
    pub fn try_pixel_value(&self, channel: usize, flat_index: usize) -> Result<F> {
        if channel >= self.channels.len() {
            return Err(SuperResError::ChannelIndexOutOfRange {
                index: channel,
                num_channels: self.channels.len(),
            });
        }
        if flat_index >= self.num_pixels() {
            return Err(SuperResError::PixelBufferMismatch {
                expected: self.num_pixels(),
                got: flat_index,
                rows: self.rows,
                cols: self.cols,
                num_channels: self.channels.len(),
            });
        }
        Ok(self.pixel_value(channel, flat_index))
    }

    /// Borrow a channel plane.
    pub fn channel(&self, index: usize) -> Result<&Array2<F>> {
        self.channels
            .get(index)
            .ok_or(SuperResError::ChannelIndexOutOfRange {
                index,
                num_channels: self.channels.len(),
            })
    }

    /// Borrow a channel plane as a read-only view.
    pub fn channel_view(&self, index: usize) -> Result<ArrayView2<'_, F>> {
        Ok(self.channel(index)?.view())
    }

    /// Borrow a channel plane mutably, scoped to the caller's operation.
    /// The view cannot change the image geometry.
    pub fn channel_mut(&mut self, index: usize) -> Result<ArrayViewMut2<'_, F>> {
        let num_channels = self.channels.len();
        self.channels
            .get_mut(index)
            .map(|c| c.view_mut())
            .ok_or(SuperResError::ChannelIndexOutOfRange {
                index,
                num_channels,
            })
    }

    /// Flatten all channels into one channel-major pixel vector.
    pub fn to_pixel_vec(&self) -> Vec<F> {
        let mut out = Vec::with_capacity(self.num_pixels() * self.channels.len());
        for channel in &self.channels {
            out.extend(channel.iter().copied());
        }
        out
    }

    // -------------------------------------------------------------------
    // Arithmetic
    // -------------------------------------------------------------------

    /// Multiply every pixel by a scalar, in place.
    pub fn multiply_by_scalar(&mut self, scalar: F) {
        self.channels
            .par_iter_mut()
            .for_each(|channel| channel.mapv_inplace(|v| v * scalar));
    }

    /// Divide every pixel by a non-zero scalar, in place.
    pub fn divide_by_scalar(&mut self, scalar: F) -> Result<()> {
        if scalar == F::zero() {
            return Err(SuperResError::ZeroScalar);
        }
        self.multiply_by_scalar(F::one() / scalar);
        Ok(())
    }

    /// Elementwise add another image of identical shape, in place.
    pub fn add_assign_image(&mut self, other: &ImageData<F>) -> Result<()> {
        self.check_same_shape(other)?;
        self.channels
            .par_iter_mut()
            .zip(other.channels.par_iter())
            .for_each(|(dst, src)| {
                dst.zip_mut_with(src, |d, s| *d += *s);
            });
        Ok(())
    }

    /// Elementwise subtract another image of identical shape, in place.
    pub fn sub_assign_image(&mut self, other: &ImageData<F>) -> Result<()> {
        self.check_same_shape(other)?;
        self.channels
            .par_iter_mut()
            .zip(other.channels.par_iter())
            .for_each(|(dst, src)| {
                dst.zip_mut_with(src, |d, s| *d -= *s);
            });
        Ok(())
    }

    /// Pure scalar multiply returning a new image.
    pub fn multiplied_by(&self, scalar: F) -> ImageData<F> {
        let mut out = self.clone();
        out.multiply_by_scalar(scalar);
        out
    }

    /// Pure scalar divide returning a new image.
    pub fn divided_by(&self, scalar: F) -> Result<ImageData<F>> {
        let mut out = self.clone();
        out.divide_by_scalar(scalar)?;
        Ok(out)
    }

    /// Pure elementwise add returning a new image.
    pub fn added_to(&self, other: &ImageData<F>) -> Result<ImageData<F>> {
        let mut out = self.clone();
        out.add_assign_image(other)?;
        Ok(out)
    }

    fn check_same_shape(&self, other: &ImageData<F>) -> Result<()> {
        if self.channels.len() != other.channels.len() {
            return Err(SuperResError::ChannelCountMismatch {
                expected: self.channels.len(),
                got: other.channels.len(),
            });
        }
        if (self.rows, self.cols) != (other.rows, other.cols) {
            return Err(SuperResError::dimension_mismatch(
                (self.rows, self.cols),
                (other.rows, other.cols),
            ));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------

    /// Resize every channel to the target geometry with the given
    /// interpolation policy. All channels are replaced atomically; on error
    /// the image is left untouched.
    pub fn resize(&mut self, target: ResizeTarget, mode: InterpolationMode) -> Result<()> {
        if self.channels.is_empty() {
            return Err(SuperResError::EmptyImage);
        }
        let (dst_rows, dst_cols) = target.resolve(self.rows, self.cols)?;
        if (dst_rows, dst_cols) == (self.rows, self.cols) {
            return Ok(());
        }
        // Channels are independent, so parallelizing across them keeps the
        // result bit-identical to the sequential computation.
        let resized: Vec<Array2<F>> = self
            .channels
            .par_iter()
            .map(|channel| resize_channel(channel.view(), dst_rows, dst_cols, mode))
            .collect();
        self.channels = resized;
        self.rows = dst_rows;
        self.cols = dst_cols;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Color
    // -------------------------------------------------------------------

    /// Convert the channel planes between RGB and YCrCb.
    ///
    /// With `luminance_only` set (YCrCb target) the chroma planes are
    /// discarded and the image collapses to a single luma channel, which is
    /// irreversible without an external color reference.
    pub fn change_color_space(&mut self, target: ColorSpace, luminance_only: bool) -> Result<()> {
        if target != self.color_space {
            if self.channels.len() != 3 {
                return Err(SuperResError::ChannelCountMismatch {
                    expected: 3,
                    got: self.channels.len(),
                });
            }
            self.channels = match target {
                ColorSpace::YCrCb => rgb_to_ycrcb(&self.channels),
                ColorSpace::Rgb => ycrcb_to_rgb(&self.channels),
            };
            self.color_space = target;
        }
        if luminance_only && target == ColorSpace::YCrCb && self.channels.len() > 1 {
            self.channels.truncate(1);
        }
        Ok(())
    }

    /// Append color information from a multi-channel reference image.
    ///
    /// `self` must be a single-channel (luma) image; the reference must have
    /// three channels. The reference's two chroma planes are resized to this
    /// image's geometry with linear interpolation and appended; the luma
    /// channel is left untouched.
    pub fn interpolate_color_from(&mut self, reference: &ImageData<F>) -> Result<()> {
        if self.channels.len() != 1 {
            return Err(SuperResError::ChannelCountMismatch {
                expected: 1,
                got: self.channels.len(),
            });
        }
        if reference.channels.len() != 3 {
            return Err(SuperResError::ChannelCountMismatch {
                expected: 3,
                got: reference.channels.len(),
            });
        }
        for chroma in &reference.channels[1..] {
            let resized = resize_channel(chroma.view(), self.rows, self.cols, InterpolationMode::Linear);
            self.channels.push(resized);
        }
        self.color_space = reference.color_space;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------

    /// Compute out-of-range statistics for testing and telemetry. Not part
    /// of the solver hot path.
    pub fn data_report(&self) -> ImageDataReport {
        let mut report = ImageDataReport {
            image_size: (self.rows, self.cols),
            num_channels: self.channels.len(),
            ..ImageDataReport::default()
        };

        for (index, channel) in self.channels.iter().enumerate() {
            let mut negative = 0usize;
            let mut over_one = 0usize;
            for value in channel.iter() {
                let v = value.to_f64().unwrap_or(0.0);
                if v < 0.0 {
                    negative += 1;
                }
                if v > 1.0 {
                    over_one += 1;
                }
                if v < report.smallest_pixel_value {
                    report.smallest_pixel_value = v;
                }
                if v > report.largest_pixel_value {
                    report.largest_pixel_value = v;
                }
            }
            report.num_negative_pixels += negative;
            report.num_over_one_pixels += over_one;
            if negative > report.max_num_negative_pixels_in_one_channel {
                report.max_num_negative_pixels_in_one_channel = negative;
                report.channel_with_most_negative_pixels = index;
            }
            if over_one > report.max_num_over_one_pixels_in_one_channel {
                report.max_num_over_one_pixels_in_one_channel = over_one;
                report.channel_with_most_over_one_pixels = index;
            }
        }

        if self.channels.is_empty() || self.num_pixels() == 0 {
            report.smallest_pixel_value = 0.0;
            report.largest_pixel_value = 0.0;
        }
        report
    }
}

/// Out-of-range pixel statistics produced by [`ImageData::data_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDataReport {
    /// (rows, cols) of the inspected image.
    pub image_size: (usize, usize),
    /// Number of channel planes inspected.
    pub num_channels: usize,
    /// Total count of negative pixels across all channels.
    pub num_negative_pixels: usize,
    /// Total count of pixels above 1.0 across all channels.
    pub num_over_one_pixels: usize,
    /// Channel index holding the most negative pixels.
    pub channel_with_most_negative_pixels: usize,
    /// Negative-pixel count of that channel.
    pub max_num_negative_pixels_in_one_channel: usize,
    /// Channel index holding the most pixels above 1.0.
    pub channel_with_most_over_one_pixels: usize,
    /// Over-one count of that channel.
    pub max_num_over_one_pixels_in_one_channel: usize,
    /// Global minimum pixel value.
    pub smallest_pixel_value: f64,
    /// Global maximum pixel value.
    pub largest_pixel_value: f64,
}

impl Default for ImageDataReport {
    fn default() -> Self {
        Self {
            image_size: (0, 0),
            num_channels: 0,
            num_negative_pixels: 0,
            num_over_one_pixels: 0,
            channel_with_most_negative_pixels: 0,
            max_num_negative_pixels_in_one_channel: 0,
            channel_with_most_over_one_pixels: 0,
            max_num_over_one_pixels_in_one_channel: 0,
            smallest_pixel_value: f64::INFINITY,
            largest_pixel_value: f64::NEG_INFINITY,
        }
    }
}
