//! Canny edge detection with fixed thresholds.
//!
//! The detector runs as a chain of typed stages, each consuming the
//! previous one:
//!
//! ```rust
//! # use framefx_pipeline::{PixelBuffer, canny::Canny};
//! let mut buffer = PixelBuffer::from_pixel(32, 32, [0, 0, 0, 255]);
//! let edges = Canny::new(&buffer.frame_mut())
//!     .blur()
//!     .differentiate()
//!     .suppress()
//!     .threshold()
//!     .link()
//!     .render();
//! assert!(edges.pixels().all(|p| p.0[0] == 0));
//! ```
//!
//! 1. [`Grayscaled`]: [`luma`](crate::luma) of every pixel.
//! 2. [`Blurred`]: 5x5 Gaussian ([`GAUSSIAN_5X5`] / [`GAUSSIAN_DIVISOR`])
//!    with clamp-to-edge borders.
//! 3. [`Differentiated`]: Sobel magnitude and direction, interior pixels
//!    only. The one-pixel border stays at zero.
//! 4. [`Suppressed`]: non-maximum suppression along the quantized
//!    gradient direction.
//! 5. [`Thresholded`]: [`EdgeLabel`] per pixel from [`LOW_THRESHOLD`] and
//!    [`HIGH_THRESHOLD`].
//! 6. [`Linked`]: hysteresis. Weak pixels 8-connected to a strong pixel
//!    become strong, transitively.
//! 7. [`Linked::render`]: 255 for strong, 0 otherwise.
//!
//! Hysteresis walks an explicit stack of pixel indices rather than
//! recursing, so a large connected weak region costs heap, not call
//! stack.

use image::{GrayImage, Luma};
use tracing::{debug, trace};

use crate::convolve::{Boundary, Kernel, convolve};
use crate::diagnostics::StageMetrics;
use crate::luma::{luma_image, to_byte};
use crate::sobel;
use crate::types::{Dimensions, FrameMut};

/// Suppressed magnitudes at or above this are [`EdgeLabel::Weak`].
pub const LOW_THRESHOLD: f32 = 20.0;

/// Suppressed magnitudes at or above this are [`EdgeLabel::Strong`].
pub const HIGH_THRESHOLD: f32 = 50.0;

const _: () = assert!(LOW_THRESHOLD <= HIGH_THRESHOLD);

/// Integer approximation of a 5x5 Gaussian with sigma 1.4.
pub const GAUSSIAN_5X5: Kernel<5> = Kernel::new([
    [2, 4, 5, 4, 2],
    [4, 9, 12, 9, 4],
    [5, 12, 15, 12, 5],
    [4, 9, 12, 9, 4],
    [2, 4, 5, 4, 2],
]);

/// Normalization divisor for [`GAUSSIAN_5X5`] (the sum of its weights).
pub const GAUSSIAN_DIVISOR: i32 = 159;

/// The 8-connected neighborhood as `(dx, dy)` offsets.
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Replace R, G and B with the binary Canny edge map. Alpha is untouched.
pub fn canny(mut frame: FrameMut<'_>) {
    let dims = frame.dimensions();
    trace!(width = dims.width, height = dims.height, "canny");
    let edges = Canny::new(&frame)
        .blur()
        .differentiate()
        .suppress()
        .threshold()
        .link()
        .render();
    frame.write_gray(edges.as_raw());
}

/// Blur a grayscale image with [`GAUSSIAN_5X5`], clamping at the borders.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(gray: &GrayImage) -> GrayImage {
    let sums = convolve(gray, &GAUSSIAN_5X5, Boundary::Clamp);
    let divisor = f64::from(GAUSSIAN_DIVISOR);
    let pixels = sums
        .into_iter()
        .map(|sum| to_byte(f64::from(sum) / divisor))
        .collect();
    GrayImage::from_raw(gray.width(), gray.height(), pixels)
        .unwrap_or_else(|| GrayImage::new(gray.width(), gray.height()))
}

// --- Gradient field ---

/// Per-pixel gradient magnitude and direction.
///
/// Only interior pixels are computed; the one-pixel border holds zero
/// in both arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    dimensions: Dimensions,
    magnitude: Vec<f32>,
    direction: Vec<f32>,
}

impl GradientField {
    /// Compute the gradient of a (blurred) grayscale image.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(image: &GrayImage) -> Self {
        let dimensions = Dimensions::new(image.width(), image.height());
        let len = dimensions.pixel_count();
        let mut magnitude = vec![0.0f32; len];
        let mut direction = vec![0.0f32; len];
        if dimensions.width < 3 || dimensions.height < 3 {
            return Self {
                dimensions,
                magnitude,
                direction,
            };
        }

        let (gx, gy) = sobel::gradients(image, Boundary::Valid);
        let (w, h) = (dimensions.width as usize, dimensions.height as usize);
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                magnitude[i] = sobel::magnitude(gx[i], gy[i]);
                direction[i] = (gy[i] as f32).atan2(gx[i] as f32);
            }
        }
        Self {
            dimensions,
            magnitude,
            direction,
        }
    }

    /// Field dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Gradient magnitudes, row-major. Always `>= 0`.
    #[must_use]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Gradient directions in radians, `(-pi, pi]`, row-major.
    #[must_use]
    pub fn direction(&self) -> &[f32] {
        &self.direction
    }

    /// Largest magnitude in the field (zero for an empty field).
    #[must_use]
    pub fn max_magnitude(&self) -> f32 {
        self.magnitude.iter().copied().fold(0.0, f32::max)
    }
}

/// Gradient direction quantized to one of four axes.
///
/// Each bin spans +/-22.5 degrees around its axis and wraps at +/-180,
/// so a direction and its opposite share a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Around 0 / 180 degrees: compare left and right.
    Deg0,
    /// Around 45 / -135 degrees: compare upper-right and lower-left.
    Deg45,
    /// Around 90 / -90 degrees: compare above and below.
    Deg90,
    /// Around 135 / -45 degrees: compare upper-left and lower-right.
    Deg135,
}

impl Orientation {
    /// Quantize a direction in radians. `atan2(0, 0) == 0` lands in
    /// [`Orientation::Deg0`].
    #[must_use]
    pub fn from_radians(theta: f32) -> Self {
        let degrees = theta.to_degrees();
        let folded = if degrees < 0.0 {
            degrees + 180.0
        } else {
            degrees
        };
        if !(22.5..157.5).contains(&folded) {
            Self::Deg0
        } else if folded < 67.5 {
            Self::Deg45
        } else if folded < 112.5 {
            Self::Deg90
        } else {
            Self::Deg135
        }
    }

    /// The two neighbors compared during suppression, as `(dx, dy)`.
    #[must_use]
    pub const fn neighbors(self) -> [(isize, isize); 2] {
        match self {
            Self::Deg0 => [(1, 0), (-1, 0)],
            Self::Deg45 => [(1, -1), (-1, 1)],
            Self::Deg90 => [(0, -1), (0, 1)],
            Self::Deg135 => [(-1, -1), (1, 1)],
        }
    }
}

/// Thin edges: keep an interior pixel's magnitude only if it is at
/// least as large as both neighbors along its gradient orientation.
///
/// The result is never larger than the input at any pixel. Border
/// pixels are zero.
#[must_use = "returns the suppressed magnitudes"]
pub fn non_maximum_suppression(field: &GradientField) -> Vec<f32> {
    let dims = field.dimensions;
    let mut out = vec![0.0f32; dims.pixel_count()];
    if dims.width < 3 || dims.height < 3 {
        return out;
    }
    let (w, h) = (dims.width as usize, dims.height as usize);
    let stride = w.cast_signed();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = field.magnitude[i];
            let [(ax, ay), (bx, by)] = Orientation::from_radians(field.direction[i]).neighbors();
            // Interior pixel, so both neighbors are in bounds.
            let a = field.magnitude[i.wrapping_add_signed(ay * stride + ax)];
            let b = field.magnitude[i.wrapping_add_signed(by * stride + bx)];
            if m >= a && m >= b {
                out[i] = m;
            }
        }
    }
    out
}

// --- Edge labels ---

/// Double-threshold classification of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeLabel {
    /// Below [`LOW_THRESHOLD`].
    #[default]
    None,
    /// In `[LOW_THRESHOLD, HIGH_THRESHOLD)`; kept only if linked.
    Weak,
    /// At or above [`HIGH_THRESHOLD`], or linked to such a pixel.
    Strong,
}

impl EdgeLabel {
    /// Classify a suppressed magnitude.
    #[must_use]
    pub fn classify(magnitude: f32) -> Self {
        if magnitude >= HIGH_THRESHOLD {
            Self::Strong
        } else if magnitude >= LOW_THRESHOLD {
            Self::Weak
        } else {
            Self::None
        }
    }
}

/// Per-pixel [`EdgeLabel`]s for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMap {
    dimensions: Dimensions,
    labels: Vec<EdgeLabel>,
}

impl EdgeMap {
    /// Label every pixel of a suppressed magnitude array.
    ///
    /// `suppressed` must hold one value per pixel of `dimensions`.
    #[must_use]
    pub fn classify(suppressed: &[f32], dimensions: Dimensions) -> Self {
        debug_assert_eq!(suppressed.len(), dimensions.pixel_count());
        Self {
            dimensions,
            labels: suppressed.iter().copied().map(EdgeLabel::classify).collect(),
        }
    }

    /// Build a map from explicit labels, or `None` if the count does
    /// not match `dimensions`.
    #[must_use]
    pub fn from_labels(dimensions: Dimensions, labels: Vec<EdgeLabel>) -> Option<Self> {
        (labels.len() == dimensions.pixel_count()).then_some(Self { dimensions, labels })
    }

    /// Map dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Labels, row-major.
    #[must_use]
    pub fn labels(&self) -> &[EdgeLabel] {
        &self.labels
    }

    /// Number of pixels carrying `label`.
    #[must_use]
    pub fn count(&self, label: EdgeLabel) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Hysteresis: promote every weak pixel 8-connected (transitively)
    /// to a strong pixel. Returns the number of promotions.
    ///
    /// Seeds a stack with all strong pixels and pops until empty, so
    /// each pixel is pushed at most once. Running it again on its own
    /// output promotes nothing.
    pub fn link(&mut self) -> usize {
        let (w, h) = (
            self.dimensions.width as usize,
            self.dimensions.height as usize,
        );
        let mut stack: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == EdgeLabel::Strong)
            .map(|(i, _)| i)
            .collect();
        let mut promoted = 0;

        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            for (dx, dy) in NEIGHBORS {
                let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy))
                else {
                    continue;
                };
                if nx >= w || ny >= h {
                    continue;
                }
                let n = ny * w + nx;
                if self.labels[n] == EdgeLabel::Weak {
                    self.labels[n] = EdgeLabel::Strong;
                    promoted += 1;
                    stack.push(n);
                }
            }
        }
        promoted
    }

    /// Binary edge image: 255 where strong, 0 elsewhere.
    #[must_use = "returns the rendered edge image"]
    pub fn render(&self) -> GrayImage {
        let Dimensions { width, height } = self.dimensions;
        GrayImage::from_fn(width, height, |x, y| {
            let strong = self.labels[self.dimensions.index(x, y)] == EdgeLabel::Strong;
            Luma([if strong { 255 } else { 0 }])
        })
    }
}

// --- Stages ---

/// Common interface of the Canny stages, used by
/// [`diagnostics`](crate::diagnostics) to name and measure each step.
pub trait CannyStage {
    /// Short stage name (e.g. `"blur"`).
    const NAME: &'static str;

    /// Metrics describing the work done to reach this stage.
    fn metrics(&self) -> StageMetrics;
}

/// Entry point of the stage chain.
pub struct Canny;

impl Canny {
    /// Extract the luma of `frame` and start the chain.
    #[allow(clippy::new_ret_no_self)]
    #[must_use = "call .blur() to continue"]
    pub fn new(frame: &FrameMut<'_>) -> Grayscaled {
        Grayscaled {
            gray: luma_image(frame),
        }
    }
}

/// Stage 1: grayscale copy of the frame.
#[must_use = "Canny stages are consumed by advancing; call .blur() to continue"]
pub struct Grayscaled {
    gray: GrayImage,
}

impl Grayscaled {
    /// The grayscale image.
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Advance to the blur stage.
    pub fn blur(self) -> Blurred {
        Blurred {
            blurred: gaussian_blur(&self.gray),
        }
    }
}

/// Stage 2: Gaussian-blurred grayscale.
#[must_use = "Canny stages are consumed by advancing; call .differentiate() to continue"]
pub struct Blurred {
    blurred: GrayImage,
}

impl Blurred {
    /// The blurred image.
    pub const fn blurred(&self) -> &GrayImage {
        &self.blurred
    }

    /// Advance to the gradient stage.
    pub fn differentiate(self) -> Differentiated {
        Differentiated {
            field: GradientField::compute(&self.blurred),
        }
    }
}

/// Stage 3: gradient magnitude and direction.
#[must_use = "Canny stages are consumed by advancing; call .suppress() to continue"]
pub struct Differentiated {
    field: GradientField,
}

impl Differentiated {
    /// The gradient field.
    pub const fn field(&self) -> &GradientField {
        &self.field
    }

    /// Advance to the non-maximum suppression stage.
    pub fn suppress(self) -> Suppressed {
        let magnitude = non_maximum_suppression(&self.field);
        Suppressed {
            dimensions: self.field.dimensions,
            magnitude,
        }
    }
}

/// Stage 4: thinned magnitudes.
#[must_use = "Canny stages are consumed by advancing; call .threshold() to continue"]
pub struct Suppressed {
    dimensions: Dimensions,
    magnitude: Vec<f32>,
}

impl Suppressed {
    /// Suppressed magnitudes, row-major.
    #[must_use]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Advance to the double-threshold stage.
    pub fn threshold(self) -> Thresholded {
        let edges = EdgeMap::classify(&self.magnitude, self.dimensions);
        debug!(
            strong = edges.count(EdgeLabel::Strong),
            weak = edges.count(EdgeLabel::Weak),
            "canny double threshold",
        );
        Thresholded { edges }
    }
}

/// Stage 5: double-threshold labels, before linking.
#[must_use = "Canny stages are consumed by advancing; call .link() to continue"]
pub struct Thresholded {
    edges: EdgeMap,
}

impl Thresholded {
    /// The edge labels.
    pub const fn edges(&self) -> &EdgeMap {
        &self.edges
    }

    /// Advance to the hysteresis stage.
    pub fn link(mut self) -> Linked {
        let promoted = self.edges.link();
        debug!(promoted, "canny hysteresis");
        Linked {
            edges: self.edges,
            promoted,
        }
    }
}

/// Stage 6: labels after hysteresis. Final stage.
#[must_use = "call .render() to produce the edge image"]
pub struct Linked {
    edges: EdgeMap,
    promoted: usize,
}

impl Linked {
    /// The final edge labels.
    pub const fn edges(&self) -> &EdgeMap {
        &self.edges
    }

    /// Number of weak pixels promoted to strong.
    #[must_use]
    pub const fn promoted(&self) -> usize {
        self.promoted
    }

    /// Render the binary edge image.
    #[must_use = "returns the rendered edge image"]
    pub fn render(&self) -> GrayImage {
        self.edges.render()
    }
}

impl CannyStage for Grayscaled {
    const NAME: &'static str = "grayscale";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Luma {
            width: self.gray.width(),
            height: self.gray.height(),
        }
    }
}

impl CannyStage for Blurred {
    const NAME: &'static str = "blur";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Blur {
            kernel_size: GAUSSIAN_5X5.weights().len(),
            divisor: GAUSSIAN_DIVISOR,
        }
    }
}

impl CannyStage for Differentiated {
    const NAME: &'static str = "gradient";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Gradient {
            max_magnitude: self.field.max_magnitude(),
        }
    }
}

impl CannyStage for Suppressed {
    const NAME: &'static str = "suppression";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Suppression {
            retained_pixel_count: self.magnitude.iter().filter(|&&m| m > 0.0).count() as u64,
        }
    }
}

impl CannyStage for Thresholded {
    const NAME: &'static str = "threshold";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Threshold {
            low_threshold: LOW_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
            strong_pixel_count: self.edges.count(EdgeLabel::Strong) as u64,
            weak_pixel_count: self.edges.count(EdgeLabel::Weak) as u64,
        }
    }
}

impl CannyStage for Linked {
    const NAME: &'static str = "hysteresis";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Hysteresis {
            promoted_pixel_count: self.promoted as u64,
            edge_pixel_count: self.edges.count(EdgeLabel::Strong) as u64,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::cast_possible_truncation,
    clippy::float_cmp
)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::types::PixelBuffer;

    /// 20x20 frame with a sharp vertical boundary at x = 10.
    fn sharp_edge_frame() -> PixelBuffer {
        PixelBuffer::from_fn(20, 20, |x, _| {
            if x < 10 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
    }

    fn labels_from(rows: &[&str]) -> EdgeMap {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let labels = rows
            .iter()
            .flat_map(|r| r.chars())
            .map(|c| match c {
                'S' => EdgeLabel::Strong,
                'w' => EdgeLabel::Weak,
                _ => EdgeLabel::None,
            })
            .collect();
        EdgeMap::from_labels(Dimensions::new(width, height), labels).unwrap()
    }

    #[test]
    fn gaussian_divisor_is_kernel_sum() {
        assert_eq!(GAUSSIAN_5X5.sum(), GAUSSIAN_DIVISOR);
    }

    #[test]
    fn black_frame_produces_no_edges() {
        let mut buffer = PixelBuffer::from_pixel(16, 12, [0, 0, 0, 255]);
        canny(buffer.frame_mut());
        assert!(buffer.data().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn uniform_frame_produces_no_edges() {
        let mut buffer = PixelBuffer::from_pixel(16, 12, [128, 64, 200, 255]);
        canny(buffer.frame_mut());
        assert!(buffer.data().chunks_exact(4).all(|p| p[0] == 0));
    }

    #[test]
    fn sharp_edge_detected_as_thin_line() {
        let mut buffer = sharp_edge_frame();
        canny(buffer.frame_mut());
        let edge_columns: Vec<u32> = (0..20).filter(|&x| buffer.pixel(x, 10)[0] == 255).collect();
        assert!(!edge_columns.is_empty(), "expected edges at sharp boundary");
        assert!(
            edge_columns.iter().all(|&x| (8..=11).contains(&x)),
            "edges away from boundary: {edge_columns:?}",
        );
        // Output is strictly binary.
        assert!(buffer.data().chunks_exact(4).all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn canny_preserves_alpha() {
        let mut buffer = PixelBuffer::from_fn(12, 12, |x, _| {
            let v = if x < 6 { 10 } else { 240 };
            [v, v, v, 77]
        });
        canny(buffer.frame_mut());
        assert!(buffer.data().chunks_exact(4).all(|p| p[3] == 77));
    }

    #[test]
    fn tiny_frames_render_black() {
        for (w, h) in [(0, 0), (1, 1), (2, 5), (5, 2)] {
            let mut buffer = PixelBuffer::from_fn(w, h, |x, _| {
                if x % 2 == 0 { [0, 0, 0, 255] } else { [255, 255, 255, 255] }
            });
            canny(buffer.frame_mut());
            assert!(
                buffer.data().chunks_exact(4).all(|p| p[0] == 0),
                "{w}x{h} produced edges",
            );
        }
    }

    #[test]
    fn blur_keeps_uniform_image() {
        let gray = GrayImage::from_pixel(9, 7, Luma([123]));
        let blurred = gaussian_blur(&gray);
        assert!(blurred.pixels().all(|p| p.0[0] == 123));
    }

    #[test]
    fn blur_softens_step() {
        let gray = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 255 }]));
        let blurred = gaussian_blur(&gray);
        assert!(blurred.get_pixel(4, 5).0[0] > 0);
        assert!(blurred.get_pixel(5, 5).0[0] < 255);
    }

    #[test]
    fn gradient_border_is_zero() {
        let gray = GrayImage::from_fn(6, 5, |x, y| Luma([((x * 37 + y * 11) % 256) as u8]));
        let field = GradientField::compute(&gray);
        let (w, h) = (6, 5);
        for y in 0..h {
            for x in 0..w {
                if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                    let i = y * w + x;
                    assert_eq!(field.magnitude()[i], 0.0, "magnitude at ({x},{y})");
                    assert_eq!(field.direction()[i], 0.0, "direction at ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn gradient_direction_follows_step() {
        // Brightness increases downward: gx = 0, gy > 0, direction +90 deg.
        let gray = GrayImage::from_fn(5, 5, |_, y| Luma([if y < 2 { 0 } else { 100 }]));
        let field = GradientField::compute(&gray);
        let i = 2 * 5 + 2;
        assert!(field.magnitude()[i] > 0.0);
        assert!((field.direction()[i] - PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn orientation_bins() {
        let bin = |deg: f32| Orientation::from_radians(deg.to_radians());
        assert_eq!(bin(0.0), Orientation::Deg0);
        assert_eq!(bin(22.4), Orientation::Deg0);
        assert_eq!(bin(22.6), Orientation::Deg45);
        assert_eq!(bin(67.4), Orientation::Deg45);
        assert_eq!(bin(90.0), Orientation::Deg90);
        assert_eq!(bin(112.6), Orientation::Deg135);
        assert_eq!(bin(157.4), Orientation::Deg135);
        assert_eq!(bin(157.6), Orientation::Deg0);
        assert_eq!(bin(180.0), Orientation::Deg0);
        assert_eq!(bin(-10.0), Orientation::Deg0);
        assert_eq!(bin(-45.0), Orientation::Deg135);
        assert_eq!(bin(-90.0), Orientation::Deg90);
        assert_eq!(bin(-135.0), Orientation::Deg45);
        assert_eq!(bin(-170.0), Orientation::Deg0);
    }

    #[test]
    fn zero_gradient_falls_in_first_bin() {
        assert_eq!(Orientation::from_radians(0.0f32.atan2(0.0)), Orientation::Deg0);
    }

    #[test]
    fn suppression_never_increases_magnitude() {
        let gray = GrayImage::from_fn(24, 18, |x, y| {
            Luma([((x * x * 7 + y * 13 + x * y * 3) % 256) as u8])
        });
        let field = GradientField::compute(&gaussian_blur(&gray));
        let suppressed = non_maximum_suppression(&field);
        for (s, m) in suppressed.iter().zip(field.magnitude()) {
            assert!(s <= m, "suppressed {s} > original {m}");
            assert!(*s == 0.0 || s == m);
        }
    }

    #[test]
    fn suppression_keeps_ridge_and_drops_flanks() {
        // Vertical ramp 0, 0, 100, 200, 200: horizontal gradient peaks in
        // the middle column.
        let gray = GrayImage::from_fn(5, 5, |x, _| Luma([[0, 0, 100, 200, 200][x as usize]]));
        let field = GradientField::compute(&gray);
        let suppressed = non_maximum_suppression(&field);
        let row = 2 * 5;
        assert!(suppressed[row + 2] > 0.0);
        assert_eq!(suppressed[row + 2], field.magnitude()[row + 2]);
        assert_eq!(suppressed[row + 1], 0.0);
        assert_eq!(suppressed[row + 3], 0.0);
    }

    #[test]
    fn classify_thresholds() {
        assert_eq!(EdgeLabel::classify(0.0), EdgeLabel::None);
        assert_eq!(EdgeLabel::classify(19.9), EdgeLabel::None);
        assert_eq!(EdgeLabel::classify(LOW_THRESHOLD), EdgeLabel::Weak);
        assert_eq!(EdgeLabel::classify(49.9), EdgeLabel::Weak);
        assert_eq!(EdgeLabel::classify(HIGH_THRESHOLD), EdgeLabel::Strong);
        assert_eq!(EdgeLabel::classify(1000.0), EdgeLabel::Strong);
    }

    #[test]
    fn hysteresis_promotes_connected_weak_chain() {
        let mut edges = labels_from(&["Sww..", ".....", "...ww"]);
        let promoted = edges.link();
        assert_eq!(promoted, 2);
        assert_eq!(edges, labels_from(&["SSS..", ".....", "...ww"]));
    }

    #[test]
    fn hysteresis_follows_diagonals() {
        let mut edges = labels_from(&["S...", ".w..", "..w.", "...w"]);
        assert_eq!(edges.link(), 3);
        assert_eq!(edges.count(EdgeLabel::Weak), 0);
    }

    #[test]
    fn hysteresis_reaches_north_and_northeast_at_borders() {
        let mut edges = labels_from(&["..w", ".w.", "S.."]);
        assert_eq!(edges.link(), 2);
        assert_eq!(edges, labels_from(&["..S", ".S.", "S.."]));
    }

    #[test]
    fn hysteresis_is_a_fixed_point() {
        let mut edges = labels_from(&["Sw...w", "..w..w", "ww..w.", "....wS"]);
        edges.link();
        let once = edges.clone();
        assert_eq!(edges.link(), 0);
        assert_eq!(edges, once);
    }

    #[test]
    fn hysteresis_handles_huge_weak_region_without_recursion() {
        let dims = Dimensions::new(1000, 1000);
        let mut labels = vec![EdgeLabel::Weak; dims.pixel_count()];
        labels[0] = EdgeLabel::Strong;
        let mut edges = EdgeMap::from_labels(dims, labels).unwrap();
        assert_eq!(edges.link(), dims.pixel_count() - 1);
        assert_eq!(edges.count(EdgeLabel::Strong), dims.pixel_count());
    }

    #[test]
    fn isolated_weak_pixels_are_dropped() {
        let edges = {
            let mut e = labels_from(&["w...", "....", "..S."]);
            e.link();
            e
        };
        let image = edges.render();
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
        assert_eq!(image.get_pixel(2, 2).0[0], 255);
    }

    #[test]
    fn from_labels_rejects_wrong_length() {
        assert!(EdgeMap::from_labels(Dimensions::new(2, 2), vec![EdgeLabel::None; 3]).is_none());
    }

    #[test]
    fn stage_chain_exposes_intermediates() {
        let mut buffer = sharp_edge_frame();
        let gray = Canny::new(&buffer.frame_mut());
        assert_eq!(gray.gray().get_pixel(0, 0).0[0], 0);
        let blurred = gray.blur();
        assert_eq!(blurred.blurred().width(), 20);
        let diff = blurred.differentiate();
        assert!(diff.field().max_magnitude() > HIGH_THRESHOLD);
        let suppressed = diff.suppress();
        assert!(suppressed.magnitude().iter().any(|&m| m > 0.0));
        let thresholded = suppressed.threshold();
        assert!(thresholded.edges().count(EdgeLabel::Strong) > 0);
        let linked = thresholded.link();
        assert!(linked.edges().count(EdgeLabel::Strong) >= linked.promoted());
    }

    #[test]
    fn stage_metrics_report_counts() {
        let mut buffer = sharp_edge_frame();
        let thresholded = Canny::new(&buffer.frame_mut())
            .blur()
            .differentiate()
            .suppress()
            .threshold();
        let expected = thresholded.edges().count(EdgeLabel::Strong) as u64;
        assert!(matches!(
            thresholded.metrics(),
            StageMetrics::Threshold { strong_pixel_count, .. } if strong_pixel_count == expected
        ));
        assert_eq!(Thresholded::NAME, "threshold");
    }
}
