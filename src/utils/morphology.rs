//! Mask morphology
//!
//! Smoothing of predicted masks and binary erosion used for trimap construction.

use image::GrayImage;
use imageproc::morphology::Mask;

/// Standard deviation of the smoothing blur applied to predicted masks
const MASK_BLUR_SIGMA: f32 = 2.0;

/// Values below this become background after smoothing
const MASK_BINARIZE_THRESHOLD: u8 = 127;

/// Smooth and binarize a predicted mask
///
/// Grayscale opening with a 3x3 cross removes isolated speckles, a
/// Gaussian blur rounds off jagged contours, and the result is thresholded
/// back to a hard {0, 255} mask.
#[must_use]
pub fn post_process_mask(mask: &GrayImage) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }

    let opened = imageproc::morphology::grayscale_open(mask, &Mask::diamond(1));
    let mut smoothed = imageproc::filter::gaussian_blur_f32(&opened, MASK_BLUR_SIGMA);

    for pixel in smoothed.pixels_mut() {
        pixel.0[0] = if pixel.0[0] < MASK_BINARIZE_THRESHOLD { 0 } else { 255 };
    }

    smoothed
}

/// Binary erosion with a `size x size` square structuring element
///
/// The element origin sits at `size / 2`, so even sizes reach one pixel
/// further up/left than down/right. Pixels outside the image read as
/// `border_value`. A size of 0 falls back to a 3x3 cross.
#[must_use]
pub fn binary_erode(
    mask: &[bool],
    width: usize,
    height: usize,
    size: usize,
    border_value: bool,
) -> Vec<bool> {
    if width == 0 || height == 0 || mask.len() != width * height {
        return mask.to_vec();
    }

    if size == 0 {
        return binary_erode_cross(mask, width, height, border_value);
    }

    let before = size / 2;
    let after = size - 1 - before;

    let rows = erode_lines(mask, width, height, before, after, border_value, Axis::Row);
    erode_lines(&rows, width, height, before, after, border_value, Axis::Column)
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

/// One-dimensional erosion along every row or column using prefix counts
fn erode_lines(
    input: &[bool],
    width: usize,
    height: usize,
    before: usize,
    after: usize,
    border_value: bool,
    axis: Axis,
) -> Vec<bool> {
    let (lines, len) = match axis {
        Axis::Row => (height, width),
        Axis::Column => (width, height),
    };
    let index = |line: usize, pos: usize| match axis {
        Axis::Row => line * width + pos,
        Axis::Column => pos * width + line,
    };

    let mut output = vec![false; input.len()];
    let mut falses = vec![0usize; len + 1];

    for line in 0..lines {
        for pos in 0..len {
            let is_false = !input.get(index(line, pos)).copied().unwrap_or(border_value);
            falses[pos + 1] = falses[pos] + usize::from(is_false);
        }

        for pos in 0..len {
            let leaves_image = pos < before || pos + after >= len;
            if leaves_image && !border_value {
                continue;
            }

            let start = pos.saturating_sub(before);
            let end = (pos + after + 1).min(len);
            if falses[end] == falses[start] {
                if let Some(slot) = output.get_mut(index(line, pos)) {
                    *slot = true;
                }
            }
        }
    }

    output
}

fn binary_erode_cross(mask: &[bool], width: usize, height: usize, border_value: bool) -> Vec<bool> {
    let at = |x: isize, y: isize| -> bool {
        if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
            border_value
        } else {
            mask.get(y as usize * width + x as usize).copied().unwrap_or(border_value)
        }
    };

    let mut output = vec![false; mask.len()];
    for y in 0..height as isize {
        for x in 0..width as isize {
            let keep = at(x, y) && at(x - 1, y) && at(x + 1, y) && at(x, y - 1) && at(x, y + 1);
            if let Some(slot) = output.get_mut(y as usize * width + x as usize) {
                *slot = keep;
            }
        }
    }

    output
}
