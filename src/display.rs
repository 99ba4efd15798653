//! Display-buffer rendering: cross-hair overlay and slice extraction.
//!
//! The display buffer is a `f32` copy of whichever source the user selected
//! (live image, dark frame, or noise map). The cross-hair is drawn into that
//! copy only, by writing a sentinel value the viewer maps to its marker
//! color; the raw image, the slice vectors, and the statistics buffers never
//! see the sentinel.

use ndarray::Array2;

/// Sentinel written into display pixels covered by the cross-hair: the
/// minimum representable signed 32-bit value, far outside any pixel range.
pub const CROSSHAIR_SENTINEL: f32 = i32::MIN as f32;

/// Half-length of each cross-hair arm; full arms span 21 pixels.
const ARM_HALF: i64 = 10;

/// Convert a processed image to a display buffer.
pub fn image_to_display(image: &Array2<i32>) -> Array2<f32> {
    image.mapv(|v| v as f32)
}

/// Draw a 21-pixel, three-wide cross-hair centred on `(x, y)`.
///
/// Nothing is drawn when the centre is outside the image or so close to an
/// edge that the three-wide band would not fit; arm ends are clipped.
pub fn draw_crosshair(buffer: &mut Array2<f32>, x: usize, y: usize) {
    let (rows, cols) = buffer.dim();
    if x == 0 || y == 0 || x + 1 >= cols || y + 1 >= rows {
        return;
    }
    let (x, y) = (x as i64, y as i64);

    // Vertical arm: rows y-10..=y+10, columns x-1..=x+1.
    for r in (y - ARM_HALF)..=(y + ARM_HALF) {
        if r < 0 || r >= rows as i64 {
            continue;
        }
        for c in (x - 1)..=(x + 1) {
            buffer[(r as usize, c as usize)] = CROSSHAIR_SENTINEL;
        }
    }
    // Horizontal arm: columns x-10..=x+10, rows y-1..=y+1.
    for c in (x - ARM_HALF)..=(x + ARM_HALF) {
        if c < 0 || c >= cols as i64 {
            continue;
        }
        for r in (y - 1)..=(y + 1) {
            buffer[(r as usize, c as usize)] = CROSSHAIR_SENTINEL;
        }
    }
}

/// A zoom window of up to `(2*half + 1)` pixels a side centred on `(x, y)`,
/// clamped to the image rectangle. Taken from the raw image, so the
/// cross-hair sentinel never appears in it.
pub fn zoom_region(image: &Array2<i32>, x: usize, y: usize, half: usize) -> Array2<f32> {
    let (rows, cols) = image.dim();
    let r0 = y.saturating_sub(half);
    let r1 = (y + half + 1).min(rows);
    let c0 = x.saturating_sub(half);
    let c1 = (x + half + 1).min(cols);
    image
        .slice(ndarray::s![r0..r1, c0..c1])
        .mapv(|v| v as f32)
}

/// Row `y` of the image as a slice vector.
pub fn row_slice(image: &Array2<i32>, y: usize) -> Vec<f32> {
    image.row(y).iter().map(|&v| v as f32).collect()
}

/// Column `x` of the image as a slice vector.
pub fn column_slice(image: &Array2<i32>, x: usize) -> Vec<f32> {
    image.column(x).iter().map(|&v| v as f32).collect()
}

/// Row `y` of the noise map as a slice vector.
pub fn noise_row_slice(map: &Array2<f32>, y: usize) -> Vec<f32> {
    map.row(y).to_vec()
}

/// Column `x` of the noise map as a slice vector.
pub fn noise_column_slice(map: &Array2<f32>, x: usize) -> Vec<f32> {
    map.column(x).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crosshair_marks_both_arms() {
        let image = Array2::from_elem((50, 60), 100);
        let mut buffer = image_to_display(&image);
        draw_crosshair(&mut buffer, 30, 20);

        assert_eq!(buffer[(20, 30)], CROSSHAIR_SENTINEL);
        assert_eq!(buffer[(10, 30)], CROSSHAIR_SENTINEL);
        assert_eq!(buffer[(30, 30)], CROSSHAIR_SENTINEL);
        assert_eq!(buffer[(20, 20)], CROSSHAIR_SENTINEL);
        assert_eq!(buffer[(20, 40)], CROSSHAIR_SENTINEL);
        // Three-wide band.
        assert_eq!(buffer[(19, 30)], CROSSHAIR_SENTINEL);
        assert_eq!(buffer[(21, 30)], CROSSHAIR_SENTINEL);
        // Beyond the arms the image shows through.
        assert_eq!(buffer[(20, 41)], 100.0);
        assert_eq!(buffer[(31, 30)], 100.0);
    }

    #[test]
    fn crosshair_arms_are_21_pixels() {
        let image = Array2::from_elem((64, 64), 0);
        let mut buffer = image_to_display(&image);
        draw_crosshair(&mut buffer, 32, 32);
        let marked = buffer
            .row(32)
            .iter()
            .filter(|&&v| v == CROSSHAIR_SENTINEL)
            .count();
        assert_eq!(marked, 21);
    }

    #[test]
    fn crosshair_at_origin_is_suppressed() {
        let image = Array2::from_elem((32, 32), 7);
        let mut buffer = image_to_display(&image);
        draw_crosshair(&mut buffer, 0, 0);
        assert!(buffer.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn crosshair_near_edge_is_clipped() {
        let image = Array2::from_elem((32, 32), 7);
        let mut buffer = image_to_display(&image);
        draw_crosshair(&mut buffer, 2, 2);
        assert_eq!(buffer[(2, 2)], CROSSHAIR_SENTINEL);
        // No wrap-around: the far corner stays untouched.
        assert_eq!(buffer[(31, 31)], 7.0);
    }

    #[test]
    fn zoom_region_is_centred_and_clamped() {
        let image = Array2::from_shape_fn((32, 32), |(r, c)| (r * 100 + c) as i32);
        let zoom = zoom_region(&image, 16, 16, 10);
        assert_eq!(zoom.dim(), (21, 21));
        assert_eq!(zoom[(10, 10)], 1616.0);

        // Near the corner the window shrinks instead of wrapping.
        let zoom = zoom_region(&image, 1, 1, 10);
        assert_eq!(zoom.dim(), (12, 12));
        assert_eq!(zoom[(0, 0)], 0.0);
    }

    #[test]
    fn slices_ignore_crosshair() {
        let mut image = Array2::from_elem((16, 16), 0);
        image[(8, 3)] = 42;
        let mut buffer = image_to_display(&image);
        draw_crosshair(&mut buffer, 8, 8);

        // Slices come from the raw image, so the sentinel cannot appear.
        let row = row_slice(&image, 8);
        assert_eq!(row[3], 42.0);
        assert!(row.iter().all(|&v| v != CROSSHAIR_SENTINEL));
        let col = column_slice(&image, 8);
        assert!(col.iter().all(|&v| v != CROSSHAIR_SENTINEL));
    }
}
