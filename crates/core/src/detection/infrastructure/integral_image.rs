use image::GrayImage;
use ndarray::Array2;

/// Windows with `area / (area * std_dev)` at or above this are too flat to
/// classify, i.e. the standard deviation must exceed 10 grey levels.
const MIN_CONTRAST: f64 = 0.1;

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables are `(height + 1) x (width + 1)` with a zero first row and
/// column, so any rectangle sum takes four lookups.
pub struct IntegralImage {
    sum: Array2<i64>,
    sq_sum: Array2<i64>,
    width: usize,
    height: usize,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let mut sum = Array2::<i64>::zeros((height + 1, width + 1));
        let mut sq_sum = Array2::<i64>::zeros((height + 1, width + 1));
        let raw = gray.as_raw();

        for y in 0..height {
            let mut row_sum = 0i64;
            let mut row_sq_sum = 0i64;
            for x in 0..width {
                let v = raw[y * width + x] as i64;
                row_sum += v;
                row_sq_sum += v * v;
                sum[[y + 1, x + 1]] = sum[[y, x + 1]] + row_sum;
                sq_sum[[y + 1, x + 1]] = sq_sum[[y, x + 1]] + row_sq_sum;
            }
        }

        Self {
            sum,
            sq_sum,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of pixels in `[x, x + w) x [y, y + h)`.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::lookup(&self.sum, x, y, w, h)
    }

    /// Sum of squared pixels in `[x, x + w) x [y, y + h)`.
    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::lookup(&self.sq_sum, x, y, w, h)
    }

    /// Reciprocal of `area * std_dev` over the rectangle, used to make
    /// feature responses independent of lighting.
    ///
    /// `None` when the rectangle is too flat to hold a face.
    pub fn inverse_norm(&self, x: usize, y: usize, w: usize, h: usize) -> Option<f64> {
        let area = (w * h) as f64;
        let sum = self.rect_sum(x, y, w, h) as f64;
        let sq_sum = self.rect_sq_sum(x, y, w, h) as f64;
        let nf = area * sq_sum - sum * sum;
        if nf <= 0.0 {
            return None;
        }
        let inv = 1.0 / nf.sqrt();
        (area * inv < MIN_CONTRAST).then_some(inv)
    }

    fn lookup(table: &Array2<i64>, x: usize, y: usize, w: usize, h: usize) -> i64 {
        table[[y + h, x + w]] - table[[y, x + w]] - table[[y + h, x]] + table[[y, x]]
    }
}
