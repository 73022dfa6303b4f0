#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Interleaved 8-bit RGB view, row-major, `len = w*h*3`.
#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

#[derive(Clone, Debug, PartialEq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Expand a grayscale image into three identical channels.
    pub fn from_gray(src: &GrayImageView<'_>) -> Self {
        let mut data = Vec::with_capacity(src.data.len() * 3);
        for &v in src.data {
            data.extend_from_slice(&[v, v, v]);
        }
        Self {
            width: src.width,
            height: src.height,
            data,
        }
    }

    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Write one pixel; coordinates outside the image are ignored.
    #[inline]
    pub fn put(&mut self, x: i32, y: i32, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    (sample_bilinear(src, x, y) + 0.5).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage {
            width: 2,
            height: 2,
            data: vec![0, 100, 100, 200],
        };
        let v = img.view();
        assert_eq!(sample_bilinear(&v, 0.0, 0.0), 0.0);
        assert!((sample_bilinear(&v, 0.5, 0.5) - 100.0).abs() < 1e-4);
        assert!((sample_bilinear(&v, 1.0, 0.5) - 150.0).abs() < 1e-4);
    }

    #[test]
    fn samples_outside_image_are_black() {
        let img = GrayImage {
            width: 1,
            height: 1,
            data: vec![255],
        };
        assert_eq!(sample_bilinear(&img.view(), -3.0, 0.0), 0.0);
        assert_eq!(sample_bilinear_u8(&img.view(), 5.0, 5.0), 0);
    }

    #[test]
    fn rgb_from_gray_replicates_channels() {
        let gray = GrayImage {
            width: 2,
            height: 1,
            data: vec![7, 9],
        };
        let rgb = RgbImage::from_gray(&gray.view());
        assert_eq!(rgb.data, vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn put_ignores_out_of_bounds() {
        let mut rgb = RgbImage::new(2, 2);
        rgb.put(-1, 0, [255, 0, 0]);
        rgb.put(2, 1, [255, 0, 0]);
        rgb.put(1, 1, [1, 2, 3]);
        assert_eq!(&rgb.data[9..12], &[1, 2, 3]);
        assert_eq!(rgb.data.iter().filter(|&&b| b != 0).count(), 3);
    }
}
