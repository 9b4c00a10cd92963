//! Core types: the RGBA8 image buffer and the shared error taxonomy.

use std::fmt;

/// An owned RGBA8 image buffer, 4 bytes per pixel, row-major.
pub struct Image {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width * height * 4) as usize],
            width,
            height,
        }
    }

    /// An image with uninitialized memory. Caller must fill every pixel before reading;
    /// every kernel in this crate does so unconditionally when given an output buffer.
    pub fn new_uninit(width: u32, height: u32) -> Self {
        let len = (width * height * 4) as usize;
        let mut data = Vec::with_capacity(len);
        unsafe { data.set_len(len) };
        Self { data, width, height }
    }

    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Result<Self, SimError> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(SimError::InvalidDataSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    #[inline]
    pub fn as_u32(&self) -> &[u32] {
        // SAFETY: `data` has length divisible by 4 (enforced at construction) and
        // u32 has no alignment requirement stricter than what Vec<u8>'s allocator gives
        // on the platforms this crate targets.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr() as *const u32, self.data.len() / 4) }
    }

    #[inline]
    pub fn as_u32_mut(&mut self) -> &mut [u32] {
        unsafe {
            std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut u32, self.data.len() / 4)
        }
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> u32 {
        self.as_u32()[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: u32) {
        let idx = (y * self.width + x) as usize;
        self.as_u32_mut()[idx] = pixel;
    }

    pub fn same_shape(&self, other: &Image) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// The validation-error taxonomy shared by every kernel (§6.4 / §7).
#[derive(Debug)]
pub enum SimError {
    /// `len(data1) != len(data2)` or the images have different `(width, height)`.
    SizeMismatch {
        img1_width: u32,
        img1_height: u32,
        img2_width: u32,
        img2_height: u32,
    },
    /// Output buffer length does not match the input buffers.
    OutputSizeMismatch { expected: usize, actual: usize },
    /// `len(data) != 4 * width * height`.
    InvalidDataSize { expected: usize, actual: usize },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::SizeMismatch {
                img1_width,
                img1_height,
                img2_width,
                img2_height,
            } => write!(
                f,
                "image sizes do not match: {}x{} vs {}x{}",
                img1_width, img1_height, img2_width, img2_height
            ),
            SimError::OutputSizeMismatch { expected, actual } => write!(
                f,
                "output buffer size mismatch: expected {} bytes, got {}",
                expected, actual
            ),
            SimError::InvalidDataSize { expected, actual } => write!(
                f,
                "invalid data size: expected {}, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for SimError {}

/// Validate that two images share a shape, and that an optional output buffer matches it.
pub(crate) fn validate_shapes(
    image1: &Image,
    image2: &Image,
    output: &Option<&mut Image>,
) -> Result<(), SimError> {
    if image1.width != image2.width || image1.height != image2.height {
        return Err(SimError::SizeMismatch {
            img1_width: image1.width,
            img1_height: image1.height,
            img2_width: image2.width,
            img2_height: image2.height,
        });
    }
    if let Some(out) = output {
        let expected = image1.data.len();
        if out.data.len() != expected || out.width != image1.width || out.height != image1.height {
            return Err(SimError::OutputSizeMismatch {
                expected,
                actual: out.data.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_creation() {
        let img = Image::new(10, 7);
        assert_eq!(img.width, 10);
        assert_eq!(img.height, 7);
        assert_eq!(img.data.len(), 10 * 7 * 4);
    }

    #[test]
    fn test_from_raw_rejects_bad_length() {
        let err = Image::from_raw(vec![0u8; 10], 2, 2).unwrap_err();
        assert!(matches!(err, SimError::InvalidDataSize { .. }));
    }

    #[test]
    fn test_validate_shapes_mismatch() {
        let a = Image::new(4, 4);
        let b = Image::new(4, 5);
        let err = validate_shapes(&a, &b, &None).unwrap_err();
        assert!(matches!(err, SimError::SizeMismatch { .. }));
    }
}
