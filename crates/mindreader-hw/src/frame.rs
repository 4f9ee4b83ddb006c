//! Pixel format conversion from raw V4L2 buffers to core frames.

use mindreader_core::Frame;

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, converted to RGB).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale, downscaled to 8 bits.
    Y16,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("buffer too short: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), FrameError> {
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// BT.601 limited-range YUV to RGB, integer arithmetic.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    [
        clamp_u8((298 * c + 409 * e + 128) >> 8),
        clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp_u8((298 * c + 516 * d + 128) >> 8),
    ]
}

/// Convert packed YUYV (4:2:2) to interleaved RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U and V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    check_len(yuyv, pixels * 2)?;

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

/// Keep the high byte of each little-endian 16-bit sample.
pub fn y16_to_gray(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    check_len(buf, pixels * 2)?;
    Ok(buf[..pixels * 2].chunks_exact(2).map(|px| px[1]).collect())
}

/// Decode a raw buffer into a frame: RGB for YUYV, gray otherwise.
pub fn decode(format: PixelFormat, buf: &[u8], width: u32, height: u32) -> Result<Frame, FrameError> {
    match format {
        PixelFormat::Yuyv => Ok(Frame::rgb(yuyv_to_rgb(buf, width, height)?, width, height)),
        PixelFormat::Y16 => Ok(Frame::gray(y16_to_gray(buf, width, height)?, width, height)),
        PixelFormat::Grey => {
            let pixels = (width * height) as usize;
            check_len(buf, pixels)?;
            Ok(Frame::gray(buf[..pixels].to_vec(), width, height))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_gray_levels_stay_gray() {
        // Neutral chroma: Y 16 is black, Y 235 is white.
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_red_chroma() {
        let rgb = yuyv_to_rgb(&[82, 90, 82, 240], 2, 1).unwrap();
        assert!(rgb[0] > 240, "{rgb:?}");
        assert!(rgb[1] < 10, "{rgb:?}");
        assert!(rgb[2] < 10, "{rgb:?}");
        assert_eq!(rgb[..3], rgb[3..]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(matches!(
            yuyv_to_rgb(&[100, 128], 2, 1),
            Err(FrameError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_y16_keeps_high_byte() {
        let gray = y16_to_gray(&[0x34, 0x12, 0xff, 0xab], 2, 1).unwrap();
        assert_eq!(gray, vec![0x12, 0xab]);
    }

    #[test]
    fn test_decode_channels() {
        let yuyv: Vec<u8> = [128u8, 128, 128, 128].repeat(4);
        let frame = decode(PixelFormat::Yuyv, &yuyv, 4, 2).unwrap();
        assert_eq!(frame.channels, 3);
        assert!(frame.is_complete());

        let frame = decode(PixelFormat::Grey, &[7u8; 10], 3, 3).unwrap();
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.data, vec![7u8; 9]);

        assert!(decode(PixelFormat::Grey, &[7u8; 8], 3, 3).is_err());
    }
}
