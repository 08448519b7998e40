// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image assets — raster pixels plus the display metadata a camera or photo
// library attaches to them (EXIF orientation, point scale).

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use camkit_core::error::{CaptureError, Result};
use camkit_core::types::Size;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// How stored pixels must be transformed to display upright. Values follow
/// the EXIF orientation tag (1–8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageOrientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl ImageOrientation {
    /// Map an EXIF orientation value. Unknown values read as upright.
    pub fn from_exif(value: u8) -> Self {
        match value {
            2 => Self::UpMirrored,
            3 => Self::Down,
            4 => Self::DownMirrored,
            5 => Self::LeftMirrored,
            6 => Self::Right,
            7 => Self::RightMirrored,
            8 => Self::Left,
            _ => Self::Up,
        }
    }

    pub fn to_exif(self) -> u8 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Right => 6,
            Self::RightMirrored => 7,
            Self::Left => 8,
        }
    }

    pub fn is_upright(self) -> bool {
        self == Self::Up
    }

    /// Whether displaying upright swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::LeftMirrored | Self::Right | Self::RightMirrored | Self::Left
        )
    }

    /// Redraw `image` so that it displays upright without metadata.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Up => image,
            Self::UpMirrored => image.fliph(),
            Self::Down => image.rotate180(),
            Self::DownMirrored => image.flipv(),
            Self::LeftMirrored => image.rotate90().fliph(),
            Self::Right => image.rotate90(),
            Self::RightMirrored => image.rotate270().fliph(),
            Self::Left => image.rotate270(),
        }
    }
}

impl From<Orientation> for ImageOrientation {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::NoTransforms => Self::Up,
            Orientation::FlipHorizontal => Self::UpMirrored,
            Orientation::Rotate180 => Self::Down,
            Orientation::FlipVertical => Self::DownMirrored,
            Orientation::Rotate90FlipH => Self::LeftMirrored,
            Orientation::Rotate90 => Self::Right,
            Orientation::Rotate270FlipH => Self::RightMirrored,
            Orientation::Rotate270 => Self::Left,
        }
    }
}

#[derive(Debug, Clone)]
enum Pixels {
    /// Compressed bytes straight from a camera or library; decoded on demand.
    Encoded(Arc<[u8]>),
    Decoded(DynamicImage),
}

/// A still image moving through the capture pipeline.
///
/// Pixels are stored in sensor order; `orientation` says how to display them.
/// `scale` is the pixel density (pixels per point), so the logical size the
/// host lays out is the upright pixel size divided by `scale`.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pixels: Pixels,
    orientation: ImageOrientation,
    scale: f64,
    /// JPEG encoding of exactly these upright pixels, when one was produced.
    jpeg: Option<Arc<[u8]>>,
}

impl ImageAsset {
    /// Wrap decoded pixels that already display upright at scale 1.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: Pixels::Decoded(image),
            orientation: ImageOrientation::Up,
            scale: 1.0,
            jpeg: None,
        }
    }

    /// Wrap upright pixels together with the JPEG bytes they were decoded
    /// from, so the bytes can be written out without compressing again.
    pub fn from_compressed(image: DynamicImage, jpeg: impl Into<Arc<[u8]>>) -> Self {
        Self {
            jpeg: Some(jpeg.into()),
            ..Self::from_dynamic(image)
        }
    }

    /// Wrap compressed bytes without decoding them. The orientation is taken
    /// as given; EXIF in the payload is not consulted.
    pub fn from_encoded(data: impl Into<Arc<[u8]>>, orientation: ImageOrientation) -> Self {
        Self {
            pixels: Pixels::Encoded(data.into()),
            orientation,
            scale: 1.0,
            jpeg: None,
        }
    }

    /// Decode compressed bytes now, reading the EXIF orientation.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (image, orientation) = decode_with_orientation(data)?;
        debug!(
            width = image.width(),
            height = image.height(),
            ?orientation,
            "Image decoded"
        );
        Ok(Self {
            pixels: Pixels::Decoded(image),
            orientation,
            scale: 1.0,
            jpeg: None,
        })
    }

    /// Read and decode an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::decode(&data).map_err(|err| {
            CaptureError::Image(format!("{}: {}", path.as_ref().display(), err))
        })
    }

    /// Kept JPEG bytes no longer describe the display once the image is
    /// rotated, so they are dropped for any orientation other than `Up`.
    pub fn with_orientation(mut self, orientation: ImageOrientation) -> Self {
        self.orientation = orientation;
        if !orientation.is_upright() {
            self.jpeg = None;
        }
        self
    }

    /// Set the pixel density. Non-positive or non-finite values read as 1.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        self
    }

    pub fn orientation(&self) -> ImageOrientation {
        self.orientation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The JPEG bytes behind these pixels, if the asset came out of a
    /// recompression.
    pub fn compressed_jpeg(&self) -> Option<&[u8]> {
        self.jpeg.as_deref()
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self.pixels, Pixels::Decoded(_))
    }

    /// Stored pixel dimensions, when the pixels are decoded.
    pub fn pixel_dimensions(&self) -> Option<(u32, u32)> {
        match &self.pixels {
            Pixels::Decoded(image) => Some(image.dimensions()),
            Pixels::Encoded(_) => None,
        }
    }

    /// Upright size in points, when the pixels are decoded.
    pub fn logical_size(&self) -> Option<Size> {
        let (width, height) = self.pixel_dimensions()?;
        let (width, height) = if self.orientation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };
        Some(Size::new(
            f64::from(width) / self.scale,
            f64::from(height) / self.scale,
        ))
    }

    /// Borrow the decoded pixels, if any.
    pub fn as_dynamic(&self) -> Option<&DynamicImage> {
        match &self.pixels {
            Pixels::Decoded(image) => Some(image),
            Pixels::Encoded(_) => None,
        }
    }

    /// The stored pixels, decoding them if necessary. Orientation is not
    /// applied.
    pub fn into_dynamic(self) -> Result<DynamicImage> {
        match self.pixels {
            Pixels::Decoded(image) => Ok(image),
            Pixels::Encoded(data) => decode_with_orientation(&data).map(|(image, _)| image),
        }
    }

    /// Redraw the pixels upright. The result has `Up` orientation and keeps
    /// the scale. Fails only when encoded pixels cannot be decoded.
    pub fn normalized_orientation(self) -> Result<Self> {
        let orientation = self.orientation;
        let scale = self.scale;
        if orientation.is_upright() && self.is_decoded() {
            return Ok(self);
        }
        let image = self.into_dynamic()?;
        Ok(Self {
            pixels: Pixels::Decoded(orientation.apply(image)),
            orientation: ImageOrientation::Up,
            scale,
            jpeg: None,
        })
    }
}

/// A single preview frame handed to the detector.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub pixels: Arc<DynamicImage>,
    /// Presentation time since the session started.
    pub timestamp: Duration,
}

impl VideoFrame {
    pub fn new(pixels: impl Into<Arc<DynamicImage>>, timestamp: Duration) -> Self {
        Self {
            pixels: pixels.into(),
            timestamp,
        }
    }
}

fn decode_with_orientation(data: &[u8]) -> Result<(DynamicImage, ImageOrientation)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| CaptureError::Image(format!("failed to sniff image format: {err}")))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|err| CaptureError::Image(format!("failed to decode image: {err}")))?;
    let orientation = decoder
        .orientation()
        .map(ImageOrientation::from)
        .unwrap_or_default();
    let image = DynamicImage::from_decoder(decoder)
        .map_err(|err| CaptureError::Image(format!("failed to decode image: {err}")))?;
    Ok((image, orientation))
}
