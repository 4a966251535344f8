//! Decoding thumbnails for display

use image::DynamicImage;
use thiserror::Error;

use crate::models::Thumbnail;

/// Default bound on the longest side of a decoded thumbnail
pub const DEFAULT_MAX_DIMENSION: u32 = 256;

/// Why a thumbnail could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The thumbnail has no data
    #[error("thumbnail for {0} is empty")]
    Empty(String),
    /// The data is not an image the decoder understands
    #[error("could not decode thumbnail for {owner}: {source}")]
    Image {
        /// Uid of the thumbnail owner
        owner: String,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },
}

/// Decode a thumbnail, downsizing it so neither side exceeds `max_dimension`.
pub fn decode_thumbnail(
    thumbnail: &Thumbnail,
    max_dimension: u32,
) -> Result<DynamicImage, DecodeError> {
    if thumbnail.data.is_empty() {
        return Err(DecodeError::Empty(thumbnail.owner_uid.clone()));
    }

    let image = image::load_from_memory(&thumbnail.data).map_err(|source| DecodeError::Image {
        owner: thumbnail.owner_uid.clone(),
        source,
    })?;

    Ok(resize_if_needed(image, max_dimension))
}

/// Resize an image whose longest side exceeds `max_dimension`, keeping its
/// aspect ratio.
fn resize_if_needed(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());

    if width <= max_dimension && height <= max_dimension {
        return image;
    }

    let ratio = f64::from(width) / f64::from(height);
    let (new_width, new_height) = if width > height {
        (max_dimension, (f64::from(max_dimension) / ratio) as u32)
    } else {
        ((f64::from(max_dimension) * ratio) as u32, max_dimension)
    };

    image.resize(
        new_width.max(1),
        new_height.max(1),
        image::imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn test_small_thumbnail_is_kept() {
        let thumbnail = Thumbnail::new("m1", png(40, 30));
        let image = decode_thumbnail(&thumbnail, DEFAULT_MAX_DIMENSION).unwrap();
        assert_eq!((image.width(), image.height()), (40, 30));
    }

    #[test]
    fn test_large_thumbnail_is_downsized() {
        let thumbnail = Thumbnail::new("m1", png(400, 200));
        let image = decode_thumbnail(&thumbnail, 100).unwrap();
        assert_eq!(image.width(), 100);
        assert!(image.height() <= 50);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let thumbnail = Thumbnail::new("m1", b"not an image".to_vec());
        assert!(matches!(
            decode_thumbnail(&thumbnail, 100),
            Err(DecodeError::Image { .. })
        ));

        let empty = Thumbnail::new("m2", Vec::new());
        assert!(matches!(
            decode_thumbnail(&empty, 100),
            Err(DecodeError::Empty(_))
        ));
    }
}
