//! Reading containers: the byte cursor, the block-structure parser and
//! the convenience layer that joins parsed metadata with the codec.

use std::io::Read;

use crate::common::{BodyElement, ColorTable, Container, GraphicsControl, ImageBlock, ImageDescriptor};
use crate::lzw;

mod cursor;
mod decoder;

pub use self::cursor::BufCursor;
pub use self::decoder::{split_into_sub_blocks, DecodingError};

/// Parses a complete container from any byte source.
///
/// Consumes the stream up to and including the trailer byte. On failure
/// the whole parse is aborted; no partial container is returned.
pub fn parse<R: Read>(reader: R) -> Result<Container, DecodingError> {
    let mut cursor = BufCursor::new(reader);
    decoder::parse_container(&mut cursor)
}

/// Parses a complete container from a caller-owned cursor.
///
/// Like [`parse`], but leaves the cursor usable afterwards, e.g. to
/// inspect trailing bytes or to report offsets.
pub fn parse_cursor<R: Read>(cursor: &mut BufCursor<R>) -> Result<Container, DecodingError> {
    decoder::parse_container(cursor)
}

/// One image with its payload decompressed to palette indices.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Placement and geometry of the frame.
    pub descriptor: ImageDescriptor,
    /// Control data that preceded the image, if any.
    pub control: Option<GraphicsControl>,
    /// The palette the indices refer to: the local table when present,
    /// otherwise the global one, `None` if the container declares
    /// neither.
    pub palette: Option<ColorTable>,
    /// Flat row-major palette indices, `width * height` of them.
    pub indices: Vec<u8>,
}

impl Container {
    /// The image blocks of the body, in stream order.
    pub fn images(&self) -> impl Iterator<Item = &ImageBlock> + '_ {
        self.body.iter().filter_map(|element| match element {
            BodyElement::Image(image) => Some(image),
            _ => None,
        })
    }

    /// Decompresses every image block into its index stream.
    ///
    /// Each decoded stream must cover exactly the frame declared by its
    /// descriptor; a shorter or longer stream fails with
    /// [`DecodingError::FrameSizeMismatch`].
    pub fn decode_images(&self) -> Result<Vec<DecodedImage>, DecodingError> {
        self.images().map(|image| self.decode_image(image)).collect()
    }

    fn decode_image(&self, image: &ImageBlock) -> Result<DecodedImage, DecodingError> {
        let indices = lzw::decompress(image.data.min_code_size, &image.data.bytes)?;
        let expected =
            usize::from(image.descriptor.width) * usize::from(image.descriptor.height);
        if indices.len() != expected {
            return Err(DecodingError::FrameSizeMismatch {
                expected,
                actual: indices.len(),
            });
        }
        let palette = image.palette.as_ref().or(self.global_palette.as_ref()).cloned();
        Ok(DecodedImage {
            descriptor: image.descriptor,
            control: image.control,
            palette,
            indices,
        })
    }
}
