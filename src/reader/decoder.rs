//! Block-structure parser: walks the tagged block sequence of a container
//! and materializes the metadata tree.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};
use thiserror::Error;

use crate::common::{
    ApplicationExtension, Block, BodyElement, ColorTable, CommentExtension, CompressedData,
    Container, Extension, GraphicsControl, ImageBlock, ImageDescriptor, PlainTextExtension,
    ScreenDescriptor, Version, PLTE_CHANNELS,
};
use crate::lzw::LzwError;
use crate::reader::cursor::BufCursor;

/// Decoding error. Any failure aborts the whole parse; there is no
/// partial-result recovery.
#[derive(Debug, Error)]
pub enum DecodingError {
    /// The signature or version tag did not match.
    #[error("not a GIF: bad signature or version tag")]
    MalformedHeader,
    /// An unexpected byte at a block boundary.
    #[error("unexpected block tag {tag:#04x} at offset {offset}")]
    MalformedStream {
        /// The offending byte.
        tag: u8,
        /// Stream position of that byte.
        offset: u64,
    },
    /// The source ended inside a fixed-size or length-prefixed field.
    #[error("stream ended inside a block")]
    TruncatedStream,
    /// A color table size exponent outside `[0, 7]`. The 3-bit wire field
    /// cannot produce this; it guards misuse of the parsing API.
    #[error("color table size exponent {exp} out of range")]
    InvalidTableSize {
        /// The rejected exponent.
        exp: u8,
    },
    /// Decompressed image data does not cover the declared frame.
    #[error("expected {expected} pixel indices, got {actual}")]
    FrameSizeMismatch {
        /// `width * height` of the owning image descriptor.
        expected: usize,
        /// Length of the decoded index stream.
        actual: usize,
    },
    /// The image payload failed to decompress.
    #[error("corrupt image data: {0}")]
    Lzw(#[from] LzwError),
    /// Any other I/O failure of the underlying source.
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for DecodingError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodingError::TruncatedStream
        } else {
            DecodingError::Io(err)
        }
    }
}

/// Parses a whole container from the cursor: header, logical screen
/// descriptor, optional global color table, body elements in stream
/// order, trailer.
pub(crate) fn parse_container<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<Container, DecodingError> {
    let version = parse_header(cursor)?;
    let screen = parse_screen_descriptor(cursor)?;
    debug!(
        "{version:?} logical screen {}x{}, global table: {}",
        screen.width, screen.height, screen.has_global_table
    );

    let global_palette = if screen.has_global_table {
        let table = parse_color_table(cursor, screen.table_size_exp)?;
        trace!("global color table with {} entries", table.len());
        Some(table)
    } else {
        None
    };

    let mut body = Vec::new();
    loop {
        let offset = cursor.offset();
        let tag = cursor.peek(1)?[0];
        match Block::from_u8(tag) {
            Some(Block::Trailer) => {
                cursor.read_u8()?;
                trace!("trailer at offset {offset}");
                break;
            }
            Some(Block::Image) => {
                body.push(BodyElement::Image(parse_image_block(cursor)?));
            }
            Some(Block::Extension) => {
                let label = cursor.peek(2)?[1];
                match Extension::from_u8(label) {
                    Some(Extension::Control) => {
                        body.push(BodyElement::Image(parse_image_block(cursor)?));
                    }
                    Some(Extension::Application) => {
                        skip_label_pair(cursor)?;
                        body.push(BodyElement::Application(parse_application_extension(
                            cursor,
                        )?));
                    }
                    Some(Extension::Comment) => {
                        skip_label_pair(cursor)?;
                        body.push(BodyElement::Comment(parse_comment_extension(cursor)?));
                    }
                    Some(Extension::Text) => {
                        skip_label_pair(cursor)?;
                        body.push(BodyElement::PlainText(parse_plain_text_extension(cursor)?));
                    }
                    None => {
                        return Err(DecodingError::MalformedStream {
                            tag: label,
                            offset: offset + 1,
                        })
                    }
                }
            }
            None => return Err(DecodingError::MalformedStream { tag, offset }),
        }
    }

    Ok(Container {
        version,
        screen,
        global_palette,
        body,
    })
}

/// 3-byte signature plus 3-byte version tag.
fn parse_header<R: Read>(cursor: &mut BufCursor<R>) -> Result<Version, DecodingError> {
    let mut magic = [0u8; 6];
    cursor.read_exact(&mut magic)?;
    if &magic[..3] != b"GIF" {
        return Err(DecodingError::MalformedHeader);
    }
    match &magic[3..] {
        b"87a" => Ok(Version::V87a),
        b"89a" => Ok(Version::V89a),
        _ => Err(DecodingError::MalformedHeader),
    }
}

fn parse_screen_descriptor<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<ScreenDescriptor, DecodingError> {
    let width = cursor.read_u16::<LittleEndian>()?;
    let height = cursor.read_u16::<LittleEndian>()?;
    let (has_global_table, color_resolution, sorted, table_size_exp) =
        ScreenDescriptor::unpack_flags(cursor.read_u8()?);
    let bg_color_index = cursor.read_u8()?;
    let pixel_aspect_ratio = cursor.read_u8()?;
    Ok(ScreenDescriptor {
        width,
        height,
        bg_color_index,
        pixel_aspect_ratio,
        has_global_table,
        color_resolution,
        sorted,
        table_size_exp,
    })
}

/// Reads `2^(exp + 1)` RGB triples.
fn parse_color_table<R: Read>(
    cursor: &mut BufCursor<R>,
    exp: u8,
) -> Result<ColorTable, DecodingError> {
    if exp > 7 {
        return Err(DecodingError::InvalidTableSize { exp });
    }
    let mut rgb = vec![0u8; PLTE_CHANNELS << (exp + 1)];
    cursor.read_exact(&mut rgb)?;
    Ok(ColorTable::from_rgb(rgb))
}

/// Parses one image block: an optional graphics control extension, the
/// image descriptor, an optional local color table and the compressed
/// payload.
fn parse_image_block<R: Read>(cursor: &mut BufCursor<R>) -> Result<ImageBlock, DecodingError> {
    let control = probe_graphics_control(cursor)?;

    let offset = cursor.offset();
    let separator = cursor.read_u8()?;
    if separator != Block::Image as u8 {
        return Err(DecodingError::MalformedStream {
            tag: separator,
            offset,
        });
    }
    let descriptor = parse_image_descriptor(cursor)?;
    trace!(
        "image block {}x{} at ({}, {}), local table: {}",
        descriptor.width,
        descriptor.height,
        descriptor.left,
        descriptor.top,
        descriptor.has_local_table
    );

    let palette = if descriptor.has_local_table {
        Some(parse_color_table(cursor, descriptor.table_size_exp)?)
    } else {
        None
    };

    let min_code_size = cursor.read_u8()?;
    let mut bytes = Vec::new();
    read_sub_blocks(cursor, |chunk| bytes.extend_from_slice(chunk))?;

    Ok(ImageBlock {
        control,
        descriptor,
        palette,
        data: CompressedData {
            min_code_size,
            bytes,
        },
    })
}

/// Non-destructive lookahead for a graphics control extension.
///
/// Peeks the introducer/label pair; only a full match consumes anything.
/// On mismatch (or end of source) the cursor position is unchanged.
fn probe_graphics_control<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<Option<GraphicsControl>, DecodingError> {
    let matched = match cursor.peek(2) {
        Ok(bytes) => bytes[0] == Block::Extension as u8 && bytes[1] == Extension::Control as u8,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(err) => return Err(err.into()),
    };
    if !matched {
        return Ok(None);
    }
    skip_label_pair(cursor)?;
    parse_graphics_control(cursor).map(Some)
}

/// Body of a graphics control extension, label pair already consumed.
fn parse_graphics_control<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<GraphicsControl, DecodingError> {
    expect_byte(cursor, 4)?;
    let (disposal, user_input, has_transparent) =
        GraphicsControl::unpack_flags(cursor.read_u8()?);
    let delay = cursor.read_u16::<LittleEndian>()?;
    let transparent_index = cursor.read_u8()?;
    expect_byte(cursor, 0)?;
    Ok(GraphicsControl {
        disposal,
        user_input,
        transparent: has_transparent.then_some(transparent_index),
        delay,
    })
}

fn parse_image_descriptor<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<ImageDescriptor, DecodingError> {
    let left = cursor.read_u16::<LittleEndian>()?;
    let top = cursor.read_u16::<LittleEndian>()?;
    let width = cursor.read_u16::<LittleEndian>()?;
    let height = cursor.read_u16::<LittleEndian>()?;
    let (has_local_table, interlaced, sorted, table_size_exp) =
        ImageDescriptor::unpack_flags(cursor.read_u8()?);
    Ok(ImageDescriptor {
        left,
        top,
        width,
        height,
        has_local_table,
        interlaced,
        sorted,
        table_size_exp,
    })
}

/// Body of an application extension, label pair already consumed: a
/// fixed 11-byte identifier block, then data sub-blocks.
fn parse_application_extension<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<ApplicationExtension, DecodingError> {
    expect_byte(cursor, 11)?;
    let mut identifier = [0u8; 11];
    cursor.read_exact(&mut identifier)?;
    let mut data = Vec::new();
    read_sub_blocks(cursor, |chunk| data.extend_from_slice(chunk))?;
    trace!("application extension {:?}", identifier);
    Ok(ApplicationExtension { identifier, data })
}

/// Body of a comment extension, label pair already consumed.
fn parse_comment_extension<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<CommentExtension, DecodingError> {
    let mut text = Vec::new();
    read_sub_blocks(cursor, |chunk| text.extend_from_slice(chunk))?;
    Ok(CommentExtension { text })
}

/// Body of a plain text extension, label pair already consumed: the
/// fixed layout fields are kept raw, then text sub-blocks.
fn parse_plain_text_extension<R: Read>(
    cursor: &mut BufCursor<R>,
) -> Result<PlainTextExtension, DecodingError> {
    let header_len = cursor.read_u8()?;
    let mut header = vec![0u8; usize::from(header_len)];
    cursor.read_exact(&mut header)?;
    let mut data = Vec::new();
    read_sub_blocks(cursor, |chunk| data.extend_from_slice(chunk))?;
    Ok(PlainTextExtension { header, data })
}

/// Reads length-prefixed sub-blocks until the zero-length terminator,
/// handing each chunk to `sink`. Carries no state across calls.
pub(crate) fn read_sub_blocks<R: Read>(
    cursor: &mut BufCursor<R>,
    mut sink: impl FnMut(&[u8]),
) -> Result<(), DecodingError> {
    let mut chunk = [0u8; 255];
    loop {
        let len = usize::from(cursor.read_u8()?);
        if len == 0 {
            return Ok(());
        }
        cursor.read_exact(&mut chunk[..len])?;
        sink(&chunk[..len]);
    }
}

/// Splits a payload into length-prefixed sub-blocks, the write-side
/// counterpart of [`read_sub_blocks`]: chunks of at most 255 bytes, then
/// the zero-length terminator.
pub fn split_into_sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 255 + 2);
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

/// Consumes an already-identified extension introducer and label.
fn skip_label_pair<R: Read>(cursor: &mut BufCursor<R>) -> Result<(), DecodingError> {
    cursor.read_u8()?;
    cursor.read_u8()?;
    Ok(())
}

fn expect_byte<R: Read>(cursor: &mut BufCursor<R>, expected: u8) -> Result<(), DecodingError> {
    let offset = cursor.offset();
    let byte = cursor.read_u8()?;
    if byte != expected {
        return Err(DecodingError::MalformedStream { tag: byte, offset });
    }
    Ok(())
}
