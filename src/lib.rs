//! Pull-based GIF container parsing and a standalone LZW codec.
//!
//! The [`parse`] entry point walks the tagged block sequence of a GIF
//! stream — header, logical screen descriptor, optional global color
//! table, image blocks and extensions, trailer — and returns the whole
//! metadata tree as a [`Container`]. The [`lzw`] module turns the
//! compressed payload of an image block back into palette indices (and
//! the other way around), independently of any container framing.
//!
//! The two layers meet in [`Container::decode_images`], which
//! decompresses every image and pairs it with the palette it refers to.
//!
//! ```
//! let bytes = [
//!     b'G', b'I', b'F', b'8', b'9', b'a',
//!     // 2x1 canvas, no global color table
//!     0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
//!     // trailer
//!     0x3B,
//! ];
//! let container = giflet::parse(&bytes[..]).unwrap();
//! assert_eq!(container.version, giflet::Version::V89a);
//! assert_eq!(container.screen.width, 2);
//! assert!(container.global_palette.is_none());
//! assert!(container.body.is_empty());
//! ```
//!
//! Parsing never seeks: any `io::Read` works, including sockets and
//! pipes. Every parse and every codec call owns its state, so
//! independent streams can be processed on as many threads as desired.

mod common;
mod reader;

pub mod lzw;

pub use common::{
    ApplicationExtension, Block, BodyElement, ColorTable, CommentExtension, CompressedData,
    Container, DisposalMethod, Extension, GraphicsControl, ImageBlock, ImageDescriptor,
    PlainTextExtension, ScreenDescriptor, Version, PLTE_CHANNELS,
};
pub use reader::{parse, parse_cursor, split_into_sub_blocks, BufCursor, DecodedImage, DecodingError};
