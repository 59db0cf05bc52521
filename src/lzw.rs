//! Variable-code-width LZW codec for GIF image data.
//!
//! Codes are packed least-significant-bit first. The code width starts at
//! `min_code_size + 1`, grows with the dictionary and is capped at 12
//! bits. `1 << min_code_size` is the clear code, the next value the
//! end-of-information code. Every call owns its own dictionary, so
//! independent streams decode in parallel without shared state.

use std::collections::HashMap;

use thiserror::Error;

/// Codes never exceed 12 bits.
const MAX_CODE_WIDTH: u8 = 12;
/// Dictionary slot count at the width ceiling.
const TABLE_CEILING: usize = 1 << MAX_CODE_WIDTH;
/// Sentinel prefix for single-symbol entries.
const NO_PREFIX: u16 = u16::MAX;

/// Codec failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum LzwError {
    /// The root code width cannot produce a valid code stream.
    #[error("minimum code size {0} outside the supported range")]
    InvalidMinCodeSize(u8),
    /// A code referenced a dictionary slot that has not been assigned.
    #[error("code {code:#x} references an unassigned dictionary slot")]
    InvalidCode {
        /// The offending code value.
        code: u16,
    },
    /// The bit stream ran out before an end-of-information code.
    #[error("bit stream ended before an end-of-information code")]
    MissingEndCode,
    /// An input byte does not fit the alphabet declared by the root width.
    #[error("symbol {symbol:#04x} does not fit a {alphabet}-symbol alphabet")]
    SymbolOutOfRange {
        /// The offending input byte.
        symbol: u8,
        /// Number of literal symbols in the alphabet.
        alphabet: u16,
    },
}

/// Reads codes from a byte buffer, least-significant-bit first,
/// sub-block boundaries already stripped.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    acc: u32,
    len: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> BitReader<'a> {
        BitReader {
            bytes,
            pos: 0,
            acc: 0,
            len: 0,
        }
    }

    /// The next `width`-bit code, or `None` once the buffer cannot supply
    /// a whole code.
    fn read(&mut self, width: u8) -> Option<u16> {
        while self.len < width {
            let &byte = self.bytes.get(self.pos)?;
            self.acc |= u32::from(byte) << self.len;
            self.len += 8;
            self.pos += 1;
        }
        let code = (self.acc & ((1u32 << width) - 1)) as u16;
        self.acc >>= width;
        self.len -= width;
        Some(code)
    }
}

/// Packs codes into bytes, mirroring [`BitReader`].
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    len: u8,
}

impl BitWriter {
    fn new() -> BitWriter {
        BitWriter {
            out: Vec::new(),
            acc: 0,
            len: 0,
        }
    }

    fn write(&mut self, code: u16, width: u8) {
        self.acc |= u32::from(code) << self.len;
        self.len += width;
        while self.len >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.len -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.len > 0 {
            self.out.push(self.acc as u8);
        }
        self.out
    }
}

#[derive(Copy, Clone)]
struct Entry {
    prefix: u16,
    suffix: u8,
    /// First symbol of the sequence this entry expands to.
    first: u8,
}

/// Decoder dictionary: a flat table indexed by code. Entries chain
/// through `prefix`, so growth is a single push and expansion walks the
/// chain backwards.
struct Table {
    entries: Vec<Entry>,
    /// Table length right after a reset: literals plus the two reserved
    /// slots for clear and end.
    base: usize,
}

impl Table {
    fn new(min_code_size: u8) -> Table {
        let roots = 1usize << min_code_size;
        let mut entries = Vec::with_capacity(TABLE_CEILING);
        for i in 0..roots + 2 {
            // the clear/end slots hold inert filler, never referenced
            let symbol = if i < roots { i as u8 } else { 0 };
            entries.push(Entry {
                prefix: NO_PREFIX,
                suffix: symbol,
                first: symbol,
            });
        }
        Table {
            base: entries.len(),
            entries,
        }
    }

    fn reset(&mut self) {
        self.entries.truncate(self.base);
    }

    /// Next unassigned slot.
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn first(&self, code: u16) -> u8 {
        self.entries[code as usize].first
    }

    /// Appends `sequence(prefix) + suffix`. Silently full at the 12-bit
    /// ceiling; callers keep decoding with a frozen table until a clear.
    fn push(&mut self, prefix: u16, suffix: u8) {
        if self.entries.len() < TABLE_CEILING {
            let first = self.first(prefix);
            self.entries.push(Entry {
                prefix,
                suffix,
                first,
            });
        }
    }

    /// Expands `code` onto `out`. `scratch` is reused across calls to
    /// avoid reallocating the reversal buffer.
    fn expand(&self, code: u16, out: &mut Vec<u8>, scratch: &mut Vec<u8>) {
        scratch.clear();
        let mut cursor = code;
        loop {
            let entry = self.entries[cursor as usize];
            scratch.push(entry.suffix);
            if entry.prefix == NO_PREFIX {
                break;
            }
            cursor = entry.prefix;
        }
        out.extend(scratch.iter().rev());
    }
}

/// Decompresses one image payload into the flat index stream.
///
/// `payload` is the concatenation of all data sub-blocks for the image.
/// The output length is whatever the stream encodes; checking it against
/// the frame geometry is the caller's business.
pub fn decompress(min_code_size: u8, payload: &[u8]) -> Result<Vec<u8>, LzwError> {
    if !(1..=11).contains(&min_code_size) {
        return Err(LzwError::InvalidMinCodeSize(min_code_size));
    }
    let clear = 1u16 << min_code_size;
    let end = clear + 1;

    let mut table = Table::new(min_code_size);
    let mut width = min_code_size + 1;
    let mut bits = BitReader::new(payload);
    let mut out = Vec::new();
    let mut scratch = Vec::new();
    let mut prev: Option<u16> = None;

    loop {
        let code = bits.read(width).ok_or(LzwError::MissingEndCode)?;
        if code == clear {
            table.reset();
            width = min_code_size + 1;
            prev = None;
            continue;
        }
        if code == end {
            // trailing bits, if any, are ignored
            break;
        }

        let next = table.len() as u16;
        if code > next || (code == next && prev.is_none()) {
            return Err(LzwError::InvalidCode { code });
        }

        if let Some(prev_code) = prev {
            // single-symbol extension: previous sequence plus the first
            // symbol of the current one; for code == next that symbol is
            // the previous sequence's own head
            let suffix = if code == next {
                table.first(prev_code)
            } else {
                table.first(code)
            };
            table.push(prev_code, suffix);
            if table.len() == 1usize << width && width < MAX_CODE_WIDTH {
                width += 1;
            }
        }

        table.expand(code, &mut out, &mut scratch);
        prev = Some(code);
    }
    Ok(out)
}

/// Compresses `data` into the code sequence, clear and end codes
/// included.
///
/// Greedy longest-match: the dictionary grows by one entry per emitted
/// code, keyed by `(prefix code, next byte)` so no key is ever re-added.
/// When the dictionary hits the 12-bit ceiling a clear code is emitted
/// and matching restarts. Single-pass and deterministic; symbols must be
/// below `1 << min_code_size`.
pub fn encode(min_code_size: u8, data: &[u8]) -> Result<Vec<u16>, LzwError> {
    if !(2..=8).contains(&min_code_size) {
        return Err(LzwError::InvalidMinCodeSize(min_code_size));
    }
    let clear = 1u16 << min_code_size;
    let end = clear + 1;

    let mut dict: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next = clear + 2;
    let mut codes = vec![clear];
    let mut prefix: Option<u16> = None;

    for &symbol in data {
        if u16::from(symbol) >= clear {
            return Err(LzwError::SymbolOutOfRange {
                symbol,
                alphabet: clear,
            });
        }
        let p = match prefix {
            None => {
                prefix = Some(symbol.into());
                continue;
            }
            Some(p) => p,
        };
        if let Some(&code) = dict.get(&(p, symbol)) {
            prefix = Some(code);
            continue;
        }
        codes.push(p);
        if usize::from(next) < TABLE_CEILING {
            dict.insert((p, symbol), next);
            next += 1;
        } else {
            codes.push(clear);
            dict.clear();
            next = clear + 2;
        }
        prefix = Some(symbol.into());
    }
    if let Some(p) = prefix {
        codes.push(p);
    }
    codes.push(end);
    Ok(codes)
}

/// Compresses `data` into a packed byte payload that [`decompress`]
/// inverts exactly.
pub fn compress(min_code_size: u8, data: &[u8]) -> Result<Vec<u8>, LzwError> {
    let codes = encode(min_code_size, data)?;
    Ok(pack_codes(min_code_size, &codes))
}

/// Packs a code sequence with the width schedule the decoder expects:
/// replay the dictionary growth code by code and widen one code after
/// the table fills the current width.
fn pack_codes(min_code_size: u8, codes: &[u16]) -> Vec<u8> {
    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let base = usize::from(clear) + 2;

    let mut width = min_code_size + 1;
    let mut len = base;
    let mut have_prev = false;
    let mut writer = BitWriter::new();

    for &code in codes {
        writer.write(code, width);
        if code == clear {
            width = min_code_size + 1;
            len = base;
            have_prev = false;
        } else if code != end {
            if have_prev && len < TABLE_CEILING {
                len += 1;
                if len == 1usize << width && width < MAX_CODE_WIDTH {
                    width += 1;
                }
            }
            have_prev = true;
        }
    }
    writer.finish()
}
