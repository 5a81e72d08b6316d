//! ZOI program image parser.
//!
//! Little-endian layout:
//!
//! ```text
//! magic[4]            "ZOI!" (bare) or "ZOI?" (with debug info)
//! u32 data_len        data words (must fit in memory)
//! u32 text_len        instruction words
//! u32 data[data_len]  initial memory image, loaded at word 0
//! u32 text[text_len]  instruction words
//! -- ZOI? only --
//! u32 inst_lines[text_len]   1-origin source line per instruction
//! bytes                      the original source text
//! ```
//!
//! A label is declared by a source line whose first token (splitting on
//! space, `#`, and tab) ends with `:`.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Magic for a bare program image.
pub const MAGIC_BARE: [u8; 4] = *b"ZOI!";

/// Magic for an image carrying debug info.
pub const MAGIC_DEBUG: [u8; 4] = *b"ZOI?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoiError {
    /// The first four bytes are not a ZOI magic.
    InvalidMagic,
    /// The data image does not fit in the machine's memory.
    DataTooLarge,
    /// The file ends before the declared payload.
    UnexpectedEof,
}

impl fmt::Display for ZoiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic => write!(f, "invalid file type"),
            Self::DataTooLarge => write!(f, "static data is too large"),
            Self::UnexpectedEof => write!(f, "unexpected end of file"),
        }
    }
}

impl Error for ZoiError {}

/// A parsed ZOI image.
#[derive(Debug)]
pub struct ZoiImage {
    /// Initial data memory, word 0 upward.
    pub data: Vec<u32>,
    /// Instruction words.
    pub text: Vec<u32>,
    /// Source-level debug info (`ZOI?` files only).
    pub debug: Option<DebugInfo>,
}

/// Source-level debug metadata from a `ZOI?` file.
#[derive(Debug, Default, Clone)]
pub struct DebugInfo {
    /// 1-origin source line for each instruction word. Nondecreasing.
    inst_lines: Vec<u32>,
    /// Source text; `lines[k]` is line `k + 1`.
    lines: Vec<String>,
    /// Labels in declaration order.
    labels: Vec<String>,
    /// Label name to 1-origin line number.
    label_lines: HashMap<String, u32>,
}

impl DebugInfo {
    fn new(inst_lines: Vec<u32>, source: &str) -> Self {
        let mut lines = Vec::new();
        let mut labels = Vec::new();
        let mut label_lines = HashMap::new();
        for (k, line) in source.lines().enumerate() {
            lines.push(line.to_string());
            let first_token = line.split([' ', '#', '\t']).find(|t| !t.is_empty());
            if let Some(name) = first_token.and_then(|t| t.strip_suffix(':')) {
                labels.push(name.to_string());
                label_lines.insert(name.to_string(), k as u32 + 1);
            }
        }
        Self {
            inst_lines,
            lines,
            labels,
            label_lines,
        }
    }

    /// 1-origin source line of instruction word `idx`.
    #[must_use]
    pub fn line_of_index(&self, idx: usize) -> Option<u32> {
        self.inst_lines.get(idx).copied()
    }

    /// The text of 1-origin line `lnum`.
    #[must_use]
    pub fn line_text(&self, lnum: u32) -> Option<&str> {
        let idx = (lnum as usize).checked_sub(1)?;
        self.lines.get(idx).map(String::as_str)
    }

    /// Byte address of the first instruction whose recorded source line is
    /// `lnum` or later.
    #[must_use]
    pub fn text_addr_of_line(&self, lnum: u32) -> Option<u32> {
        let idx = self.inst_lines.partition_point(|&l| l < lnum);
        (idx < self.inst_lines.len()).then(|| (idx as u32) << 2)
    }

    /// 1-origin line number of a declared label.
    #[must_use]
    pub fn line_of_label(&self, label: &str) -> Option<u32> {
        self.label_lines.get(label).copied()
    }

    /// Declared labels, in declaration order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Byte cursor over the raw file.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ZoiError> {
        let end = self.pos.checked_add(n).ok_or(ZoiError::UnexpectedEof)?;
        let slice = self.bytes.get(self.pos..end).ok_or(ZoiError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn word(&mut self) -> Result<u32, ZoiError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn words(&mut self, n: u32) -> Result<Vec<u32>, ZoiError> {
        let mut words = Vec::with_capacity(n as usize);
        for _ in 0..n {
            words.push(self.word()?);
        }
        Ok(words)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

/// Parse a ZOI image from raw file bytes.
///
/// `mem_words` bounds the data image; a larger image is rejected before
/// any payload is read.
pub fn parse(bytes: &[u8], mem_words: u32) -> Result<ZoiImage, ZoiError> {
    let mut r = Reader::new(bytes);

    let magic = r.take(4)?;
    let has_debug = if magic == MAGIC_BARE {
        false
    } else if magic == MAGIC_DEBUG {
        true
    } else {
        return Err(ZoiError::InvalidMagic);
    };

    let data_len = r.word()?;
    if data_len > mem_words {
        return Err(ZoiError::DataTooLarge);
    }
    let text_len = r.word()?;

    let data = r.words(data_len)?;
    let text = r.words(text_len)?;

    let debug = if has_debug {
        let inst_lines = r.words(text_len)?;
        let source = String::from_utf8_lossy(r.rest());
        Some(DebugInfo::new(inst_lines, &source))
    } else {
        None
    };

    Ok(ZoiImage { data, text, debug })
}
