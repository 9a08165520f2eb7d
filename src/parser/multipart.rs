//! Multipart body decoding: recovers the individual objects of a bulk
//! GetObject response (`multipart/parallel`) from one fully buffered body.
//!
//! Decoding is a finite-state machine over the byte stream:
//!
//! ```text
//! Preamble ──boundary──▶ HeaderField ◀──CRLF── HeaderValue
//!                          │    └──':'──▶──────────┘
//!                      empty line
//!                          ▼
//!                         Body ──boundary──▶ HeaderField (next part)
//!                          └──close boundary──▶ Done (epilogue ignored)
//! ```
//!
//! All accumulation state lives in a per-call context, so a
//! [`MultipartDecoder`] can be shared freely between threads.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::{debug, trace, warn};

use crate::error::{DecodeError, Result};
use crate::model::part::{FieldPart, Multipart, Part};
use crate::parser::header::{
    decode_text, disposition_filename, disposition_name, HeaderName, TransferEncoding,
};

/// Default cap on the number of field parts kept per call.
pub const DEFAULT_MAX_FIELDS: usize = 1000;

/// Default cap on the total decoded size of field parts per call (2 MB).
pub const DEFAULT_MAX_FIELDS_SIZE: usize = 2 * 1024 * 1024;

/// Lenient base64: trailing group may be unpadded, stray trailing bits tolerated.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Tunables for a multipart decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Field parts beyond this count are dropped (with a warning).
    pub max_fields: usize,
    /// Field text beyond this many bytes in total is dropped (with a warning).
    pub max_fields_size: usize,
    /// Report a body that never mentions the boundary as
    /// [`DecodeError::MalformedBoundary`] instead of "no parts".
    pub strict_boundary: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_fields: DEFAULT_MAX_FIELDS,
            max_fields_size: DEFAULT_MAX_FIELDS_SIZE,
            strict_boundary: false,
        }
    }
}

/// Decode a multipart body with default options and return its payload parts.
///
/// Field parts are decoded but not returned; use [`MultipartDecoder::decode`]
/// to get them too.
pub fn decode_multipart(buffer: &[u8], boundary: &str) -> Result<Vec<Part>> {
    Ok(MultipartDecoder::new(boundary)?.decode(buffer)?.parts)
}

/// A reusable, immutable multipart decoder bound to one boundary token.
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    boundary: String,
    /// `--` followed by the boundary: the delimiter as it appears on the wire.
    delimiter: Vec<u8>,
    options: DecodeOptions,
}

impl MultipartDecoder {
    /// Create a decoder for `boundary` (the bare token, without leading `--`).
    ///
    /// An empty boundary, or one containing a line break, is rejected.
    pub fn new(boundary: &str) -> Result<Self> {
        if boundary.is_empty() {
            return Err(DecodeError::MalformedBoundary("empty boundary".into()));
        }
        if boundary.contains(['\r', '\n']) {
            return Err(DecodeError::MalformedBoundary(format!(
                "boundary contains a line break: {boundary:?}"
            )));
        }
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Ok(Self {
            boundary: boundary.to_string(),
            delimiter,
            options: DecodeOptions::default(),
        })
    }

    /// Replace the decode options.
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// The boundary token this decoder looks for.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Decode a complete body into payload parts and field parts.
    ///
    /// On error nothing is returned: no partially decoded part list escapes.
    pub fn decode(&self, buffer: &[u8]) -> Result<Multipart> {
        let mut ctx = DecodeContext::new(self);
        ctx.run(buffer)?;

        if !ctx.saw_boundary && buffer.iter().any(|b| !b.is_ascii_whitespace()) {
            if self.options.strict_boundary {
                return Err(DecodeError::MalformedBoundary(format!(
                    "boundary '{}' not found in body",
                    self.boundary
                )));
            }
            warn!(
                boundary = %self.boundary,
                len = buffer.len(),
                "Boundary not found in multipart body; returning no parts"
            );
        }

        debug!(
            parts = ctx.out.parts.len(),
            fields = ctx.out.fields.len(),
            bytes = buffer.len(),
            "Decoded multipart body"
        );
        Ok(ctx.out)
    }
}

/// Parser state. Header bytes are classified one at a time; bodies are
/// consumed up to the next boundary in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    HeaderField,
    HeaderValue,
    Body,
    Done,
}

/// What followed a delimiter match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    /// `--boundary` CRLF: another part follows.
    Part,
    /// `--boundary--`: end of the multipart body.
    Close,
}

/// A boundary occurrence located in the buffer.
#[derive(Debug, Clone, Copy)]
struct BoundaryMatch {
    /// End of the preceding part's body (the line break before the delimiter
    /// belongs to the boundary, not the body).
    body_end: usize,
    /// First byte after the boundary line.
    next: usize,
    kind: BoundaryKind,
}

/// Per-call decoding state.
struct DecodeContext<'d> {
    decoder: &'d MultipartDecoder,
    state: State,
    pos: usize,
    /// 1-based ordinal of the part being built (0 before the first).
    ordinal: usize,
    current: Option<PartBuilder>,
    header_field: Vec<u8>,
    header_value: Vec<u8>,
    /// The current header line is a folded continuation of the previous one.
    folding: bool,
    fields_size: usize,
    saw_boundary: bool,
    out: Multipart,
}

impl<'d> DecodeContext<'d> {
    fn new(decoder: &'d MultipartDecoder) -> Self {
        Self {
            decoder,
            state: State::Preamble,
            pos: 0,
            ordinal: 0,
            current: None,
            header_field: Vec::new(),
            header_value: Vec::new(),
            folding: false,
            fields_size: 0,
            saw_boundary: false,
            out: Multipart::default(),
        }
    }

    fn run(&mut self, buf: &[u8]) -> Result<()> {
        loop {
            self.state = match self.state {
                State::Preamble => self.on_preamble(buf),
                State::HeaderField => self.on_header_field(buf)?,
                State::HeaderValue => self.on_header_value(buf),
                State::Body => self.on_body(buf)?,
                State::Done => return Ok(()),
            };
        }
    }

    fn on_preamble(&mut self, buf: &[u8]) -> State {
        match find_boundary(buf, 0, &self.decoder.delimiter) {
            Some(m) => {
                self.saw_boundary = true;
                trace!(offset = m.body_end, "Preamble ends");
                self.after_boundary(m)
            }
            None => State::Done,
        }
    }

    fn on_header_field(&mut self, buf: &[u8]) -> Result<State> {
        let Some(&byte) = buf.get(self.pos) else {
            return Ok(self.truncated("headers"));
        };

        match byte {
            b'\r' | b'\n' => {
                self.pos += line_break_len(buf, self.pos);
                if self.header_field.is_empty() {
                    self.on_headers_end()?;
                    return Ok(State::Body);
                }
                warn!(
                    part = self.ordinal,
                    line = %String::from_utf8_lossy(&self.header_field),
                    "Header line without a colon ignored"
                );
                self.header_field.clear();
                Ok(State::HeaderField)
            }
            b':' => {
                self.pos += 1;
                Ok(State::HeaderValue)
            }
            b' ' | b'\t' if self.header_field.is_empty() && self.has_headers() => {
                self.folding = true;
                Ok(State::HeaderValue)
            }
            _ => {
                self.header_field.push(byte);
                self.pos += 1;
                Ok(State::HeaderField)
            }
        }
    }

    fn on_header_value(&mut self, buf: &[u8]) -> State {
        let Some(&byte) = buf.get(self.pos) else {
            return self.truncated("headers");
        };

        match byte {
            b'\r' | b'\n' => {
                self.pos += line_break_len(buf, self.pos);
                self.commit_header();
                State::HeaderField
            }
            _ => {
                self.header_value.push(byte);
                self.pos += 1;
                State::HeaderValue
            }
        }
    }

    fn on_body(&mut self, buf: &[u8]) -> Result<State> {
        let Some(m) = find_boundary(buf, self.pos, &self.decoder.delimiter) else {
            return Ok(self.truncated("body"));
        };

        let body = &buf[self.pos..m.body_end.max(self.pos)];
        let ordinal = self.ordinal;
        if let Some(part) = self.current.as_mut() {
            part.feed(body, ordinal)?;
        }
        self.seal()?;
        Ok(self.after_boundary(m))
    }

    /// Move past a boundary line and start the next part if there is one.
    fn after_boundary(&mut self, m: BoundaryMatch) -> State {
        self.pos = m.next;
        match m.kind {
            BoundaryKind::Close => State::Done,
            BoundaryKind::Part => {
                self.ordinal += 1;
                self.current = Some(PartBuilder::default());
                self.header_field.clear();
                self.header_value.clear();
                self.folding = false;
                State::HeaderField
            }
        }
    }

    fn has_headers(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|p| !p.raw_headers.is_empty())
    }

    fn commit_header(&mut self) {
        let value = decode_text(&self.header_value).trim().to_string();
        if let Some(part) = self.current.as_mut() {
            if self.folding {
                if let Some(last) = part.raw_headers.last_mut() {
                    if !value.is_empty() {
                        last.1.push(' ');
                        last.1.push_str(&value);
                    }
                }
            } else {
                let name = decode_text(&self.header_field);
                part.raw_headers.push((name, value));
            }
        }
        self.header_field.clear();
        self.header_value.clear();
        self.folding = false;
    }

    /// Interpret the collected headers once the blank line is reached.
    fn on_headers_end(&mut self) -> Result<()> {
        let ordinal = self.ordinal;
        if let Some(part) = self.current.as_mut() {
            part.interpret_headers()?;
            trace!(
                part = ordinal,
                encoding = %part.transfer_encoding,
                field = part.is_field(),
                "Part headers complete"
            );
        }
        Ok(())
    }

    /// Finish the current part and move it into the output.
    fn seal(&mut self) -> Result<()> {
        let Some(builder) = self.current.take() else {
            return Ok(());
        };
        let ordinal = self.ordinal;

        if builder.is_field() {
            let field = builder.into_field(ordinal)?;
            self.push_field(field);
        } else {
            let part = builder.into_part(ordinal)?;
            debug!(
                part = ordinal,
                size = part.payload.len(),
                mime = part.mime.as_deref().unwrap_or(""),
                object_id = part.object_id.as_deref().unwrap_or(""),
                "Sealed part"
            );
            self.out.parts.push(part);
        }
        Ok(())
    }

    fn push_field(&mut self, field: FieldPart) {
        let options = &self.decoder.options;
        if self.out.fields.len() >= options.max_fields {
            warn!(
                max = options.max_fields,
                name = %field.name,
                "Too many field parts; dropping field"
            );
            return;
        }
        if self.fields_size + field.value.len() > options.max_fields_size {
            warn!(
                max = options.max_fields_size,
                received = self.fields_size + field.value.len(),
                name = %field.name,
                "Field data size limit exceeded; dropping field"
            );
            return;
        }
        self.fields_size += field.value.len();
        self.out.fields.push(field);
    }

    /// The stream ended inside a part: drop the unfinished part.
    fn truncated(&mut self, section: &str) -> State {
        if self.current.take().is_some() {
            warn!(
                part = self.ordinal,
                section,
                "Multipart body ended before the closing boundary; dropping unfinished part"
            );
        }
        State::Done
    }
}

/// A part under construction.
#[derive(Debug, Default)]
struct PartBuilder {
    raw_headers: Vec<(String, String)>,
    mime: Option<String>,
    content_description: Option<String>,
    content_id: Option<String>,
    object_id: Option<String>,
    disposition: Option<String>,
    name: Option<String>,
    filename: Option<String>,
    transfer_encoding: TransferEncoding,
    extra_headers: Vec<(String, String)>,
    payload: Vec<u8>,
    base64: Base64Stream,
}

impl PartBuilder {
    fn interpret_headers(&mut self) -> Result<()> {
        for (name, value) in std::mem::take(&mut self.raw_headers) {
            match HeaderName::from_name(&name) {
                HeaderName::ContentDisposition => {
                    self.name = disposition_name(&value);
                    self.filename = disposition_filename(&value);
                    self.disposition = Some(value);
                }
                HeaderName::ContentType => self.mime = Some(value),
                HeaderName::ContentTransferEncoding => {
                    self.transfer_encoding = TransferEncoding::from_header(&value)?;
                }
                HeaderName::ContentDescription => self.content_description = Some(value),
                HeaderName::ContentId => self.content_id = Some(value),
                HeaderName::ObjectId => self.object_id = Some(value),
                HeaderName::Other(lower) => self.extra_headers.push((lower, value)),
            }
        }
        Ok(())
    }

    /// A disposition naming a field, with no filename and no object id.
    fn is_field(&self) -> bool {
        self.disposition.is_some() && self.filename.is_none() && self.object_id.is_none()
    }

    /// Append body bytes, undoing the transfer encoding.
    fn feed(&mut self, body: &[u8], ordinal: usize) -> Result<()> {
        if self.transfer_encoding.is_identity() {
            self.payload.extend_from_slice(body);
            return Ok(());
        }
        // Wrapped base64 arrives line by line; each line is one chunk.
        for chunk in body.split_inclusive(|&b| b == b'\n') {
            self.base64
                .push(chunk, &mut self.payload)
                .map_err(|reason| DecodeError::InvalidBase64 {
                    part: ordinal,
                    reason,
                })?;
        }
        Ok(())
    }

    fn flush(&mut self, ordinal: usize) -> Result<()> {
        let base64 = std::mem::take(&mut self.base64);
        base64
            .finish(&mut self.payload)
            .map_err(|reason| DecodeError::InvalidBase64 {
                part: ordinal,
                reason,
            })
    }

    fn into_part(mut self, ordinal: usize) -> Result<Part> {
        self.flush(ordinal)?;
        Ok(Part {
            payload: self.payload,
            mime: self.mime,
            content_description: self.content_description,
            content_id: self.content_id,
            object_id: self.object_id,
            filename: self.filename,
            name: self.name,
            transfer_encoding: self.transfer_encoding,
            extra_headers: self.extra_headers,
        })
    }

    fn into_field(mut self, ordinal: usize) -> Result<FieldPart> {
        self.flush(ordinal)?;
        Ok(FieldPart {
            name: self.name.unwrap_or_default(),
            value: decode_text(&self.payload),
        })
    }
}

/// Incremental base64 decoder.
///
/// Text is buffered and only whole 4-character groups are decoded, each
/// producing exactly 3 bytes; the unaligned tail waits for the next chunk.
#[derive(Debug, Default)]
struct Base64Stream {
    pending: Vec<u8>,
}

impl Base64Stream {
    fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> std::result::Result<(), String> {
        self.pending
            .extend(chunk.iter().copied().filter(|b| !b.is_ascii_whitespace()));
        let aligned = self.pending.len() / 4 * 4;
        if aligned == 0 {
            return Ok(());
        }
        BASE64
            .decode_vec(&self.pending[..aligned], out)
            .map_err(|e| e.to_string())?;
        self.pending.drain(..aligned);
        Ok(())
    }

    /// Decode whatever is left as a final, possibly short or padded, group.
    fn finish(self, out: &mut Vec<u8>) -> std::result::Result<(), String> {
        if self.pending.is_empty() {
            return Ok(());
        }
        BASE64
            .decode_vec(&self.pending, out)
            .map_err(|e| e.to_string())
    }
}

/// Find the next boundary line at or after `from`.
///
/// A delimiter only counts at the start of the buffer or right after a line
/// break, and only when followed by `--` (close), optional blanks and a line
/// break (next part), or the end of the buffer.
fn find_boundary(buf: &[u8], from: usize, delimiter: &[u8]) -> Option<BoundaryMatch> {
    let mut search = from;

    while let Some(i) = find_subslice(buf, delimiter, search) {
        search = i + 1;

        let body_end = if i == 0 {
            0
        } else if buf[i - 1] == b'\n' {
            if i >= 2 && buf[i - 2] == b'\r' {
                i - 2
            } else {
                i - 1
            }
        } else {
            continue;
        };

        let after = i + delimiter.len();
        if buf[after..].starts_with(b"--") {
            return Some(BoundaryMatch {
                body_end,
                next: after + 2,
                kind: BoundaryKind::Close,
            });
        }

        let mut k = after;
        while k < buf.len() && (buf[k] == b' ' || buf[k] == b'\t') {
            k += 1;
        }
        if k == buf.len() {
            return Some(BoundaryMatch {
                body_end,
                next: k,
                kind: BoundaryKind::Close,
            });
        }
        if buf[k] == b'\r' || buf[k] == b'\n' {
            return Some(BoundaryMatch {
                body_end,
                next: k + line_break_len(buf, k),
                kind: BoundaryKind::Part,
            });
        }
    }
    None
}

/// Position of `needle` in `haystack` at or after `from`.
fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    let first = *needle.first()?;
    let mut start = from;
    while start + needle.len() <= haystack.len() {
        let offset = haystack[start..].iter().position(|&b| b == first)?;
        let candidate = start + offset;
        if haystack[candidate..].starts_with(needle) {
            return Some(candidate);
        }
        start = candidate + 1;
    }
    None
}

/// Length of the line break at `pos`: 2 for CRLF, 1 for a lone CR or LF.
fn line_break_len(buf: &[u8], pos: usize) -> usize {
    if buf[pos] == b'\r' && buf.get(pos + 1) == Some(&b'\n') {
        2
    } else {
        1
    }
}
