use crate::boxes::{BoxHeader, BoxNode, FourCC, NodeKind, SizeMode};
use crate::error::{ParseError, Result};
use crate::observer::{NoopObserver, ParseObserver};
use crate::payload::Payload;
use crate::registry::{BoxTypeDescriptor, Registry, shared_registry};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Deepest nesting accepted by default. Real files stay around six levels.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Boxes nested deeper than this fail with [`ParseError::DepthExceeded`].
    pub max_depth: usize,
    /// Reject registered boxes that appear under a parent not listing them.
    pub strict_children: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_children: false,
        }
    }
}

fn truncated_at(offset: u64, wanted: u64) -> impl FnOnce(io::Error) -> ParseError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ParseError::Truncated { offset, wanted }
        } else {
            ParseError::Io(e)
        }
    }
}

/// The fixed 8 bytes every box starts with, before its size is resolved.
#[derive(Debug, Clone, Copy)]
struct RawHeader {
    start: u64,
    size32: u32,
    typ: FourCC,
}

fn read_raw_header<R: Read + Seek>(r: &mut R) -> Result<RawHeader> {
    let start = r.stream_position()?;
    let size32 = r.read_u32::<BigEndian>().map_err(truncated_at(start, 8))?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ).map_err(truncated_at(start, 8))?;
    Ok(RawHeader {
        start,
        size32,
        typ: FourCC(typ),
    })
}

fn resolve_size<R: Read>(r: &mut R, raw: RawHeader, bound: u64) -> Result<BoxHeader> {
    let RawHeader { start, size32, typ } = raw;
    let malformed = |reason| ParseError::MalformedSize {
        typ,
        offset: start,
        reason,
    };

    let (header_size, payload_size, size_mode) = match size32 {
        1 => {
            let ext = r.read_u64::<BigEndian>().map_err(truncated_at(start, 16))?;
            let payload = ext
                .checked_sub(16)
                .ok_or_else(|| malformed("extended size smaller than its 16-byte header"))?;
            (16, payload, SizeMode::Extended)
        }
        0 => {
            let payload = bound
                .checked_sub(start + 8)
                .ok_or_else(|| malformed("header runs past the enclosing bound"))?;
            (8, payload, SizeMode::ToBound)
        }
        n => {
            let payload = (n as u64)
                .checked_sub(8)
                .ok_or_else(|| malformed("size smaller than the 8-byte header"))?;
            (8, payload, SizeMode::Compact)
        }
    };

    if start
        .checked_add(header_size)
        .and_then(|p| p.checked_add(payload_size))
        .is_none()
    {
        return Err(malformed("box end does not fit in 64 bits"));
    }

    Ok(BoxHeader {
        typ,
        start,
        header_size,
        payload_size,
        size_mode,
    })
}

/// Read a box header at the current position and resolve its payload length.
///
/// `bound` is the end offset of the enclosing box (or of the input at top
/// level); it only matters for the size-0 form, whose payload runs up to it.
/// On success the reader sits on the first payload byte. The type code is not
/// checked against any registry.
pub fn read_box_header<R: Read + Seek>(r: &mut R, bound: u64) -> Result<BoxHeader> {
    let raw = read_raw_header(r)?;
    resolve_size(r, raw, bound)
}

/// Recursive-descent box tree builder.
///
/// Every call either returns a complete node or an error; nothing partially
/// built is handed back.
pub struct BoxParser<'r, O: ParseObserver = NoopObserver> {
    registry: &'r Registry,
    config: ParserConfig,
    observer: O,
}

impl<'r> BoxParser<'r, NoopObserver> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            config: ParserConfig::default(),
            observer: NoopObserver,
        }
    }
}

impl<'r, O: ParseObserver> BoxParser<'r, O> {
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer<P: ParseObserver>(self, observer: P) -> BoxParser<'r, P> {
        BoxParser {
            registry: self.registry,
            config: self.config,
            observer,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Parse the single top-level box at the reader's position.
    ///
    /// `end` is the end of the input; a box claiming more bytes than that is
    /// reported as truncated.
    pub fn parse_box<R: Read + Seek>(&mut self, r: &mut R, end: u64) -> Result<BoxNode> {
        self.parse_at(r, end, 0, None)
    }

    /// Parse consecutive top-level boxes from the reader's position up to `end`.
    pub fn parse_all<R: Read + Seek>(&mut self, r: &mut R, end: u64) -> Result<Vec<BoxNode>> {
        let mut boxes = Vec::new();
        while r.stream_position()? < end {
            boxes.push(self.parse_at(r, end, 0, None)?);
        }
        Ok(boxes)
    }

    fn parse_at<R: Read + Seek>(
        &mut self,
        r: &mut R,
        bound: u64,
        depth: usize,
        parent: Option<&'r BoxTypeDescriptor>,
    ) -> Result<BoxNode> {
        if depth >= self.config.max_depth {
            return Err(ParseError::DepthExceeded {
                max: self.config.max_depth,
            });
        }

        // The type is checked before any size arithmetic.
        let raw = read_raw_header(r)?;
        let registry = self.registry;
        let desc = registry.lookup(raw.typ, raw.start)?;

        let hdr = resolve_size(r, raw, bound)?;
        self.observer.on_header(&hdr, depth);

        let end = hdr.end();
        if end > bound {
            // At top level the bound is the input itself.
            return Err(if depth == 0 {
                ParseError::Truncated {
                    offset: hdr.payload_offset(),
                    wanted: hdr.payload_size,
                }
            } else {
                ParseError::MalformedSize {
                    typ: hdr.typ,
                    offset: hdr.start,
                    reason: "box overruns its parent",
                }
            });
        }

        if let Some(parent) = parent {
            if !parent.allows_child(desc.typ) {
                if self.config.strict_children {
                    return Err(ParseError::UnexpectedChild {
                        parent: parent.typ,
                        child: desc.typ,
                        offset: hdr.start,
                    });
                }
                self.observer.on_unexpected_child(parent.typ, &hdr);
            }
        }

        let kind = if desc.is_bulk_media() {
            self.observer.on_skip(&hdr, depth);
            r.seek(SeekFrom::Start(end))?;
            NodeKind::Skipped {
                len: hdr.payload_size,
            }
        } else if desc.is_container() {
            let mut kids = Vec::new();
            let mut pos = r.stream_position()?;
            while pos < end {
                kids.push(self.parse_at(r, end, depth + 1, Some(desc))?);
                pos = r.stream_position()?;
            }
            if pos != end {
                return Err(ParseError::MalformedSize {
                    typ: hdr.typ,
                    offset: hdr.start,
                    reason: "children do not end on the container bound",
                });
            }
            NodeKind::Container(kids)
        } else {
            let data = read_payload(r, &hdr)?;
            NodeKind::Leaf(decode_payload(desc, &hdr, data)?)
        };

        let node = BoxNode {
            typ: desc.typ,
            offset: hdr.payload_offset(),
            header: hdr,
            kind,
        };
        self.observer.on_node(&node, depth);
        Ok(node)
    }
}

// The buffer grows with what is actually read, so a lying size field can not
// force a large up-front allocation.
fn read_payload<R: Read>(r: &mut R, hdr: &BoxHeader) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    r.by_ref().take(hdr.payload_size).read_to_end(&mut data)?;
    if (data.len() as u64) < hdr.payload_size {
        return Err(ParseError::Truncated {
            offset: hdr.payload_offset(),
            wanted: hdr.payload_size,
        });
    }
    Ok(data)
}

/// Run the registered decoder for a leaf, or keep the bytes opaque when the
/// type has none.
pub fn decode_payload(desc: &BoxTypeDescriptor, hdr: &BoxHeader, data: Vec<u8>) -> Result<Payload> {
    match &desc.decoder {
        Some(dec) => dec
            .decode(&mut Cursor::new(&data), hdr)
            .map_err(|source| ParseError::Decode {
                typ: desc.typ,
                source,
            }),
        None => Ok(Payload::Opaque {
            typ: desc.typ,
            data,
        }),
    }
}

/// Parse top-level boxes from the current position up to `size` using the
/// shared registry.
pub fn parse_boxes<R: Read + Seek>(r: &mut R, size: u64) -> Result<Vec<BoxNode>> {
    BoxParser::new(shared_registry()).parse_all(r, size)
}

pub fn parse_bytes(data: &[u8]) -> Result<Vec<BoxNode>> {
    let mut cur = Cursor::new(data);
    parse_boxes(&mut cur, data.len() as u64)
}
