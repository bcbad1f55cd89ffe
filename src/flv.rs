//! FLV tag stream codec.
//!
//! Layout of a stream:
//!
//! ```text
//! preamble  "FLV" | version u8 | flags u8 | header_size u32 (=9) | prev_tag_size u32 (=0)
//! tag       type u8 | size u24 | timestamp u24 | reserved u32 (=0) | payload | prev_tag_size u32
//! ```
//!
//! All integers are big-endian. The trailing `prev_tag_size` of a tag is its
//! payload size plus the 11-byte tag header.

use crate::error::TagError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};

pub const SIGNATURE: [u8; 3] = *b"FLV";
pub const FILE_HEADER_SIZE: u32 = 9;
pub const TAG_HEADER_SIZE: u32 = 11;
pub const MAX_U24: u32 = 0x00FF_FFFF;

const FLAG_AUDIO: u8 = 0x04;
const FLAG_VIDEO: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagType {
    Audio,
    Video,
    ScriptData,
    /// Any other message type code, kept as-is.
    Other(u8),
}

impl From<u8> for TagType {
    fn from(code: u8) -> Self {
        match code {
            8 => TagType::Audio,
            9 => TagType::Video,
            18 => TagType::ScriptData,
            other => TagType::Other(other),
        }
    }
}

impl From<TagType> for u8 {
    fn from(t: TagType) -> u8 {
        match t {
            TagType::Audio => 8,
            TagType::Video => 9,
            TagType::ScriptData => 18,
            TagType::Other(code) => code,
        }
    }
}

/// Stream preamble written once before the first tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlvHeader {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
}

impl Default for FlvHeader {
    fn default() -> Self {
        Self {
            version: 1,
            has_audio: true,
            has_video: true,
        }
    }
}

impl FlvHeader {
    pub fn flags(&self) -> u8 {
        let mut f = 0;
        if self.has_audio {
            f |= FLAG_AUDIO;
        }
        if self.has_video {
            f |= FLAG_VIDEO;
        }
        f
    }

    /// Writes the 9-byte header followed by the zero "previous tag size".
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&SIGNATURE)?;
        w.write_u8(self.version)?;
        w.write_u8(self.flags())?;
        w.write_u32::<BigEndian>(FILE_HEADER_SIZE)?;
        w.write_u32::<BigEndian>(0)
    }

    /// Reads the preamble, skipping any extra header bytes a larger
    /// `header_size` announces, and the leading "previous tag size".
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TagError> {
        Self::read_with_len(r).map(|(header, _)| header)
    }

    /// Like [`FlvHeader::read_from`], also returning the number of bytes the
    /// preamble occupied. The first tag starts at that offset.
    pub fn read_with_len<R: Read>(r: &mut R) -> Result<(Self, u64), TagError> {
        let mut sig = [0u8; 3];
        r.read_exact(&mut sig).map_err(eof_as_truncated(3))?;
        if sig != SIGNATURE {
            return Err(TagError::BadSignature(sig));
        }
        let version = r.read_u8().map_err(eof_as_truncated(1))?;
        let flags = r.read_u8().map_err(eof_as_truncated(1))?;
        let header_size = r.read_u32::<BigEndian>().map_err(eof_as_truncated(4))?;
        let extra = header_size.saturating_sub(FILE_HEADER_SIZE) as u64;
        let skipped = io::copy(&mut r.by_ref().take(extra), &mut io::sink())?;
        if skipped < extra {
            return Err(TagError::Truncated {
                expected: extra as usize,
                actual: skipped as usize,
            });
        }
        let _prev_tag_size = r.read_u32::<BigEndian>().map_err(eof_as_truncated(4))?;
        let header = Self {
            version,
            has_audio: flags & FLAG_AUDIO != 0,
            has_video: flags & FLAG_VIDEO != 0,
        };
        // fixed header, announced extra bytes, leading prev_tag_size
        Ok((header, FILE_HEADER_SIZE as u64 + extra + 4))
    }
}

fn eof_as_truncated(expected: usize) -> impl FnOnce(io::Error) -> TagError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TagError::Truncated {
                expected,
                actual: 0,
            }
        } else {
            TagError::Io(e)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagHeader {
    pub tag_type: TagType,
    /// Payload length, 24 bits on the wire.
    pub size: u32,
    /// Milliseconds, 24 bits on the wire.
    pub timestamp: u32,
}

impl TagHeader {
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TagError> {
        let mut buf = [0u8; TAG_HEADER_SIZE as usize];
        read_exactly(r, &mut buf)?;
        let mut cur = &buf[..];
        let tag_type = TagType::from(cur.read_u8()?);
        let size = cur.read_u24::<BigEndian>()?;
        let timestamp = cur.read_u24::<BigEndian>()?;
        // remaining 4 bytes are reserved
        Ok(Self {
            tag_type,
            size,
            timestamp,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.tag_type.into())?;
        w.write_u24::<BigEndian>(self.size)?;
        w.write_u24::<BigEndian>(self.timestamp)?;
        w.write_u32::<BigEndian>(0)
    }

    /// Value of the trailing back-pointer for a tag with this header.
    pub fn trailer(&self) -> u32 {
        self.size + TAG_HEADER_SIZE
    }
}

// Like read_exact, but reports how much actually arrived.
fn read_exactly<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), TagError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(TagError::Truncated {
                    expected: buf.len(),
                    actual: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// One timestamped media message.
///
/// `header.size` always equals `data.len()` for tags built with [`FlvTag::new`]
/// or read with [`FlvTag::read_from`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlvTag {
    pub header: TagHeader,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl FlvTag {
    pub fn new(tag_type: TagType, timestamp: u32, data: Vec<u8>) -> Result<Self, TagError> {
        if data.len() > MAX_U24 as usize {
            return Err(TagError::PayloadTooLarge(data.len()));
        }
        if timestamp > MAX_U24 {
            return Err(TagError::TimestampOverflow(timestamp));
        }
        Ok(Self {
            header: TagHeader {
                tag_type,
                size: data.len() as u32,
                timestamp,
            },
            data,
        })
    }

    /// Read one tag and skip its 4-byte trailer without checking it.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TagError> {
        let (tag, _trailer) = Self::read_with_trailer(r)?;
        Ok(tag)
    }

    /// Read one tag and return the trailer value found on the wire.
    pub fn read_with_trailer<R: Read>(r: &mut R) -> Result<(Self, u32), TagError> {
        let header = TagHeader::read_from(r)?;
        let mut data = Vec::new();
        r.by_ref().take(header.size as u64).read_to_end(&mut data)?;
        if data.len() < header.size as usize {
            return Err(TagError::Truncated {
                expected: header.size as usize,
                actual: data.len(),
            });
        }
        let trailer = r.read_u32::<BigEndian>().map_err(eof_as_truncated(4))?;
        Ok((Self { header, data }, trailer))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TagError> {
        let mut cur = bytes;
        Self::read_from(&mut cur)
    }

    /// Write header, payload and a freshly computed trailer. The header size
    /// written is always the real payload length.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TagError> {
        if self.data.len() > MAX_U24 as usize {
            return Err(TagError::PayloadTooLarge(self.data.len()));
        }
        if self.header.timestamp > MAX_U24 {
            return Err(TagError::TimestampOverflow(self.header.timestamp));
        }
        let header = TagHeader {
            size: self.data.len() as u32,
            ..self.header
        };
        header.write_to(w)?;
        w.write_all(&self.data)?;
        w.write_u32::<BigEndian>(header.trailer())?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TagError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Bytes occupied on the wire, trailer included.
    pub fn encoded_len(&self) -> usize {
        TAG_HEADER_SIZE as usize + self.data.len() + 4
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderConfig {
    /// Fail with [`TagError::TrailerMismatch`] when a tag's trailer is not
    /// `size + 11`. Off by default: the trailer is skipped unchecked.
    pub validate_trailer: bool,
}

/// Iterates the tags of an FLV stream.
pub struct TagReader<R> {
    inner: R,
    header: FlvHeader,
    preamble_len: u64,
    config: ReaderConfig,
    done: bool,
}

impl<R: Read> TagReader<R> {
    /// Reads the stream preamble.
    pub fn new(inner: R) -> Result<Self, TagError> {
        Self::with_config(inner, ReaderConfig::default())
    }

    pub fn with_config(mut inner: R, config: ReaderConfig) -> Result<Self, TagError> {
        let (header, preamble_len) = FlvHeader::read_with_len(&mut inner)?;
        tracing::debug!(
            version = header.version,
            audio = header.has_audio,
            video = header.has_video,
            preamble_len,
            "flv stream opened"
        );
        Ok(Self {
            inner,
            header,
            preamble_len,
            config,
            done: false,
        })
    }

    pub fn header(&self) -> &FlvHeader {
        &self.header
    }

    /// Stream offset of the first tag.
    pub fn preamble_len(&self) -> u64 {
        self.preamble_len
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Next tag, `Ok(None)` on a clean end of stream at a tag boundary.
    pub fn next_tag(&mut self) -> Result<Option<FlvTag>, TagError> {
        if self.done {
            return Ok(None);
        }
        let mut first = [0u8; 1];
        let n = loop {
            match self.inner.read(&mut first) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            self.done = true;
            return Ok(None);
        }

        let mut chained = (&first[..]).chain(&mut self.inner);
        let (tag, trailer) = FlvTag::read_with_trailer(&mut chained)?;
        if self.config.validate_trailer && trailer != tag.header.trailer() {
            return Err(TagError::TrailerMismatch {
                expected: tag.header.trailer(),
                found: trailer,
            });
        }
        tracing::trace!(
            tag_type = ?tag.header.tag_type,
            size = tag.header.size,
            timestamp = tag.header.timestamp,
            "flv tag"
        );
        Ok(Some(tag))
    }
}

impl<R: Read> Iterator for TagReader<R> {
    type Item = Result<FlvTag, TagError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_tag() {
            Ok(Some(tag)) => Some(Ok(tag)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Writes an FLV stream: preamble on construction, then one tag per call.
pub struct TagWriter<W: Write> {
    inner: W,
    tags: u64,
}

impl<W: Write> TagWriter<W> {
    pub fn new(mut inner: W, header: FlvHeader) -> Result<Self, TagError> {
        header.write_to(&mut inner)?;
        Ok(Self { inner, tags: 0 })
    }

    pub fn write_tag(&mut self, tag: &FlvTag) -> Result<(), TagError> {
        tag.write_to(&mut self.inner)?;
        self.tags += 1;
        Ok(())
    }

    pub fn tags_written(&self) -> u64 {
        self.tags
    }

    pub fn finish(mut self) -> Result<W, TagError> {
        self.inner.flush()?;
        tracing::debug!(tags = self.tags, "flv stream finished");
        Ok(self.inner)
    }
}
