use crate::{
    boxes::BoxNode,
    flv::{FlvHeader, FlvTag, ReaderConfig, TagReader, TagWriter},
    observer::TracingObserver,
    parser::{BoxParser, ParserConfig},
    registry::shared_registry,
    util::{hex_dump, read_slice},
};
use anyhow::Context;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek},
    path::Path,
};

/// Parse every top-level box of an F4V/MP4 file.
///
/// Parser events are forwarded to `tracing`.
pub fn read_boxes(path: impl AsRef<Path>, config: ParserConfig) -> anyhow::Result<Vec<BoxNode>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let size = f.metadata()?.len();
    let mut r = BufReader::new(f);

    BoxParser::new(shared_registry())
        .with_config(config)
        .with_observer(TracingObserver)
        .parse_all(&mut r, size)
        .with_context(|| format!("parsing boxes of {}", path.display()))
}

/// Contents of an FLV file as read by [`read_tags`].
#[derive(Debug, Clone)]
pub struct TagFile {
    pub header: FlvHeader,
    /// Offset of the first tag, which depends on the header size the file announces.
    pub preamble_len: u64,
    pub tags: Vec<FlvTag>,
}

/// Read the preamble and every tag of an FLV file.
pub fn read_tags(path: impl AsRef<Path>, config: ReaderConfig) -> anyhow::Result<TagFile> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = TagReader::with_config(BufReader::new(f), config)
        .with_context(|| format!("reading FLV header of {}", path.display()))?;
    let header = *reader.header();
    let preamble_len = reader.preamble_len();

    let tags = reader
        .enumerate()
        .map(|(i, t)| t.with_context(|| format!("reading tag #{i}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(TagFile {
        header,
        preamble_len,
        tags,
    })
}

/// Write a complete FLV file.
pub fn write_tags(path: impl AsRef<Path>, header: FlvHeader, tags: &[FlvTag]) -> anyhow::Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = TagWriter::new(BufWriter::new(f), header)?;
    for (i, tag) in tags.iter().enumerate() {
        w.write_tag(tag).with_context(|| format!("writing tag #{i}"))?;
    }
    w.finish()?;
    Ok(())
}

/// Result of a hex dump operation containing the formatted hex output.
#[derive(Serialize)]
pub struct HexDump {
    /// Starting offset of the dumped data
    pub offset: u64,
    /// Actual number of bytes that were read and dumped
    pub length: u64,
    /// Formatted hex dump string with addresses and ASCII representation
    pub hex: String,
}

/// Hex-dump up to `max_len` bytes starting at `offset`, never reading past
/// `size`. The returned length is what was actually dumped.
pub fn hex_range<R: Read + Seek>(
    r: &mut R,
    size: u64,
    offset: u64,
    max_len: u64,
) -> anyhow::Result<HexDump> {
    let to_read = size.saturating_sub(offset).min(max_len);
    if to_read == 0 {
        return Ok(HexDump {
            offset,
            length: 0,
            hex: String::new(),
        });
    }

    let data = read_slice(r, offset, to_read)
        .with_context(|| format!("reading {to_read} bytes at {offset:#x}"))?;
    Ok(HexDump {
        offset,
        length: to_read,
        hex: hex_dump(&data, offset),
    })
}
