use crate::payload::Payload;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }
    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}
impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

/// The closed set of box types understood by the parser.
///
/// There is no catch-all variant: a type code outside this set
/// is rejected by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxType {
    Ftyp,
    Moov,
    Mvhd,
    Trak,
    Tkhd,
    Mdia,
    Mdhd,
    Hdlr,
    Minf,
    Vmhd,
    Smhd,
    Dinf,
    Stbl,
    Stsd,
    Stts,
    Ctts,
    Stsc,
    Stsz,
    Stco,
    Co64,
    Stss,
    Mdat,
}

impl BoxType {
    pub const ALL: [BoxType; 22] = [
        BoxType::Ftyp,
        BoxType::Moov,
        BoxType::Mvhd,
        BoxType::Trak,
        BoxType::Tkhd,
        BoxType::Mdia,
        BoxType::Mdhd,
        BoxType::Hdlr,
        BoxType::Minf,
        BoxType::Vmhd,
        BoxType::Smhd,
        BoxType::Dinf,
        BoxType::Stbl,
        BoxType::Stsd,
        BoxType::Stts,
        BoxType::Ctts,
        BoxType::Stsc,
        BoxType::Stsz,
        BoxType::Stco,
        BoxType::Co64,
        BoxType::Stss,
        BoxType::Mdat,
    ];

    pub fn from_fourcc(cc: FourCC) -> Option<Self> {
        Some(match &cc.0 {
            b"ftyp" => BoxType::Ftyp,
            b"moov" => BoxType::Moov,
            b"mvhd" => BoxType::Mvhd,
            b"trak" => BoxType::Trak,
            b"tkhd" => BoxType::Tkhd,
            b"mdia" => BoxType::Mdia,
            b"mdhd" => BoxType::Mdhd,
            b"hdlr" => BoxType::Hdlr,
            b"minf" => BoxType::Minf,
            b"vmhd" => BoxType::Vmhd,
            b"smhd" => BoxType::Smhd,
            b"dinf" => BoxType::Dinf,
            b"stbl" => BoxType::Stbl,
            b"stsd" => BoxType::Stsd,
            b"stts" => BoxType::Stts,
            b"ctts" => BoxType::Ctts,
            b"stsc" => BoxType::Stsc,
            b"stsz" => BoxType::Stsz,
            b"stco" => BoxType::Stco,
            b"co64" => BoxType::Co64,
            b"stss" => BoxType::Stss,
            b"mdat" => BoxType::Mdat,
            _ => return None,
        })
    }

    pub fn fourcc(&self) -> FourCC {
        FourCC(*match self {
            BoxType::Ftyp => b"ftyp",
            BoxType::Moov => b"moov",
            BoxType::Mvhd => b"mvhd",
            BoxType::Trak => b"trak",
            BoxType::Tkhd => b"tkhd",
            BoxType::Mdia => b"mdia",
            BoxType::Mdhd => b"mdhd",
            BoxType::Hdlr => b"hdlr",
            BoxType::Minf => b"minf",
            BoxType::Vmhd => b"vmhd",
            BoxType::Smhd => b"smhd",
            BoxType::Dinf => b"dinf",
            BoxType::Stbl => b"stbl",
            BoxType::Stsd => b"stsd",
            BoxType::Stts => b"stts",
            BoxType::Ctts => b"ctts",
            BoxType::Stsc => b"stsc",
            BoxType::Stsz => b"stsz",
            BoxType::Stco => b"stco",
            BoxType::Co64 => b"co64",
            BoxType::Stss => b"stss",
            BoxType::Mdat => b"mdat",
        })
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            BoxType::Ftyp => "File Type Box",
            BoxType::Moov => "Movie Box",
            BoxType::Mvhd => "Movie Header Box",
            BoxType::Trak => "Track Box",
            BoxType::Tkhd => "Track Header Box",
            BoxType::Mdia => "Media Box",
            BoxType::Mdhd => "Media Header Box",
            BoxType::Hdlr => "Handler Reference Box",
            BoxType::Minf => "Media Information Box",
            BoxType::Vmhd => "Video Media Header Box",
            BoxType::Smhd => "Sound Media Header Box",
            BoxType::Dinf => "Data Information Box",
            BoxType::Stbl => "Sample Table Box",
            BoxType::Stsd => "Sample Description Box",
            BoxType::Stts => "Decoding Time to Sample Box",
            BoxType::Ctts => "Composition Time to Sample Box",
            BoxType::Stsc => "Sample To Chunk Box",
            BoxType::Stsz => "Sample Size Box",
            BoxType::Stco => "Chunk Offset Box",
            BoxType::Co64 => "64-bit Chunk Offset Box",
            BoxType::Stss => "Sync Sample Box",
            BoxType::Mdat => "Media Data Box",
        }
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

impl Serialize for BoxType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.fourcc().serialize(s)
    }
}

/// How the payload length of a box was resolved from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMode {
    /// 32-bit size field, total length including the 8-byte header.
    Compact,
    /// size field == 1, followed by a 64-bit total length.
    Extended,
    /// size field == 0, payload runs to the enclosing bound.
    ToBound,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoxHeader {
    pub typ: FourCC,
    pub start: u64,       // offset of the header
    pub header_size: u64, // 8 or 16
    pub payload_size: u64,
    pub size_mode: SizeMode,
}

impl BoxHeader {
    pub fn payload_offset(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn end(&self) -> u64 {
        self.payload_offset() + self.payload_size
    }

    /// Total number of bytes the box occupies, header included.
    pub fn span(&self) -> u64 {
        self.header_size + self.payload_size
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NodeKind {
    Container(Vec<BoxNode>),
    Leaf(Payload),
    /// Bulk media payload, seeked over and never read.
    Skipped { len: u64 },
}

/// One parsed box. Built once by the parser and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct BoxNode {
    pub typ: BoxType,
    /// Offset of the first payload byte in the source.
    pub offset: u64,
    pub header: BoxHeader,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl BoxNode {
    pub fn children(&self) -> &[BoxNode] {
        match &self.kind {
            NodeKind::Container(kids) => kids,
            _ => &[],
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.kind {
            NodeKind::Leaf(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    /// First direct child of the given type.
    pub fn child(&self, typ: BoxType) -> Option<&BoxNode> {
        self.children().iter().find(|c| c.typ == typ)
    }

    /// Visit this node and all of its descendants depth-first, parents before
    /// children. `f` receives the nesting level (0 for `self`).
    pub fn walk<'a, F: FnMut(&'a BoxNode, usize)>(&'a self, f: &mut F) {
        walk_at(self, 0, f);
    }
}

fn walk_at<'a, F: FnMut(&'a BoxNode, usize)>(node: &'a BoxNode, level: usize, f: &mut F) {
    f(node, level);
    for c in node.children() {
        walk_at(c, level + 1, f);
    }
}

/// Resolve a dotted path such as `moov.trak.mdia.mdhd` against a list of
/// top-level boxes. Each segment picks the first matching box at that level.
pub fn find<'a>(roots: &'a [BoxNode], path: &str) -> Option<&'a BoxNode> {
    let mut level = roots;
    let mut found = None;
    for seg in path.split('.') {
        let typ = FourCC::from_str(seg).and_then(BoxType::from_fourcc)?;
        let node = level.iter().find(|b| b.typ == typ)?;
        level = node.children();
        found = Some(node);
    }
    found
}

/// Every node in the forest that carries a decoded payload, in stream order.
pub fn leaves(roots: &[BoxNode]) -> Vec<&BoxNode> {
    let mut out = Vec::new();
    for r in roots {
        r.walk(&mut |b, _| {
            if b.payload().is_some() {
                out.push(b);
            }
        });
    }
    out
}
