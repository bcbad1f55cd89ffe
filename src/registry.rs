use crate::boxes::{BoxType, FourCC};
use crate::error::{ParseError, Result};
use crate::payload::{
    BoxDecoder, Co64Decoder, CttsDecoder, FtypDecoder, MdhdDecoder, MvhdDecoder, StcoDecoder,
    StscDecoder, StsdDecoder, StssDecoder, StszDecoder, SttsDecoder, TkhdDecoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;

/// What the parser needs to know about one box type.
pub struct BoxTypeDescriptor {
    pub typ: BoxType,
    /// Legal child types in their usual order. Non-empty means container.
    pub children: &'static [BoxType],
    pub decoder: Option<Box<dyn BoxDecoder>>,
}

impl BoxTypeDescriptor {
    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_bulk_media(&self) -> bool {
        self.typ == BoxType::Mdat
    }

    pub fn allows_child(&self, child: BoxType) -> bool {
        self.children.contains(&child)
    }
}

/// Closed registry of box types keyed by their 4CC.
///
/// Only [`default_registry`] can populate one; there is no way to add types
/// from outside the crate.
pub struct Registry {
    map: HashMap<FourCC, BoxTypeDescriptor>,
}

impl Registry {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    fn with_type(
        mut self,
        typ: BoxType,
        children: &'static [BoxType],
        decoder: Option<Box<dyn BoxDecoder>>,
    ) -> Self {
        self.map.insert(
            typ.fourcc(),
            BoxTypeDescriptor {
                typ,
                children,
                decoder,
            },
        );
        self
    }

    /// Look up a type code. `offset` is only used for the error.
    pub fn lookup(&self, typ: FourCC, offset: u64) -> Result<&BoxTypeDescriptor> {
        self.map
            .get(&typ)
            .ok_or(ParseError::UnknownBoxType { typ, offset })
    }

    pub fn get(&self, typ: BoxType) -> Option<&BoxTypeDescriptor> {
        self.map.get(&typ.fourcc())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        default_registry()
    }
}

const MOOV_CHILDREN: &[BoxType] = &[BoxType::Mvhd, BoxType::Trak];
const TRAK_CHILDREN: &[BoxType] = &[BoxType::Tkhd, BoxType::Mdia];
const MDIA_CHILDREN: &[BoxType] = &[BoxType::Mdhd, BoxType::Hdlr, BoxType::Minf];
const MINF_CHILDREN: &[BoxType] = &[BoxType::Vmhd, BoxType::Smhd, BoxType::Dinf, BoxType::Stbl];
const STBL_CHILDREN: &[BoxType] = &[
    BoxType::Stsd,
    BoxType::Stts,
    BoxType::Ctts,
    BoxType::Stsc,
    BoxType::Stsz,
    BoxType::Stco,
    BoxType::Co64,
    BoxType::Stss,
];

// ---------- Default registry ----------
pub fn default_registry() -> Registry {
    Registry::new()
        .with_type(BoxType::Ftyp, &[], Some(Box::new(FtypDecoder)))
        .with_type(BoxType::Moov, MOOV_CHILDREN, None)
        .with_type(BoxType::Mvhd, &[], Some(Box::new(MvhdDecoder)))
        .with_type(BoxType::Trak, TRAK_CHILDREN, None)
        .with_type(BoxType::Tkhd, &[], Some(Box::new(TkhdDecoder)))
        .with_type(BoxType::Mdia, MDIA_CHILDREN, None)
        .with_type(BoxType::Mdhd, &[], Some(Box::new(MdhdDecoder)))
        .with_type(BoxType::Hdlr, &[], None)
        .with_type(BoxType::Minf, MINF_CHILDREN, None)
        .with_type(BoxType::Vmhd, &[], None)
        .with_type(BoxType::Smhd, &[], None)
        .with_type(BoxType::Dinf, &[], None)
        .with_type(BoxType::Stbl, STBL_CHILDREN, None)
        .with_type(BoxType::Stsd, &[], Some(Box::new(StsdDecoder)))
        .with_type(BoxType::Stts, &[], Some(Box::new(SttsDecoder)))
        .with_type(BoxType::Ctts, &[], Some(Box::new(CttsDecoder)))
        .with_type(BoxType::Stsc, &[], Some(Box::new(StscDecoder)))
        .with_type(BoxType::Stsz, &[], Some(Box::new(StszDecoder)))
        .with_type(BoxType::Stco, &[], Some(Box::new(StcoDecoder)))
        .with_type(BoxType::Co64, &[], Some(Box::new(Co64Decoder)))
        .with_type(BoxType::Stss, &[], Some(Box::new(StssDecoder)))
        .with_type(BoxType::Mdat, &[], None)
}

/// Process-wide registry, built on first use.
pub fn shared_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(default_registry)
}
