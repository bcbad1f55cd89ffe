pub mod api;
pub mod boxes;
pub mod error;
pub mod flv;
pub mod observer;
pub mod parser;
pub mod payload;
pub mod registry;
pub mod util;

pub use api::{HexDump, TagFile, hex_range, read_boxes, read_tags, write_tags};
pub use boxes::{BoxHeader, BoxNode, BoxType, FourCC, NodeKind, SizeMode};
pub use error::{ParseError, TagError};
pub use flv::{FlvHeader, FlvTag, ReaderConfig, TagHeader, TagReader, TagType, TagWriter};
pub use observer::{NoopObserver, ParseObserver, TracingObserver};
pub use parser::{BoxParser, ParserConfig, parse_boxes, parse_bytes, read_box_header};
pub use payload::Payload;
pub use registry::{BoxTypeDescriptor, Registry, default_registry, shared_registry};
