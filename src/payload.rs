use crate::boxes::{BoxHeader, BoxType, FourCC};
use byteorder::{BigEndian, ReadBytesExt};
use serde::{Serialize, Serializer};
use std::io::{self, Read};

/// Decoded payload of a leaf box.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Payload {
    FileType(FtypData),
    MovieHeader(MvhdData),
    TrackHeader(TkhdData),
    MediaHeader(MdhdData),
    SampleDescription(StsdData),
    TimeToSample(SttsData),
    CompositionOffset(CttsData),
    SampleToChunk(StscData),
    SampleSize(StszData),
    ChunkOffset(StcoData),
    ChunkOffset64(Co64Data),
    SyncSample(StssData),
    /// A registered leaf type with no dedicated decoder.
    Opaque {
        typ: BoxType,
        #[serde(serialize_with = "as_hex")]
        data: Vec<u8>,
    },
}

fn as_hex<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(data))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FtypData {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MvhdData {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: u32,   // 16.16
    pub volume: u16, // 8.8
    pub next_track_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TkhdData {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: u16,
    pub width: u32,  // 16.16
    pub height: u32, // 16.16
}

impl TkhdData {
    pub fn width_px(&self) -> f32 {
        self.width as f32 / 65536.0
    }
    pub fn height_px(&self) -> f32 {
        self.height as f32 / 65536.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MdhdData {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StsdData {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SampleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEntry {
    pub size: u32,
    pub format: FourCC,
    pub data_reference_index: u16,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub channel_count: Option<u16>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SttsData {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SttsEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CttsData {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<CttsEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: i64, // signed in version 1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StscData {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<StscEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StszData {
    pub version: u8,
    pub flags: u32,
    pub sample_size: u32,
    pub sample_count: u32,
    pub sample_sizes: Vec<u32>, // empty if sample_size > 0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StcoData {
    pub version: u8,
    pub flags: u32,
    pub chunk_offsets: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Co64Data {
    pub version: u8,
    pub flags: u32,
    pub chunk_offsets: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StssData {
    pub version: u8,
    pub flags: u32,
    pub sample_numbers: Vec<u32>,
}

/// Decodes the payload bytes of one leaf box type.
///
/// `r` yields exactly the payload of the box described by `hdr`. Running out
/// of bytes is reported as an `UnexpectedEof` error and fails the parse.
pub trait BoxDecoder: Send + Sync {
    fn decode(&self, r: &mut dyn Read, hdr: &BoxHeader) -> io::Result<Payload>;
}

// ---------- Helpers ----------

fn full_box_header(r: &mut dyn Read) -> io::Result<(u8, u32)> {
    let version = r.read_u8()?;
    let flags = r.read_u24::<BigEndian>()?;
    Ok((version, flags))
}

fn fourcc(r: &mut dyn Read) -> io::Result<FourCC> {
    let mut cc = [0u8; 4];
    r.read_exact(&mut cc)?;
    Ok(FourCC(cc))
}

fn skip(r: &mut dyn Read, n: u64) -> io::Result<()> {
    let copied = io::copy(&mut (&mut *r).take(n), &mut io::sink())?;
    if copied < n {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Reads a 32-bit field in version 0 boxes and a 64-bit one in version 1.
fn versioned_u64(r: &mut dyn Read, version: u8) -> io::Result<u64> {
    if version == 1 {
        r.read_u64::<BigEndian>()
    } else {
        Ok(r.read_u32::<BigEndian>()? as u64)
    }
}

fn lang_from_u16(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

// ---------- Decoders ----------

pub struct FtypDecoder;

impl BoxDecoder for FtypDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let major_brand = fourcc(r)?;
        let minor_version = r.read_u32::<BigEndian>()?;

        let mut rest = Vec::new();
        r.read_to_end(&mut rest)?;
        let compatible_brands = rest
            .chunks_exact(4)
            .map(|c| FourCC([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Payload::FileType(FtypData {
            major_brand,
            minor_version,
            compatible_brands,
        }))
    }
}

pub struct MvhdDecoder;

impl BoxDecoder for MvhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let creation_time = versioned_u64(r, version)?;
        let modification_time = versioned_u64(r, version)?;
        let timescale = r.read_u32::<BigEndian>()?;
        let duration = versioned_u64(r, version)?;
        let rate = r.read_u32::<BigEndian>()?;
        let volume = r.read_u16::<BigEndian>()?;
        // reserved (10), matrix (36), pre_defined (24)
        skip(r, 10 + 36 + 24)?;
        let next_track_id = r.read_u32::<BigEndian>()?;

        Ok(Payload::MovieHeader(MvhdData {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            next_track_id,
        }))
    }
}

pub struct TkhdDecoder;

impl BoxDecoder for TkhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let creation_time = versioned_u64(r, version)?;
        let modification_time = versioned_u64(r, version)?;
        let track_id = r.read_u32::<BigEndian>()?;
        let _reserved = r.read_u32::<BigEndian>()?;
        let duration = versioned_u64(r, version)?;
        skip(r, 8)?;
        let layer = r.read_i16::<BigEndian>()?;
        let alternate_group = r.read_i16::<BigEndian>()?;
        let volume = r.read_u16::<BigEndian>()?;
        let _reserved = r.read_u16::<BigEndian>()?;
        skip(r, 36)?; // matrix
        let width = r.read_u32::<BigEndian>()?;
        let height = r.read_u32::<BigEndian>()?;

        Ok(Payload::TrackHeader(TkhdData {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            width,
            height,
        }))
    }
}

pub struct MdhdDecoder;

impl BoxDecoder for MdhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let creation_time = versioned_u64(r, version)?;
        let modification_time = versioned_u64(r, version)?;
        let timescale = r.read_u32::<BigEndian>()?;
        let duration = versioned_u64(r, version)?;
        let language = lang_from_u16(r.read_u16::<BigEndian>()?);
        let _pre_defined = r.read_u16::<BigEndian>()?;

        Ok(Payload::MediaHeader(MdhdData {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            language,
        }))
    }
}

const VISUAL_FORMATS: [&[u8; 4]; 6] = [b"avc1", b"hvc1", b"hev1", b"vp09", b"av01", b"mp4v"];
const AUDIO_FORMATS: [&[u8; 4]; 4] = [b"mp4a", b"ac-3", b"ec-3", b".mp3"];

pub struct StsdDecoder;

impl BoxDecoder for StsdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;

        let mut entries = Vec::new();
        for _ in 0..entry_count {
            let size = r.read_u32::<BigEndian>()?;
            let format = fourcc(r)?;
            // 6 reserved bytes precede data_reference_index
            skip(r, 6)?;
            let data_reference_index = r.read_u16::<BigEndian>()?;
            let mut consumed: u32 = 16;

            let mut entry = SampleEntry {
                size,
                format,
                data_reference_index,
                width: None,
                height: None,
                channel_count: None,
                sample_rate: None,
            };

            if VISUAL_FORMATS.contains(&&format.0) {
                // pre_defined / reserved
                skip(r, 16)?;
                entry.width = Some(r.read_u16::<BigEndian>()?);
                entry.height = Some(r.read_u16::<BigEndian>()?);
                consumed += 20;
            } else if AUDIO_FORMATS.contains(&&format.0) {
                skip(r, 8)?;
                entry.channel_count = Some(r.read_u16::<BigEndian>()?);
                let _sample_size = r.read_u16::<BigEndian>()?;
                skip(r, 4)?;
                entry.sample_rate = Some(r.read_u32::<BigEndian>()? >> 16);
                consumed += 20;
            }

            if size < consumed {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("sample entry {format} declares {size} bytes, needs {consumed}"),
                ));
            }
            // codec configuration boxes (avcC, esds, ...) are not interpreted
            skip(r, (size - consumed) as u64)?;
            entries.push(entry);
        }

        Ok(Payload::SampleDescription(StsdData {
            version,
            flags,
            entries,
        }))
    }
}

pub struct SttsDecoder;

impl BoxDecoder for SttsDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;
        let mut entries = Vec::new();
        for _ in 0..entry_count {
            let sample_count = r.read_u32::<BigEndian>()?;
            let sample_delta = r.read_u32::<BigEndian>()?;
            entries.push(SttsEntry {
                sample_count,
                sample_delta,
            });
        }
        Ok(Payload::TimeToSample(SttsData {
            version,
            flags,
            entries,
        }))
    }
}

pub struct CttsDecoder;

impl BoxDecoder for CttsDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;
        let mut entries = Vec::new();
        for _ in 0..entry_count {
            let sample_count = r.read_u32::<BigEndian>()?;
            let sample_offset = if version == 1 {
                r.read_i32::<BigEndian>()? as i64
            } else {
                r.read_u32::<BigEndian>()? as i64
            };
            entries.push(CttsEntry {
                sample_count,
                sample_offset,
            });
        }
        Ok(Payload::CompositionOffset(CttsData {
            version,
            flags,
            entries,
        }))
    }
}

pub struct StscDecoder;

impl BoxDecoder for StscDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;
        let mut entries = Vec::new();
        for _ in 0..entry_count {
            entries.push(StscEntry {
                first_chunk: r.read_u32::<BigEndian>()?,
                samples_per_chunk: r.read_u32::<BigEndian>()?,
                sample_description_index: r.read_u32::<BigEndian>()?,
            });
        }
        Ok(Payload::SampleToChunk(StscData {
            version,
            flags,
            entries,
        }))
    }
}

pub struct StszDecoder;

impl BoxDecoder for StszDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let sample_size = r.read_u32::<BigEndian>()?;
        let sample_count = r.read_u32::<BigEndian>()?;
        let mut sample_sizes = Vec::new();

        // per-sample table only when there is no constant size
        if sample_size == 0 {
            for _ in 0..sample_count {
                sample_sizes.push(r.read_u32::<BigEndian>()?);
            }
        }

        Ok(Payload::SampleSize(StszData {
            version,
            flags,
            sample_size,
            sample_count,
            sample_sizes,
        }))
    }
}

pub struct StcoDecoder;

impl BoxDecoder for StcoDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;
        let mut chunk_offsets = Vec::new();
        for _ in 0..entry_count {
            chunk_offsets.push(r.read_u32::<BigEndian>()?);
        }
        Ok(Payload::ChunkOffset(StcoData {
            version,
            flags,
            chunk_offsets,
        }))
    }
}

pub struct Co64Decoder;

impl BoxDecoder for Co64Decoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;
        let mut chunk_offsets = Vec::new();
        for _ in 0..entry_count {
            chunk_offsets.push(r.read_u64::<BigEndian>()?);
        }
        Ok(Payload::ChunkOffset64(Co64Data {
            version,
            flags,
            chunk_offsets,
        }))
    }
}

pub struct StssDecoder;

impl BoxDecoder for StssDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> io::Result<Payload> {
        let (version, flags) = full_box_header(r)?;
        let entry_count = r.read_u32::<BigEndian>()?;
        let mut sample_numbers = Vec::new();
        for _ in 0..entry_count {
            sample_numbers.push(r.read_u32::<BigEndian>()?);
        }
        Ok(Payload::SyncSample(StssData {
            version,
            flags,
            sample_numbers,
        }))
    }
}
