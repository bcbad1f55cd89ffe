mod common;

use common::{full, leaf, mdhd, table};
use f4vflv::{BoxType, FourCC, ParseError, Payload, parse_bytes};

fn decode_one(data: &[u8]) -> Payload {
    let mut boxes = parse_bytes(data).expect("parse failed");
    assert_eq!(boxes.len(), 1);
    boxes
        .pop()
        .and_then(|b| b.payload().cloned())
        .expect("leaf without payload")
}

#[test]
fn ftyp_with_compatible_brands() {
    match decode_one(&common::ftyp()) {
        Payload::FileType(f) => {
            assert_eq!(f.major_brand, FourCC(*b"f4v "));
            assert_eq!(f.minor_version, 0);
            assert_eq!(f.compatible_brands, vec![FourCC(*b"isom"), FourCC(*b"mp42")]);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn mvhd_version_one_uses_wide_fields() {
    let mut b = Vec::new();
    b.extend_from_slice(&1u64.to_be_bytes());
    b.extend_from_slice(&2u64.to_be_bytes());
    b.extend_from_slice(&90_000u32.to_be_bytes());
    b.extend_from_slice(&(u32::MAX as u64 + 10).to_be_bytes());
    b.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    b.extend_from_slice(&0x0100u16.to_be_bytes());
    b.extend_from_slice(&[0; 70]);
    b.extend_from_slice(&7u32.to_be_bytes());

    match decode_one(&leaf(b"mvhd", &full(1, 0, &b))) {
        Payload::MovieHeader(m) => {
            assert_eq!(m.version, 1);
            assert_eq!(m.creation_time, 1);
            assert_eq!(m.modification_time, 2);
            assert_eq!(m.timescale, 90_000);
            assert_eq!(m.duration, u32::MAX as u64 + 10);
            assert_eq!(m.rate, 0x0001_0000);
            assert_eq!(m.next_track_id, 7);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn mdhd_language_code() {
    match decode_one(&mdhd(48_000, 96_000)) {
        Payload::MediaHeader(m) => {
            assert_eq!(m.timescale, 48_000);
            assert_eq!(m.duration, 96_000);
            assert_eq!(m.language, "und");
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn time_to_sample_entries() {
    match decode_one(&table(b"stts", &[&[3, 1000], &[1, 500]])) {
        Payload::TimeToSample(t) => {
            let rows: Vec<(u32, u32)> =
                t.entries.iter().map(|e| (e.sample_count, e.sample_delta)).collect();
            assert_eq!(rows, vec![(3, 1000), (1, 500)]);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn composition_offsets_are_signed_in_version_one() {
    let mut b = Vec::new();
    b.extend_from_slice(&2u32.to_be_bytes());
    b.extend_from_slice(&4u32.to_be_bytes());
    b.extend_from_slice(&(-2i32).to_be_bytes());
    b.extend_from_slice(&1u32.to_be_bytes());
    b.extend_from_slice(&6i32.to_be_bytes());

    match decode_one(&leaf(b"ctts", &full(1, 0, &b))) {
        Payload::CompositionOffset(c) => {
            assert_eq!(c.version, 1);
            assert_eq!(c.entries[0].sample_count, 4);
            assert_eq!(c.entries[0].sample_offset, -2);
            assert_eq!(c.entries[1].sample_offset, 6);
        }
        other => panic!("{other:?}"),
    }

    // version 0 reads the same bits as unsigned
    match decode_one(&leaf(b"ctts", &full(0, 0, &b))) {
        Payload::CompositionOffset(c) => {
            assert_eq!(c.entries[0].sample_offset, u32::MAX as i64 - 1);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn sample_to_chunk_rows() {
    match decode_one(&table(b"stsc", &[&[1, 10, 1], &[5, 3, 2]])) {
        Payload::SampleToChunk(s) => {
            assert_eq!(s.entries.len(), 2);
            assert_eq!(s.entries[1].first_chunk, 5);
            assert_eq!(s.entries[1].samples_per_chunk, 3);
            assert_eq!(s.entries[1].sample_description_index, 2);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn sample_sizes_constant_and_variable() {
    let mut constant = Vec::new();
    constant.extend_from_slice(&512u32.to_be_bytes());
    constant.extend_from_slice(&3u32.to_be_bytes());
    match decode_one(&leaf(b"stsz", &full(0, 0, &constant))) {
        Payload::SampleSize(s) => {
            assert_eq!(s.sample_size, 512);
            assert_eq!(s.sample_count, 3);
            assert!(s.sample_sizes.is_empty());
        }
        other => panic!("{other:?}"),
    }

    let mut variable = Vec::new();
    variable.extend_from_slice(&0u32.to_be_bytes());
    variable.extend_from_slice(&2u32.to_be_bytes());
    variable.extend_from_slice(&100u32.to_be_bytes());
    variable.extend_from_slice(&200u32.to_be_bytes());
    match decode_one(&leaf(b"stsz", &full(0, 0, &variable))) {
        Payload::SampleSize(s) => assert_eq!(s.sample_sizes, vec![100, 200]),
        other => panic!("{other:?}"),
    }
}

#[test]
fn chunk_offsets_32_and_64_bit() {
    match decode_one(&table(b"stco", &[&[48], &[4096]])) {
        Payload::ChunkOffset(c) => assert_eq!(c.chunk_offsets, vec![48, 4096]),
        other => panic!("{other:?}"),
    }

    let big = 5_000_000_000u64;
    let mut b = Vec::new();
    b.extend_from_slice(&1u32.to_be_bytes());
    b.extend_from_slice(&big.to_be_bytes());
    match decode_one(&leaf(b"co64", &full(0, 0, &b))) {
        Payload::ChunkOffset64(c) => assert_eq!(c.chunk_offsets, vec![big]),
        other => panic!("{other:?}"),
    }
}

#[test]
fn sync_samples() {
    match decode_one(&table(b"stss", &[&[1], &[31], &[61]])) {
        Payload::SyncSample(s) => assert_eq!(s.sample_numbers, vec![1, 31, 61]),
        other => panic!("{other:?}"),
    }
}

fn sample_entry(format: &[u8; 4], body: &[u8], trailing: usize) -> Vec<u8> {
    let size = (16 + body.len() + trailing) as u32;
    let mut e = Vec::new();
    e.extend_from_slice(&size.to_be_bytes());
    e.extend_from_slice(format);
    e.extend_from_slice(&[0; 6]);
    e.extend_from_slice(&1u16.to_be_bytes());
    e.extend_from_slice(body);
    e.extend_from_slice(&vec![0xCC; trailing]);
    e
}

#[test]
fn sample_descriptions_for_video_and_audio() {
    let mut visual = vec![0u8; 16];
    visual.extend_from_slice(&1280u16.to_be_bytes());
    visual.extend_from_slice(&720u16.to_be_bytes());

    let mut audio = vec![0u8; 8];
    audio.extend_from_slice(&2u16.to_be_bytes());
    audio.extend_from_slice(&16u16.to_be_bytes());
    audio.extend_from_slice(&[0; 4]);
    audio.extend_from_slice(&(44_100u32 << 16).to_be_bytes());

    let mut b = 3u32.to_be_bytes().to_vec();
    b.extend(sample_entry(b"avc1", &visual, 20));
    b.extend(sample_entry(b"mp4a", &audio, 0));
    b.extend(sample_entry(b"tx3g", &[], 8));

    match decode_one(&leaf(b"stsd", &full(0, 0, &b))) {
        Payload::SampleDescription(s) => {
            assert_eq!(s.entries.len(), 3);
            let v = &s.entries[0];
            assert_eq!(v.format, FourCC(*b"avc1"));
            assert_eq!(v.size, 56);
            assert_eq!(v.data_reference_index, 1);
            assert_eq!((v.width, v.height), (Some(1280), Some(720)));
            assert_eq!(v.channel_count, None);

            let a = &s.entries[1];
            assert_eq!(a.channel_count, Some(2));
            assert_eq!(a.sample_rate, Some(44_100));
            assert_eq!(a.width, None);

            let t = &s.entries[2];
            assert_eq!(t.format, FourCC(*b"tx3g"));
            assert_eq!((t.width, t.channel_count), (None, None));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn sample_entry_smaller_than_its_fields_fails() {
    let mut entry = sample_entry(b"avc1", &[0; 20], 0);
    entry[0..4].copy_from_slice(&20u32.to_be_bytes());
    let mut b = 1u32.to_be_bytes().to_vec();
    b.extend(entry);

    match parse_bytes(&leaf(b"stsd", &full(0, 0, &b))).unwrap_err() {
        ParseError::Decode { typ, source } => {
            assert_eq!(typ, BoxType::Stsd);
            assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn payload_json_is_tagged_by_format() {
    let v = serde_json::to_value(decode_one(&table(b"stco", &[&[48]]))).unwrap();
    assert_eq!(v["format"], "chunk_offset");
    assert_eq!(v["chunk_offsets"][0], 48);

    let hdlr = decode_one(&leaf(b"hdlr", &[0xde, 0xad]));
    let v = serde_json::to_value(hdlr).unwrap();
    assert_eq!(v["format"], "opaque");
    assert_eq!(v["typ"], "hdlr");
    assert_eq!(v["data"], "dead");
}
