#![allow(dead_code)]

//! Byte builders for hand-made box trees.

pub fn leaf(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn container(typ: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = children.concat();
    leaf(typ, &body)
}

/// version + 24-bit flags prefix of a full box.
pub fn full(version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut v = vec![version];
    v.extend_from_slice(&flags.to_be_bytes()[1..]);
    v.extend_from_slice(body);
    v
}

pub fn ftyp() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"f4v ");
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(b"isom");
    p.extend_from_slice(b"mp42");
    leaf(b"ftyp", &p)
}

pub fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&0u32.to_be_bytes()); // creation
    b.extend_from_slice(&0u32.to_be_bytes()); // modification
    b.extend_from_slice(&timescale.to_be_bytes());
    b.extend_from_slice(&duration.to_be_bytes());
    b.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    b.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    b.extend_from_slice(&[0u8; 10 + 36 + 24]);
    b.extend_from_slice(&2u32.to_be_bytes()); // next_track_id
    leaf(b"mvhd", &full(0, 0, &b))
}

pub fn tkhd(track_id: u32, duration: u32, width: u16, height: u16) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&0u32.to_be_bytes());
    b.extend_from_slice(&0u32.to_be_bytes());
    b.extend_from_slice(&track_id.to_be_bytes());
    b.extend_from_slice(&0u32.to_be_bytes());
    b.extend_from_slice(&duration.to_be_bytes());
    b.extend_from_slice(&[0u8; 8]);
    b.extend_from_slice(&0i16.to_be_bytes()); // layer
    b.extend_from_slice(&0i16.to_be_bytes()); // alternate_group
    b.extend_from_slice(&0u16.to_be_bytes()); // volume
    b.extend_from_slice(&0u16.to_be_bytes());
    b.extend_from_slice(&[0u8; 36]);
    b.extend_from_slice(&((width as u32) << 16).to_be_bytes());
    b.extend_from_slice(&((height as u32) << 16).to_be_bytes());
    leaf(b"tkhd", &full(0, 3, &b))
}

pub fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&0u32.to_be_bytes());
    b.extend_from_slice(&0u32.to_be_bytes());
    b.extend_from_slice(&timescale.to_be_bytes());
    b.extend_from_slice(&duration.to_be_bytes());
    b.extend_from_slice(&0x55c4u16.to_be_bytes()); // "und"
    b.extend_from_slice(&0u16.to_be_bytes());
    leaf(b"mdhd", &full(0, 0, &b))
}

pub fn table(typ: &[u8; 4], rows: &[&[u32]]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&(rows.len() as u32).to_be_bytes());
    for row in rows {
        for v in *row {
            b.extend_from_slice(&v.to_be_bytes());
        }
    }
    leaf(typ, &full(0, 0, &b))
}

/// A small but complete movie: ftyp, moov with one video track, mdat.
pub fn movie() -> Vec<u8> {
    let stbl = container(
        b"stbl",
        &[
            table(b"stts", &[&[10, 1000]]),
            table(b"stsc", &[&[1, 10, 1]]),
            table(b"stco", &[&[1024]]),
        ],
    );
    let minf = container(b"minf", &[leaf(b"vmhd", &full(0, 1, &[0; 8])), stbl]);
    let mdia = container(
        b"mdia",
        &[mdhd(1000, 10_000), leaf(b"hdlr", &full(0, 0, b"\0\0\0\0vide")), minf],
    );
    let trak = container(b"trak", &[tkhd(1, 10_000, 640, 360), mdia]);
    let moov = container(b"moov", &[mvhd(1000, 10_000), trak]);
    [ftyp(), moov, leaf(b"mdat", &[0xAB; 64])].concat()
}
