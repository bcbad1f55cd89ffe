use clap::{ArgAction, Parser};
use f4vflv::{ReaderConfig, read_tags, util::hex_dump};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "List the tags of an FLV stream")]
struct Args {
    /// FLV file path
    path: String,

    /// Fail when a tag's previous-tag-size trailer is not size + 11
    #[arg(long, action = ArgAction::SetTrue)]
    validate_trailer: bool,

    /// Hex-dump the first N payload bytes of every tag (0 = none)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Emit JSON instead of a table
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct TagRow {
    index: usize,
    offset: u64,
    tag_type: String,
    size: u32,
    timestamp: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = ReaderConfig {
        validate_trailer: args.validate_trailer,
    };
    let file = read_tags(&args.path, config)?;
    let (header, tags) = (file.header, file.tags);

    let mut offset = file.preamble_len;
    let mut rows = Vec::with_capacity(tags.len());
    for (index, tag) in tags.iter().enumerate() {
        rows.push(TagRow {
            index,
            offset,
            tag_type: format!("{:?}", tag.header.tag_type),
            size: tag.header.size,
            timestamp: tag.header.timestamp,
        });
        offset += tag.encoded_len() as u64;
    }

    if args.json {
        #[derive(Serialize)]
        struct Out<'a> {
            header: f4vflv::FlvHeader,
            tags: &'a [TagRow],
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&Out {
                header,
                tags: &rows
            })?
        );
        return Ok(());
    }

    println!(
        "FLV v{} audio={} video={} tags={}",
        header.version,
        header.has_audio,
        header.has_video,
        tags.len()
    );
    for (row, tag) in rows.iter().zip(&tags) {
        println!(
            "{:>6} {:>10} {:<14} size={:<8} ts={}",
            row.index,
            format!("{:#x}", row.offset),
            row.tag_type,
            row.size,
            row.timestamp
        );
        if args.bytes > 0 && !tag.data.is_empty() {
            let n = args.bytes.min(tag.data.len());
            print!("{}", hex_dump(&tag.data[..n], row.offset + 11));
        }
    }
    Ok(())
}
