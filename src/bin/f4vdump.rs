use clap::{ArgAction, Parser};
use f4vflv::{
    BoxNode, NodeKind, ParserConfig, Payload,
    boxes::find,
    read_boxes,
    util::hex_dump,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "F4V/MP4 box tree explorer")]
struct Args {
    /// F4V/MP4 file path
    path: String,

    /// Only print the subtree at a dotted path (e.g. moov.trak.mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Refuse input nested deeper than this
    #[arg(long, default_value_t = f4vflv::parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Fail on boxes that appear under a parent not listing them
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Hex-dump payloads that have no decoder
    #[arg(long, action = ArgAction::SetTrue)]
    raw: bool,

    /// Emit JSON instead of human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = ParserConfig {
        max_depth: args.max_depth,
        strict_children: args.strict,
    };
    let top = read_boxes(&args.path, config)?;

    let targets: Vec<&BoxNode> = match &args.filter {
        Some(path) => match find(&top, path) {
            Some(b) => vec![b],
            None => anyhow::bail!("no box at path '{path}'"),
        },
        None => top.iter().collect(),
    };

    // JSON mode: output JSON and exit
    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    for b in targets {
        print_box(b, 0, args.raw);
    }
    Ok(())
}

// ---------- Human-readable tree ----------

fn print_box(b: &BoxNode, depth: usize, raw: bool) {
    let indent = "  ".repeat(depth);
    let hdr = &b.header;
    let line = format!(
        "{indent}{:>8} {:>10} {} ({})",
        format!("{:#x}", hdr.start),
        hdr.span(),
        b.typ,
        b.typ.full_name()
    );
    match &b.kind {
        NodeKind::Container(kids) => {
            println!("{line} [{} children]", kids.len());
            for c in kids {
                print_box(c, depth + 1, raw);
            }
        }
        NodeKind::Skipped { len } => println!("{line} [{len} media bytes skipped]"),
        NodeKind::Leaf(p) => {
            println!("{line}");
            println!("{indent}        -> {}", summary(p));
            if let (true, Payload::Opaque { data, .. }) = (raw, p) {
                for l in hex_dump(data, b.offset).lines() {
                    println!("{indent}        {l}");
                }
            }
        }
    }
}

fn summary(p: &Payload) -> String {
    match p {
        Payload::FileType(d) => format!(
            "major={} minor={} compatible={:?}",
            d.major_brand, d.minor_version, d.compatible_brands
        ),
        Payload::MovieHeader(d) => format!(
            "timescale={} duration={} next_track_id={}",
            d.timescale, d.duration, d.next_track_id
        ),
        Payload::TrackHeader(d) => format!(
            "track_id={} duration={} width={} height={}",
            d.track_id,
            d.duration,
            d.width_px(),
            d.height_px()
        ),
        Payload::MediaHeader(d) => format!(
            "timescale={} duration={} language={}",
            d.timescale, d.duration, d.language
        ),
        Payload::SampleDescription(d) => {
            let formats: Vec<String> = d.entries.iter().map(|e| e.format.to_string()).collect();
            format!("entries={} formats={:?}", d.entries.len(), formats)
        }
        Payload::TimeToSample(d) => format!("entries={}", d.entries.len()),
        Payload::CompositionOffset(d) => format!("entries={}", d.entries.len()),
        Payload::SampleToChunk(d) => format!("entries={}", d.entries.len()),
        Payload::SampleSize(d) => format!(
            "sample_size={} sample_count={}",
            d.sample_size, d.sample_count
        ),
        Payload::ChunkOffset(d) => format!("chunks={}", d.chunk_offsets.len()),
        Payload::ChunkOffset64(d) => format!("chunks={}", d.chunk_offsets.len()),
        Payload::SyncSample(d) => format!("sync_samples={}", d.sample_numbers.len()),
        Payload::Opaque { data, .. } => format!("{} bytes (not decoded)", data.len()),
    }
}
