use anyhow::{Context, Result as R, anyhow};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;
use wavcodex_lib::metadata::*;
use wavcodex_lib::*;

#[derive(Parser)]
#[command(name = "wavcodex")]
#[command(author, version, about = "Inspect and write WAV files with broadcast metadata", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show format and metadata of a WAV file
    Info(InfoArgs),

    /// Replace the broadcast (bext) metadata of a WAV file
    SetBext(SetBextArgs),

    /// Copy a WAV file with a different bit depth or channel count
    Convert(ConvertArgs),

    /// Write a sine tone
    Tone(ToneArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the WAV file
    file: String,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SetBextArgs {
    /// Path to the WAV file
    file: String,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    originator: Option<String>,

    #[arg(long)]
    originator_ref: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,

    /// HH:MM:SS
    #[arg(long)]
    time: Option<String>,

    /// Time reference in samples since midnight
    #[arg(long)]
    time_reference: Option<u64>,

    #[arg(long)]
    coding_history: Option<String>,
}

#[derive(Args)]
struct ConvertArgs {
    input: String,
    output: String,

    /// Output bit depth (8, 16, 24 or 32)
    #[arg(long)]
    bits: Option<u16>,

    /// Output channel count (1 or 2)
    #[arg(long)]
    channels: Option<u16>,
}

#[derive(Args)]
struct ToneArgs {
    output: String,

    /// Frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f64,

    /// Length in seconds
    #[arg(long, default_value_t = 1.0)]
    seconds: f64,

    /// Peak level, 0.0 to 1.0
    #[arg(long, default_value_t = 0.5)]
    amplitude: f64,

    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    #[arg(long, default_value_t = 16)]
    bits: u16,

    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Written to the bext description
    #[arg(long)]
    description: Option<String>,
}

fn main() -> R<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info(args) => run_info(args),
        Commands::SetBext(args) => run_set_bext(args),
        Commands::Convert(args) => run_convert(args),
        Commands::Tone(args) => run_tone(args),
    }
}

fn run_info(args: InfoArgs) -> R<()> {
    let info = get_file_info(&args.file).with_context(|| format!("reading {}", args.file))?;
    let metadata: BTreeMap<String, String> = read_metadata(&args.file)?.into_iter().collect();

    if args.json {
        let value = serde_json::json!({
            "path": info.path,
            "size": info.size,
            "sample_rate": info.sample_rate,
            "channels": info.channels,
            "bits_per_sample": info.bit_depth,
            "floating_point": info.floating_point,
            "frames": info.frames,
            "duration": info.duration,
            "metadata": metadata,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let encoding = if info.floating_point { "IEEE Float" } else { "PCM" };
    println!("File:        {}", info.path);
    println!("Format:      {} {}-bit", encoding, info.bit_depth);
    println!("Channels:    {}", info.channels);
    println!("Sample Rate: {} Hz", info.sample_rate);
    println!("Duration:    {} ({} frames)", info.duration, info.frames);
    println!("File Size:   {} bytes", info.size);
    for (key, value) in &metadata {
        println!("  {:<22} {}", key, value);
    }
    Ok(())
}

fn run_set_bext(args: SetBextArgs) -> R<()> {
    let mut metadata = read_metadata(&args.file).with_context(|| format!("reading {}", args.file))?;

    let updates = [
        (BWAV_DESCRIPTION, args.description),
        (BWAV_ORIGINATOR, args.originator),
        (BWAV_ORIGINATOR_REF, args.originator_ref),
        (BWAV_ORIGINATION_DATE, args.date),
        (BWAV_ORIGINATION_TIME, args.time),
        (BWAV_TIME_REFERENCE, args.time_reference.map(|t| t.to_string())),
        (BWAV_CODING_HISTORY, args.coding_history),
    ];
    for (key, value) in updates {
        if let Some(value) = value {
            metadata.insert(key.to_string(), value);
        }
    }

    match replace_metadata_in_file(&args.file, &metadata)? {
        PatchOutcome::InPlace => tracing::info!("updated bext chunk of {} in place", args.file),
        PatchOutcome::Rewritten => tracing::info!("rewrote {} with new metadata", args.file),
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> R<()> {
    let source = get_file_info(&args.input).with_context(|| format!("reading {}", args.input))?;
    let bits = args.bits.unwrap_or(source.bit_depth);
    let channels = args.channels.unwrap_or(source.channels);

    let frames = convert_file(&args.input, &args.output, bits, channels)
        .with_context(|| format!("converting {} to {}", args.input, args.output))?;
    tracing::info!(
        "wrote {} frames to {} ({} channels, {}-bit)",
        frames,
        args.output,
        channels,
        bits
    );
    Ok(())
}

fn run_tone(args: ToneArgs) -> R<()> {
    if !args.seconds.is_finite() || args.seconds <= 0.0 {
        return Err(anyhow!("tone length must be positive"));
    }

    let config = WriterConfig::new(args.sample_rate as f64, args.channels, args.bits);
    let mut metadata = MetadataMap::new();
    if let Some(description) = args.description {
        metadata.insert(BWAV_DESCRIPTION.to_string(), description);
    }

    let codec = WavCodec;
    let mut writer = codec.create_file(&args.output, config, &metadata)?;

    let total = (args.seconds * args.sample_rate as f64).round() as usize;
    let step = std::f64::consts::TAU * args.frequency / args.sample_rate as f64;
    let amplitude = args.amplitude.clamp(0.0, 1.0);

    let mut block = vec![0i32; 4096];
    let mut written = 0;
    while written < total {
        let frames = block.len().min(total - written);
        for (i, sample) in block[..frames].iter_mut().enumerate() {
            let value = amplitude * ((written + i) as f64 * step).sin();
            *sample = convert::from_f32(value as f32, config.floating_point);
        }
        let channels = vec![&block[..frames]; args.channels as usize];
        writer.write(&channels, frames)?;
        written += frames;
    }

    writer.finalize()?;
    tracing::info!("wrote {} frames of {} Hz to {}", total, args.frequency, args.output);
    Ok(())
}
