use clap::{ArgAction, Parser, Subcommand};
use hound::{SampleFormat, WavSpec};
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonepair_core::payload::build_payload;
use tonepair_core::{
    build_tone_sequence, AudioModemError, Decoder, ModemConfig, Transmitter, TONE_SLOTS,
};

#[derive(Parser)]
#[command(name = "tonepair")]
#[command(about = "Near-ultrasonic tone-pair modem for short numeric codes")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a 32-bit value to a WAV audio file
    Encode {
        /// Value to send, decimal or 0x-prefixed hex
        #[arg(value_name = "VALUE", value_parser = parse_value)]
        value: u32,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Peak amplitude of the tones (0, 1]
        #[arg(short, long, default_value = "0.5")]
        amplitude: f32,

        /// Silence before and after the transmission, in milliseconds
        #[arg(short, long, default_value = "250")]
        padding_ms: u32,
    },

    /// Decode every value found in a WAV audio file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },

    /// Print the payload symbols and tone sequence for a value
    Symbols {
        /// Value to inspect, decimal or 0x-prefixed hex
        #[arg(value_name = "VALUE", value_parser = parse_value)]
        value: u32,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Modem(#[from] AudioModemError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("No value decoded from {0}")]
    NothingDecoded(String),
}

fn parse_value(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid value '{}': {}", text, e))
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Encode {
            value,
            output,
            amplitude,
            padding_ms,
        } => encode_command(value, &output, amplitude, padding_ms),
        Commands::Decode { input } => decode_command(&input),
        Commands::Symbols { value } => symbols_command(value),
    }
}

fn encode_command(
    value: u32,
    output_path: &Path,
    amplitude: f32,
    padding_ms: u32,
) -> Result<(), CliError> {
    let config = ModemConfig::default();
    let mut tx = Transmitter::new(&config, amplitude)?;

    let padding = (config.sample_rate * padding_ms as f32 / 1000.0) as usize;
    let mut samples = vec![0.0f32; padding];
    samples.extend(tx.render(value)?);
    samples.extend(std::iter::repeat(0.0f32).take(padding));
    println!(
        "Encoded 0x{:08X} to {} audio samples ({:.2} s of tones)",
        value,
        samples.len(),
        config.transmission_secs()
    );

    let spec = WavSpec {
        channels: 1,
        sample_rate: config.sample_rate as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let file = File::create(output_path).map_err(hound::Error::IoError)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    println!("Wrote {}", output_path.display());
    Ok(())
}

fn read_wav(input_path: &Path) -> Result<(WavSpec, Vec<f32>), CliError> {
    let mut reader = hound::WavReader::open(input_path)?;
    let spec = reader.spec();
    info!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(CliError::UnsupportedFormat(format!(
                "{:?} with {} bits per sample",
                format, bits
            )))
        }
    };

    // downmix to mono
    let channels = spec.channels.max(1) as usize;
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok((spec, mono))
}

fn decode_command(input_path: &Path) -> Result<(), CliError> {
    let (spec, samples) = read_wav(input_path)?;

    let config = ModemConfig {
        sample_rate: spec.sample_rate as f32,
        ..ModemConfig::default()
    };
    let mut decoder = Decoder::new(config)?;

    let block_len = decoder.config().block_len;
    let mut found = 0;
    for (i, block) in samples.chunks_exact(block_len).enumerate() {
        let report = decoder.process_block(block)?;
        if report.synced {
            debug!("start marker recognised at block {}", i);
        }
        if let Some(value) = report.value {
            let seconds = (i * block_len) as f32 / spec.sample_rate as f32;
            println!("Decoded: 0x{:08X} ({}) at {:.2} s", value, value, seconds);
            found += 1;
        }
    }

    if found == 0 {
        return Err(CliError::NothingDecoded(input_path.display().to_string()));
    }
    Ok(())
}

fn symbols_command(value: u32) -> Result<(), CliError> {
    let config = ModemConfig::default();
    let payload = build_payload(value)?;
    let sequence = build_tone_sequence(value)?;

    let symbols: String = payload.iter().map(|s| format!("{:X}", s)).collect();
    println!("Value:    0x{:08X}", value);
    println!("Payload:  {} (parity, checksum, data)", symbols);
    println!("Tones:    {} slots", TONE_SLOTS);
    for (slot, pair) in sequence.chunks(2).enumerate() {
        let label = if slot == 0 {
            "start".to_string()
        } else {
            format!("{:X}", payload[slot - 1])
        };
        println!(
            "  {:>5}  {} {}  ({:.0} Hz, {:.0} Hz)",
            label, pair[0], pair[1], config.tones[pair[0]], config.tones[pair[1]]
        );
    }
    Ok(())
}
