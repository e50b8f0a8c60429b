//! Feature-stream synthesis demo.
//!
//! Reads a raw stream of 32-bit little-endian float feature frames
//! (38 floats per frame) and writes raw 16-bit signed little-endian PCM
//! at 16 kHz, one 160-sample frame per feature frame.
//!
//! Play the output with `ffplay -f s16le -ar 16000 -ac 1 <file>`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::Parser;
use lpcnet::{LPCNetState, FRAME_SIZE, NB_FEATURES};

#[derive(Parser, Debug)]
#[command(about = "Synthesize speech from a raw float feature stream")]
struct Cli {
    /// Input feature file (f32le, 38 floats per frame)
    input: PathBuf,

    /// Output PCM file (s16le, 16 kHz mono)
    output: PathBuf,

    /// Model weight blob; without it the synthesizer runs unloaded
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Sampling seed
    #[arg(short, long)]
    seed: Option<u64>,
}

fn run(cli: Cli) -> std::io::Result<()> {
    let mut lpcnet = match cli.seed {
        Some(seed) => LPCNetState::with_seed(seed),
        None => LPCNetState::new(),
    };

    if let Some(path) = &cli.weights {
        let mut blob = Vec::new();
        File::open(path)?.read_to_end(&mut blob)?;
        lpcnet
            .load_model(&blob)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    }

    let mut input = BufReader::new(File::open(&cli.input)?);
    let mut output = BufWriter::new(File::create(&cli.output)?);

    let mut features = [0.0f32; NB_FEATURES];
    let mut pcm = [0i16; FRAME_SIZE];
    let mut frames = 0usize;
    loop {
        match input.read_f32_into::<LittleEndian>(&mut features) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        lpcnet.synthesize(&features, &mut pcm);
        for &s in pcm.iter() {
            output.write_i16::<LittleEndian>(s)?;
        }
        frames += 1;
    }
    eprintln!("synthesized {} frames ({} samples)", frames, frames * FRAME_SIZE);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
