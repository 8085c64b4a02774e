use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pendant::audio::input::ChunkSource;
use pendant::audio::wav::samples_to_wav;
use pendant::audio::{MicChunkSource, list_devices, play_wav};
use pendant::config::AudioConfig;
use pendant::speech::TtsClient;
use pendant::{Config, Daemon, Running};

/// Pendant - wearable voice assistant daemon
#[derive(Parser)]
#[command(name = "pendant", version, about)]
struct Cli {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(short, long, env = "PENDANT_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// List audio devices
    ListDevices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,pendant=info",
        1 => "info,pendant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(cli.config.as_deref(), &text).await,
            Command::ListDevices => cmd_list_devices(),
        };
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::info!("starting pendant daemon");

    let daemon = Daemon::new(config);
    daemon.run().await?;

    Ok(())
}

/// Test microphone input with a level meter
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let audio = AudioConfig::default();
    let mut source = MicChunkSource::open(&audio)?;
    println!("Sample rate: {} Hz", audio.sample_rate);
    println!("---");

    let chunks_per_sec = audio.sample_rate as usize / audio.chunk_size;
    for i in 0..duration {
        let mut peak = 0i16;
        let mut level_sum = 0f32;
        let mut seen = 0usize;

        for _ in 0..chunks_per_sec {
            if let Some(chunk) = source.next_chunk(Duration::from_millis(50)) {
                peak = peak.max(chunk.iter().map(|s| s.saturating_abs()).max().unwrap_or(0));
                #[allow(clippy::cast_precision_loss)]
                let mean = chunk.iter().map(|&s| f32::from(s).abs()).sum::<f32>()
                    / chunk.len() as f32;
                level_sum += mean;
                seen += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let level = if seen == 0 { 0.0 } else { level_sum / seen as f32 };

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = ((level / 100.0) as usize).min(50);
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] mean: {level:7.1} | peak: {peak:6} | [{meter}]", i + 1);
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If levels stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pendant list-devices");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let audio = AudioConfig::default();
    let sample_rate = audio.sample_rate;
    let frequency = 440.0_f32;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let samples: Vec<i16> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let v = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3; // 30% volume
            (v * 32767.0) as i16
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    let wav = samples_to_wav(&samples, sample_rate, 1)?;
    play_wav(&wav, &audio, &Running::new())?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output end to end
async fn test_tts(config_path: Option<&std::path::Path>, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(config_path)?;
    let tts = TtsClient::new(&config);

    println!("Synthesizing speech...");
    let wav = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", wav.len());

    println!("Playing audio...");
    play_wav(&wav, &config.audio, &Running::new())?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// List audio devices
fn cmd_list_devices() -> anyhow::Result<()> {
    let (inputs, outputs) = list_devices()?;

    println!("Input devices:");
    for name in &inputs {
        println!("  {name}");
    }
    println!("\nOutput devices:");
    for name in &outputs {
        println!("  {name}");
    }

    Ok(())
}
