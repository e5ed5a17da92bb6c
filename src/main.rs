use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use parlance::core::audio::{AudioInput, push_audio_stream, read_wav_samples};
use parlance::core::{
    BaseTranslator, Lexicon, LocalEngineConfig, LocalTranslator, RecognitionEvent,
};
use parlance::harness::Latch;
use parlance::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Usage: parlance <wave-file> [lexicon-file]
    let mut args = env::args();
    let _ = args.next();
    let wave_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Usage: parlance <wave-file> [lexicon-file]"))?;
    let lexicon_path = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected argument '{extra}'");
    }

    // Load configuration
    let settings = Settings::from_env().map_err(|e| anyhow!(e.to_string()))?;
    let mut config = settings.translation_config()?;

    let (meta, samples) = read_wav_samples(&wave_path)?;
    config.sample_rate = meta.sample_rate;
    println!(
        "Loaded {} ({} samples at {} Hz)",
        wave_path.display(),
        samples.len(),
        meta.sample_rate
    );

    let lexicon = match lexicon_path.or(settings.lexicon_file.clone()) {
        Some(path) => {
            let lexicon = Lexicon::from_json_file(&path)?;
            println!("Lexicon: {} phrases from {}", lexicon.len(), path.display());
            lexicon
        }
        None => {
            println!("No lexicon configured; segments will report no match");
            Lexicon::new()
        }
    };

    let (stream, chunks) = push_audio_stream();
    let engine_config = LocalEngineConfig {
        base: config,
        lexicon,
        ..Default::default()
    };
    let mut translator =
        LocalTranslator::with_engine_config(engine_config, AudioInput::push(chunks))?;

    let done = Latch::new();
    let done_clone = done.clone();
    let target_language = settings.target_language.clone();
    let _subscription = translator.subscribe(Arc::new(move |event| {
        let done = done_clone.clone();
        let target_language = target_language.clone();
        Box::pin(async move {
            match event {
                RecognitionEvent::Recognized { result, .. } if !result.text.is_empty() => {
                    match result.translation_for(&target_language) {
                        Some(translation) => {
                            println!("{}  ->  [{target_language}] {translation}", result.text);
                        }
                        None => println!("{}", result.text),
                    }
                }
                RecognitionEvent::Canceled { reason, .. } => {
                    println!("Stream ended: {reason:?}");
                    done.set();
                }
                _ => {}
            }
        })
    }));

    translator.start_continuous().await?;

    // Pump the file through the push stream in 100 ms chunks.
    let chunk_samples = (meta.sample_rate as usize / 10).max(1);
    for window in samples.chunks(chunk_samples) {
        let bytes: Vec<u8> = window.iter().flat_map(|s| s.to_le_bytes()).collect();
        stream.write(bytes)?;
    }
    stream.close();

    tokio::time::timeout(Duration::from_secs(60), done.wait())
        .await
        .map_err(|_| anyhow!("Timed out waiting for the stream to finish"))?;
    translator.stop_continuous().await?;

    Ok(())
}
