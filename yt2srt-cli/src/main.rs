use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt2srt::parser::VideoUrlParser;
use yt2srt::types::{DEFAULT_LIST_URL, DEFAULT_TRACK_URL};
use yt2srt::{srt, TrackList, Yt2Srt, Yt2SrtError, Yt2SrtOptions, NETWORK_ERROR_EXIT_CODE};

#[derive(Parser)]
#[command(name = "yt2srt")]
#[command(version, about = "Download closed captions of a YouTube video as a SRT file")]
#[command(long_about = None)]
struct Cli {
    /// YouTube video url or timed-text XML filename
    #[arg(value_name = "VIDEO_URL_OR_FILENAME")]
    uri: String,

    /// Comma separated list of two letter language codes
    #[arg(short, long, value_name = "l1[,l2...]", value_delimiter = ',', default_value = "en")]
    lang: Vec<String>,

    /// Write captions to FILE instead of video_id.srt
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// List available caption tracks instead of downloading
    #[arg(long)]
    list: bool,

    /// Print the track list as JSON (with --list)
    #[arg(long, requires = "list")]
    json: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Custom User-Agent string
    #[arg(long)]
    user_agent: Option<String>,

    /// Proxy URL (http://proxy:port)
    #[arg(long)]
    proxy: Option<String>,

    /// Track listing endpoint
    #[arg(long, hide = true, default_value = DEFAULT_LIST_URL)]
    list_url: String,

    /// Track download endpoint
    #[arg(long, hide = true, default_value = DEFAULT_TRACK_URL)]
    track_url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(err) = run(&cli).await {
        let code = err
            .downcast_ref::<Yt2SrtError>()
            .map_or(1, Yt2SrtError::exit_code);

        // Network errors already carry the URL and the underlying cause
        if code == NETWORK_ERROR_EXIT_CODE {
            eprintln!("{}", err);
        } else {
            eprintln!("Error: {:#}", err);
        }
        std::process::exit(code);
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "yt2srt_cli=debug,yt2srt=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "yt2srt_cli=warn,yt2srt=warn".into())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .with(env_filter)
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    if VideoUrlParser::new().is_url(&cli.uri) {
        convert_remote(cli).await
    } else {
        convert_local(cli).await
    }
}

/// Build Yt2SrtOptions from CLI arguments
fn build_options(cli: &Cli) -> Yt2SrtOptions {
    let mut options = Yt2SrtOptions::new()
        .languages(cli.lang.iter().map(|lang| lang.trim()))
        .list_url(&cli.list_url)
        .track_url(&cli.track_url)
        .timeout(cli.timeout);

    if let Some(user_agent) = &cli.user_agent {
        options = options.user_agent(user_agent);
    }

    if let Some(proxy) = &cli.proxy {
        options = options.proxy(proxy);
    }

    options
}

/// Download the preferred track of a video, or explain which languages exist
async fn convert_remote(cli: &Cli) -> anyhow::Result<()> {
    let downloader = Yt2Srt::new(&cli.uri, build_options(cli))?;
    let tracks = downloader.tracks().await?;

    if cli.list {
        return print_tracks(&tracks, cli.json);
    }

    if let Some(blocks) = downloader.caption_from(&tracks).await? {
        let output = output_path(cli.output.as_deref(), downloader.video_id());
        save(&output, &blocks).await?;
        return Ok(());
    }

    if tracks.is_empty() {
        println!("There are no subtitles available for this video: {}", cli.uri);
    } else {
        print_available_languages(&tracks);
    }

    Ok(())
}

/// Convert a timed-text file that was downloaded earlier
async fn convert_local(cli: &Cli) -> anyhow::Result<()> {
    let input = Path::new(&cli.uri);

    if cli.list {
        warn!("--list only applies to video URLs, converting {} instead", cli.uri);
    }

    if !input.is_file() {
        println!("There is no such file: {}", cli.uri);
        return Ok(());
    }

    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = output_path(cli.output.as_deref(), &stem);

    match yt2srt::convert_file(input).await? {
        Some(blocks) => save(&output, &blocks).await,
        None => {
            info!("No caption lines in {}", input.display());
            Ok(())
        }
    }
}

async fn save(output: &Path, blocks: &[String]) -> anyhow::Result<()> {
    srt::write_srt(output, blocks)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Saved {} caption blocks to {}", blocks.len(), output.display());
    Ok(())
}

/// Resolve the output file, appending `.srt` when missing
fn output_path(explicit: Option<&str>, default_stem: &str) -> PathBuf {
    let name = explicit.unwrap_or(default_stem);
    let path = if name.ends_with(".srt") {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}.srt", name))
    };

    debug!("Output path: {}", path.display());
    path
}

fn print_available_languages(tracks: &TrackList) {
    println!("Available languages:");
    for (code, track) in tracks {
        println!("  {}\t{} ({})", code, track.lang_original, track.lang_translated);
    }
}

fn print_tracks(tracks: &TrackList, json: bool) -> anyhow::Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(tracks).context("Failed to serialize track list")?;
        println!("{}", rendered);
        return Ok(());
    }

    if tracks.is_empty() {
        println!("No caption tracks found.");
        return Ok(());
    }

    println!("{:<8} {:<20} {:<20} {:<8}", "Code", "Original", "Translated", "Default");
    println!("{}", "─".repeat(60));
    for (code, track) in tracks {
        println!(
            "{:<8} {:<20} {:<20} {:<8}",
            code,
            truncate(&track.lang_original, 20),
            truncate(&track.lang_translated, 20),
            if track.lang_default == "true" { "Yes" } else { "" }
        );
    }

    Ok(())
}

/// Truncate string to specified length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("yt2srt").chain(args.iter().copied()))
    }

    #[test]
    fn test_lang_is_comma_split() {
        let remote = cli(&["https://youtu.be/x", "-l", "fr,en"]);
        assert_eq!(remote.lang, vec!["fr", "en"]);

        let local = cli(&["file.xml"]);
        assert_eq!(local.lang, vec!["en"]);
    }

    #[test]
    fn test_build_options() {
        let cli = cli(&[
            "https://youtu.be/x",
            "--lang",
            "de, en",
            "--timeout",
            "5",
            "--proxy",
            "http://proxy:3128",
        ]);
        let options = build_options(&cli);

        assert_eq!(options.languages, vec!["de", "en"]);
        assert_eq!(options.timeout_seconds, 5);
        assert_eq!(options.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(options.list_url, DEFAULT_LIST_URL);
    }

    #[test]
    fn test_json_requires_list() {
        let result = Cli::try_parse_from(["yt2srt", "https://youtu.be/x", "--json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path(None, "abc"), PathBuf::from("abc.srt"));
        assert_eq!(output_path(Some("out"), "abc"), PathBuf::from("out.srt"));
        assert_eq!(output_path(Some("out.srt"), "abc"), PathBuf::from("out.srt"));
        assert_eq!(
            output_path(Some("dir/sub.txt"), "abc"),
            PathBuf::from("dir/sub.txt.srt")
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("Español (España)", 20), "Español (España)");
    }
}
