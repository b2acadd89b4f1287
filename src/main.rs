use anyhow::{ Context, Result };
use clap::{ Args, Parser, Subcommand };
use image::GenericImageView;
use tracing::{ debug, info, warn };
use tracing_subscriber::EnvFilter;

use std::io::BufRead;
use std::path::{ Path, PathBuf };
use std::process;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lpr_cam::config::{ LprConfig, SourceConfig };
use lpr_cam::matcher::ResultKind;
use lpr_cam::report::{ self, ResultLog };
use lpr_cam::session::Session;
use lpr_cam::source::{ FileSource, FrameSource, SnapshotSource };
use lpr_cam::{ utils, Lpr };

#[derive(Parser)]
#[command(name = "lpr-cam", version, about = "License plate recognition from camera snapshots")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "LPR_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the camera and report every new plate
    Watch {
        #[command(flatten)]
        camera: CameraArgs,
        /// Pause between snapshots
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many capture attempts
        #[arg(long)]
        max_frames: Option<u64>,
        /// Result log, appended to
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Fetch one snapshot to check the camera is reachable
    Check {
        #[command(flatten)]
        camera: CameraArgs,
        /// Where to store the snapshot
        #[arg(long, default_value = "test_capture.jpg")]
        save: PathBuf,
    },
    /// Recognize plates in image files or directories
    Recognize {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write a copy of the (single) input with candidate boxes drawn
        #[arg(long)]
        annotate: Option<PathBuf>,
        /// One JSON document per image instead of plain text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CameraArgs {
    /// Snapshot url
    #[arg(long, conflicts_with = "ip")]
    url: Option<String>,
    /// Phone / camera ip, expands to http://<ip>:8080/shot.jpg
    #[arg(long)]
    ip: Option<String>,
}

impl CameraArgs {
    fn apply(&self, source: &mut SourceConfig) {
        if let Some(url) = &self.url {
            source.url = url.clone();
        } else if let Some(ip) = &self.ip {
            source.url = SourceConfig::snapshot_url(ip);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "lpr_cam=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => LprConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LprConfig::default(),
    };

    match cli.command {
        Command::Watch { camera, interval_ms, max_frames, log } => {
            camera.apply(&mut config.source);
            if let Some(ms) = interval_ms {
                config.source.interval_ms = ms;
            }
            if let Some(path) = log {
                config.log.path = path;
            }
            watch(&config, max_frames)
        }
        Command::Check { camera, save } => {
            camera.apply(&mut config.source);
            if check(&config.source, Some(save.as_path()))? {
                Ok(())
            } else {
                process::exit(1);
            }
        }
        Command::Recognize { inputs, annotate, json } => recognize(&config, &inputs, annotate, json),
    }
}

/// Fetch one snapshot, storing it at `save` when given.
fn check(source: &SourceConfig, save: Option<&Path>) -> Result<bool> {
    let mut camera = SnapshotSource::new(source)?;
    println!("connection test: {}", camera.describe());
    match camera.capture() {
        Ok(Some(img)) => {
            let (width, height) = img.dimensions();
            println!("connected, image size {}x{} ({} channels)", width, height, img.color().channel_count());
            if let Some(save) = save {
                img.save(save).with_context(|| format!("saving {}", save.display()))?;
                println!("saved {}", save.display());
            }
            Ok(true)
        }
        Ok(None) => Ok(false),
        Err(e) => {
            println!("connection failed: {}", e);
            println!();
            println!("things to check:");
            println!("1. the IP webcam app is running and its server is started");
            println!("2. the address is right (currently {})", source.url);
            println!("3. the camera and this machine are on the same network");
            Ok(false)
        }
    }
}

fn watch(config: &LprConfig, max_frames: Option<u64>) -> Result<()> {
    let mut camera = SnapshotSource::new(&config.source)?;
    println!("license plate recognition, camera {}", camera.describe());
    if !check(&config.source, None)? {
        anyhow::bail!("camera at {} is not reachable", config.source.url);
    }

    // fatal when the engine cannot come up
    let lpr = Lpr::from_config(config).context("starting the ocr engine")?;
    let log = ResultLog::open(&config.log.path)
        .with_context(|| format!("opening {}", config.log.path.display()))?;
    let mut session = Session::new(Some(log));

    let quit = Arc::new(AtomicBool::new(false));
    spawn_quit_listener(Arc::clone(&quit));
    println!("recognition started with {}, type q and Enter to stop", lpr.recognizer_name());

    let pacing = Pacing {
        interval: Duration::from_millis(config.source.interval_ms),
        retry_delay: Duration::from_millis(config.source.retry_delay_ms),
        max_frames,
    };
    let attempts = capture_loop(&lpr, &mut camera, &mut session, &quit, &pacing)?;

    println!();
    println!("plates seen in this session:");
    for plate in session.plates() {
        println!("  - {}", plate);
    }
    info!(attempts, frames = session.frames(), plates = session.plates().len(), "session finished");
    Ok(())
}

struct Pacing {
    interval: Duration,
    retry_delay: Duration,
    /// Capture attempts, failed ones included.
    max_frames: Option<u64>,
}

/// Poll `camera` until `quit` is set, the source runs dry or the attempt
/// budget is spent. Returns the number of capture attempts.
fn capture_loop(lpr: &Lpr, camera: &mut dyn FrameSource, session: &mut Session, quit: &AtomicBool,
    pacing: &Pacing) -> Result<u64>
{
    let mut attempts = 0u64;
    while !quit.load(Ordering::Relaxed) {
        if pacing.max_frames.map_or(false, |max| attempts >= max) {
            break;
        }
        attempts += 1;
        let frame = match camera.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                println!("could not get an image, retrying... ({})", e);
                thread::sleep(pacing.retry_delay);
                continue;
            }
        };

        let outcome = match lpr.process(&frame) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e).context("recognition cannot continue"),
            Err(e) => {
                warn!(error = %e, "frame skipped");
                thread::sleep(pacing.retry_delay);
                continue;
            }
        };
        let now = chrono::Local::now();
        debug!(candidates = outcome.candidates.len(), used_fallback = outcome.used_fallback, "frame done");
        if outcome.results.is_empty() {
            println!("[{}] no text found", report::timestamp(&now));
        }
        for result in session.accept(&now, outcome.results) {
            match result.kind {
                ResultKind::Plate => println!("[{}] new plate: {} (confidence: {:.2})",
                    report::timestamp(&now), result.plate, result.confidence),
                ResultKind::Text => println!("[{}] text: {} (confidence: {:.2})",
                    report::timestamp(&now), result.plate, result.confidence),
            }
        }
        thread::sleep(pacing.interval);
    }
    Ok(attempts)
}

fn spawn_quit_listener(quit: Arc<AtomicBool>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => break,
                Ok(_) => continue,
                Err(_) => return,
            }
        }
        quit.store(true, Ordering::Relaxed);
    });
}

fn recognize(config: &LprConfig, inputs: &[PathBuf], annotate: Option<PathBuf>, json: bool) -> Result<()> {
    let lpr = Lpr::from_config(config).context("starting the ocr engine")?;
    let mut files = FileSource::new(inputs)?;
    info!(source = %files.describe(), "recognizing");
    if annotate.is_some() && files.remaining() != 1 {
        anyhow::bail!("--annotate needs exactly one input image");
    }

    while let Some(path) = files.peek_path().map(|p| p.to_path_buf()) {
        let frame = match files.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                continue;
            }
        };
        let outcome = lpr.process(&frame).with_context(|| format!("processing {}", path.display()))?;

        if json {
            println!("{}", serde_json::json!({ "file": path, "outcome": &outcome }));
        } else if outcome.results.is_empty() {
            println!("{}: no text found", path.display());
        } else {
            for result in &outcome.results {
                println!("{}: {} {} (confidence: {:.2})", path.display(), result.kind, result.plate, result.confidence);
            }
        }

        if let Some(out) = &annotate {
            let plates: Vec<_> = outcome.results.iter().filter_map(|r| r.source_region).collect();
            utils::annotate(&frame, &outcome.candidates, &plates)
                .save(out)
                .with_context(|| format!("saving {}", out.display()))?;
            info!(path = %out.display(), "annotated image written");
        }
    }
    Ok(())
}
