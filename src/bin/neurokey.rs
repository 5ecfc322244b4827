use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use neurokey::analysis::features::FEATURE_COUNT;
use neurokey::analysis::window::WindowAccumulator;
use neurokey::config::DispatchConfig;
use neurokey::dispatch::{JsonLinesActuator, LogActuator};
use neurokey::source::{parse_sample, LineSource, ReadingQueue, SyntheticSource, WavSource};
use neurokey::telemetry::{MetricEvent, TelemetrySnapshot};
use neurokey::{
    Actuator, AppConfig, ClassifierAdapter, FeatureVector, Pipeline, RunSummary, SampleSource,
    SourceRead, StopCondition, WindowAnalyzer, WindowReport, FEATURE_NAMES,
};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::Level;

/// Readings buffered between the input thread and the loop
const LINE_QUEUE_CAPACITY: usize = 4096;
/// Longest a read waits before the loop gets to check its stop conditions
const LINE_READ_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(
    name = "neurokey",
    about = "Classify biosignal windows and trigger debounced actions"
)]
struct Cli {
    /// Log at DEBUG level instead of INFO
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the classification loop over a sample source
    Run(RunArgs),
    /// Print the feature vector of every full window of an input
    Features {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Validate configuration and artifacts, then exit
    Check {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        artifacts: ArtifactArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ArtifactArgs {
    /// Scaler artifact, overrides the config
    #[arg(long)]
    scaler: Option<PathBuf>,
    /// Classifier artifact, overrides the config
    #[arg(long)]
    classifier: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Text input with one sample per line (file or serial device); stdin when no input is given
    #[arg(long, conflicts_with_all = ["wav", "synthetic"])]
    input: Option<PathBuf>,
    /// Zero-based CSV column holding the sample (for recorded sessions)
    #[arg(long)]
    column: Option<usize>,
    /// Mono PCM WAV recording
    #[arg(long, conflicts_with = "synthetic")]
    wav: Option<PathBuf>,
    /// Generate a sine at this frequency (Hz) instead of reading input
    #[arg(long)]
    synthetic: Option<f64>,
    /// Length of the synthetic signal in seconds
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,
    /// Uniform noise amplitude added to the synthetic signal
    #[arg(long, default_value_t = 0.0)]
    noise: f64,
    /// Seed for synthetic noise
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(flatten)]
    artifacts: ArtifactArgs,
    #[command(flatten)]
    input: InputArgs,
    /// Stop after this many seconds of wall-clock time
    #[arg(long)]
    max_seconds: Option<f64>,
    /// Stop after this many processed windows
    #[arg(long)]
    max_windows: Option<u64>,
    /// Where triggered actions go
    #[arg(long, value_enum, default_value_t = ActuatorKind::Log)]
    actuator: ActuatorKind,
    /// Print a JSON report (`"type": "report"`) for every processed window to stdout
    #[arg(long)]
    reports: bool,
    /// Log every telemetry event as it is published
    #[arg(long)]
    events: bool,
    /// Use the single-class blink detector bindings (label 2 → right, 5 s gap)
    #[arg(long)]
    blink: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ActuatorKind {
    /// Log actions through tracing
    Log,
    /// One JSON command per line on stdout
    Stdout,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => run_pipeline(args),
        Commands::Features { config, input } => run_features(&config, &input),
        Commands::Check { config, artifacts } => run_check(&config, &artifacts),
    }
}

fn load_config(args: &ConfigArgs) -> Result<AppConfig> {
    match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn apply_artifact_overrides(config: &mut AppConfig, args: &ArtifactArgs) {
    if let Some(path) = &args.scaler {
        config.artifacts.scaler_path = path.clone();
    }
    if let Some(path) = &args.classifier {
        config.artifacts.classifier_path = path.clone();
    }
}

fn load_classifier(config: &AppConfig) -> Result<ClassifierAdapter> {
    ClassifierAdapter::load(
        &config.artifacts.scaler_path,
        &config.artifacts.classifier_path,
    )
    .context("loading artifacts")
}

fn open_source(args: &InputArgs, config: &AppConfig) -> Result<Box<dyn SampleSource>> {
    let sample_rate_hz = config.signal.sample_rate_hz;

    if let Some(frequency) = args.synthetic {
        if !(args.seconds.is_finite() && args.seconds > 0.0) {
            bail!("--seconds must be positive (got {})", args.seconds);
        }
        let len = (args.seconds * sample_rate_hz).round() as usize;
        let source = SyntheticSource::sine(sample_rate_hz, frequency, len)
            .with_noise(args.noise, args.seed);
        return Ok(Box::new(source));
    }

    if let Some(path) = &args.wav {
        let source =
            WavSource::open(path).with_context(|| format!("opening {}", path.display()))?;
        if f64::from(source.sample_rate()) != sample_rate_hz {
            tracing::warn!(
                "[CLI] {} is sampled at {} Hz but the pipeline is configured for {} Hz",
                path.display(),
                source.sample_rate(),
                sample_rate_hz
            );
        }
        return Ok(Box::new(source));
    }

    match &args.input {
        Some(path) => {
            let source =
                LineSource::open(path).with_context(|| format!("opening {}", path.display()))?;
            spawn_line_reader(source, args.column)
        }
        None => spawn_line_reader(LineSource::stdin(), args.column),
    }
}

/// Text inputs block on read, so they are drained on an acquisition thread
/// and the loop sees `Idle` whenever the device goes quiet
fn spawn_line_reader<R>(
    source: LineSource<R>,
    column: Option<usize>,
) -> Result<Box<dyn SampleSource>>
where
    R: BufRead + Send + 'static,
{
    let source = match column {
        Some(column) => source.with_column(column),
        None => source,
    };
    let queue = ReadingQueue::spawn_reader(source, LINE_QUEUE_CAPACITY, LINE_READ_TIMEOUT)
        .context("starting input reader thread")?;
    Ok(Box::new(queue))
}

fn stop_condition(args: &RunArgs) -> Result<StopCondition> {
    let mut stop = StopCondition::new();
    if let Some(secs) = args.max_seconds {
        let budget = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --max-seconds {secs}"))?;
        stop = stop.with_time_budget(budget);
    }
    if let Some(windows) = args.max_windows {
        stop = stop.with_max_windows(windows);
    }
    Ok(stop)
}

fn run_pipeline(args: RunArgs) -> Result<ExitCode> {
    let mut config = load_config(&args.config)?;
    apply_artifact_overrides(&mut config, &args.artifacts);
    if args.blink {
        config.dispatch = DispatchConfig::blink_detector();
    }

    let classifier = load_classifier(&config)?;
    let mut pipeline = Pipeline::new(&config, classifier).context("validating configuration")?;
    let mut source = open_source(&args.input, &config)?;
    let stop = stop_condition(&args)?;

    let mut actuator: Box<dyn Actuator> = match args.actuator {
        ActuatorKind::Log => Box::new(LogActuator),
        ActuatorKind::Stdout => Box::new(JsonLinesActuator::new(io::stdout())),
    };

    let mut events = args.events.then(|| pipeline.telemetry().subscribe());
    let summary = pipeline.run_with_reports(source.as_mut(), actuator.as_mut(), &stop, |report| {
        if args.reports {
            print_report(report);
        }
        if let Some(events) = events.as_mut() {
            log_events(events);
        }
    });
    if let Some(events) = events.as_mut() {
        log_events(events);
    }

    let output = RunOutput {
        summary: &summary,
        telemetry: pipeline.telemetry().snapshot(),
    };
    eprintln!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

/// Stdout lines; tagged so reports and `--actuator stdout` commands can share the stream
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StdoutLine<'a> {
    Report(&'a WindowReport),
}

fn print_report(report: &WindowReport) {
    match serde_json::to_string(&StdoutLine::Report(report)) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::warn!("[CLI] Failed to serialize report: {err}"),
    }
}

fn log_events(events: &mut broadcast::Receiver<MetricEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => tracing::info!("[Telemetry] {line}"),
                Err(err) => tracing::warn!("[CLI] Failed to serialize event: {err}"),
            },
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("[Telemetry] {skipped} events dropped before they were logged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    summary: &'a RunSummary,
    telemetry: TelemetrySnapshot,
}

#[derive(Serialize)]
struct FeatureLine<'a> {
    window_index: u64,
    features: &'a FeatureVector,
}

fn run_features(config_args: &ConfigArgs, input: &InputArgs) -> Result<ExitCode> {
    let config = load_config(config_args)?;
    let analyzer = WindowAnalyzer::new(&config.signal).context("designing filters")?;
    let mut source = open_source(input, &config)?;
    let mut window = WindowAccumulator::new(analyzer.window_size());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut window_index = 0_u64;

    loop {
        let sample = match source.read_sample() {
            Ok(SourceRead::Token(token)) => parse_sample(&token),
            Ok(SourceRead::Sample(sample)) => Ok(sample),
            Ok(SourceRead::Idle) => continue,
            Ok(SourceRead::Closed) => break,
            Err(err) => Err(err),
        };
        let sample = match sample {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!("[CLI] Skipping sample: {err}");
                continue;
            }
        };

        window.push(sample)?;
        if let Some(samples) = window.drain_and_reset() {
            match analyzer.analyze(&samples) {
                Ok(features) => {
                    let line = FeatureLine {
                        window_index,
                        features: &features,
                    };
                    writeln!(out, "{}", serde_json::to_string(&line)?)?;
                }
                Err(err) => tracing::warn!("[CLI] Window {window_index} failed: {err}"),
            }
            window_index += 1;
        }
    }

    tracing::info!(
        "[CLI] {} windows, {} samples left over",
        window_index,
        window.len()
    );
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct CheckSummary<'a> {
    sample_rate_hz: f64,
    window_size: usize,
    window_ms: f64,
    filter_pad_len: usize,
    scaler: &'a Path,
    scaler_kind: &'static str,
    classifier: &'a Path,
    classifier_kind: &'static str,
    labels: Vec<i64>,
    feature_names: [&'static str; FEATURE_COUNT],
    debounce_gap_secs: Option<f64>,
    bindings: usize,
}

fn run_check(config_args: &ConfigArgs, artifacts: &ArtifactArgs) -> Result<ExitCode> {
    let mut config = load_config(config_args)?;
    apply_artifact_overrides(&mut config, artifacts);
    let analyzer = WindowAnalyzer::new(&config.signal).context("designing filters")?;
    config
        .dispatch
        .validate()
        .context("validating configuration")?;
    let classifier = load_classifier(&config)?;
    config
        .validate_labels(&classifier.labels())
        .context("validating bindings against artifact labels")?;

    let summary = CheckSummary {
        sample_rate_hz: config.signal.sample_rate_hz,
        window_size: config.signal.window_size,
        window_ms: config.signal.window_duration().as_secs_f64() * 1000.0,
        filter_pad_len: analyzer.filters().pad_len(),
        scaler: &config.artifacts.scaler_path,
        scaler_kind: classifier.scaler_kind(),
        classifier: &config.artifacts.classifier_path,
        classifier_kind: classifier.classifier_kind(),
        labels: classifier.labels(),
        feature_names: FEATURE_NAMES,
        debounce_gap_secs: config.dispatch.debounce_gap_secs,
        bindings: config.dispatch.bindings.len(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::SUCCESS)
}
