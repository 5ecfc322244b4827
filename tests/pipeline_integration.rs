//! End-to-end tests for the classification pipeline
//!
//! These tests drive the full window → filter → features → classify →
//! dispatch chain with the bundled example artifacts, covering:
//! - relaxed / attentive / blink classification of synthetic windows
//! - the blink detector debounce with a deterministic clock
//! - CSV replay with malformed rows
//! - producer thread feeding the loop through the SPSC queue source
//! - blocking line input moved onto a reader thread with a bounded wait

use std::io::{self, BufReader, Cursor, Read};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use neurokey::analysis::ActionReport;
use neurokey::clock::ManualTimeSource;
use neurokey::config::DispatchConfig;
use neurokey::dispatch::RecordingActuator;
use neurokey::source::{LineSource, QueueSource, ReadingQueue, SyntheticSource};
use neurokey::{AppConfig, Pipeline, StopCondition, StopReason};

const SAMPLE_RATE: f64 = 512.0;
const WINDOW: usize = 512;

fn bundled_config() -> AppConfig {
    let assets = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets");
    let mut config = AppConfig::default();
    config.artifacts.scaler_path = assets.join("scaler.json");
    config.artifacts.classifier_path = assets.join("classifier.json");
    config
}

fn sine(frequency: f64, amplitude: f64, len: usize) -> Vec<f64> {
    SyntheticSource::sine(SAMPLE_RATE, frequency, len)
        .with_amplitude(amplitude)
        .collect_samples()
}

/// Slow, large deflection as produced by an eye blink on a frontal electrode
fn blink_window() -> Vec<f64> {
    sine(1.5, 20.0, WINDOW)
}

/// Stands in for a serial device: blocks until bytes arrive, EOF once the
/// sender is dropped
struct DeviceReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for DeviceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(bytes) => self.pending = bytes,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

fn device() -> (mpsc::Sender<Vec<u8>>, LineSource<BufReader<DeviceReader>>) {
    let (tx, rx) = mpsc::channel();
    let reader = DeviceReader {
        rx,
        pending: Vec::new(),
    };
    (tx, LineSource::new(BufReader::new(reader)))
}

#[test]
fn test_bundled_artifacts_separate_states() {
    let mut pipeline = Pipeline::from_config(&bundled_config()).expect("pipeline builds");
    let mut actuator = RecordingActuator::new();

    let relaxed = pipeline
        .process_window(&sine(10.0, 1.0, WINDOW), &mut actuator)
        .unwrap();
    let attentive = pipeline
        .process_window(&sine(20.0, 1.0, WINDOW), &mut actuator)
        .unwrap();
    let blink = pipeline
        .process_window(&blink_window(), &mut actuator)
        .unwrap();
    let silence = pipeline
        .process_window(&vec![0.0; WINDOW], &mut actuator)
        .unwrap();

    assert_eq!(relaxed.label, 0);
    assert!(relaxed.features.alpha_beta_ratio > 1.0);
    assert_eq!(attentive.label, 1);
    assert!(attentive.features.alpha_beta_ratio < 1.0);
    assert_eq!(blink.label, 2);
    assert!(blink.features.e_delta > blink.features.e_alpha);
    assert_eq!(silence.label, 1);

    let actions: Vec<String> = actuator
        .commands()
        .into_iter()
        .map(|command| command.action)
        .collect();
    assert_eq!(actions, vec!["space", "w", "right", "w"]);
}

#[test]
fn test_blink_detector_debounces_presses() {
    let config = AppConfig {
        dispatch: DispatchConfig::blink_detector(),
        ..bundled_config()
    };
    let clock = Arc::new(ManualTimeSource::new());
    let mut pipeline = Pipeline::from_config(&config)
        .unwrap()
        .with_time_source(clock.clone());
    let mut actuator = RecordingActuator::new();

    let blink = blink_window();
    let relaxed = sine(10.0, 1.0, WINDOW);

    let first = pipeline.process_window(&blink, &mut actuator).unwrap();
    clock.advance(Duration::from_secs(1));
    let second = pipeline.process_window(&blink, &mut actuator).unwrap();
    let unmapped = pipeline.process_window(&relaxed, &mut actuator).unwrap();
    clock.advance(Duration::from_secs(5));
    let third = pipeline.process_window(&blink, &mut actuator).unwrap();

    assert_eq!(
        first.action,
        ActionReport::Triggered {
            action: "right".to_string(),
            hold_ms: 0
        }
    );
    assert!(matches!(second.action, ActionReport::Suppressed { remaining_ms } if (remaining_ms - 4000.0).abs() < 1e-6));
    assert_eq!(unmapped.action, ActionReport::Unmapped);
    assert!(matches!(third.action, ActionReport::Triggered { .. }));
    assert_eq!(actuator.commands().len(), 2);
}

#[test]
fn test_csv_replay_skips_malformed_rows() {
    let mut csv = String::from("Timestamp,Signal,Label\n");
    for (i, value) in sine(10.0, 1.0, WINDOW).iter().enumerate() {
        csv.push_str(&format!("2024-05-01 10:00:00.{i:03},{value},0\n"));
        if i == 100 {
            csv.push_str("2024-05-01 10:00:00.100,\u{fffd}\u{fffd},0\n");
        }
    }
    let mut source = LineSource::new(Cursor::new(csv.into_bytes())).with_column(1);

    let mut pipeline = Pipeline::from_config(&bundled_config()).unwrap();
    let mut actuator = RecordingActuator::new();
    let summary = pipeline.run(&mut source, &mut actuator, &StopCondition::new());

    // Header row and the garbled row
    assert_eq!(summary.malformed_samples, 2);
    assert_eq!(summary.windows_processed, 1);
    assert_eq!(summary.label_counts.get(&0), Some(&1));
    assert_eq!(summary.stop_reason, Some(StopReason::SourceClosed));
}

#[test]
fn test_queue_source_feeds_loop_from_producer_thread() {
    let (mut producer, mut source) = QueueSource::<f64>::channel(1024, Duration::from_millis(20));
    let samples = sine(10.0, 1.0, WINDOW * 3);

    let acquisition = thread::spawn(move || {
        for sample in samples {
            while producer.push(sample).is_err() {
                thread::sleep(Duration::from_micros(200));
            }
        }
    });

    let mut pipeline = Pipeline::from_config(&bundled_config()).unwrap();
    let mut actuator = RecordingActuator::new();
    let summary = pipeline.run(&mut source, &mut actuator, &StopCondition::new());
    acquisition.join().unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::SourceClosed));
    assert_eq!(summary.windows_processed, 3);
    assert_eq!(summary.samples_accepted, (WINDOW * 3) as u64);
    assert!(actuator
        .commands()
        .iter()
        .all(|command| command.action == "space"));
}

#[test]
fn test_silent_device_still_honours_time_budget() {
    let (device_tx, lines) = device();
    let mut source = ReadingQueue::spawn_reader(lines, 64, Duration::from_millis(10)).unwrap();

    let mut pipeline = Pipeline::from_config(&bundled_config()).unwrap();
    let mut actuator = RecordingActuator::new();
    let stop = StopCondition::new().with_time_budget(Duration::from_millis(200));

    let started = Instant::now();
    let summary = pipeline.run(&mut source, &mut actuator, &stop);

    assert_eq!(summary.stop_reason, Some(StopReason::TimeBudget));
    assert!(summary.idle_reads > 0);
    assert_eq!(summary.samples_accepted, 0);
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(device_tx);
}

#[test]
fn test_threaded_line_input_counts_malformed_tokens() {
    let (device_tx, lines) = device();
    let mut source = ReadingQueue::spawn_reader(lines, 64, Duration::from_millis(20)).unwrap();

    let writer = thread::spawn(move || {
        device_tx.send(b"\xff\xfe\n".to_vec()).unwrap();
        for chunk in sine(10.0, 1.0, WINDOW).chunks(64) {
            let text: String = chunk.iter().map(|value| format!("{value}\n")).collect();
            device_tx.send(text.into_bytes()).unwrap();
        }
    });

    let mut pipeline = Pipeline::from_config(&bundled_config()).unwrap();
    let mut actuator = RecordingActuator::new();
    let summary = pipeline.run(&mut source, &mut actuator, &StopCondition::new());
    writer.join().unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::SourceClosed));
    assert_eq!(summary.malformed_samples, 1);
    assert_eq!(summary.windows_processed, 1);
    assert_eq!(summary.label_counts.get(&0), Some(&1));
}
