// QueueSource - consumer side of a lock-free SPSC ring buffer
//
// An acquisition thread owns the `rtrb::Producer` and pushes samples as they
// arrive; the single-threaded pipeline loop pops them here. Reads wait in
// 1 ms polls up to the configured timeout and then report `Idle`. Once the
// producer is dropped and the ring is drained the source reports `Closed`.
//
// Blocking sources (a serial TTY, stdin) are moved onto their own thread with
// `ReadingQueue::spawn_reader`, so a silent device turns into `Idle` reads and
// the loop still observes its stop conditions.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use rtrb::{Consumer, PopError, Producer, PushError, RingBuffer};

use super::{SampleSource, SourceRead};
use crate::error::PipelineError;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Something an acquisition thread can hand over through the ring
pub trait QueueItem: Send + 'static {
    fn into_read(self) -> Result<SourceRead, PipelineError>;
}

impl QueueItem for f64 {
    fn into_read(self) -> Result<SourceRead, PipelineError> {
        Ok(SourceRead::Sample(self))
    }
}

/// Whole readings, so tokens and read errors survive the thread hop
impl QueueItem for Result<SourceRead, PipelineError> {
    fn into_read(self) -> Result<SourceRead, PipelineError> {
        self
    }
}

/// Queue carrying whole readings from a reader thread
pub type ReadingQueue = QueueSource<Result<SourceRead, PipelineError>>;

pub struct QueueSource<T = f64> {
    consumer: Consumer<T>,
    timeout: Duration,
}

impl<T: QueueItem> QueueSource<T> {
    pub fn new(consumer: Consumer<T>, timeout: Duration) -> Self {
        Self { consumer, timeout }
    }

    /// Allocate a ring of `capacity` items and return both ends
    pub fn channel(capacity: usize, timeout: Duration) -> (Producer<T>, Self) {
        let (producer, consumer) = RingBuffer::new(capacity);
        (producer, Self::new(consumer, timeout))
    }

    /// Items currently buffered
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

impl ReadingQueue {
    /// Read `source` on a dedicated acquisition thread
    ///
    /// The thread forwards every reading until the source closes, fails to
    /// read, or this queue is dropped. Reads on the returned queue wait at
    /// most `timeout` before reporting `Idle`.
    pub fn spawn_reader<S>(source: S, capacity: usize, timeout: Duration) -> io::Result<Self>
    where
        S: SampleSource + Send + 'static,
    {
        let (producer, queue) = Self::channel(capacity, timeout);
        thread::Builder::new()
            .name("neurokey-acquisition".to_string())
            .spawn(move || forward_readings(source, producer))?;
        Ok(queue)
    }
}

fn forward_readings<S: SampleSource>(
    mut source: S,
    mut producer: Producer<Result<SourceRead, PipelineError>>,
) {
    let mut forwarded = 0_u64;
    loop {
        if producer.is_abandoned() {
            break;
        }
        let read = source.read_sample();
        let last = match &read {
            Ok(SourceRead::Closed) => break,
            Ok(SourceRead::Idle) => continue,
            Err(PipelineError::SourceRead { .. }) => true,
            _ => false,
        };
        if !push_waiting(&mut producer, read) || last {
            break;
        }
        forwarded += 1;
    }
    tracing::debug!("[Acquisition] Reader finished after {} readings", forwarded);
}

/// Push, waiting for room; false once the consumer is gone
fn push_waiting<T>(producer: &mut Producer<T>, mut item: T) -> bool {
    loop {
        match producer.push(item) {
            Ok(()) => return true,
            Err(PushError::Full(rejected)) => {
                if producer.is_abandoned() {
                    return false;
                }
                item = rejected;
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

impl<T: QueueItem> SampleSource for QueueSource<T> {
    fn read_sample(&mut self) -> Result<SourceRead, PipelineError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.consumer.pop() {
                Ok(item) => return item.into_read(),
                Err(PopError::Empty) => {
                    if self.consumer.is_abandoned() && self.consumer.is_empty() {
                        return Ok(SourceRead::Closed);
                    }
                    if Instant::now() >= deadline {
                        return Ok(SourceRead::Idle);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{LineSource, ManualSource};
    use std::io::{BufReader, Read};
    use std::sync::mpsc;

    /// Reader that blocks until bytes are sent; EOF once the sender is dropped
    struct ChannelReader {
        rx: mpsc::Receiver<Vec<u8>>,
        pending: Vec<u8>,
    }

    impl Read for ChannelReader {
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

    fn channel_lines() -> (mpsc::Sender<Vec<u8>>, LineSource<BufReader<ChannelReader>>) {
        let (tx, rx) = mpsc::channel();
        let reader = ChannelReader {
            rx,
            pending: Vec::new(),
        };
        (tx, LineSource::new(BufReader::new(reader)))
    }

    #[test]
    fn pops_in_order_then_idles() {
        let (mut producer, mut source) = QueueSource::<f64>::channel(8, Duration::from_millis(5));
        producer.push(1.0).unwrap();
        producer.push(2.0).unwrap();
        assert_eq!(source.pending(), 2);

        assert_eq!(source.read_sample().unwrap(), SourceRead::Sample(1.0));
        assert_eq!(source.read_sample().unwrap(), SourceRead::Sample(2.0));
        assert_eq!(source.read_sample().unwrap(), SourceRead::Idle);
        drop(producer);
    }

    #[test]
    fn drains_before_reporting_closed() {
        let (mut producer, mut source) = QueueSource::<f64>::channel(4, Duration::from_millis(5));
        producer.push(3.5).unwrap();
        drop(producer);

        assert_eq!(source.read_sample().unwrap(), SourceRead::Sample(3.5));
        assert_eq!(source.read_sample().unwrap(), SourceRead::Closed);
    }

    #[test]
    fn receives_from_producer_thread() {
        let (mut producer, mut source) = QueueSource::<f64>::channel(64, Duration::from_millis(50));
        let handle = thread::spawn(move || {
            for i in 0..32 {
                while producer.push(i as f64).is_err() {
                    thread::sleep(Duration::from_micros(100));
                }
            }
        });

        let mut received = Vec::new();
        loop {
            match source.read_sample().unwrap() {
                SourceRead::Sample(v) => received.push(v),
                SourceRead::Closed => break,
                SourceRead::Idle | SourceRead::Token(_) => {}
            }
        }
        handle.join().unwrap();

        let expected: Vec<f64> = (0..32).map(|i| i as f64).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn spawned_reader_idles_while_device_is_silent() {
        let (tx, lines) = channel_lines();
        let mut source =
            ReadingQueue::spawn_reader(lines, 16, Duration::from_millis(10)).unwrap();

        assert_eq!(source.read_sample().unwrap(), SourceRead::Idle);
        assert_eq!(source.read_sample().unwrap(), SourceRead::Idle);

        tx.send(b"512\nnoise\n".to_vec()).unwrap();
        drop(tx);

        let mut read = Vec::new();
        loop {
            match source.read_sample() {
                Ok(SourceRead::Idle) => {}
                Ok(SourceRead::Closed) => break,
                other => read.push(other),
            }
        }
        assert_eq!(
            read,
            vec![
                Ok(SourceRead::Token("512".to_string())),
                Ok(SourceRead::Token("noise".to_string())),
            ]
        );
    }

    #[test]
    fn spawned_reader_forwards_errors_and_stops_on_read_failure() {
        let mut scripted = ManualSource::from_tokens(["1.0"]);
        scripted.push_error(PipelineError::MalformedSample {
            token: "x".to_string(),
        });
        scripted.push_error(PipelineError::SourceRead {
            details: "device unplugged".to_string(),
        });
        scripted.push_token("2.0");

        let mut source =
            ReadingQueue::spawn_reader(scripted, 8, Duration::from_millis(50)).unwrap();
        let mut read = Vec::new();
        loop {
            match source.read_sample() {
                Ok(SourceRead::Idle) => {}
                Ok(SourceRead::Closed) => break,
                other => read.push(other),
            }
        }

        assert_eq!(read.len(), 3);
        assert_eq!(read[0], Ok(SourceRead::Token("1.0".to_string())));
        assert!(matches!(read[1], Err(PipelineError::MalformedSample { .. })));
        assert!(matches!(read[2], Err(PipelineError::SourceRead { .. })));
    }
}
