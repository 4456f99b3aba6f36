//! Durable writer and periodic flush task.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netutil_events::{ChannelSink, DataFormat, TcpEvent};
use tokio::fs::File;
use tokio::io::BufWriter;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::csv::{CsvReader, CsvWriter, RowSink};
use crate::row::{EventRow, HEADER};
use crate::EventLogError;

/// How often buffered rows are pushed to disk.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

type SharedRowSink = Arc<Mutex<CsvWriter<BufWriter<File>>>>;

/// Configuration for a durable event log.
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// File to create (truncated if it exists).
    pub path: PathBuf,
    /// Rendering of data payloads.
    pub format: DataFormat,
    /// Flush period.
    pub flush_interval: Duration,
}

impl EventLogConfig {
    pub fn new(path: impl Into<PathBuf>, format: DataFormat) -> Self {
        Self {
            path: path.into(),
            format,
            flush_interval: FLUSH_INTERVAL,
        }
    }
}

/// Counters for one event log.
#[derive(Debug, Default)]
pub struct EventLogStats {
    /// Rows appended successfully.
    pub rows_written: AtomicU64,
    /// Rows lost to write failures.
    pub rows_failed: AtomicU64,
    /// Flushes that failed.
    pub flush_failures: AtomicU64,
}

/// A running durable writer.
///
/// Created once per engine run. Events published to the returned sink are
/// appended as rows in dequeue order; [`shutdown`](Self::shutdown) stops both
/// background tasks.
pub struct EventLog {
    path: PathBuf,
    stop_tx: watch::Sender<bool>,
    writer: JoinHandle<()>,
    flusher: JoinHandle<()>,
    stats: Arc<EventLogStats>,
}

impl EventLog {
    /// Creates the log file, writes the header and starts the writer and
    /// flush tasks.
    pub async fn create(config: EventLogConfig) -> Result<(Self, ChannelSink), EventLogError> {
        let file = File::create(&config.path)
            .await
            .map_err(|source| EventLogError::Create {
                path: config.path.clone(),
                source,
            })?;

        let mut csv = CsvWriter::with_bom(BufWriter::new(file)).await?;
        csv.write_row(&HEADER).await?;
        let csv: SharedRowSink = Arc::new(Mutex::new(csv));

        let (sink, rx) = ChannelSink::channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(EventLogStats::default());

        info!(
            path = %config.path.display(),
            format = %config.format,
            "Event log created"
        );

        let span = tracing::info_span!("event_log", path = %config.path.display());
        let writer = tokio::spawn(
            run_writer(
                Arc::clone(&csv),
                rx,
                config.format,
                stop_rx.clone(),
                Arc::clone(&stats),
            )
            .instrument(span.clone()),
        );
        let flusher = tokio::spawn(
            run_flusher(csv, config.flush_interval, stop_rx, Arc::clone(&stats)).instrument(span),
        );

        Ok((
            Self {
                path: config.path,
                stop_tx,
                writer,
                flusher,
                stats,
            },
            sink,
        ))
    }

    /// Stops the writer and flush tasks and waits for them.
    ///
    /// Events already queued are written before the final flush; anything
    /// published afterwards is lost. Task failures are logged, not returned.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);

        if let Err(e) = self.writer.await {
            warn!(error = %e, "Event log writer task failed");
        }
        if let Err(e) = self.flusher.await {
            warn!(error = %e, "Event log flush task failed");
        }

        info!(
            path = %self.path.display(),
            rows_written = self.stats.rows_written.load(Ordering::Relaxed),
            rows_failed = self.stats.rows_failed.load(Ordering::Relaxed),
            "Event log closed"
        );
    }
}

async fn run_writer(
    csv: SharedRowSink,
    mut rx: mpsc::UnboundedReceiver<TcpEvent>,
    format: DataFormat,
    mut stop: watch::Receiver<bool>,
    stats: Arc<EventLogStats>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            event = rx.recv() => match event {
                Some(event) => append(&csv, &event, format, &stats).await,
                None => break,
            },
        }
    }

    // Best-effort drain of what is already queued.
    let mut drained = 0usize;
    while let Ok(event) = rx.try_recv() {
        append(&csv, &event, format, &stats).await;
        drained += 1;
    }
    if drained > 0 {
        debug!(drained, "Drained queued events on shutdown");
    }

    if let Err(e) = csv.lock().await.flush().await {
        stats.flush_failures.fetch_add(1, Ordering::Relaxed);
        warn!(error = %e, "Final event log flush failed");
    }
}

async fn append(csv: &SharedRowSink, event: &TcpEvent, format: DataFormat, stats: &EventLogStats) {
    let fields = EventRow::from_event(event, format).to_fields();
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();

    match csv.lock().await.write_row(&fields).await {
        Ok(()) => {
            stats.rows_written.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            // Not retried: the row is lost.
            stats.rows_failed.fetch_add(1, Ordering::Relaxed);
            error!(
                connection_id = %event.connection_id(),
                kind = %event.kind(),
                error = %e,
                "Failed to append event log row"
            );
        }
    }
}

async fn run_flusher(
    csv: SharedRowSink,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    stats: Arc<EventLogStats>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            _ = ticker.tick() => {
                if let Err(e) = csv.lock().await.flush().await {
                    stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Event log flush failed");
                }
            }
        }
    }
}

/// Resolves once a stop is requested or the controlling handle is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Reads a durable log back into rows, checking the header.
pub fn read_event_log(path: impl AsRef<Path>) -> Result<Vec<EventRow>, EventLogError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| EventLogError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = CsvReader::new(BufReader::new(file));

    match reader.read_row()? {
        Some(header) if header == HEADER => {}
        Some(header) => {
            return Err(EventLogError::invalid_row(
                reader.line_number(),
                format!("unexpected header {:?}", header),
            ))
        }
        None => return Ok(Vec::new()),
    }

    let mut rows = Vec::new();
    while let Some(fields) = reader.read_row()? {
        if fields.len() == 1 && fields[0].is_empty() {
            continue;
        }
        rows.push(EventRow::from_fields(&fields, reader.line_number())?);
    }
    Ok(rows)
}
