use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::annotation::domain::frame_processor::FrameProcessor;
use crate::pipeline::stream_executor::{StreamConfig, StreamExecutor, StreamSummary};
use crate::shared::error::AnnotateError;
use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// What a worker hands back for one sequence number.
enum WorkResult {
    Annotated { frame: Frame, annotate_ms: f64 },
    Skipped(AnnotateError),
    Failed(SendError),
}

/// Push-style execution: every frame is a callback into the processor, and
/// several callbacks run at once.
///
/// Layout: `reader → N workers [process] → main [reorder] → sink`
///
/// The processor is shared by reference across workers, so it must not
/// hold per-frame state. The main thread restores capture order before
/// frames reach the sink.
pub struct ThreadedCallbackExecutor {
    workers: usize,
    channel_capacity: usize,
}

impl ThreadedCallbackExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadedCallbackExecutor {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self::new(workers)
    }
}

impl StreamExecutor for ThreadedCallbackExecutor {
    fn execute(
        &self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        processor: Arc<dyn FrameProcessor>,
        metadata: &StreamMetadata,
        mut config: StreamConfig,
    ) -> Result<StreamSummary, Box<dyn std::error::Error>> {
        if let Err(e) = sink.open(metadata) {
            source.close();
            return Err(e);
        }
        config.logger.info(&format!(
            "Streaming {}x{} with {} workers",
            metadata.width, metadata.height, self.workers
        ));
        let cap = self.channel_capacity.max(self.workers);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<(usize, Result<Frame, SendError>)>(cap);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<(usize, WorkResult)>(cap);

        let reader_handle = spawn_reader(source, frame_tx, config.cancelled.clone(), config.max_frames);
        let worker_handles: Vec<_> = (0..self.workers)
            .map(|_| spawn_worker(processor.clone(), frame_rx.clone(), result_tx.clone()))
            .collect();
        drop(frame_rx);
        drop(result_tx);

        let result = run_main_loop(result_rx, sink.as_mut(), metadata, &mut config);

        let mut first_error = result.as_ref().err().map(|e| e.to_string());
        if reader_handle.join().is_err() && first_error.is_none() {
            first_error = Some("Reader thread panicked".to_string());
        }
        for handle in worker_handles {
            if handle.join().is_err() && first_error.is_none() {
                first_error = Some("Worker thread panicked".to_string());
            }
        }
        let closed = sink.close();
        config.logger.summary();

        if let Some(e) = first_error {
            return Err(e.into());
        }
        closed?;
        let summary = result?;
        log::info!("Stream finished: {summary} ({} workers)", self.workers);
        Ok(summary)
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    frame_tx: crossbeam_channel::Sender<(usize, Result<Frame, SendError>)>,
    cancelled: Arc<AtomicBool>,
    max_frames: Option<usize>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        {
            let mut frames = source.frames();
            let mut seq = 0;
            while !cancelled.load(Ordering::Relaxed) && max_frames.map_or(true, |max| seq < max) {
                let Some(next) = frames.next() else {
                    break;
                };
                let mapped = next.map_err(|e| -> SendError { e.to_string().into() });
                let failed = mapped.is_err();
                if frame_tx.send((seq, mapped)).is_err() || failed {
                    break;
                }
                seq += 1;
            }
        }
        source.close();
    })
}

fn spawn_worker(
    processor: Arc<dyn FrameProcessor>,
    frame_rx: crossbeam_channel::Receiver<(usize, Result<Frame, SendError>)>,
    result_tx: crossbeam_channel::Sender<(usize, WorkResult)>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for (seq, frame_result) in frame_rx {
            let result = match frame_result {
                Ok(frame) => {
                    let t0 = Instant::now();
                    match processor.process(frame) {
                        Ok(frame) => WorkResult::Annotated {
                            frame,
                            annotate_ms: t0.elapsed().as_secs_f64() * 1000.0,
                        },
                        Err(e) if e.is_recoverable() => WorkResult::Skipped(e),
                        Err(e) => WorkResult::Failed(Box::new(e)),
                    }
                }
                Err(e) => WorkResult::Failed(e),
            };
            if result_tx.send((seq, result)).is_err() {
                break;
            }
        }
    })
}

/// Receives results in completion order and delivers them in sequence order.
fn run_main_loop(
    result_rx: crossbeam_channel::Receiver<(usize, WorkResult)>,
    sink: &mut dyn FrameSink,
    metadata: &StreamMetadata,
    config: &mut StreamConfig,
) -> Result<StreamSummary, Box<dyn std::error::Error>> {
    let total = config.expected_frames(metadata);
    let mut summary = StreamSummary::default();
    let mut pending: BTreeMap<usize, WorkResult> = BTreeMap::new();
    let mut next_seq = 0;

    for (seq, result) in result_rx {
        pending.insert(seq, result);
        config.logger.metric("reorder_backlog", pending.len() as f64);

        while let Some(result) = pending.remove(&next_seq) {
            if config.is_cancelled() {
                summary.stopped = true;
                return Ok(summary);
            }
            next_seq += 1;
            match result {
                WorkResult::Annotated { frame, annotate_ms } => {
                    summary.frames_read += 1;
                    config.logger.timing("annotate", annotate_ms);
                    let t0 = Instant::now();
                    sink.show(&frame)?;
                    config.logger.timing("show", t0.elapsed().as_secs_f64() * 1000.0);
                    summary.frames_annotated += 1;
                    if !config.report_progress(summary.frames_annotated, total) {
                        // Signal the reader too, so the run winds down.
                        config.cancelled.store(true, Ordering::Relaxed);
                        summary.stopped = true;
                        return Ok(summary);
                    }
                }
                WorkResult::Skipped(e) => {
                    summary.frames_read += 1;
                    summary.frames_skipped += 1;
                    log::warn!("Skipping frame {}: {e}", next_seq - 1);
                }
                WorkResult::Failed(e) => return Err(e.to_string().into()),
            }
        }
    }

    summary.stopped = config.is_cancelled();
    Ok(summary)
}
