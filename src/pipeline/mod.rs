// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 逐帧处理流水线 (Per-frame processing pipeline)
///
/// 单线程, 同步, 每个 tick 内各阶段严格顺序执行:
/// 采集 → 推理 → 提取 → 标注 → 转码 → 封装 → 发布 → (可选) 录像
///
/// 状态机: `Initializing → Running → Draining → Stopped`
///
/// 帧计数从 0 开始, 每个处理过的 tick 恰好加 1, 与本帧是否发布成功无关.
pub mod stats;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::codec::{EnvelopeBuilder, MediaTranscoder};
use crate::detection::{ClassLabelTable, DetectionExtractor, DEFAULT_CONF_THRESHOLD};
use crate::input::FrameSource;
use crate::models::InferenceEngine;
use crate::output::VideoWriter;
use crate::render::FrameAnnotator;
use crate::transport::{MessagePublisher, Transport, ZmqTransport};

pub use stats::{RunSummary, StageTimings, ThroughputMeter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

/// 未发布的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Inference(String),
    Encode(String),
    Envelope(String),
}

/// 单个 tick 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 已交给传输层
    Published { frame: i64, detections: usize },
    /// 传输层拒绝, 已记录并丢弃
    Dropped { frame: i64 },
    /// 本帧未发布, 计数照常前进
    Skipped { frame: i64, reason: SkipReason },
    /// 源已耗尽或给出空帧
    EndOfStream,
}

pub struct Pipeline<T: Transport = ZmqTransport> {
    source: Box<dyn FrameSource>,
    engine: Box<dyn InferenceEngine>,
    labels: ClassLabelTable,
    threshold: f32,
    annotator: FrameAnnotator,
    transcoder: MediaTranscoder,
    builder: EnvelopeBuilder,
    publisher: MessagePublisher<T>,
    writer: Option<Box<dyn VideoWriter>>,
    state: PipelineState,
    frame_counter: i64,
    skipped: u64,
    meter: ThroughputMeter,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: Box<dyn InferenceEngine>,
        labels: ClassLabelTable,
        publisher: MessagePublisher<T>,
    ) -> Self {
        Self {
            source,
            engine,
            labels,
            threshold: DEFAULT_CONF_THRESHOLD,
            annotator: FrameAnnotator::default(),
            transcoder: MediaTranscoder::default(),
            builder: EnvelopeBuilder,
            publisher,
            writer: None,
            state: PipelineState::Initializing,
            frame_counter: 0,
            skipped: 0,
            meter: ThroughputMeter::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_transcoder(mut self, transcoder: MediaTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn VideoWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 下一个 tick 将使用的帧号
    pub fn frame_counter(&self) -> i64 {
        self.frame_counter
    }

    pub fn publisher(&self) -> &MessagePublisher<T> {
        &self.publisher
    }

    pub fn summary(&self) -> RunSummary {
        let stats = self.publisher.stats();
        RunSummary {
            frames: self.frame_counter as u64,
            published: stats.published,
            skipped: self.skipped,
            dropped: stats.dropped,
        }
    }

    /// 运行直到源耗尽, 然后释放资源
    pub fn run(&mut self) -> RunSummary {
        info!(
            "🚀 pipeline running: source={} engine={} threshold={}",
            self.source.describe(),
            self.engine.name(),
            self.threshold
        );
        while self.tick() != TickOutcome::EndOfStream {}
        self.drain();

        let summary = self.summary();
        info!(
            "🏁 stream ended: frames {} | published {} | skipped {} | dropped {}",
            summary.frames, summary.published, summary.skipped, summary.dropped
        );
        summary
    }

    /// 处理一帧
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            PipelineState::Initializing => self.state = PipelineState::Running,
            PipelineState::Running => {}
            PipelineState::Draining | PipelineState::Stopped => return TickOutcome::EndOfStream,
        }

        let mut frame = match self.source.read_next_frame() {
            Some(frame) if !frame.is_empty() => frame,
            _ => {
                self.state = PipelineState::Draining;
                return TickOutcome::EndOfStream;
            }
        };

        let frame_no = self.frame_counter;
        let mut timings = StageTimings::default();
        let outcome = self.process(frame_no, &mut frame, &mut timings);
        self.frame_counter += 1;

        if matches!(outcome, TickOutcome::Skipped { .. }) {
            self.skipped += 1;
        }
        debug!(
            frame = frame_no,
            inference_ms = timings.inference_ms,
            extract_ms = timings.extract_ms,
            annotate_ms = timings.annotate_ms,
            encode_ms = timings.encode_ms,
            publish_ms = timings.publish_ms,
            "tick"
        );
        let summary = self.summary();
        self.meter.record(&timings, &summary);
        outcome
    }

    fn process(
        &mut self,
        frame_no: i64,
        frame: &mut crate::input::Frame,
        timings: &mut StageTimings,
    ) -> TickOutcome {
        let t = Instant::now();
        let tensor = match self.engine.infer(frame) {
            Ok(tensor) => tensor,
            Err(e) => {
                warn!(frame = frame_no, error = %format!("{e:#}"), "inference failed, frame skipped");
                return TickOutcome::Skipped {
                    frame: frame_no,
                    reason: SkipReason::Inference(e.to_string()),
                };
            }
        };
        timings.inference_ms = stats::ms_since(t);

        let t = Instant::now();
        let detections = DetectionExtractor::new(&self.labels, self.threshold).extract(
            &tensor,
            frame.width(),
            frame.height(),
        );
        timings.extract_ms = stats::ms_since(t);

        let t = Instant::now();
        self.annotator.annotate(frame, &detections);
        timings.annotate_ms = stats::ms_since(t);

        let t = Instant::now();
        let image = match self.transcoder.transcode(frame) {
            Ok(image) => image,
            Err(e) => {
                warn!(frame = frame_no, error = %e, "encode failed, frame skipped");
                return TickOutcome::Skipped {
                    frame: frame_no,
                    reason: SkipReason::Encode(e.to_string()),
                };
            }
        };
        timings.encode_ms = stats::ms_since(t);

        let count = detections.len();
        let envelope = self.builder.build(frame_no, detections, image);
        let payload = match self.builder.serialize(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(frame = frame_no, error = %e, "envelope serialization failed, frame skipped");
                return TickOutcome::Skipped {
                    frame: frame_no,
                    reason: SkipReason::Envelope(e.to_string()),
                };
            }
        };

        let t = Instant::now();
        let sent = self.publisher.publish(frame_no, &payload);
        timings.publish_ms = stats::ms_since(t);

        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write(frame) {
                warn!(frame = frame_no, error = %format!("{e:#}"), "recording write failed");
            }
        }

        if sent {
            TickOutcome::Published {
                frame: frame_no,
                detections: count,
            }
        } else {
            TickOutcome::Dropped { frame: frame_no }
        }
    }

    /// 释放采集源与录像句柄
    pub fn drain(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        self.state = PipelineState::Draining;
        self.source.release();
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.finish() {
                warn!(error = %format!("{e:#}"), "failed to finalize recording");
            }
        }
        self.state = PipelineState::Stopped;
    }
}
