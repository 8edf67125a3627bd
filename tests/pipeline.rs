// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use image::{DynamicImage, Rgb, Rgb32FImage, RgbImage};
use ndarray::{arr2, Array2};

use detstream::codec::{decode_text, DetectionEnvelope};
use detstream::detection::{ClassLabelTable, RawDetectionTensor};
use detstream::errors::PublishError;
use detstream::input::{Frame, FrameSource};
use detstream::models::InferenceEngine;
use detstream::output::VideoWriter;
use detstream::pipeline::{Pipeline, PipelineState, RunSummary, SkipReason, TickOutcome};
use detstream::transport::{MessagePublisher, Transport};

// ---------- mock collaborators ----------

struct VecSource {
    frames: VecDeque<Frame>,
    released: Rc<Cell<bool>>,
}

impl FrameSource for VecSource {
    fn read_next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    fn fps(&self) -> f64 {
        0.0
    }

    fn release(&mut self) {
        self.released.set(true);
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

/// 每次调用按脚本返回张量或错误, 脚本用完后返回空张量
struct ScriptedEngine {
    script: VecDeque<Result<RawDetectionTensor>>,
}

impl InferenceEngine for ScriptedEngine {
    fn infer(&mut self, _frame: &Frame) -> Result<RawDetectionTensor> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(Array2::zeros((0, 7))))
    }
}

#[derive(Clone, Default)]
struct SharedTransport {
    sent: Rc<RefCell<Vec<String>>>,
    fail: Rc<Cell<bool>>,
}

impl Transport for SharedTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), PublishError> {
        if self.fail.get() {
            return Err(PublishError::WouldBlock);
        }
        self.sent
            .borrow_mut()
            .push(String::from_utf8(payload.to_vec()).unwrap());
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "inproc://test"
    }
}

#[derive(Clone, Default)]
struct SharedWriter {
    frames: Rc<Cell<u64>>,
    finished: Rc<Cell<bool>>,
    fail: bool,
}

impl VideoWriter for SharedWriter {
    fn write(&mut self, _frame: &Frame) -> Result<()> {
        if self.fail {
            return Err(anyhow!("disk full"));
        }
        self.frames.set(self.frames.get() + 1);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished.set(true);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.get()
    }
}

// ---------- helpers ----------

fn rgb(w: u32, h: u32) -> Frame {
    Frame::new(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([40, 80, 120]))),
        0,
    )
}

fn float_frame() -> Frame {
    Frame::new(DynamicImage::ImageRgb32F(Rgb32FImage::new(64, 48)), 0)
}

struct Harness {
    pipeline: Pipeline<SharedTransport>,
    transport: SharedTransport,
    released: Rc<Cell<bool>>,
}

fn harness(frames: Vec<Frame>, script: Vec<Result<RawDetectionTensor>>) -> Harness {
    let released = Rc::new(Cell::new(false));
    let transport = SharedTransport::default();
    let source = VecSource {
        frames: frames.into(),
        released: released.clone(),
    };
    let engine = ScriptedEngine {
        script: script.into(),
    };
    let pipeline = Pipeline::new(
        Box::new(source),
        Box::new(engine),
        ClassLabelTable::voc(),
        MessagePublisher::new(transport.clone()),
    );
    Harness {
        pipeline,
        transport,
        released,
    }
}

fn published(transport: &SharedTransport) -> Vec<DetectionEnvelope> {
    transport
        .sent
        .borrow()
        .iter()
        .map(|json| DetectionEnvelope::from_json(json).unwrap())
        .collect()
}

// ---------- tests ----------

#[test]
fn test_person_detection_end_to_end() {
    let tensor = arr2(&[
        [0.0, 15.0, 0.91, 0.1, 0.2, 0.4, 0.5],
        [0.0, 7.0, 0.10, 0.0, 0.0, 1.0, 1.0],
    ]);
    let mut h = harness(vec![rgb(640, 480)], vec![Ok(tensor)]);

    let summary = h.pipeline.run();
    assert_eq!(
        summary,
        RunSummary {
            frames: 1,
            published: 1,
            skipped: 0,
            dropped: 0
        }
    );

    let envs = published(&h.transport);
    assert_eq!(envs.len(), 1);
    let env = &envs[0];
    assert_eq!(env.frame, 0);
    assert_eq!(env.detections.len(), 1);
    let det = &env.detections[0];
    assert_eq!(det.class_id, 15);
    assert_eq!(det.label, "person");
    assert_eq!(det.confidence, 0.91);
    assert_eq!(det.bbox.to_array(), [64, 96, 256, 240]);

    let jpeg = decode_text(&env.image).unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (640, 480));
}

#[test]
fn test_no_detections_still_publishes_image() {
    let tensor = arr2(&[
        [0.0, 15.0, 0.2, 0.1, 0.1, 0.2, 0.2],
        [0.0, 3.0, 0.05, 0.3, 0.3, 0.6, 0.6],
    ]);
    let mut h = harness(vec![rgb(32, 32)], vec![Ok(tensor)]);
    h.pipeline.run();

    let raw = h.transport.sent.borrow()[0].clone();
    assert!(raw.contains(r#""detections":[]"#));
    let env = DetectionEnvelope::from_json(&raw).unwrap();
    assert!(env.detections.is_empty());
    assert!(!env.image.is_empty());
}

#[test]
fn test_encode_failure_advances_counter() {
    let mut h = harness(vec![rgb(64, 48), float_frame(), rgb(64, 48)], Vec::new());

    assert_eq!(
        h.pipeline.tick(),
        TickOutcome::Published {
            frame: 0,
            detections: 0
        }
    );
    assert!(matches!(
        h.pipeline.tick(),
        TickOutcome::Skipped {
            frame: 1,
            reason: SkipReason::Encode(_)
        }
    ));
    assert_eq!(
        h.pipeline.tick(),
        TickOutcome::Published {
            frame: 2,
            detections: 0
        }
    );
    assert_eq!(h.pipeline.tick(), TickOutcome::EndOfStream);

    let frames: Vec<i64> = published(&h.transport).iter().map(|e| e.frame).collect();
    assert_eq!(frames, vec![0, 2]);
    assert_eq!(h.pipeline.summary().skipped, 1);
    assert_eq!(h.pipeline.frame_counter(), 3);
}

#[test]
fn test_inference_failure_skips_frame() {
    let script = vec![
        Ok(Array2::zeros((0, 7))),
        Err(anyhow!("session lost")),
        Ok(Array2::zeros((0, 7))),
    ];
    let mut h = harness(vec![rgb(16, 16), rgb(16, 16), rgb(16, 16)], script);
    let summary = h.pipeline.run();

    let frames: Vec<i64> = published(&h.transport).iter().map(|e| e.frame).collect();
    assert_eq!(frames, vec![0, 2]);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn test_publish_errors_are_swallowed() {
    let mut h = harness((0..4).map(|_| rgb(8, 8)).collect(), Vec::new());
    h.transport.fail.set(true);

    assert_eq!(h.pipeline.tick(), TickOutcome::Dropped { frame: 0 });
    assert_eq!(h.pipeline.tick(), TickOutcome::Dropped { frame: 1 });
    h.transport.fail.set(false);
    let summary = h.pipeline.run();

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.dropped, 2);
    assert_eq!(summary.published, 2);
    let frames: Vec<i64> = published(&h.transport).iter().map(|e| e.frame).collect();
    assert_eq!(frames, vec![2, 3]);
}

#[test]
fn test_counter_strictly_increasing() {
    let frames: Vec<Frame> = (0..20)
        .map(|i| if i % 3 == 1 { float_frame() } else { rgb(8, 8) })
        .collect();
    let mut h = harness(frames, Vec::new());
    h.pipeline.run();

    let published: Vec<i64> = published(&h.transport).iter().map(|e| e.frame).collect();
    assert!(published.windows(2).all(|w| w[1] > w[0]));
    let expected: Vec<i64> = (0..20).filter(|i| i % 3 != 1).collect();
    assert_eq!(published, expected);
}

#[test]
fn test_state_machine_and_release() {
    let writer = SharedWriter::default();
    let mut h = harness(vec![rgb(8, 8)], Vec::new());
    h.pipeline = h.pipeline.with_writer(Box::new(writer.clone()));
    assert_eq!(h.pipeline.state(), PipelineState::Initializing);

    h.pipeline.tick();
    assert_eq!(h.pipeline.state(), PipelineState::Running);
    assert_eq!(h.pipeline.tick(), TickOutcome::EndOfStream);
    assert_eq!(h.pipeline.state(), PipelineState::Draining);
    assert!(!h.released.get());

    h.pipeline.drain();
    assert_eq!(h.pipeline.state(), PipelineState::Stopped);
    assert!(h.released.get());
    assert!(writer.finished.get());
    assert_eq!(writer.frames.get(), 1);
    assert_eq!(h.pipeline.tick(), TickOutcome::EndOfStream);
}

#[test]
fn test_empty_frame_ends_stream() {
    let mut h = harness(vec![rgb(8, 8), rgb(0, 0), rgb(8, 8)], Vec::new());
    let summary = h.pipeline.run();
    assert_eq!(summary.frames, 1);
    assert!(h.released.get());
}

#[test]
fn test_writer_skips_unencoded_frames_and_errors_are_logged() {
    let writer = SharedWriter::default();
    let mut h = harness(vec![rgb(8, 8), float_frame(), rgb(8, 8)], Vec::new());
    h.pipeline = h.pipeline.with_writer(Box::new(writer.clone()));
    h.pipeline.run();
    assert_eq!(writer.frames.get(), 2);

    let failing = SharedWriter {
        fail: true,
        ..Default::default()
    };
    let mut h = harness(vec![rgb(8, 8), rgb(8, 8)], Vec::new());
    h.pipeline = h.pipeline.with_writer(Box::new(failing));
    let summary = h.pipeline.run();
    assert_eq!(summary.published, 2);
}

#[test]
fn test_threshold_is_configurable() {
    let tensor = arr2(&[[0.0, 12.0, 0.5, 0.0, 0.0, 0.5, 0.5]]);
    let mut h = harness(vec![rgb(100, 100)], vec![Ok(tensor)]);
    h.pipeline = h.pipeline.with_threshold(0.6);
    assert_eq!(
        h.pipeline.tick(),
        TickOutcome::Published {
            frame: 0,
            detections: 0
        }
    );
}
