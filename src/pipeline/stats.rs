// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 吞吐统计: 每秒一行汇总, 各阶段耗时按 debug 级别输出

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// 单帧各阶段耗时 (毫秒)
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub inference_ms: f64,
    pub extract_ms: f64,
    pub annotate_ms: f64,
    pub encode_ms: f64,
    pub publish_ms: f64,
}

impl StageTimings {
    pub fn total_ms(&self) -> f64 {
        self.inference_ms + self.extract_ms + self.annotate_ms + self.encode_ms + self.publish_ms
    }
}

pub(crate) fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// 运行结束时的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// 已处理的帧数 (= 最终帧计数)
    pub frames: u64,
    pub published: u64,
    /// 推理或编码失败而未发布的帧
    pub skipped: u64,
    /// 传输层丢弃的帧
    pub dropped: u64,
}

/// 每秒统计窗口
pub struct ThroughputMeter {
    window: Duration,
    last: Instant,
    count: u64,
    busy_ms: f64,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl ThroughputMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Instant::now(),
            count: 0,
            busy_ms: 0.0,
        }
    }

    /// 记录一帧; 窗口到期时输出一行统计并返回当前 fps
    pub fn record(&mut self, timings: &StageTimings, summary: &RunSummary) -> Option<f64> {
        self.count += 1;
        self.busy_ms += timings.total_ms();

        let elapsed = self.last.elapsed();
        if elapsed < self.window {
            return None;
        }
        let fps = self.count as f64 / elapsed.as_secs_f64();
        let avg_ms = self.busy_ms / self.count as f64;
        info!(
            "📊 {:.1} fps | {:.1} ms/frame | frames {} | published {} | skipped {} | dropped {}",
            fps, avg_ms, summary.frames, summary.published, summary.skipped, summary.dropped
        );

        self.count = 0;
        self.busy_ms = 0.0;
        self.last = Instant::now();
        Some(fps)
    }
}
