// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 实时检测广播 (Detection stream)
///
/// 采集 → SSD 推理 → 标注 → JPEG/Base64 → JSON → ZeroMQ PUB
///
/// 退出码: 0 = 源正常结束; 1 = 初始化失败
use std::process::ExitCode;

use clap::Parser;
use mimalloc::MiMalloc;
use tracing::{error, info};

use detstream::codec::MediaTranscoder;
use detstream::config::{Args, PipelineConfig};
use detstream::detection::ClassLabelTable;
use detstream::errors::InitError;
use detstream::input::{open_source, recording_fps};
use detstream::models::SsdMobileNet;
use detstream::output::MjpegWriter;
use detstream::pipeline::{Pipeline, RunSummary};
use detstream::render::{FrameAnnotator, LabelFont};
use detstream::telemetry;
use detstream::transport::{MessagePublisher, ZmqTransport};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.print_config {
        return match config.to_json() {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("❌ {}", e);
                ExitCode::FAILURE
            }
        };
    }

    exit_code(build(&args, &config).map(|mut pipeline| pipeline.run()))
}

/// 源正常结束 → 0, 初始化失败 → 1
fn exit_code(result: Result<RunSummary, InitError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ initialization failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build(args: &Args, config: &PipelineConfig) -> Result<Pipeline, InitError> {
    let transport = ZmqTransport::bind(&config.bind_address, config.sndhwm)?;

    let engine = SsdMobileNet::load(&config.model, config.prefer_accelerated, config.blob_params())
        .map_err(|source| InitError::Model {
            path: config.model.display().to_string(),
            source,
        })?;

    let labels = match &config.labels {
        Some(path) => ClassLabelTable::from_file(path)?,
        None => ClassLabelTable::voc(),
    };
    info!("🏷️ {} class labels", labels.len());

    let font = match &config.font_path {
        Some(path) => LabelFont::load(path, config.font_px)?,
        None => LabelFont::default(),
    };

    let source = open_source(&args.source)?;
    let fps = recording_fps(source.fps(), config.fallback_fps);
    info!("📷 source {} at {} fps", source.describe(), fps);

    let mut pipeline = Pipeline::new(
        source,
        Box::new(engine),
        labels,
        MessagePublisher::new(transport),
    )
    .with_threshold(config.conf_threshold)
    .with_annotator(FrameAnnotator::new(font))
    .with_transcoder(MediaTranscoder::new(config.jpeg_quality));

    if let Some(output) = &args.output {
        let writer = MjpegWriter::create(output, fps, config.jpeg_quality).map_err(|source| {
            InitError::Writer {
                path: output.display().to_string(),
                source,
            }
        })?;
        pipeline = pipeline.with_writer(Box::new(writer));
    }

    Ok(pipeline)
}
