// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 本地录像 (Motion-JPEG AVI writer)
//!
//! 单视频流 AVI 1.0 容器, 每帧一个 `00dc` JPEG 块, 结束时写 `idx1` 索引并回填各长度字段.
//! 头部在第一帧到达时写入, 尺寸以第一帧为准.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::codec::MediaTranscoder;
use crate::input::{effective_fps, Frame};

/// 录像输出接口
pub trait VideoWriter {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// 写出索引并关闭, 重复调用无副作用
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;
}

// 头部字段偏移
const OFF_RIFF_SIZE: u64 = 4;
const OFF_MAX_BYTES_PER_SEC: u64 = 36;
const OFF_TOTAL_FRAMES: u64 = 48;
const OFF_AVIH_BUFFER: u64 = 60;
const OFF_STRH_LENGTH: u64 = 140;
const OFF_STRH_BUFFER: u64 = 144;
const OFF_MOVI_SIZE: u64 = 216;
/// `movi` 四字符码所在位置, idx1 偏移以此为基准
const MOVI_FOURCC: u64 = 220;
/// 第一个数据块位置
pub const HEADER_LEN: u64 = 224;

/// RIFF 长度与 idx1 偏移均为 u32, 文件不能超过该长度
pub const MAX_FILE_LEN: u64 = u32::MAX as u64;
const IDX_ENTRY_LEN: u64 = 16;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

pub struct MjpegWriter<W: Write + Seek> {
    out: W,
    fps: f64,
    transcoder: MediaTranscoder,
    size: Option<(u32, u32)>,
    index: Vec<(u32, u32)>, // (相对 movi 的偏移, 数据长度)
    cursor: u64,
    max_chunk: u32,
    finished: bool,
}

impl MjpegWriter<BufWriter<File>> {
    /// 创建录像文件, 非正帧率按 30 处理
    pub fn create<P: AsRef<Path>>(path: P, fps: f64, quality: u8) -> std::io::Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("🎬 recording to {:?} at {} fps", path.as_ref(), effective_fps(fps));
        Ok(Self::new(BufWriter::new(file), fps, quality))
    }
}

impl<W: Write + Seek> MjpegWriter<W> {
    pub fn new(out: W, fps: f64, quality: u8) -> Self {
        Self {
            out,
            fps: effective_fps(fps),
            transcoder: MediaTranscoder::new(quality),
            size: None,
            index: Vec::new(),
            cursor: HEADER_LEN,
            max_chunk: 0,
            finished: false,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    fn write_header(&mut self, width: u32, height: u32) -> Result<()> {
        let mut h = Vec::with_capacity(HEADER_LEN as usize);
        let rate = (self.fps * 1000.0).round() as u32;
        let us_per_frame = (1_000_000.0 / self.fps).round() as u32;

        h.extend_from_slice(b"RIFF");
        put_u32(&mut h, 0);
        h.extend_from_slice(b"AVI ");

        h.extend_from_slice(b"LIST");
        put_u32(&mut h, 192);
        h.extend_from_slice(b"hdrl");

        h.extend_from_slice(b"avih");
        put_u32(&mut h, 56);
        for v in [
            us_per_frame,
            0, // max bytes/sec
            0,
            AVIF_HASINDEX,
            0, // total frames
            0,
            1, // streams
            0, // suggested buffer
            width,
            height,
            0,
            0,
            0,
            0,
        ] {
            put_u32(&mut h, v);
        }

        h.extend_from_slice(b"LIST");
        put_u32(&mut h, 116);
        h.extend_from_slice(b"strl");

        h.extend_from_slice(b"strh");
        put_u32(&mut h, 56);
        h.extend_from_slice(b"vids");
        h.extend_from_slice(b"MJPG");
        put_u32(&mut h, 0); // flags
        put_u16(&mut h, 0); // priority
        put_u16(&mut h, 0); // language
        for v in [0, 1000, rate, 0, 0, 0, u32::MAX, 0] {
            put_u32(&mut h, v);
        }
        for v in [0, 0, width as u16, height as u16] {
            put_u16(&mut h, v);
        }

        h.extend_from_slice(b"strf");
        put_u32(&mut h, 40);
        put_u32(&mut h, 40);
        put_u32(&mut h, width);
        put_u32(&mut h, height);
        put_u16(&mut h, 1);
        put_u16(&mut h, 24);
        h.extend_from_slice(b"MJPG");
        put_u32(&mut h, width * height * 3);
        for _ in 0..4 {
            put_u32(&mut h, 0);
        }

        h.extend_from_slice(b"LIST");
        put_u32(&mut h, 0);
        h.extend_from_slice(b"movi");
        debug_assert_eq!(h.len() as u64, HEADER_LEN);

        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&h)?;
        self.size = Some((width, height));
        Ok(())
    }

    fn patch_u32(&mut self, offset: u64, value: u32) -> Result<()> {
        self.out.seek(SeekFrom::Start(offset))?;
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

impl<W: Write + Seek> VideoWriter for MjpegWriter<W> {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            bail!("writer already finished");
        }
        let dims = (frame.width(), frame.height());
        match self.size {
            None => self.write_header(dims.0, dims.1)?,
            Some(size) if size != dims => bail!(
                "frame size {}x{} differs from recording size {}x{}",
                dims.0,
                dims.1,
                size.0,
                size.1
            ),
            Some(_) => {}
        }

        let jpeg = self
            .transcoder
            .compress(frame)
            .context("failed to encode recording frame")?;
        let padded = jpeg.len() as u64 + jpeg.len() as u64 % 2;
        let chunk = 8 + padded;
        // 写入本块后仍需容纳完整的 idx1
        let index_len = 8 + (self.index.len() as u64 + 1) * IDX_ENTRY_LEN;
        if self.cursor + chunk + index_len > MAX_FILE_LEN {
            bail!(
                "recording reached the AVI size limit after {} frames",
                self.index.len()
            );
        }
        let len = jpeg.len() as u32;

        self.out.seek(SeekFrom::Start(self.cursor))?;
        self.out.write_all(b"00dc")?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(&jpeg)?;
        if len % 2 == 1 {
            self.out.write_all(&[0])?;
        }

        self.index.push(((self.cursor - MOVI_FOURCC) as u32, len));
        self.cursor += chunk;
        self.max_chunk = self.max_chunk.max(len);
        debug!("recorded frame {} ({} bytes)", self.index.len(), len);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.size.is_none() {
            self.write_header(0, 0)?;
        }

        let mut idx = Vec::with_capacity(8 + self.index.len() * 16);
        idx.extend_from_slice(b"idx1");
        put_u32(&mut idx, (self.index.len() * 16) as u32);
        for &(offset, len) in &self.index {
            idx.extend_from_slice(b"00dc");
            put_u32(&mut idx, AVIIF_KEYFRAME);
            put_u32(&mut idx, offset);
            put_u32(&mut idx, len);
        }
        self.out.seek(SeekFrom::Start(self.cursor))?;
        self.out.write_all(&idx)?;
        let end = self.cursor + idx.len() as u64;

        let frames = self.index.len() as u32;
        let max_rate = (self.max_chunk as f64 * self.fps).round() as u32;
        self.patch_u32(OFF_RIFF_SIZE, (end - 8) as u32)?;
        self.patch_u32(OFF_MAX_BYTES_PER_SEC, max_rate)?;
        self.patch_u32(OFF_TOTAL_FRAMES, frames)?;
        self.patch_u32(OFF_AVIH_BUFFER, self.max_chunk)?;
        self.patch_u32(OFF_STRH_LENGTH, frames)?;
        self.patch_u32(OFF_STRH_BUFFER, self.max_chunk)?;
        self.patch_u32(OFF_MOVI_SIZE, (self.cursor - MOVI_FOURCC) as u32)?;
        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;

        info!("🎬 recording finished: {} frames", frames);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.index.len() as u64
    }
}

impl<W: Write + Seek> Drop for MjpegWriter<W> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn frame(w: u32, h: u32, i: u64) -> Frame {
        Frame::new(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([i as u8 * 40, 90, 200]))),
            i,
        )
    }

    fn u32_at(buf: &[u8], off: usize) -> u32 {
        u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
    }

    #[test]
    fn test_avi_layout() {
        let mut writer = MjpegWriter::new(Cursor::new(Vec::new()), 25.0, 80);
        for i in 0..3 {
            writer.write(&frame(32, 24, i)).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.frames_written(), 3);
        let buf = std::mem::replace(&mut writer.out, Cursor::new(Vec::new())).into_inner();

        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"AVI ");
        assert_eq!(u32_at(&buf, 4) as usize, buf.len() - 8);
        assert_eq!(u32_at(&buf, 32), 40_000);
        assert_eq!(u32_at(&buf, 48), 3);
        assert_eq!((u32_at(&buf, 64), u32_at(&buf, 68)), (32, 24));
        assert_eq!(&buf[112..116], b"MJPG");
        assert_eq!(u32_at(&buf, 132), 25_000);
        assert_eq!(u32_at(&buf, 140), 3);

        let first = HEADER_LEN as usize;
        assert_eq!(&buf[first..first + 4], b"00dc");
        assert_eq!(&buf[first + 8..first + 10], &[0xff, 0xd8]);

        let movi_end = MOVI_FOURCC as usize + u32_at(&buf, 216) as usize;
        assert_eq!(&buf[movi_end..movi_end + 4], b"idx1");
        assert_eq!(u32_at(&buf, movi_end + 4), 48);
        assert_eq!(u32_at(&buf, movi_end + 16), 4);
        assert_eq!(movi_end + 8 + 48, buf.len());
    }

    #[test]
    fn test_default_fps_and_size_mismatch() {
        let mut writer = MjpegWriter::new(Cursor::new(Vec::new()), 0.0, 80);
        assert_eq!(writer.fps(), 30.0);
        writer.write(&frame(16, 16, 0)).unwrap();
        assert!(writer.write(&frame(8, 8, 1)).is_err());
        assert_eq!(writer.frames_written(), 1);
    }

    #[test]
    fn test_finish_without_frames_and_twice() {
        let mut writer = MjpegWriter::new(Cursor::new(Vec::new()), 30.0, 80);
        writer.finish().unwrap();
        writer.finish().unwrap();
        assert!(writer.write(&frame(4, 4, 0)).is_err());
    }

    /// 只记录写入位置与头部字节的输出
    #[derive(Default)]
    struct Sink {
        pos: u64,
        len: u64,
        head: Vec<u8>,
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            for (i, &b) in buf.iter().enumerate() {
                let at = self.pos as usize + i;
                if at < HEADER_LEN as usize {
                    if self.head.len() <= at {
                        self.head.resize(at + 1, 0);
                    }
                    self.head[at] = b;
                }
            }
            self.pos += buf.len() as u64;
            self.len = self.len.max(self.pos);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for Sink {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.pos = match pos {
                SeekFrom::Start(p) => p,
                SeekFrom::End(d) => (self.len as i64 + d) as u64,
                SeekFrom::Current(d) => (self.pos as i64 + d) as u64,
            };
            Ok(self.pos)
        }
    }

    #[test]
    fn test_size_limit_keeps_file_consistent() {
        let mut writer = MjpegWriter::new(Sink::default(), 30.0, 80);
        writer.write(&frame(16, 16, 0)).unwrap();
        writer.cursor = MAX_FILE_LEN - 64;

        let err = writer.write(&frame(16, 16, 1)).unwrap_err();
        assert!(err.to_string().contains("size limit"));
        assert_eq!(writer.frames_written(), 1);

        writer.finish().unwrap();
        let sink = std::mem::take(&mut writer.out);
        assert!(sink.len <= MAX_FILE_LEN);
        assert_eq!(u32_at(&sink.head, 4) as u64, sink.len - 8);
        assert_eq!(u32_at(&sink.head, 48), 1);
    }

    #[test]
    fn test_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");
        {
            let mut writer = MjpegWriter::create(&path, 15.0, 80).unwrap();
            writer.write(&frame(10, 10, 0)).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 48), 1);
        assert!(MjpegWriter::create(dir.path().join("missing/out.avi"), 15.0, 80).is_err());
    }
}
