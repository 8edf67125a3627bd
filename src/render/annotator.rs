// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧标注器 (Frame annotator)
//!
//! 每个检测: 绿色矩形框 + 框左上角上方的白底黑字标签.
//! 原地修改帧, 没有失败路径.

use image::{DynamicImage, ImageBuffer};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::debug;

use super::font::{LabelFont, Palette, TextSize};
use crate::detection::{BBox, DetectionRecord};
use crate::input::Frame;

pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const TAG_COLOR: [u8; 3] = [255, 255, 255];
pub const TEXT_COLOR: [u8; 3] = [0, 0, 0];

/// 标签 `"<name>: <confidence:.2>"`
pub fn label_text(det: &DetectionRecord) -> String {
    format!("{}: {:.2}", det.label, det.confidence)
}

/// 标签背景框与文字位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagGeometry {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    /// 文字左上角
    pub text_x: i32,
    pub text_y: i32,
}

/// 计算标签位置: 基线锚在框顶; 框顶距帧顶不足一个字高时锚在字高处
pub fn tag_geometry(bbox: &BBox, size: TextSize) -> TagGeometry {
    let anchor = bbox.y0.max(size.height as i32);
    TagGeometry {
        left: bbox.x0,
        top: anchor - size.height as i32,
        width: size.width,
        height: size.height + size.baseline,
        text_x: bbox.x0,
        text_y: anchor - size.height as i32,
    }
}

#[derive(Debug, Clone)]
pub struct FrameAnnotator {
    font: LabelFont,
    thickness: u32,
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(LabelFont::default())
    }
}

impl FrameAnnotator {
    pub fn new(font: LabelFont) -> Self {
        Self { font, thickness: 2 }
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness.max(1);
        self
    }

    pub fn font(&self) -> &LabelFont {
        &self.font
    }

    /// 在帧上绘制全部检测 (按顺序: 框, 标签, 框, 标签...)
    pub fn annotate(&self, frame: &mut Frame, detections: &[DetectionRecord]) {
        if detections.is_empty() {
            return;
        }
        match frame.image_mut() {
            DynamicImage::ImageRgb8(img) => self.draw_all(img, detections),
            DynamicImage::ImageRgba8(img) => self.draw_all(img, detections),
            DynamicImage::ImageLuma8(img) => self.draw_all(img, detections),
            DynamicImage::ImageLumaA8(img) => self.draw_all(img, detections),
            other => debug!(color = ?other.color(), "no annotation for pixel layout"),
        }
    }

    fn draw_all<P: Palette>(&self, img: &mut ImageBuffer<P, Vec<u8>>, detections: &[DetectionRecord]) {
        for det in detections {
            self.draw_box(img, &det.bbox);
            self.draw_tag(img, det);
        }
    }

    fn draw_box<P: Palette>(&self, img: &mut ImageBuffer<P, Vec<u8>>, bbox: &BBox) {
        let color = P::from_rgb(BOX_COLOR);
        for t in 0..self.thickness as i32 {
            let w = bbox.width() + 1 - 2 * t;
            let h = bbox.height() + 1 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(bbox.x0 + t, bbox.y0 + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(img, rect, color);
        }
    }

    fn draw_tag<P: Palette>(&self, img: &mut ImageBuffer<P, Vec<u8>>, det: &DetectionRecord) {
        let text = label_text(det);
        let geo = tag_geometry(&det.bbox, self.font.text_size(&text));

        if geo.width > 0 && geo.height > 0 {
            let rect = Rect::at(geo.left, geo.top).of_size(geo.width, geo.height);
            draw_filled_rect_mut(img, rect, P::from_rgb(TAG_COLOR));
        }
        self.font
            .draw(img, geo.text_x, geo.text_y, &text, P::from_rgb(TEXT_COLOR));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgb32FImage, RgbImage};

    fn record(bbox: BBox) -> DetectionRecord {
        DetectionRecord {
            class_id: 15,
            label: "person".to_string(),
            confidence: 0.91,
            bbox,
        }
    }

    #[test]
    fn test_label_text() {
        assert_eq!(label_text(&record(BBox::default())), "person: 0.91");
        let mut r = record(BBox::default());
        r.confidence = 0.5;
        r.label = "Unknown".into();
        assert_eq!(label_text(&r), "Unknown: 0.50");
    }

    #[test]
    fn test_tag_above_box() {
        let size = TextSize { width: 40, height: 14, baseline: 4 };
        let geo = tag_geometry(&BBox::new(64, 96, 256, 240), size);
        assert_eq!(geo.top, 82);
        assert_eq!(geo.left, 64);
        assert_eq!(geo.height, 18);
        assert_eq!(geo.text_y, 82);
    }

    #[test]
    fn test_tag_clamped_to_top_edge() {
        let size = TextSize { width: 40, height: 14, baseline: 4 };
        let geo = tag_geometry(&BBox::new(10, 3, 50, 50), size);
        assert_eq!(geo.top, 0);
        assert!(geo.top >= 0);

        let geo = tag_geometry(&BBox::new(10, 0, 50, 50), size);
        assert_eq!(geo.top, 0);
    }

    #[test]
    fn test_annotate_rgb() {
        let mut frame = Frame::new(DynamicImage::ImageRgb8(RgbImage::new(200, 150)), 0);
        let annotator = FrameAnnotator::default();
        annotator.annotate(&mut frame, &[record(BBox::new(20, 60, 120, 140))]);

        let img = frame.image().as_rgb8().unwrap();
        // 框角与框内侧
        assert_eq!(img.get_pixel(20, 140), &Rgb(BOX_COLOR));
        assert_eq!(img.get_pixel(120, 100), &Rgb(BOX_COLOR));
        assert_eq!(img.get_pixel(21, 139), &Rgb(BOX_COLOR));
        // 框中心不变
        assert_eq!(img.get_pixel(70, 100), &Rgb([0, 0, 0]));
        // 标签背景位于框上方
        let size = annotator.font().text_size("person: 0.91");
        let tag_y = 60 - size.height + 1;
        assert_eq!(img.get_pixel(20 + size.width - 1, tag_y), &Rgb(TAG_COLOR));
    }

    #[test]
    fn test_degenerate_box_does_not_panic() {
        let mut frame = Frame::new(DynamicImage::ImageRgb8(RgbImage::new(50, 50)), 0);
        let annotator = FrameAnnotator::default();
        annotator.annotate(
            &mut frame,
            &[record(BBox::new(49, 49, 49, 49)), record(BBox::new(0, 0, 0, 0))],
        );
        // 标签锚定在帧顶 (x=10 为字间空白列)
        let img = frame.image().as_rgb8().unwrap();
        assert_eq!(img.get_pixel(10, 0), &Rgb(TAG_COLOR));
    }

    #[test]
    fn test_unsupported_layout_left_untouched() {
        let image = DynamicImage::ImageRgb32F(Rgb32FImage::new(10, 10));
        let mut frame = Frame::new(image.clone(), 0);
        FrameAnnotator::default().annotate(&mut frame, &[record(BBox::new(1, 1, 5, 5))]);
        assert_eq!(frame.image(), &image);
    }
}
