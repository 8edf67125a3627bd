// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 标签字体 (Label fonts)
//!
//! 默认使用内置 5x7 点阵字体, 无需任何字体文件; 配置字体路径时改用
//! ab_glyph 加载的 TrueType 字体.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};

use crate::errors::InitError;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// 可由RGB三元组构造的8位像素类型
pub trait Palette: Pixel<Subpixel = u8> + 'static {
    fn from_rgb(rgb: [u8; 3]) -> Self;
}

impl Palette for Rgb<u8> {
    fn from_rgb(rgb: [u8; 3]) -> Self {
        Rgb(rgb)
    }
}

impl Palette for Rgba<u8> {
    fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        Rgba([r, g, b, 255])
    }
}

impl Palette for Luma<u8> {
    fn from_rgb(rgb: [u8; 3]) -> Self {
        Luma([luminance(rgb)])
    }
}

impl Palette for LumaA<u8> {
    fn from_rgb(rgb: [u8; 3]) -> Self {
        LumaA([luminance(rgb), 255])
    }
}

fn luminance([r, g, b]: [u8; 3]) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// 文本尺寸: 宽, 字高 (基线以上), 基线以下余量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSize {
    pub width: u32,
    pub height: u32,
    pub baseline: u32,
}

#[derive(Clone)]
pub enum LabelFont {
    /// 点阵字体, `scale` 为像素放大倍数
    Bitmap { scale: u32 },
    TrueType { font: FontArc, scale: PxScale },
}

impl Default for LabelFont {
    fn default() -> Self {
        LabelFont::Bitmap { scale: 2 }
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelFont::Bitmap { scale } => f.debug_struct("Bitmap").field("scale", scale).finish(),
            LabelFont::TrueType { scale, .. } => {
                f.debug_struct("TrueType").field("px", &scale.y).finish()
            }
        }
    }
}

impl LabelFont {
    /// 加载 TrueType/OpenType 字体
    pub fn load(path: impl AsRef<Path>, px: f32) -> Result<Self, InitError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| InitError::Config {
            path: path.display().to_string(),
            reason: format!("font unreadable: {e}"),
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| InitError::Config {
            path: path.display().to_string(),
            reason: format!("invalid font: {e}"),
        })?;
        Ok(LabelFont::TrueType {
            font,
            scale: PxScale::from(px),
        })
    }

    pub fn text_size(&self, text: &str) -> TextSize {
        match self {
            LabelFont::Bitmap { scale } => {
                let chars = text.chars().count() as u32;
                TextSize {
                    width: (chars * (GLYPH_W + 1)).saturating_sub(1) * scale,
                    height: GLYPH_H * scale,
                    baseline: 2 * scale,
                }
            }
            LabelFont::TrueType { font, scale } => {
                let (width, height) = imageproc::drawing::text_size(*scale, font, text);
                TextSize {
                    width,
                    height,
                    baseline: (height / 4).max(1),
                }
            }
        }
    }

    /// 以 `(x, top)` 为左上角绘制文本, 超出画布部分裁掉
    pub fn draw<P: Palette>(
        &self,
        img: &mut ImageBuffer<P, Vec<u8>>,
        x: i32,
        top: i32,
        text: &str,
        color: P,
    ) {
        match self {
            LabelFont::Bitmap { scale } => draw_bitmap(img, x, top, text, color, *scale),
            LabelFont::TrueType { font, scale } => {
                imageproc::drawing::draw_text_mut(img, color, x, top, *scale, font, text)
            }
        }
    }
}

fn draw_bitmap<P: Palette>(
    img: &mut ImageBuffer<P, Vec<u8>>,
    mut x: i32,
    top: i32,
    text: &str,
    color: P,
    scale: u32,
) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let s = scale.max(1) as i32;

    for ch in text.chars().flat_map(char::to_uppercase) {
        let glyph = glyph_bits(ch);
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_W as i32 {
                if (bits >> (GLYPH_W as i32 - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..s {
                    for dx in 0..s {
                        let px = x + col * s + dx;
                        let py = top + row as i32 * s + dy;
                        if px >= 0 && px < w && py >= 0 && py < h {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        x += (GLYPH_W as i32 + 1) * s;
    }
}

fn glyph_bits(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        ' ' => [0; 7],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}
