/// 标注渲染 (Annotation rendering)
///
/// - annotator: 检测框 + 标签绘制
/// - font:      点阵 / TrueType 标签字体
pub mod annotator;
pub mod font;

pub use annotator::{label_text, tag_geometry, FrameAnnotator, TagGeometry};
pub use font::{LabelFont, Palette, TextSize};
