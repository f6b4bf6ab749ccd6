pub mod engines;
pub mod preprocess;
pub mod strategy;

pub use engines::{tool_installed, EasyOcrEngine, OcrEngine, RawReading, TesseractEngine};
pub use preprocess::{clean_for_ocr, Variant};
pub use strategy::LocalRecognitionStrategy;
