pub mod ela;
pub mod recompress;
pub mod spectrum;
