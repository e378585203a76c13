//! Value types shared by the streamdec pipeline and its adapters.

mod error;
mod frame;
mod response;

pub use error::{DecoderError, DecoderResult};
pub use frame::{PixelLayout, PixelLayoutParseError, RgbFrame};
pub use response::{Response, Status};
