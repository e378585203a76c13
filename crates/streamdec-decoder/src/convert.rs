use ffmpeg_next::Rational;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as FfFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags};
use streamdec_types::{DecoderError, DecoderResult, PixelLayout, RgbFrame};
use tracing::debug;

/// Converts decoded pictures into packed 3-byte-per-pixel buffers.
pub(crate) struct FrameConverter {
    layout: PixelLayout,
    cache: Option<ScalingCache>,
}

struct ScalingCache {
    src_fmt: Pixel,
    width: u32,
    height: u32,
    scaler: ScalingContext,
    scratch: FfFrame,
}

impl ScalingCache {
    fn matches(&self, src_fmt: Pixel, width: u32, height: u32) -> bool {
        self.src_fmt == src_fmt && self.width == width && self.height == height
    }
}

impl FrameConverter {
    pub(crate) fn new(layout: PixelLayout) -> Self {
        Self {
            layout,
            cache: None,
        }
    }

    pub(crate) fn convert(
        &mut self,
        frame: &FfFrame,
        time_base: Rational,
    ) -> DecoderResult<RgbFrame> {
        let width = frame.width();
        let height = frame.height();
        let src_fmt = frame.format();
        if width == 0 || height == 0 || src_fmt == Pixel::None {
            return Err(DecoderError::Convert(format!(
                "decoded frame has no usable geometry ({width}x{height}, {src_fmt:?})"
            )));
        }

        let layout = self.layout;
        let cache = self.scaling_cache(src_fmt, width, height)?;
        cache
            .scaler
            .run(frame, &mut cache.scratch)
            .map_err(|err| DecoderError::Convert(err.to_string()))?;
        let data = pack_rows(
            cache.scratch.data(0),
            cache.scratch.stride(0),
            RgbFrame::packed_len(width, 1),
            height as usize,
        )?;

        let timestamp = seconds_from(frame.pts().or_else(|| frame.timestamp()), time_base);
        RgbFrame::new(width, height, timestamp, layout, data)
    }

    fn scaling_cache(
        &mut self,
        src_fmt: Pixel,
        width: u32,
        height: u32,
    ) -> DecoderResult<&mut ScalingCache> {
        let reusable = matches!(&self.cache, Some(cache) if cache.matches(src_fmt, width, height));
        if !reusable {
            let dst_fmt = match self.layout {
                PixelLayout::Rgb24 => Pixel::RGB24,
                PixelLayout::Bgr24 => Pixel::BGR24,
            };
            let scaler = ScalingContext::get(
                src_fmt,
                width,
                height,
                dst_fmt,
                width,
                height,
                Flags::BILINEAR,
            )
            .map_err(|err| DecoderError::Convert(err.to_string()))?;
            debug!(?src_fmt, ?dst_fmt, width, height, "scaler configured");
            self.cache = Some(ScalingCache {
                src_fmt,
                width,
                height,
                scaler,
                scratch: FfFrame::empty(),
            });
        }
        self.cache
            .as_mut()
            .ok_or_else(|| DecoderError::Convert("scaler unavailable".into()))
    }
}

/// Copies `rows` rows of `row_bytes` out of a plane with the given stride.
fn pack_rows(plane: &[u8], stride: usize, row_bytes: usize, rows: usize) -> DecoderResult<Vec<u8>> {
    let mut out = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let start = row * stride;
        let Some(line) = plane.get(start..start + row_bytes) else {
            return Err(DecoderError::Convert(format!(
                "converted plane ends at row {row} of {rows}"
            )));
        };
        out.extend_from_slice(line);
    }
    Ok(out)
}

/// Presentation time in seconds; missing timestamps map to zero.
fn seconds_from(ts: Option<i64>, time_base: Rational) -> f64 {
    let Some(ts) = ts else {
        return 0.0;
    };
    if time_base.denominator() == 0 {
        return 0.0;
    }
    ts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}
