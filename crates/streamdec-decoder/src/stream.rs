use std::ptr;

use ffmpeg_next::codec;
use ffmpeg_next::decoder;
use ffmpeg_next::error::Error as FfmpegError;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::frame::Video as FfFrame;
use ffmpeg_next::media;
use ffmpeg_next::packet::Packet;
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_next::Rational;
use streamdec_types::{DecoderError, DecoderResult};
use tracing::{debug, trace};

use crate::config::Configuration;
use crate::container::Container;
use crate::session::Progress;

/// The selected video stream together with its opened decoder.
pub(crate) struct VideoStream {
    index: usize,
    time_base: Rational,
    decoder: decoder::Video,
    packets: u64,
    wait_for_first_packet: bool,
    draining: bool,
}

impl VideoStream {
    /// Gathers stream info, picks the best video stream and opens its decoder.
    ///
    /// With journaled input, gathering stream info may have swallowed
    /// a partial packet when it ran the queue dry, so the container is reopened
    /// from the first byte before demuxing starts.
    pub(crate) fn select(
        container: &mut Container,
        config: &Configuration,
    ) -> DecoderResult<Progress<Self>> {
        let starved = match container.find_stream_info() {
            Ok(starved) => starved,
            Err(err) => {
                debug!(error = %err, "stream info incomplete");
                if container.is_journaled() {
                    container.restart(config)?;
                }
                return Ok(Progress::Again);
            }
        };
        if container.is_journaled() && starved && has_incomplete_video(container.input()) {
            debug!("video parameters incomplete, waiting for more input");
            container.restart(config)?;
            return Ok(Progress::Again);
        }

        let stream = container
            .input()
            .streams()
            .best(media::Type::Video)
            .ok_or(DecoderError::NoVideoStream)?;
        let index = stream.index();
        let time_base = stream.time_base();
        let decoder = open_decoder(&stream, config)?;
        debug!(
            index,
            codec = ?decoder.id(),
            width = decoder.width(),
            height = decoder.height(),
            "video decoder opened"
        );
        if container.is_journaled() && starved {
            container.restart(config)?;
        }

        Ok(Progress::Ready(Self {
            index,
            time_base,
            decoder,
            packets: 0,
            wait_for_first_packet: container.is_journaled(),
            draining: false,
        }))
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Produces the next decoded picture into `frame`.
    ///
    /// Buffered decoder output is returned first. Otherwise packets of the
    /// selected stream are fed until the decoder emits a picture or the
    /// demuxer runs out of packets.
    pub(crate) fn decode_next(
        &mut self,
        container: &mut Container,
        frame: &mut FfFrame,
    ) -> DecoderResult<Progress<()>> {
        if self.draining {
            return self.receive_drained(frame);
        }

        loop {
            match self.decoder.receive_frame(frame) {
                Ok(()) => return Ok(Progress::Ready(())),
                Err(FfmpegError::Eof) => return Ok(Progress::EndOfInput),
                Err(err) if is_again(&err) => {}
                Err(err) => return Err(DecoderError::Decode(err.to_string())),
            }

            let packet = match self.next_packet(container) {
                Progress::Ready(packet) => packet,
                Progress::Again => return Ok(Progress::Again),
                // A header without any packet yet looks exactly like a cut
                // stream; wait for more bytes instead of finishing.
                Progress::EndOfInput if self.packets == 0 && self.wait_for_first_packet => {
                    trace!(stream = self.index, "no packets yet");
                    return Ok(Progress::Again);
                }
                Progress::EndOfInput => {
                    debug!(stream = self.index, "demuxer finished, draining decoder");
                    self.draining = true;
                    self.decoder
                        .send_eof()
                        .map_err(|err| DecoderError::SendPacket(err.to_string()))?;
                    return self.receive_drained(frame);
                }
            };

            self.packets += 1;
            self.decoder
                .send_packet(&packet)
                .map_err(|err| DecoderError::SendPacket(err.to_string()))?;
        }
    }

    fn next_packet(&self, container: &mut Container) -> Progress<Packet> {
        loop {
            match container.read_packet() {
                Progress::Ready(packet) if packet.stream() == self.index => {
                    return Progress::Ready(packet);
                }
                Progress::Ready(packet) => {
                    trace!(stream = packet.stream(), "skipping packet of another stream")
                }
                pending => return pending,
            }
        }
    }

    fn receive_drained(&mut self, frame: &mut FfFrame) -> DecoderResult<Progress<()>> {
        match self.decoder.receive_frame(frame) {
            Ok(()) => Ok(Progress::Ready(())),
            Err(FfmpegError::Eof) => Ok(Progress::EndOfInput),
            Err(err) if is_again(&err) => Ok(Progress::EndOfInput),
            Err(err) => Err(DecoderError::Decode(err.to_string())),
        }
    }
}

fn open_decoder(stream: &Stream, config: &Configuration) -> DecoderResult<decoder::Video> {
    let raw = unsafe { ffi::avcodec_alloc_context3(ptr::null()) };
    if raw.is_null() {
        return Err(DecoderError::Allocation("codec context"));
    }
    let mut context = unsafe { codec::Context::wrap(raw, None) };
    context
        .set_parameters(stream.parameters())
        .map_err(|err| DecoderError::CopyParameters(err.to_string()))?;
    if let Some(threads) = config.decoder_threads {
        context.set_threading(codec::threading::Config {
            kind: codec::threading::Type::Frame,
            count: threads.get(),
        });
    }
    context
        .decoder()
        .video()
        .map_err(|err| DecoderError::OpenCodec(err.to_string()))
}

fn has_incomplete_video(input: &Input) -> bool {
    input.streams().any(|stream| {
        let parameters = stream.parameters();
        if parameters.medium() != media::Type::Video {
            return false;
        }
        unsafe {
            let raw = parameters.as_ptr();
            (*raw).width <= 0 || (*raw).height <= 0 || (*raw).format < 0
        }
    })
}

fn is_again(err: &FfmpegError) -> bool {
    matches!(err, FfmpegError::Other { errno } if *errno == EAGAIN)
}
