#![allow(dead_code)]

use std::iter;

use ffmpeg_next::{Packet, Rational, codec, encoder, format, frame};
use streamdec_decoder::{Configuration, Response, RgbFrame, Session};

/// Limited-range BT.601 red.
pub const RED_YUV: [u8; 3] = [81, 90, 240];
pub const GREY_YUV: [u8; 3] = [128, 128, 128];

/// Builds a YUV4MPEG2 clip of `frames` solid-colour 4:2:0 frames at 25 fps.
pub fn y4m_clip(width: u32, height: u32, frames: usize, yuv: [u8; 3]) -> Vec<u8> {
    let mut out = format!("YUV4MPEG2 W{width} H{height} F25:1 Ip A1:1 C420jpeg\n").into_bytes();
    let luma = width as usize * height as usize;
    let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize;
    for _ in 0..frames {
        out.extend_from_slice(b"FRAME\n");
        out.extend(iter::repeat_n(yuv[0], luma));
        out.extend(iter::repeat_n(yuv[1], chroma));
        out.extend(iter::repeat_n(yuv[2], chroma));
    }
    out
}

/// Length of the YUV4MPEG2 stream header, including its newline.
pub fn y4m_header_len(clip: &[u8]) -> usize {
    clip.iter().position(|b| *b == b'\n').map_or(0, |pos| pos + 1)
}

/// Builds a mono 16-bit PCM WAV file: a well-formed container without video.
pub fn wav_clip(samples: usize) -> Vec<u8> {
    let sample_rate = 8_000u32;
    let data_len = (samples * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..samples {
        let sample = ((i % 64) as i16 - 32) * 256;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Encodes a moving gradient as MPEG-1 video with B-frames in an MPEG-TS
/// container. The decoder holds frames back, so the last ones only come out
/// when it is drained.
pub fn mpegts_clip(width: u32, height: u32, frames: usize) -> Vec<u8> {
    ffmpeg_next::init().expect("ffmpeg init");
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("clip.ts");
    let time_base = Rational(1, 25);

    let codec = encoder::find(codec::Id::MPEG1VIDEO).expect("mpeg1video encoder");
    let mut output = format::output(&path).expect("mpegts muxer");
    let mut settings = codec::Context::new_with_codec(codec)
        .encoder()
        .video()
        .expect("video encoder");
    settings.set_width(width);
    settings.set_height(height);
    settings.set_format(format::Pixel::YUV420P);
    settings.set_time_base(time_base);
    settings.set_frame_rate(Some((25, 1)));
    settings.set_bit_rate(400_000);
    settings.set_gop(12);
    settings.set_max_b_frames(2);
    let mut video = settings.open_as(codec).expect("open encoder");

    let index = {
        let mut stream = output.add_stream(codec).expect("output stream");
        stream.set_parameters(&video);
        stream.set_time_base(time_base);
        stream.index()
    };
    output.write_header().expect("write header");
    let stream_time_base = output.stream(index).expect("output stream").time_base();

    let mut picture = frame::Video::new(format::Pixel::YUV420P, width, height);
    for n in 0..frames {
        for plane in 0..3 {
            let stride = picture.stride(plane);
            let shift = if plane == 0 { 0 } else { 1 };
            let data = picture.data_mut(plane);
            for row in 0..(height as usize >> shift) {
                for col in 0..(width as usize >> shift) {
                    data[row * stride + col] = if plane == 0 {
                        ((row + col) * 3 + n * 8) as u8
                    } else {
                        128
                    };
                }
            }
        }
        picture.set_pts(Some(n as i64));
        video.send_frame(&picture).expect("send frame");
        write_encoded(&mut video, &mut output, index, time_base, stream_time_base);
    }
    video.send_eof().expect("flush encoder");
    write_encoded(&mut video, &mut output, index, time_base, stream_time_base);
    output.write_trailer().expect("write trailer");
    drop(output);

    std::fs::read(&path).expect("read clip")
}

fn write_encoded(
    video: &mut encoder::Video,
    output: &mut format::context::Output,
    index: usize,
    from: Rational,
    to: Rational,
) {
    let mut packet = Packet::empty();
    while video.receive_packet(&mut packet).is_ok() {
        packet.set_stream(index);
        packet.rescale_ts(from, to);
        packet.write_interleaved(output).expect("write packet");
    }
}

pub fn open_session() -> Session {
    Session::open(Configuration::default()).expect("session")
}

/// Polls until a terminal response, returning the frames and the terminal.
pub fn drain(session: &mut Session) -> (Vec<RgbFrame>, Response) {
    let mut frames = Vec::new();
    for _ in 0..10_000 {
        match session.poll() {
            Response::Frame(frame) => frames.push(frame),
            Response::Again => panic!("unexpected Again after {} frames", frames.len()),
            terminal => return (frames, terminal),
        }
    }
    panic!("session never reached a terminal response");
}
