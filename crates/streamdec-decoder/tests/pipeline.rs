mod common;

use common::{
    GREY_YUV, RED_YUV, drain, mpegts_clip, open_session, wav_clip, y4m_clip, y4m_header_len,
};
use streamdec_decoder::{
    Configuration, DEFAULT_PROBE_LIMIT, PixelLayout, Progress, Response, Session, Status,
};

#[test]
fn starved_header_resumes_after_more_input() {
    let clip = y4m_clip(16, 8, 3, GREY_YUV);
    let header = y4m_header_len(&clip);
    for split in [4, 12, header - 1] {
        let mut session = open_session();
        session.push(&clip[..split]);
        assert_eq!(session.poll(), Response::Again, "split at {split}");
        assert!(!session.is_container_open());

        session.push(&clip[split..]);
        let (frames, terminal) = drain(&mut session);
        assert_eq!(terminal, Response::EndOfInput, "split at {split}");
        assert_eq!(frames.len(), 3, "split at {split}");
    }
}

#[test]
fn repeated_again_does_not_lose_bytes() {
    let clip = y4m_clip(16, 8, 2, GREY_YUV);
    let mut session = open_session();
    session.push(&clip[..10]);
    for _ in 0..5 {
        assert_eq!(session.poll(), Response::Again);
    }
    assert_eq!(session.buffered(), 10);
    session.push(&clip[10..]);
    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), 2);
    assert_eq!(terminal, Response::EndOfInput);
}

#[test]
fn empty_session_asks_for_input() {
    let mut session = open_session();
    assert_eq!(session.poll(), Response::Again);
    assert_eq!(session.poll().status(), Status::Again);
}

#[test]
fn setup_is_idempotent() {
    let clip = y4m_clip(32, 18, 2, GREY_YUV);
    let mut session = open_session();
    session.push(&clip);

    assert_eq!(session.ensure_open().unwrap(), Progress::Ready(()));
    let format = session.container_format();
    let buffered = session.buffered();
    assert_eq!(session.ensure_open().unwrap(), Progress::Ready(()));
    assert_eq!(session.container_format(), format);
    assert_eq!(session.buffered(), buffered);

    assert_eq!(session.ensure_stream_ready().unwrap(), Progress::Ready(()));
    let selected = session.selected_stream();
    assert_eq!(selected, Some(0));
    let buffered = session.buffered();
    for _ in 0..3 {
        assert_eq!(session.ensure_open().unwrap(), Progress::Ready(()));
        assert_eq!(session.ensure_stream_ready().unwrap(), Progress::Ready(()));
    }
    assert_eq!(session.selected_stream(), selected);
    assert_eq!(session.buffered(), buffered);
    assert_eq!(session.container_format().as_deref(), Some("yuv4mpegpipe"));

    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), 2);
    assert_eq!(terminal, Response::EndOfInput);
}

#[test]
fn frames_are_tightly_packed_for_every_size() {
    for (width, height) in [(16, 8), (32, 18), (48, 48), (64, 36), (160, 90)] {
        let mut session = open_session();
        session.push(&y4m_clip(width, height, 2, GREY_YUV));
        let (frames, _) = drain(&mut session);
        assert_eq!(frames.len(), 2, "{width}x{height}");
        for frame in frames {
            assert_eq!(frame.width(), width);
            assert_eq!(frame.height(), height);
            assert_eq!(frame.data().len(), (width * height * 3) as usize);
        }
    }
}

#[test]
fn complete_clip_yields_every_frame_then_one_end() {
    let frames_in_clip = 5;
    let mut session = open_session();
    session.push(&y4m_clip(16, 8, frames_in_clip, GREY_YUV));

    let mut timestamps = Vec::new();
    loop {
        match session.poll() {
            Response::Frame(frame) => timestamps.push(frame.timestamp()),
            Response::EndOfInput => break,
            other => panic!("unexpected response {other:?}"),
        }
    }
    assert_eq!(timestamps.len(), frames_in_clip);
    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(timestamps[0].abs() < 1e-9);
    assert!((timestamps[1] - 0.04).abs() < 1e-6);
}

#[test]
fn terminal_responses_repeat() {
    let mut session = open_session();
    session.push(&y4m_clip(16, 8, 1, GREY_YUV));
    let (_, terminal) = drain(&mut session);
    assert_eq!(terminal, Response::EndOfInput);
    assert!(session.is_finished());
    assert_eq!(session.poll(), Response::EndOfInput);

    let mut broken = open_session();
    broken.push(&vec![0u8; DEFAULT_PROBE_LIMIT]);
    let first = broken.poll();
    assert!(matches!(first, Response::Fatal(_)));
    assert_eq!(broken.poll(), first);
}

#[test]
fn unrecognized_bytes_are_fatal() {
    let mut session = open_session();
    session.push(&vec![0u8; DEFAULT_PROBE_LIMIT]);
    match session.poll() {
        Response::Fatal(message) => assert!(!message.is_empty()),
        other => panic!("expected Fatal, got {other:?}"),
    }
    drop(session);
}

#[test]
fn short_unrecognized_prefix_waits() {
    let mut session = open_session();
    session.push(&[0u8; 512]);
    assert_eq!(session.poll(), Response::Again);
}

#[test]
fn audio_only_container_has_no_video_stream() {
    let mut session = open_session();
    session.push(&wav_clip(4_000));
    assert_eq!(session.poll(), Response::Fatal("no video stream".into()));
    assert!(session.is_container_open());
    assert_eq!(session.selected_stream(), None);
}

#[test]
fn pixel_layout_controls_channel_order() {
    let clip = y4m_clip(16, 8, 1, RED_YUV);
    for layout in [PixelLayout::Rgb24, PixelLayout::Bgr24] {
        let config = Configuration {
            pixel_layout: layout,
            ..Configuration::default()
        };
        let mut session = Session::open(config).unwrap();
        session.push(&clip);
        let frame = session.poll().into_frame().expect("frame");
        assert_eq!(frame.layout(), layout);

        let [r, g, b] = frame.rgb_at(4, 4).unwrap();
        assert!(r > 200 && g < 40 && b < 40, "{layout}: {r},{g},{b}");
        let first = frame.data()[0];
        match layout {
            PixelLayout::Rgb24 => assert!(first > 200),
            PixelLayout::Bgr24 => assert!(first < 40),
        }
    }
}

#[test]
fn strict_open_fails_on_incomplete_header() {
    let clip = y4m_clip(16, 8, 1, GREY_YUV);
    let config = Configuration {
        retry_incomplete_header: false,
        ..Configuration::default()
    };
    let mut session = Session::open(config).unwrap();
    session.push(&clip[..20]);
    assert!(matches!(session.poll(), Response::Fatal(_)));
}

#[test]
fn strict_open_decodes_complete_input() {
    let config = Configuration {
        retry_incomplete_header: false,
        ..Configuration::default()
    };
    let mut session = Session::open(config).unwrap();
    session.push(&y4m_clip(16, 8, 2, GREY_YUV));
    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), 2);
    assert_eq!(terminal, Response::EndOfInput);
}

#[test]
fn small_io_buffer_and_chunked_header() {
    let clip = y4m_clip(16, 8, 3, GREY_YUV);
    let config = Configuration {
        io_buffer_size: std::num::NonZeroUsize::new(64).unwrap(),
        ..Configuration::default()
    };
    let mut session = Session::open(config).unwrap();
    let header = y4m_header_len(&clip);
    for chunk in clip[..header].chunks(7) {
        session.push(chunk);
        if session.poll() != Response::Again {
            panic!("header chunk should not be enough to decode");
        }
    }
    session.push(&clip[header..]);
    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), 3);
    assert_eq!(terminal, Response::EndOfInput);
}

#[test]
fn header_without_frames_waits_for_packets() {
    let clip = y4m_clip(16, 8, 2, GREY_YUV);
    let header = y4m_header_len(&clip);
    let mut session = open_session();
    session.push(&clip[..header]);
    assert_eq!(session.poll(), Response::Again);
    assert!(session.is_container_open());
    assert_eq!(session.poll(), Response::Again);

    session.push(&clip[header..]);
    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), 2);
    assert_eq!(terminal, Response::EndOfInput);
}

#[test]
fn packet_cut_by_empty_queue_is_replayed() {
    let frames_in_clip = 4;
    let clip = y4m_clip(16, 8, frames_in_clip, GREY_YUV);
    let cut = y4m_header_len(&clip) + b"FRAME\n".len() + 50;
    let mut session = open_session();
    session.push(&clip[..cut]);
    assert_eq!(session.poll(), Response::Again);
    assert_eq!(session.poll(), Response::Again);

    session.push(&clip[cut..]);
    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), frames_in_clip);
    assert_eq!(terminal, Response::EndOfInput);
    for (n, frame) in frames.iter().enumerate() {
        assert!((frame.timestamp() - n as f64 * 0.04).abs() < 1e-6, "frame {n}");
    }
}

#[test]
fn packet_cut_after_first_frame_is_replayed() {
    let clip = y4m_clip(16, 8, 3, GREY_YUV);
    let first_packet_end = y4m_header_len(&clip) + b"FRAME\n".len() + 16 * 8 * 3 / 2;
    let mut session = open_session();
    session.push(&clip[..first_packet_end + 20]);
    assert!(matches!(session.poll(), Response::Frame(_)));
    assert_eq!(session.poll(), Response::Again);

    session.push(&clip[first_packet_end + 20..]);
    let (frames, terminal) = drain(&mut session);
    assert_eq!(frames.len(), 2);
    assert_eq!(terminal, Response::EndOfInput);
}

#[test]
fn small_chunks_polled_after_each_push_yield_every_frame() {
    let frames_in_clip = 6;
    let clip = y4m_clip(16, 8, frames_in_clip, GREY_YUV);
    let mut session = open_session();
    let mut frames = Vec::new();
    for chunk in clip.chunks(37) {
        session.push(chunk);
        match session.poll() {
            Response::Frame(frame) => frames.push(frame),
            Response::Again => {}
            other => panic!("unexpected {other:?} after {} frames", frames.len()),
        }
    }
    let (rest, terminal) = drain(&mut session);
    frames.extend(rest);
    assert_eq!(frames.len(), frames_in_clip);
    assert_eq!(terminal, Response::EndOfInput);
    assert!(frames.windows(2).all(|pair| pair[0].timestamp() < pair[1].timestamp()));
}

#[test]
fn delayed_frames_are_drained_at_end_of_input() {
    let frames_in_clip = 30;
    let mut session = open_session();
    session.push(&mpegts_clip(64, 48, frames_in_clip));

    let (frames, terminal) = drain(&mut session);
    assert_eq!(terminal, Response::EndOfInput);
    assert_eq!(session.container_format().as_deref(), Some("mpegts"));
    assert_eq!(frames.len(), frames_in_clip);
    assert!(frames.windows(2).all(|pair| pair[0].timestamp() <= pair[1].timestamp()));
    for frame in &frames {
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }
    assert_eq!(session.poll(), Response::EndOfInput);
}
