//! Raw frame export through the command surface: slice delivery over a
//! real loopback socket, reset sequencing, and pipe idempotence.

mod support;

use std::io::Read;
use std::net::TcpListener;

use stagecast_protocol::BYTES_PER_PIXEL;

use support::{initialize, scripted_session, sim_session};

#[test]
fn sliced_frames_arrive_over_the_loopback_socket() {
    let (_engine, sink, mut session) = sim_session();
    initialize(&mut session);

    // 8x4 scaled frames, sliced to the 2x2 interior starting at (1,1):
    // the sim engine fills row r with byte r, so the slice is a row of
    // 1s over a row of 2s.
    session.handle_line(
        r#"{"action":"initializeRecording","actionId":"cfg",
            "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
            "scaledWidth":8,"scaledHeight":4,
            "sliceX":1,"sliceY":1,"sliceWidth":2,"sliceHeight":2}"#,
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    session.handle_line(&format!(
        r#"{{"action":"startRenderFramesPipe","actionId":"pipe","port":{port}}}"#
    ));
    assert_eq!(sink.lines().pop().unwrap(), r#"{"actionId":"pipe"}"#);

    let (mut inbound, _) = listener.accept().unwrap();
    let mut slice = vec![0u8; 2 * 2 * BYTES_PER_PIXEL];
    inbound.read_exact(&mut slice).unwrap();
    assert_eq!(slice, [[1u8; 8], [2u8; 8]].concat());

    session.handle_line(r#"{"action":"stopRenderFramesPipe","actionId":"close"}"#);
    assert_eq!(sink.lines().pop().unwrap(), r#"{"actionId":"close"}"#);
}

#[test]
fn full_frames_flow_when_no_slice_is_configured() {
    let (_engine, sink, mut session) = sim_session();
    initialize(&mut session);

    session.handle_line(
        r#"{"action":"initializeRecording","actionId":"cfg",
            "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
            "scaledWidth":8,"scaledHeight":4}"#,
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    session.handle_line(&format!(
        r#"{{"action":"startRenderFramesPipe","actionId":"pipe","port":{port}}}"#
    ));

    let (mut inbound, _) = listener.accept().unwrap();
    let mut frame = vec![0u8; 8 * 4 * BYTES_PER_PIXEL];
    inbound.read_exact(&mut frame).unwrap();
    let row = 8 * BYTES_PER_PIXEL;
    for r in 0..4usize {
        assert!(frame[r * row..(r + 1) * row].iter().all(|b| *b == r as u8));
    }

    assert_eq!(sink.lines().len(), 3);
}

#[test]
fn video_reset_suspends_the_callback_and_restores_it_after() {
    let (engine, _sink, mut session) = scripted_session();
    initialize(&mut session);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    session.handle_line(&format!(
        r#"{{"action":"startRenderFramesPipe","actionId":"pipe","port":{port}}}"#
    ));
    assert!(engine.frame_callback_installed());

    engine.clear_calls();
    session.handle_line(
        r#"{"action":"initializeRecording","actionId":"cfg",
            "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
            "scaledWidth":640,"scaledHeight":360}"#,
    );

    // The scripted engine rejects a reset while a callback is live, so
    // this exact order is the only way the command can have succeeded.
    assert_eq!(
        engine.calls(),
        vec![
            "remove_frame_callback".to_string(),
            "reset_video 640x360".to_string(),
            "add_frame_callback 640x360".to_string(),
        ]
    );
    assert!(engine.frame_callback_installed());
}

#[test]
fn video_reset_without_a_pipe_registers_nothing() {
    let (engine, _sink, mut session) = scripted_session();
    initialize(&mut session);

    engine.clear_calls();
    session.handle_line(
        r#"{"action":"initializeRecording","actionId":"cfg",
            "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
            "scaledWidth":640,"scaledHeight":360}"#,
    );

    assert_eq!(engine.calls(), vec!["reset_video 640x360".to_string()]);
    assert!(!engine.frame_callback_installed());
}

#[test]
fn double_stop_render_frames_pipe_is_a_noop() {
    let (_engine, sink, mut session) = sim_session();
    initialize(&mut session);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    session.handle_line(&format!(
        r#"{{"action":"startRenderFramesPipe","actionId":"pipe","port":{port}}}"#
    ));
    let (_inbound, _) = listener.accept().unwrap();

    session.handle_line(r#"{"action":"stopRenderFramesPipe","actionId":"c1"}"#);
    session.handle_line(r#"{"action":"stopRenderFramesPipe","actionId":"c2"}"#);

    let lines = sink.lines();
    assert_eq!(lines[lines.len() - 2], r#"{"actionId":"c1"}"#);
    assert_eq!(lines[lines.len() - 1], r#"{"actionId":"c2"}"#);
}

#[test]
fn pipe_connect_failure_is_a_correlated_error() {
    let (_engine, sink, mut session) = sim_session();
    initialize(&mut session);

    // A freshly bound-and-dropped listener leaves the port closed.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    session.handle_line(&format!(
        r#"{{"action":"startRenderFramesPipe","actionId":"pipe","port":{port}}}"#
    ));
    let last = sink.lines().pop().unwrap();
    assert!(last.contains(r#""actionId":"pipe""#));
    assert!(last.contains("error"));
}
