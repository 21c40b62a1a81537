//! Scene lifecycle through the command surface: collection length,
//! singleton source resolution, and switch bounds checking.

mod support;

use stagecast_engine::VIDEO_SLOT;

use support::{initialize, sim_session};

#[test]
fn n_scene_plans_build_n_scenes_with_scene_zero_active() {
    let (engine, sink, mut session) = sim_session();
    initialize(&mut session);

    session.handle_line(
        r#"{"action":"initializeScenes","actionId":"sc","scenes":[
            {"itemSources":[{"type":"display"},{"type":"microphone"}]},
            {"itemSources":[{"type":"webcam","scaleX":0.5,"scaleY":0.5}]},
            {"itemSources":[{"type":"display"},{"type":"desktopAudio"}]}
        ]}"#,
    );
    assert_eq!(sink.lines().pop().unwrap(), r#"{"actionId":"sc"}"#);
    assert_eq!(engine.scene_count(), 3);
    assert!(engine.bound_scene(VIDEO_SLOT).is_some());
}

#[test]
fn every_item_resolves_to_the_singleton_source_of_its_kind() {
    let (engine, _sink, mut session) = sim_session();
    initialize(&mut session);

    // Two scenes both using the display: items must reference the one
    // registry-owned display source, not per-scene copies.
    session.handle_line(
        r#"{"action":"initializeScenes","actionId":"sc","scenes":[
            {"itemSources":[{"type":"display"}]},
            {"itemSources":[{"type":"display"}]}
        ]}"#,
    );
    let first = engine.bound_scene(VIDEO_SLOT).unwrap();
    let first_source = engine.scene_items(first)[0].1;

    session.handle_line(r#"{"action":"switchToScene","actionId":"sw","sceneNum":1}"#);
    let second = engine.bound_scene(VIDEO_SLOT).unwrap();
    assert_ne!(first, second);
    assert_eq!(engine.scene_items(second)[0].1, first_source);
}

#[test]
fn scene_rebuild_does_not_recreate_sources() {
    let (engine, _sink, mut session) = sim_session();
    initialize(&mut session);

    session.handle_line(
        r#"{"action":"initializeScenes","actionId":"a","scenes":[{"itemSources":[{"type":"webcam"}]}]}"#,
    );
    let before = engine.scene_items(engine.bound_scene(VIDEO_SLOT).unwrap())[0].1;

    session.handle_line(
        r#"{"action":"initializeScenes","actionId":"b","scenes":[{"itemSources":[{"type":"webcam"}]}]}"#,
    );
    let after = engine.scene_items(engine.bound_scene(VIDEO_SLOT).unwrap())[0].1;
    assert_eq!(before, after);
    assert_eq!(engine.scene_count(), 1);
}

#[test]
fn out_of_range_switch_errors_and_keeps_the_active_scene() {
    let (engine, sink, mut session) = sim_session();
    initialize(&mut session);

    session.handle_line(
        r#"{"action":"initializeScenes","actionId":"sc","scenes":[
            {"itemSources":[{"type":"display"}]},
            {"itemSources":[{"type":"webcam"}]}
        ]}"#,
    );
    session.handle_line(r#"{"action":"switchToScene","actionId":"sw","sceneNum":1}"#);
    let active = engine.bound_scene(VIDEO_SLOT).unwrap();

    session.handle_line(r#"{"action":"switchToScene","actionId":"bad","sceneNum":2}"#);
    let last = sink.lines().pop().unwrap();
    assert!(last.contains(r#""actionId":"bad""#));
    assert!(last.contains("scene 2"));
    assert_eq!(engine.bound_scene(VIDEO_SLOT), Some(active));
}

#[test]
fn single_video_recording_builds_one_cropped_scene() {
    let (engine, sink, mut session) = sim_session();
    initialize(&mut session);

    session.handle_line(
        r#"{"action":"initializeSingleVideoRecording","actionId":"sv",
            "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
            "scaledWidth":640,"scaledHeight":360,"deviceType":"display",
            "cropLeft":10,"cropTop":20,"cropRight":30,"cropBottom":40}"#,
    );
    assert_eq!(sink.lines().pop().unwrap(), r#"{"actionId":"sv"}"#);

    assert_eq!(engine.scene_count(), 1);
    let scene = engine.bound_scene(VIDEO_SLOT).unwrap();
    let items = engine.scene_items(scene);
    assert_eq!(items.len(), 1);
    let transform = items[0].2;
    assert_eq!(
        (
            transform.crop_left,
            transform.crop_top,
            transform.crop_right,
            transform.crop_bottom
        ),
        (10, 20, 30, 40)
    );

    session.handle_line(
        r#"{"action":"initializeSingleVideoRecording","actionId":"bad",
            "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
            "scaledWidth":640,"scaledHeight":360,"deviceType":"teleprompter",
            "cropLeft":0,"cropTop":0,"cropRight":0,"cropBottom":0}"#,
    );
    assert!(sink.lines().pop().unwrap().contains("teleprompter"));
}
