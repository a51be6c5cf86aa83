mod support;

use serial_test::serial;
use std::time::Duration;

use deskview::prelude::*;
use support::{Recorder, headless_app, run_for};

fn record_resizes(window: &Window) -> Recorder<ViewSize> {
    let sizes = Recorder::new();
    let recorder = sizes.clone();
    window
        .events()
        .connect(move |event: &mut WindowResize| recorder.push(event.size));
    sizes
}

#[test]
#[serial]
fn resize_burst_is_delivered_once_with_the_latest_size() {
    let (app, platform) = headless_app("burst");
    let window = app.create_window("main", WindowOptions::default()).unwrap();
    let sizes = record_resizes(&window);

    let native = platform.window("main").unwrap();
    for width in [100, 200, 300, 400] {
        native.resize(ViewSize::new(width, 300));
    }
    assert_eq!(sizes.len(), 0);

    run_for(&app, Duration::from_millis(150));

    assert_eq!(sizes.entries(), vec![ViewSize::new(400, 300)]);
}

#[test]
#[serial]
fn separate_bursts_are_delivered_separately() {
    let (app, platform) = headless_app("bursts");
    let options = WindowOptions {
        resize_throttle_ms: 10,
        ..WindowOptions::default()
    };
    let window = app.create_window("main", options).unwrap();
    let sizes = record_resizes(&window);
    let native = platform.window("main").unwrap();

    native.resize(ViewSize::new(100, 100));
    native.resize(ViewSize::new(110, 110));
    run_for(&app, Duration::from_millis(100));

    native.resize(ViewSize::new(200, 200));
    run_for(&app, Duration::from_millis(100));

    assert_eq!(
        sizes.entries(),
        vec![ViewSize::new(110, 110), ViewSize::new(200, 200)]
    );
}

#[test]
#[serial]
fn programmatic_resize_is_reported_through_the_throttle() {
    let (app, _platform) = headless_app("programmatic");
    let window = app.create_window("main", WindowOptions::default()).unwrap();
    let sizes = record_resizes(&window);

    window.set_size(ViewSize::new(640, 480), PixelsType::Physical);
    run_for(&app, Duration::from_millis(150));

    assert_eq!(sizes.entries(), vec![ViewSize::new(640, 480)]);
}

#[test]
fn zero_delay_delivers_on_the_next_iteration() {
    let (app, platform) = headless_app("immediate");
    let options = WindowOptions {
        resize_throttle_ms: 0,
        ..WindowOptions::default()
    };
    let window = app.create_window("main", options).unwrap();
    let sizes = record_resizes(&window);

    let native = platform.window("main").unwrap();
    native.resize(ViewSize::new(100, 100));
    native.resize(ViewSize::new(200, 200));
    run_for(&app, Duration::from_millis(20));

    assert_eq!(
        sizes.entries(),
        vec![ViewSize::new(100, 100), ViewSize::new(200, 200)]
    );
}

#[test]
#[serial]
fn resize_of_a_destroyed_window_is_dropped() {
    let (app, platform) = headless_app("gone");
    app.create_window("keep", WindowOptions::default()).unwrap();
    let window = app.create_window("main", WindowOptions::default()).unwrap();
    let sizes = record_resizes(&window);

    platform.window("main").unwrap().resize(ViewSize::new(300, 300));
    window.close();
    run_for(&app, Duration::from_millis(100));

    assert_eq!(sizes.len(), 0);
}
