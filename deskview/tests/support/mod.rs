#![allow(dead_code)]

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use deskview::prelude::*;

pub fn headless_app(name: &str) -> (App, HeadlessPlatform) {
    let platform = HeadlessPlatform::new();
    let app = App::with_platform(name, platform.clone()).expect("headless app");
    (app, platform)
}

/// Runs `f` on a worker thread while the event loop runs on this one, then
/// stops the loop and hands back what `f` returned.
pub fn run_with<R, F>(app: &App, f: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    thread::scope(|scope| {
        let worker = scope.spawn(|| {
            wait_for_loop(app);
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            app.terminate();
            result
        });

        app.run();

        match worker.join().expect("worker thread") {
            Ok(result) => result,
            Err(cause) => panic::resume_unwind(cause),
        }
    })
}

/// Runs the event loop for roughly `duration`.
pub fn run_for(app: &App, duration: Duration) {
    run_with(app, || thread::sleep(duration));
}

fn wait_for_loop(app: &App) {
    app.dispatcher()
        .dispatch_on_main_thread(|| ())
        .expect("event loop accepts work");
}

/// Shared log that listeners running on the loop thread can append to.
#[derive(Clone)]
pub struct Recorder<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, entry: T) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
