//! Display-free platform.
//!
//! The loop is a plain channel drained on the calling thread; windows and
//! web views are in-memory records. Navigation is simulated synchronously:
//! loading a url asks the hooks for permission, then reports the new source
//! and the load result, the same sequence a real engine goes through.
//!
//! [`HeadlessPlatform`] is cheap to clone. Keep a clone after handing one to
//! an app to inspect backends and to play the native side:
//!
//! ```rust,ignore
//! let platform = HeadlessPlatform::new();
//! let app = App::with_platform("app", platform.clone())?;
//! let window = app.create_window("main", WindowOptions::default()).unwrap();
//! platform.window("main").unwrap().request_close();
//! ```
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use super::{LoopWaker, Platform, PlatformLoop, WebViewBackend, WindowBackend};
use crate::framework::logging::*;
use crate::framework::util::{BoxError, panic_message};
use crate::runtime::config::{ExternalWindow, WebViewOptions, WindowOptions};
use crate::runtime::dispatch::Task;
use crate::runtime::geometry::{Rgb, ViewRect, ViewSize};
use crate::runtime::hooks::{WebViewHooks, WindowHooks};
use crate::runtime::web_view::{RESOURCE_ORIGIN, Resource, resource_path};

/// Physical size of the simulated monitor windows are centered on.
pub const MONITOR_SIZE: ViewSize = ViewSize::new(1920, 1080);

const BLANK_URL: &str = "about:blank";

#[derive(Clone, Default)]
pub struct HeadlessPlatform {
    inner: Rc<Inner>,
}

struct Inner {
    scale_factor: Cell<f32>,
    fail_next_window: Cell<bool>,
    fail_next_web_view: Cell<bool>,
    windows: RefCell<Vec<Rc<HeadlessWindow>>>,
    web_views: RefCell<Vec<Rc<HeadlessWebView>>>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            scale_factor: Cell::new(1.0),
            fail_next_window: Cell::new(false),
            fail_next_web_view: Cell::new(false),
            windows: RefCell::new(Vec::new()),
            web_views: RefCell::new(Vec::new()),
        }
    }
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Windows created from now on report `scale_factor`.
    pub fn with_scale_factor(self, scale_factor: f32) -> Self {
        self.inner.scale_factor.set(scale_factor);
        self
    }

    /// Makes the next window construction fail.
    pub fn fail_next_window(&self) {
        self.inner.fail_next_window.set(true);
    }

    /// Makes the next web view construction fail.
    pub fn fail_next_web_view(&self) {
        self.inner.fail_next_web_view.set(true);
    }

    /// Most recently created native window named `name`, closed or not.
    pub fn window(&self, name: &str) -> Option<Rc<HeadlessWindow>> {
        self.inner
            .windows
            .borrow()
            .iter()
            .rev()
            .find(|window| window.name == name)
            .cloned()
    }

    /// Number of native windows created so far, closed ones included.
    pub fn window_count(&self) -> usize {
        self.inner.windows.borrow().len()
    }

    /// Most recently created native web view named `name` in `window`.
    pub fn web_view(&self, window: &str, name: &str) -> Option<Rc<HeadlessWebView>> {
        self.inner
            .web_views
            .borrow()
            .iter()
            .rev()
            .find(|web_view| web_view.window == window && web_view.name == name)
            .cloned()
    }
}

impl Platform for HeadlessPlatform {
    fn create_loop(&self) -> Result<Box<dyn PlatformLoop>, BoxError> {
        Ok(Box::new(HeadlessLoop::new()))
    }

    fn create_window(
        &self,
        name: &str,
        options: &WindowOptions,
        hooks: WindowHooks,
    ) -> Result<Box<dyn WindowBackend>, BoxError> {
        if self.inner.fail_next_window.replace(false) {
            return Err(format!("native window '{}' unavailable", name).into());
        }

        let window = Rc::new(HeadlessWindow::new(
            name,
            options,
            self.inner.scale_factor.get(),
            hooks,
        ));
        self.inner.windows.borrow_mut().push(window.clone());

        Ok(Box::new(window))
    }

    fn create_web_view(
        &self,
        parent: &dyn WindowBackend,
        name: &str,
        options: &WebViewOptions,
        hooks: WebViewHooks,
    ) -> Result<Box<dyn WebViewBackend>, BoxError> {
        if self.inner.fail_next_web_view.replace(false) {
            return Err(format!("native web view '{}' unavailable", name).into());
        }

        let parent = parent
            .as_any()
            .downcast_ref::<HeadlessWindow>()
            .ok_or("parent is not a headless window")?;

        if parent.closed.get() {
            return Err("parent window is closed".into());
        }

        let web_view =
            Rc::new(HeadlessWebView::new(&parent.name, name, options, hooks));
        web_view.bounds.set(ViewRect::new(
            0,
            0,
            parent.size.get().width,
            parent.size.get().height,
        ));
        self.inner.web_views.borrow_mut().push(web_view.clone());

        Ok(Box::new(web_view))
    }
}

pub struct HeadlessLoop {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    stop: Arc<AtomicBool>,
}

impl HeadlessLoop {
    fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PlatformLoop for HeadlessLoop {
    fn enter(&self) {
        while let Ok(task) = self.receiver.recv() {
            if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(task)) {
                error!("Task panicked: {}", panic_message(cause.as_ref()));
            }

            if self.stop.swap(false, Ordering::SeqCst) {
                break;
            }
        }
    }

    fn waker(&self) -> Arc<dyn LoopWaker> {
        Arc::new(HeadlessWaker {
            sender: self.sender.clone(),
            stop: self.stop.clone(),
        })
    }
}

struct HeadlessWaker {
    sender: Sender<Task>,
    stop: Arc<AtomicBool>,
}

impl LoopWaker for HeadlessWaker {
    fn post(&self, task: Task) -> Result<(), Task> {
        self.sender.send(task).map_err(|e| e.0)
    }

    fn exit(&self) {
        let stop = self.stop.clone();
        let _ = self.post(Box::new(move || stop.store(true, Ordering::SeqCst)));
    }
}

/// In-memory native window.
pub struct HeadlessWindow {
    name: String,
    external: Option<ExternalWindow>,
    hooks: RefCell<Option<WindowHooks>>,
    title: RefCell<String>,
    size: Cell<ViewSize>,
    min_size: Cell<Option<ViewSize>>,
    max_size: Cell<Option<ViewSize>>,
    position: Cell<ViewRect>,
    resizable: Cell<bool>,
    decorated: Cell<bool>,
    visible: Cell<bool>,
    enabled: Cell<bool>,
    background_color: Cell<Option<Rgb>>,
    scale_factor: Cell<f32>,
    detached: Cell<bool>,
    closed: Cell<bool>,
}

impl HeadlessWindow {
    fn new(
        name: &str,
        options: &WindowOptions,
        scale_factor: f32,
        hooks: WindowHooks,
    ) -> Self {
        let size = options.size.to_physical(scale_factor);
        Self {
            name: name.to_string(),
            external: options.external,
            hooks: RefCell::new(Some(hooks)),
            title: RefCell::new(options.title.clone()),
            size: Cell::new(size),
            min_size: Cell::new(None),
            max_size: Cell::new(None),
            position: Cell::new(ViewRect::new(0, 0, size.width, size.height)),
            resizable: Cell::new(options.resizable),
            decorated: Cell::new(options.decorations),
            visible: Cell::new(options.visible),
            enabled: Cell::new(true),
            background_color: Cell::new(None),
            scale_factor: Cell::new(scale_factor),
            detached: Cell::new(false),
            closed: Cell::new(false),
        }
    }

    fn hooks(&self) -> Option<WindowHooks> {
        self.hooks.borrow().clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn external(&self) -> Option<ExternalWindow> {
        self.external
    }

    pub fn min_size(&self) -> Option<ViewSize> {
        self.min_size.get()
    }

    pub fn max_size(&self) -> Option<ViewSize> {
        self.max_size.get()
    }

    pub fn background_color(&self) -> Option<Rgb> {
        self.background_color.get()
    }

    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Plays a user resize of the client area to `size` physical pixels.
    pub fn resize(&self, size: ViewSize) {
        let size = self.apply_size(size);
        if let Some(hooks) = self.hooks() {
            hooks.on_native_resize(size);
        }
    }

    /// Plays a click on the close button. Returns whether the close went
    /// ahead.
    pub fn request_close(&self) -> bool {
        match self.hooks() {
            Some(hooks) => hooks.on_native_close_requested(),
            None => false,
        }
    }

    /// Plays a move to a monitor with a different scale factor.
    pub fn change_scale_factor(&self, scale_factor: f32) {
        self.scale_factor.set(scale_factor);
        if let Some(hooks) = self.hooks() {
            hooks.on_native_scale_factor_changed(scale_factor);
        }
    }

    fn apply_size(&self, size: ViewSize) -> ViewSize {
        let clamped = ViewSize::new(
            clamp_dimension(
                size.width,
                self.min_size.get().map(|s| s.width),
                self.max_size.get().map(|s| s.width),
            ),
            clamp_dimension(
                size.height,
                self.min_size.get().map(|s| s.height),
                self.max_size.get().map(|s| s.height),
            ),
        );
        let position = self.position.get();
        self.size.set(clamped);
        self.position.set(ViewRect::new(
            position.left,
            position.top,
            position.left + clamped.width,
            position.top + clamped.height,
        ));
        clamped
    }
}

fn clamp_dimension(value: usize, min: Option<usize>, max: Option<usize>) -> usize {
    let value = min.map_or(value, |min| value.max(min));
    max.filter(|max| *max > 0).map_or(value, |max| value.min(max))
}

impl WindowBackend for Rc<HeadlessWindow> {
    fn set_title(&self, title: &str) {
        *self.title.borrow_mut() = title.to_string();
    }

    fn title(&self) -> String {
        self.title.borrow().clone()
    }

    fn set_size(&self, size: ViewSize) {
        HeadlessWindow::resize(self, size);
    }

    fn size(&self) -> ViewSize {
        self.size.get()
    }

    fn set_size_constraints(&self, min: Option<ViewSize>, max: Option<ViewSize>) {
        self.min_size.set(min);
        self.max_size.set(max);
    }

    fn set_position(&self, rect: ViewRect) {
        self.position.set(rect);
        self.size.set(rect.size());
    }

    fn position(&self) -> ViewRect {
        self.position.get()
    }

    fn set_resizable(&self, resizable: bool) {
        self.resizable.set(resizable);
    }

    fn is_resizable(&self) -> bool {
        self.resizable.get()
    }

    fn set_decorations(&self, decorations: bool) {
        self.decorated.set(decorations);
    }

    fn is_decorated(&self) -> bool {
        self.decorated.get()
    }

    fn set_visible(&self, visible: bool) {
        if self.visible.replace(visible) == visible {
            return;
        }
        if let Some(hooks) = self.hooks() {
            hooks.on_native_show(visible);
        }
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn center(&self) {
        let size = self.size.get();
        let left = MONITOR_SIZE.width.saturating_sub(size.width) / 2;
        let top = MONITOR_SIZE.height.saturating_sub(size.height) / 2;
        self.position.set(ViewRect::new(
            left,
            top,
            left + size.width,
            top + size.height,
        ));
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_background_color(&self, color: Rgb) {
        self.background_color.set(Some(color));
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor.get()
    }

    fn detach(&self) {
        self.hooks.borrow_mut().take();
        self.detached.set(true);
    }

    fn close(&self) {
        self.hooks.borrow_mut().take();
        self.visible.set(false);
        self.closed.set(true);
    }

    fn as_any(&self) -> &dyn Any {
        &**self
    }
}

/// In-memory web view.
pub struct HeadlessWebView {
    window: String,
    name: String,
    options: WebViewOptions,
    hooks: RefCell<Option<WebViewHooks>>,
    url: RefCell<String>,
    html: RefCell<Option<String>>,
    injected_scripts: RefCell<Vec<String>>,
    executed_scripts: RefCell<Vec<String>>,
    bounds: Cell<ViewRect>,
    visible: Cell<bool>,
    dev_tools: Cell<bool>,
    context_menu: Cell<bool>,
    zoom: Cell<bool>,
    accelerator_keys: Cell<bool>,
    last_resource: RefCell<Option<Resource>>,
    closed: Cell<bool>,
}

impl HeadlessWebView {
    fn new(
        window: &str,
        name: &str,
        options: &WebViewOptions,
        hooks: WebViewHooks,
    ) -> Self {
        Self {
            window: window.to_string(),
            name: name.to_string(),
            options: options.clone(),
            hooks: RefCell::new(Some(hooks)),
            url: RefCell::new(String::new()),
            html: RefCell::new(None),
            injected_scripts: RefCell::new(Vec::new()),
            executed_scripts: RefCell::new(Vec::new()),
            bounds: Cell::new(ViewRect::default()),
            visible: Cell::new(true),
            dev_tools: Cell::new(options.dev_tools),
            context_menu: Cell::new(options.context_menu),
            zoom: Cell::new(options.zoom),
            accelerator_keys: Cell::new(options.accelerator_keys),
            last_resource: RefCell::new(None),
            closed: Cell::new(false),
        }
    }

    fn hooks(&self) -> Option<WebViewHooks> {
        self.hooks.borrow().clone()
    }

    /// Options the web view was constructed with.
    pub fn options(&self) -> &WebViewOptions {
        &self.options
    }

    pub fn html(&self) -> Option<String> {
        self.html.borrow().clone()
    }

    pub fn injected_scripts(&self) -> Vec<String> {
        self.injected_scripts.borrow().clone()
    }

    pub fn executed_scripts(&self) -> Vec<String> {
        self.executed_scripts.borrow().clone()
    }

    pub fn bounds(&self) -> ViewRect {
        self.bounds.get()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn dev_tools(&self) -> bool {
        self.dev_tools.get()
    }

    pub fn context_menu(&self) -> bool {
        self.context_menu.get()
    }

    pub fn zoom(&self) -> bool {
        self.zoom.get()
    }

    pub fn accelerator_keys(&self) -> bool {
        self.accelerator_keys.get()
    }

    /// Resource served for the last navigation to the reserved origin.
    pub fn last_resource(&self) -> Option<Resource> {
        self.last_resource.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Plays the page posting `raw` through the native transport.
    pub fn post_from_page(&self, raw: &str) {
        if let Some(hooks) = self.hooks() {
            hooks.on_native_message(raw);
        }
    }

    /// Plays a navigation started by the page itself, e.g. a link click.
    pub fn navigate_from_page(&self, url: &str) {
        self.simulate_navigation(url);
    }

    fn simulate_navigation(&self, url: &str) {
        let Some(hooks) = self.hooks() else {
            return;
        };

        if !hooks.on_navigation_starting(url) {
            return;
        }

        *self.url.borrow_mut() = url.to_string();
        self.html.borrow_mut().take();
        hooks.on_source_changed(url);

        let success = if url.starts_with(RESOURCE_ORIGIN) {
            let resource = hooks.resource(url);
            let found = resource.is_some();
            *self.last_resource.borrow_mut() = resource;
            if !found {
                debug!("No resource for {:?}", resource_path(url));
            }
            found
        } else {
            true
        };

        hooks.on_content_loaded(success);
    }
}

impl WebViewBackend for Rc<HeadlessWebView> {
    fn load_url(&self, url: &str) {
        self.simulate_navigation(url);
    }

    fn load_html(&self, html: &str) {
        *self.html.borrow_mut() = Some(html.to_string());
        *self.url.borrow_mut() = BLANK_URL.to_string();

        if let Some(hooks) = self.hooks() {
            hooks.on_source_changed(BLANK_URL);
            hooks.on_content_loaded(true);
        }
    }

    fn inject_script(&self, script: &str) {
        self.injected_scripts.borrow_mut().push(script.to_string());
    }

    fn execute_script(&self, script: &str) {
        self.executed_scripts.borrow_mut().push(script.to_string());
    }

    fn url(&self) -> String {
        self.url.borrow().clone()
    }

    fn set_bounds(&self, rect: ViewRect) {
        self.bounds.set(rect);
    }

    fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    fn set_dev_tools(&self, enabled: bool) {
        self.dev_tools.set(enabled);
    }

    fn set_context_menu(&self, enabled: bool) {
        self.context_menu.set(enabled);
    }

    fn set_zoom(&self, enabled: bool) {
        self.zoom.set(enabled);
    }

    fn set_accelerator_keys(&self, enabled: bool) {
        self.accelerator_keys.set(enabled);
    }

    fn ipc_function(&self) -> &'static str {
        "window.ipc.postMessage"
    }

    fn close(&self) {
        self.hooks.borrow_mut().take();
        self.closed.set(true);
    }

    fn as_any(&self) -> &dyn Any {
        &**self
    }
}
