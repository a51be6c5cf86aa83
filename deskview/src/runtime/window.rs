use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Weak};

use crate::framework::logging::*;
use crate::platform::{Platform, WindowBackend};
use crate::runtime::app::{AppShared, AppState, on_main_thread};
use crate::runtime::config::{WebViewOptions, WindowOptions};
use crate::runtime::dispatch::Dispatcher;
use crate::runtime::event_bus::EventBus;
use crate::runtime::events::{WindowResize, WindowScaleFactorChanged};
use crate::runtime::geometry::{PixelsType, Rgb, ViewRect, ViewSize};
use crate::runtime::hooks::WebViewHooks;
use crate::runtime::registry::{self, AppId, EntityId};
use crate::runtime::throttle::Throttle;
use crate::runtime::web_view::{WebView, WebViewState};

/// Queues the `WindowResize` emission for a settled size on the loop
/// thread. Returns false when the loop no longer accepts work.
fn schedule_resize(
    dispatcher: &Dispatcher,
    app_id: AppId,
    name: Arc<str>,
    id: EntityId,
    size: ViewSize,
) -> bool {
    let window_name = name.clone();
    let result = dispatcher.dispatch(move || {
        if let Some(window) = registry::window(app_id, &name, id) {
            window.events.emit(&mut WindowResize::new(size));
        }
    });

    if let Err(e) = result {
        warn!("Unable to deliver resize of window '{}': {}", window_name, e);
        return false;
    }

    true
}

/// Loop-thread state of a window. Sizes are kept in physical pixels.
pub(crate) struct WindowState {
    app_id: AppId,
    name: Arc<str>,
    id: EntityId,
    backend: Box<dyn WindowBackend>,
    events: Arc<EventBus>,
    external: bool,
    min_size: Cell<Option<ViewSize>>,
    max_size: Cell<Option<ViewSize>>,
    scale_factor: Cell<f32>,
    resize_throttle: Throttle<ViewSize>,
    web_views: RefCell<IndexMap<String, Rc<WebViewState>>>,
}

impl WindowState {
    pub fn new(
        app_id: AppId,
        name: Arc<str>,
        id: EntityId,
        backend: Box<dyn WindowBackend>,
        options: &WindowOptions,
        dispatcher: Dispatcher,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let scale_factor = backend.scale_factor();

        let resize_throttle = {
            let name = name.clone();
            Throttle::from_millis(options.resize_throttle_ms, move |size| {
                schedule_resize(&dispatcher, app_id, name.clone(), id, size);
            })
        };

        Self {
            app_id,
            name,
            id,
            backend,
            events,
            external: options.external.is_some(),
            min_size: Cell::new(None),
            max_size: Cell::new(None),
            scale_factor: Cell::new(scale_factor),
            resize_throttle,
            web_views: RefCell::new(IndexMap::new()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn web_view(&self, name: &str) -> Option<Rc<WebViewState>> {
        self.web_views.borrow().get(name).cloned()
    }

    pub fn queue_resize(&self, size: ViewSize) {
        self.resize_throttle.trigger(size);
    }

    pub fn update_scale_factor(&self, scale_factor: f32) {
        self.scale_factor.set(scale_factor);
        self.events
            .emit(&mut WindowScaleFactorChanged { scale_factor });
    }

    fn scale(&self) -> f32 {
        self.scale_factor.get()
    }

    fn apply_size_constraints(&self) {
        self.backend
            .set_size_constraints(self.min_size.get(), self.max_size.get());
    }

    fn create_web_view(
        &self,
        platform: &dyn Platform,
        name: &str,
        options: &WebViewOptions,
    ) -> Option<Rc<WebViewState>> {
        if self.web_views.borrow().contains_key(name) {
            warn!("Web view '{}' already exists in '{}'", name, self.name);
            return None;
        }

        let id = EntityId::next();
        let shared_name: Arc<str> = Arc::from(name);
        let hooks = WebViewHooks::new(
            self.app_id,
            self.name.clone(),
            self.id,
            shared_name.clone(),
            id,
        );

        let backend = match platform.create_web_view(
            self.backend.as_ref(),
            name,
            options,
            hooks,
        ) {
            Ok(backend) => backend,
            Err(e) => {
                error!(
                    "Unable to create web view '{}' in '{}': {}",
                    name, self.name, e
                );
                return None;
            }
        };

        let web_view = Rc::new(WebViewState::new(shared_name, id, backend));

        let mut web_views = self.web_views.borrow_mut();
        if web_views.contains_key(name) {
            warn!("Web view '{}' was created while being constructed", name);
            return None;
        }
        web_views.insert(name.to_string(), web_view.clone());
        debug!("Created web view '{}' {} in '{}'", name, id, self.name);

        Some(web_view)
    }

    fn destroy_web_view(&self, name: &str) {
        let removed = self.web_views.borrow_mut().shift_remove(name);
        if let Some(web_view) = removed {
            web_view.teardown();
            debug!("Destroyed web view '{}' in '{}'", name, self.name);
        }
    }

    /// Destroys the web views, then releases the native window. External
    /// windows are only detached.
    pub fn teardown(&self) {
        let web_views: Vec<_> = self.web_views.borrow_mut().drain(..).collect();
        for (_, web_view) in web_views.into_iter().rev() {
            web_view.teardown();
        }

        if self.external {
            self.backend.detach();
        } else {
            self.backend.close();
        }

        self.events.clear();
    }
}

/// Handle to a window owned by an [`App`](crate::runtime::app::App).
///
/// Handles are cheap to clone and can be sent to any thread. Every
/// operation runs on the loop thread, blocking callers on other threads
/// until it has. Once the window is destroyed, operations do nothing and
/// getters return default values.
#[derive(Clone)]
pub struct Window {
    app: Weak<AppShared>,
    app_id: AppId,
    name: Arc<str>,
    id: EntityId,
    events: Arc<EventBus>,
}

impl Window {
    pub(crate) fn new(app: &Arc<AppShared>, state: &WindowState) -> Self {
        Self {
            app: Arc::downgrade(app),
            app_id: state.app_id,
            name: state.name.clone(),
            id: state.id,
            events: state.events.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Window lifecycle events: [`WindowResize`], `WindowShow`, `WindowClose`
    /// and [`WindowScaleFactorChanged`]. Listeners run on the loop thread.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// False once the window has been destroyed.
    pub fn is_alive(&self) -> bool {
        self.with_state(|_, _| true)
    }

    pub fn is_external(&self) -> bool {
        self.with_state(|_, window| window.external)
    }

    pub fn set_title(&self, title: &str) {
        let title = title.to_string();
        self.with_state(move |_, window| window.backend.set_title(&title));
    }

    pub fn title(&self) -> String {
        self.with_state(|_, window| window.backend.title())
    }

    pub fn set_size(&self, size: ViewSize, pixels: PixelsType) {
        self.with_state(move |_, window| {
            let size = size.physical_from(pixels, window.scale());
            window.backend.set_size(size);
        });
    }

    pub fn size(&self, pixels: PixelsType) -> ViewSize {
        self.with_state(move |_, window| {
            window.backend.size().physical_into(pixels, window.scale())
        })
    }

    pub fn set_min_size(&self, size: ViewSize, pixels: PixelsType) {
        self.with_state(move |_, window| {
            window
                .min_size
                .set(Some(size.physical_from(pixels, window.scale())));
            window.apply_size_constraints();
        });
    }

    /// Zero until a minimum size has been set.
    pub fn min_size(&self, pixels: PixelsType) -> ViewSize {
        self.with_state(move |_, window| {
            window
                .min_size
                .get()
                .unwrap_or_default()
                .physical_into(pixels, window.scale())
        })
    }

    pub fn set_max_size(&self, size: ViewSize, pixels: PixelsType) {
        self.with_state(move |_, window| {
            window
                .max_size
                .set(Some(size.physical_from(pixels, window.scale())));
            window.apply_size_constraints();
        });
    }

    /// Zero until a maximum size has been set.
    pub fn max_size(&self, pixels: PixelsType) -> ViewSize {
        self.with_state(move |_, window| {
            window
                .max_size
                .get()
                .unwrap_or_default()
                .physical_into(pixels, window.scale())
        })
    }

    pub fn set_position(&self, rect: ViewRect, pixels: PixelsType) {
        self.with_state(move |_, window| {
            let rect = rect.physical_from(pixels, window.scale());
            window.backend.set_position(rect);
        });
    }

    pub fn position(&self, pixels: PixelsType) -> ViewRect {
        self.with_state(move |_, window| {
            window.backend.position().physical_into(pixels, window.scale())
        })
    }

    pub fn set_resizable(&self, resizable: bool) {
        self.with_state(move |_, window| window.backend.set_resizable(resizable));
    }

    pub fn is_resizable(&self) -> bool {
        self.with_state(|_, window| window.backend.is_resizable())
    }

    pub fn set_decorations(&self, decorations: bool) {
        self.with_state(move |_, window| {
            window.backend.set_decorations(decorations)
        });
    }

    pub fn is_decorated(&self) -> bool {
        self.with_state(|_, window| window.backend.is_decorated())
    }

    pub fn show(&self) {
        self.with_state(|_, window| window.backend.set_visible(true));
    }

    pub fn hide(&self) {
        self.with_state(|_, window| window.backend.set_visible(false));
    }

    pub fn is_visible(&self) -> bool {
        self.with_state(|_, window| window.backend.is_visible())
    }

    pub fn center(&self) {
        self.with_state(|_, window| window.backend.center());
    }

    /// Enables or disables user input.
    pub fn enable(&self, enabled: bool) {
        self.with_state(move |_, window| window.backend.set_enabled(enabled));
    }

    pub fn is_enabled(&self) -> bool {
        self.with_state(|_, window| window.backend.is_enabled())
    }

    pub fn set_background_color(&self, color: Rgb) {
        self.with_state(move |_, window| {
            window.backend.set_background_color(color)
        });
    }

    /// Ratio of physical to logical pixels on the window's monitor.
    pub fn scale_factor(&self) -> f32 {
        self.with_state(|_, window| window.scale())
    }

    /// Overrides the scale factor used for pixel conversions until the
    /// monitor reports a new one.
    pub fn set_scale_factor(&self, scale_factor: f32) {
        self.with_state(move |_, window| {
            window.scale_factor.set(scale_factor)
        });
    }

    /// Returns `None` when a web view named `name` already exists in this
    /// window or the native web view could not be created.
    pub fn create_web_view(
        &self,
        name: &str,
        options: WebViewOptions,
    ) -> Option<WebView> {
        let name = name.to_string();
        self.with_state(move |app, window| {
            let web_view =
                window.create_web_view(app.platform(), &name, &options)?;
            Some(WebView::new(app.shared(), window, &web_view))
        })
    }

    pub fn web_view(&self, name: &str) -> Option<WebView> {
        let name = name.to_string();
        self.with_state(move |app, window| {
            let web_view = window.web_view(&name)?;
            Some(WebView::new(app.shared(), window, &web_view))
        })
    }

    /// Web view names in creation order.
    pub fn web_view_names(&self) -> Vec<String> {
        self.with_state(|_, window| {
            window.web_views.borrow().keys().cloned().collect()
        })
    }

    /// No-op when no such web view exists.
    pub fn destroy_web_view(&self, name: &str) {
        let name = name.to_string();
        self.with_state(move |_, window| window.destroy_web_view(&name));
    }

    /// Destroys this window through its app, exactly as
    /// [`App::destroy_window`](crate::runtime::app::App::destroy_window).
    pub fn close(&self) {
        let (name, id) = (self.name.clone(), self.id);
        on_main_thread(&self.app, move |app| {
            app.destroy_window(&name, Some(id));
            Some(())
        });
    }

    fn with_state<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&AppState, &WindowState) -> R + Send + 'static,
        R: Default + Send + 'static,
    {
        let (name, id) = (self.name.clone(), self.id);
        let result = on_main_thread(&self.app, move |app| {
            let window = app.window(&name).filter(|window| window.id() == id)?;
            Some(f(&*app, &*window))
        });

        result.unwrap_or_else(|| {
            debug!("Ignoring call on destroyed window '{}'", self.name);
            R::default()
        })
    }
}

impl PartialEq for Window {
    fn eq(&self, other: &Self) -> bool {
        self.app_id == other.app_id && self.id == other.id
    }
}

impl Eq for Window {}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    use super::*;
    use crate::platform::LoopWaker;
    use crate::runtime::dispatch::Task;

    #[derive(Default)]
    struct TaskQueue {
        tasks: Mutex<VecDeque<Task>>,
        closed: Mutex<bool>,
    }

    impl LoopWaker for TaskQueue {
        fn post(&self, task: Task) -> Result<(), Task> {
            if *self.closed.lock() {
                return Err(task);
            }
            self.tasks.lock().push_back(task);
            Ok(())
        }

        fn exit(&self) {
            *self.closed.lock() = true;
        }
    }

    #[test]
    fn resize_for_a_closed_loop_is_reported_and_dropped() {
        let queue = Arc::new(TaskQueue::default());
        let dispatcher = Dispatcher::new(queue.clone());
        queue.exit();

        let scheduled = schedule_resize(
            &dispatcher,
            AppId::next(),
            Arc::from("main"),
            EntityId::next(),
            ViewSize::new(640, 480),
        );

        assert!(!scheduled);
        assert!(queue.tasks.lock().is_empty());
    }

    #[test]
    fn resize_for_an_unregistered_window_is_a_no_op() {
        let queue = Arc::new(TaskQueue::default());
        let dispatcher = Dispatcher::new(queue.clone());

        let scheduled = schedule_resize(
            &dispatcher,
            AppId::next(),
            Arc::from("gone"),
            EntityId::next(),
            ViewSize::new(640, 480),
        );

        assert!(scheduled);
        let task = queue.tasks.lock().pop_front();
        assert!(task.is_some());
        if let Some(task) = task {
            task();
        }
        assert!(queue.tasks.lock().is_empty());
    }
}
