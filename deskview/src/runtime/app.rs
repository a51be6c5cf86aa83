use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::framework::logging::*;
use crate::framework::util::BoxError;
use crate::platform::{self, Platform, PlatformLoop};
use crate::runtime::config::{AppConfig, WindowOptions};
use crate::runtime::dispatch::Dispatcher;
use crate::runtime::hooks::WindowHooks;
use crate::runtime::registry::{self, AppId, EntityId};
use crate::runtime::window::{Window, WindowState};

/// The part of an app that handles on any thread may hold on to.
pub(crate) struct AppShared {
    pub(crate) id: AppId,
    name: String,
    pub(crate) dispatcher: Dispatcher,
    running: AtomicBool,
}

impl AppShared {
    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("Stopping event loop of '{}'", self.name);
            self.dispatcher.exit_loop();
        }
    }
}

/// Runs `f` against the live app state on the loop thread. `None` when the
/// app is gone or its loop no longer accepts work.
pub(crate) fn on_main_thread<R, F>(app: &Weak<AppShared>, f: F) -> Option<R>
where
    F: FnOnce(Rc<AppState>) -> Option<R> + Send + 'static,
    R: Send + 'static,
{
    let Some(shared) = app.upgrade() else {
        warn!("Ignoring call on an app that has been dropped");
        return None;
    };

    let app_id = shared.id;
    match shared
        .dispatcher
        .dispatch_on_main_thread(move || registry::app(app_id).and_then(f))
    {
        Ok(result) => result,
        Err(e) => {
            warn!("Ignoring call on '{}': {}", shared.name, e);
            None
        }
    }
}

/// Loop-thread state of an app: the platform, its event loop and the
/// windows the app owns.
pub(crate) struct AppState {
    shared: Arc<AppShared>,
    platform: Box<dyn Platform>,
    event_loop: Box<dyn PlatformLoop>,
    windows: RefCell<IndexMap<String, Rc<WindowState>>>,
}

impl AppState {
    pub fn id(&self) -> AppId {
        self.shared.id
    }

    pub fn shared(&self) -> &Arc<AppShared> {
        &self.shared
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn window(&self, name: &str) -> Option<Rc<WindowState>> {
        self.windows.borrow().get(name).cloned()
    }

    fn window_names(&self) -> Vec<String> {
        self.windows.borrow().keys().cloned().collect()
    }

    fn create_window(
        &self,
        name: &str,
        options: &WindowOptions,
    ) -> Option<Rc<WindowState>> {
        if self.windows.borrow().contains_key(name) {
            warn!("Window '{}' already exists", name);
            return None;
        }

        let id = EntityId::next();
        let shared_name: Arc<str> = Arc::from(name);
        let hooks = WindowHooks::new(self.id(), shared_name.clone(), id);

        let backend = match self.platform.create_window(name, options, hooks) {
            Ok(backend) => backend,
            Err(e) => {
                error!("Unable to create window '{}': {}", name, e);
                return None;
            }
        };

        let window = Rc::new(WindowState::new(
            self.id(),
            shared_name,
            id,
            backend,
            options,
            self.dispatcher().clone(),
        ));

        let mut windows = self.windows.borrow_mut();
        if windows.contains_key(name) {
            warn!("Window '{}' was created while being constructed", name);
            return None;
        }
        windows.insert(name.to_string(), window.clone());
        debug!("Created window '{}' {}", name, id);

        Some(window)
    }

    /// Removes a window and everything it owns. When `id` is given only that
    /// generation of the window is destroyed.
    pub fn destroy_window(&self, name: &str, id: Option<EntityId>) {
        let removed = {
            let mut windows = self.windows.borrow_mut();
            let matches = windows
                .get(name)
                .is_some_and(|window| id.is_none_or(|id| window.id() == id));
            if matches { windows.shift_remove(name) } else { None }
        };

        let Some(window) = removed else {
            return;
        };

        window.teardown();
        debug!("Destroyed window '{}' {}", name, window.id());

        if self.windows.borrow().is_empty() {
            debug!("Last window of '{}' destroyed", self.shared.name);
            self.shared.stop();
        }
    }

    /// Schedules destruction of a window the user closed. Runs on the next
    /// loop iteration so the native close notification can return first.
    pub fn notify_window_closed_from_ui(&self, name: Arc<str>, id: EntityId) {
        let app_id = self.id();
        let result = self.dispatcher().dispatch(move || {
            if let Some(app) = registry::app(app_id) {
                app.destroy_window(&name, Some(id));
            }
        });

        if let Err(e) = result {
            warn!("Unable to schedule window close: {}", e);
        }
    }

    fn teardown(&self) {
        let windows: Vec<_> = self.windows.borrow_mut().drain(..).collect();
        for (name, window) in windows.into_iter().rev() {
            window.teardown();
            debug!("Destroyed window '{}' with its app", name);
        }
    }
}

/// Root of the window hierarchy and owner of the event loop.
///
/// The thread that creates an `App` becomes its loop thread: [`App::run`]
/// must be called there, and every window and web view operation executes
/// there. Every other method, and every method of the handles it returns,
/// may be called from any thread.
pub struct App {
    shared: Arc<AppShared>,
}

impl App {
    /// Creates an app on the default platform.
    pub fn new(name: &str) -> Result<Self, BoxError> {
        Self::from_platform(name, platform::default_platform())
    }

    pub fn with_platform<P>(name: &str, platform: P) -> Result<Self, BoxError>
    where
        P: Platform + 'static,
    {
        Self::from_platform(name, Box::new(platform))
    }

    fn from_platform(
        name: &str,
        platform: Box<dyn Platform>,
    ) -> Result<Self, BoxError> {
        let event_loop = platform.create_loop()?;
        let shared = Arc::new(AppShared {
            id: AppId::next(),
            name: name.to_string(),
            dispatcher: Dispatcher::new(event_loop.waker()),
            running: AtomicBool::new(false),
        });

        registry::register(Rc::new(AppState {
            shared: shared.clone(),
            platform,
            event_loop,
            windows: RefCell::new(IndexMap::new()),
        }));

        info!("Created app '{}'", name);
        Ok(Self { shared })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    pub fn is_main_thread(&self) -> bool {
        self.shared.dispatcher.is_main_thread()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Returns `None` when a window named `name` already exists or the
    /// native window could not be created.
    pub fn create_window(
        &self,
        name: &str,
        options: WindowOptions,
    ) -> Option<Window> {
        let name = name.to_string();
        self.with_state(move |app| {
            let window = app.create_window(&name, &options)?;
            Some(Window::new(app.shared(), &window))
        })
    }

    pub fn window(&self, name: &str) -> Option<Window> {
        let name = name.to_string();
        self.with_state(move |app| {
            let window = app.window(&name)?;
            Some(Window::new(app.shared(), &window))
        })
    }

    /// Window names in creation order.
    pub fn window_names(&self) -> Vec<String> {
        self.with_state(|app| Some(app.window_names()))
            .unwrap_or_default()
    }

    /// Destroys a window with its web views. Destroying the last window
    /// terminates the loop. No-op when no such window exists.
    pub fn destroy_window(&self, name: &str) {
        let name = name.to_string();
        self.with_state(move |app| {
            app.destroy_window(&name, None);
            Some(())
        });
    }

    /// Destroys a window on the next loop iteration, the path taken when the
    /// user closes it through its chrome.
    pub fn notify_window_closed_from_ui(&self, name: &str) {
        let name = name.to_string();
        self.with_state(move |app| {
            let id = app.window(&name)?.id();
            app.notify_window_closed_from_ui(Arc::from(name), id);
            Some(())
        });
    }

    /// Creates the windows and web views described by `config` in order and
    /// navigates web views that name a url. Entries that fail to create are
    /// logged and skipped.
    pub fn create_from_config(&self, config: &AppConfig) -> Vec<Window> {
        let mut windows = Vec::new();

        for (name, window_config) in &config.windows {
            let Some(window) =
                self.create_window(name, window_config.options.clone())
            else {
                continue;
            };

            for (view_name, view_config) in &window_config.web_views {
                let web_view = window
                    .create_web_view(view_name, view_config.options.clone());
                if let (Some(web_view), Some(url)) = (web_view, &view_config.url)
                {
                    web_view.navigate(url);
                }
            }

            windows.push(window);
        }

        windows
    }

    /// Enters the event loop and blocks until [`App::terminate`] is called or
    /// the last window is destroyed. Calling it while the loop already runs,
    /// or from any thread but the loop thread, returns immediately.
    pub fn run(&self) {
        if !self.is_main_thread() {
            warn!("App::run called off the loop thread of '{}'", self.name());
            return;
        }

        let Some(state) = registry::app(self.shared.id) else {
            return;
        };

        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Running '{}'", self.name());
        state.event_loop.enter();
        self.shared.running.store(false, Ordering::SeqCst);
        info!("Event loop of '{}' exited", self.name());
    }

    /// Stops the event loop once the tasks already queued have run. Windows
    /// stay alive. No-op when the loop is not running.
    pub fn terminate(&self) {
        self.shared.stop();
    }

    fn with_state<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(Rc<AppState>) -> Option<R> + Send + 'static,
        R: Send + 'static,
    {
        on_main_thread(&Arc::downgrade(&self.shared), f)
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let id = self.shared.id;
        let release = move || {
            if let Some(state) = registry::unregister(id) {
                state.teardown();
            }
        };

        if self.is_main_thread() {
            release();
        } else if self.shared.dispatcher.dispatch(release).is_err() {
            warn!("App '{}' dropped after its loop closed", self.name());
        }

        info!("Dropped app '{}'", self.shared.name);
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .finish()
    }
}
