use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::{Arc, Weak};

use crate::framework::logging::*;
use crate::framework::util::{BoxError, HashMap, panic_message};
use crate::platform::WebViewBackend;
use crate::runtime::app::{AppShared, on_main_thread};
use crate::runtime::event_bus::EventBus;
use crate::runtime::events::WebViewMessage;
use crate::runtime::geometry::{ViewRect, ViewSize};
use crate::runtime::registry::{AppId, EntityId};
use crate::runtime::web_view_bridge::{self as bridge, BridgeMessage};
use crate::runtime::window::WindowState;

/// Scheme of the origin in-memory resources are served from.
pub const RESOURCE_SCHEME: &str = "webview";

/// Origin in-memory resources are served from.
pub const RESOURCE_ORIGIN: &str = "webview://localhost/";

/// Spellings of [`RESOURCE_ORIGIN`] as engines report them back. Engines
/// that cannot register arbitrary schemes map the custom scheme onto
/// `http(s)://<scheme>.localhost/`.
const RESOURCE_ORIGINS: [&str; 3] = [
    RESOURCE_ORIGIN,
    "http://webview.localhost/",
    "https://webview.localhost/",
];

/// In-memory file served under [`RESOURCE_ORIGIN`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resource {
    /// Path relative to the origin, e.g. `index.html` or `js/main.js`
    pub path: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Resource {
    pub fn new(
        path: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let path: String = path.into();
        Self {
            path: path.trim_start_matches('/').to_string(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }
}

/// Extracts the resource path from a request to the reserved origin.
pub fn resource_path(uri: &str) -> Option<&str> {
    let path = RESOURCE_ORIGINS
        .iter()
        .find_map(|origin| uri.strip_prefix(origin))?;
    let end = path.find(['?', '#']).unwrap_or(path.len());
    Some(path[..end].trim_start_matches('/'))
}

type MessageCallback = Rc<dyn Fn(&str)>;
type BindFunction = Rc<dyn Fn(&str) -> Result<String, BoxError>>;

/// Loop-thread state of a web view.
pub(crate) struct WebViewState {
    name: Arc<str>,
    id: EntityId,
    backend: Box<dyn WebViewBackend>,
    events: Arc<EventBus>,
    bounds: Cell<ViewRect>,
    callbacks: RefCell<HashMap<String, MessageCallback>>,
    bindings: RefCell<HashMap<String, BindFunction>>,
    pending_responses: RefCell<Vec<String>>,
    resources: RefCell<Vec<Resource>>,
}

impl WebViewState {
    pub fn new(
        name: Arc<str>,
        id: EntityId,
        backend: Box<dyn WebViewBackend>,
    ) -> Self {
        let bootstrap = bridge::bootstrap_script(backend.ipc_function());
        backend.inject_script(&bootstrap);
        backend.execute_script(&bootstrap);

        Self {
            name,
            id,
            backend,
            events: Arc::new(EventBus::new()),
            bounds: Cell::new(ViewRect::default()),
            callbacks: RefCell::new(HashMap::default()),
            bindings: RefCell::new(HashMap::default()),
            pending_responses: RefCell::new(Vec::new()),
            resources: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Routes a raw page message to its callback or bind function and emits
    /// it as a [`WebViewMessage`]. Returns true when a bind response was
    /// queued.
    pub fn on_message(&self, raw: &str) -> bool {
        let queued = match bridge::parse_message(raw) {
            Some(BridgeMessage::Bind {
                key,
                payload,
                request_id,
            }) => {
                let script = self.call_binding(&key, &payload, &request_id);
                self.pending_responses.borrow_mut().push(script);
                true
            }
            Some(BridgeMessage::Callback { key, payload }) => {
                self.call_callback(&key, &payload);
                false
            }
            None => {
                trace!("Unrecognized message from '{}': {}", self.name, raw);
                false
            }
        };

        self.events.emit(&mut WebViewMessage {
            message: raw.to_string(),
        });

        queued
    }

    fn call_binding(&self, key: &str, payload: &str, request_id: &str) -> String {
        let Some(function) = self.bindings.borrow().get(key).cloned() else {
            warn!("No function bound to '{}' in '{}'", key, self.name);
            return bridge::reject_script(
                request_id,
                &format!("No function bound to '{}'", key),
            );
        };

        match panic::catch_unwind(AssertUnwindSafe(|| function(payload))) {
            Ok(Ok(result)) => bridge::resolve_script(request_id, &result),
            Ok(Err(e)) => {
                debug!("Bound function '{}' failed: {}", key, e);
                bridge::reject_script(request_id, &e.to_string())
            }
            Err(cause) => {
                let message = panic_message(cause.as_ref());
                error!("Bound function '{}' panicked: {}", key, message);
                bridge::reject_script(request_id, &message)
            }
        }
    }

    fn call_callback(&self, key: &str, payload: &str) {
        let Some(callback) = self.callbacks.borrow().get(key).cloned() else {
            trace!("No callback registered for '{}'", key);
            return;
        };

        if let Err(cause) =
            panic::catch_unwind(AssertUnwindSafe(|| callback(payload)))
        {
            error!(
                "Callback '{}' panicked: {}",
                key,
                panic_message(cause.as_ref())
            );
        }
    }

    /// Runs and clears the queued bind responses.
    pub fn process_pending_responses(&self) {
        let responses = std::mem::take(&mut *self.pending_responses.borrow_mut());
        for script in responses {
            self.backend.execute_script(&script);
        }
    }

    /// Registers a page script for every future document and runs it in the
    /// current one.
    fn install_script(&self, script: &str) {
        self.backend.inject_script(script);
        self.backend.execute_script(script);
    }

    fn navigate(&self, url: &str) {
        debug!("'{}' navigating to {}", self.name, url);
        self.backend.load_url(url);
    }

    pub fn resource_for_uri(&self, uri: &str) -> Option<Resource> {
        let path = resource_path(uri)?;
        self.resources
            .borrow()
            .iter()
            .find(|resource| resource.path == path)
            .cloned()
    }

    pub fn teardown(&self) {
        self.backend.close();
        self.callbacks.borrow_mut().clear();
        self.bindings.borrow_mut().clear();
        self.pending_responses.borrow_mut().clear();
        self.events.clear();
    }
}

/// Handle to a web view owned by a [`Window`](crate::runtime::window::Window).
///
/// Like window handles, web view handles may be used from any thread and
/// become inert once the web view is destroyed.
#[derive(Clone)]
pub struct WebView {
    app: Weak<AppShared>,
    app_id: AppId,
    window_name: Arc<str>,
    window_id: EntityId,
    name: Arc<str>,
    id: EntityId,
    events: Arc<EventBus>,
}

impl WebView {
    pub(crate) fn new(
        app: &Arc<AppShared>,
        window: &WindowState,
        state: &WebViewState,
    ) -> Self {
        Self {
            app: Arc::downgrade(app),
            app_id: app.id,
            window_name: window.name().clone(),
            window_id: window.id(),
            name: state.name.clone(),
            id: state.id,
            events: state.events.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window_name(&self) -> &str {
        &self.window_name
    }

    /// Content events: `NavigationStarting`, `SourceChanged`,
    /// `ContentLoaded` and [`WebViewMessage`].
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_alive(&self) -> bool {
        self.with_state(|_| true)
    }

    pub fn enable_dev_tools(&self, enabled: bool) {
        self.with_state(move |web_view| web_view.backend.set_dev_tools(enabled));
    }

    pub fn enable_context_menu(&self, enabled: bool) {
        self.with_state(move |web_view| {
            web_view.backend.set_context_menu(enabled)
        });
    }

    pub fn enable_zoom(&self, enabled: bool) {
        self.with_state(move |web_view| web_view.backend.set_zoom(enabled));
    }

    pub fn enable_accelerator_keys(&self, enabled: bool) {
        self.with_state(move |web_view| {
            web_view.backend.set_accelerator_keys(enabled)
        });
    }

    /// Places the web view inside its window, in physical pixels.
    pub fn set_position(&self, rect: ViewRect) {
        self.with_state(move |web_view| {
            web_view.bounds.set(rect);
            web_view.backend.set_bounds(rect);
        });
    }

    /// Resizes the web view, keeping its top-left corner.
    pub fn resize(&self, size: ViewSize) {
        self.with_state(move |web_view| {
            let current = web_view.bounds.get();
            let rect = ViewRect::new(
                current.left,
                current.top,
                current.left + size.width,
                current.top + size.height,
            );
            web_view.bounds.set(rect);
            web_view.backend.set_bounds(rect);
        });
    }

    pub fn show(&self, visible: bool) {
        self.with_state(move |web_view| web_view.backend.set_visible(visible));
    }

    pub fn navigate(&self, url: &str) {
        let url = url.to_string();
        self.with_state(move |web_view| web_view.navigate(&url));
    }

    /// Loads a local file given its absolute path.
    pub fn load_file(&self, path: &str) {
        self.navigate(&format!("file://{}", path));
    }

    pub fn load_html(&self, html: &str) {
        let html = html.to_string();
        self.with_state(move |web_view| web_view.backend.load_html(&html));
    }

    /// Replaces the resources served under [`RESOURCE_ORIGIN`].
    pub fn load_resources(&self, resources: Vec<Resource>) {
        self.with_state(move |web_view| {
            *web_view.resources.borrow_mut() = resources;
        });
    }

    /// Navigates to a previously loaded resource.
    pub fn serve_resource(&self, path: &str) {
        self.navigate(&format!(
            "{}{}",
            RESOURCE_ORIGIN,
            path.trim_start_matches('/')
        ));
    }

    pub fn clear_resources(&self) {
        self.with_state(|web_view| web_view.resources.borrow_mut().clear());
    }

    /// Url of the current document, empty before the first navigation.
    pub fn url(&self) -> String {
        self.with_state(|web_view| web_view.backend.url())
    }

    /// Runs `script` at the start of every future document.
    pub fn inject_script(&self, script: &str) {
        let script = script.to_string();
        self.with_state(move |web_view| web_view.backend.inject_script(&script));
    }

    /// Runs `script` in the current document.
    pub fn execute_script(&self, script: &str) {
        let script = script.to_string();
        self.with_state(move |web_view| {
            web_view.backend.execute_script(&script)
        });
    }

    /// Exposes `window[key](payload)` to the page. Calls arrive with the
    /// payload as text: strings as-is, other values as JSON. Returns false
    /// and keeps the existing callback when `key` is already registered.
    pub fn add_callback<F>(&self, key: &str, callback: F) -> bool
    where
        F: Fn(&str) + Send + 'static,
    {
        let key = key.to_string();
        self.with_state(move |web_view| {
            {
                let mut callbacks = web_view.callbacks.borrow_mut();
                if callbacks.contains_key(&key) {
                    warn!("Callback '{}' already registered", key);
                    return false;
                }
                callbacks.insert(key.clone(), Rc::new(callback));
            }
            web_view.install_script(&bridge::callback_script(&key));
            true
        })
    }

    pub fn remove_callback(&self, key: &str) {
        let key = key.to_string();
        self.with_state(move |web_view| {
            web_view.callbacks.borrow_mut().remove(&key);
            web_view.install_script(&bridge::remove_callback_script(&key));
        });
    }

    /// Exposes `window[key](payload)` returning a promise that settles with
    /// the function's result. An `Err` or a panic rejects the promise with
    /// its message. Returns false and keeps the existing function when `key`
    /// is already bound.
    pub fn bind<F>(&self, key: &str, function: F) -> bool
    where
        F: Fn(&str) -> Result<String, BoxError> + Send + 'static,
    {
        let key = key.to_string();
        self.with_state(move |web_view| {
            {
                let mut bindings = web_view.bindings.borrow_mut();
                if bindings.contains_key(&key) {
                    warn!("Function '{}' already bound", key);
                    return false;
                }
                bindings.insert(key.clone(), Rc::new(function));
            }
            web_view.install_script(&bridge::bind_script(&key));
            true
        })
    }

    /// Removes a bound function and rejects its calls still in flight.
    pub fn unbind(&self, key: &str) {
        let key = key.to_string();
        self.with_state(move |web_view| {
            web_view.bindings.borrow_mut().remove(&key);
            web_view.install_script(&bridge::unbind_script(&key));
        });
    }

    /// Sends `message` to the page's `window.webview.onMessage` handler.
    pub fn post_message(&self, message: &str) {
        let script = bridge::post_message_script(message);
        self.with_state(move |web_view| {
            web_view.backend.execute_script(&script)
        });
    }

    /// Bind responses queued for the page and not yet delivered.
    pub fn pending_responses(&self) -> Vec<String> {
        self.with_state(|web_view| web_view.pending_responses.borrow().clone())
    }

    /// Delivers queued bind responses now instead of on the next loop
    /// iteration.
    pub fn process_pending_responses(&self) {
        self.with_state(|web_view| web_view.process_pending_responses());
    }

    fn with_state<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&WebViewState) -> R + Send + 'static,
        R: Default + Send + 'static,
    {
        let window_name = self.window_name.clone();
        let (window_id, name, id) = (self.window_id, self.name.clone(), self.id);

        let result = on_main_thread(&self.app, move |app| {
            let window = app
                .window(&window_name)
                .filter(|window| window.id() == window_id)?;
            let web_view =
                window.web_view(&name).filter(|web_view| web_view.id() == id)?;
            Some(f(&*web_view))
        });

        result.unwrap_or_else(|| {
            debug!("Ignoring call on destroyed web view '{}'", self.name);
            R::default()
        })
    }
}

impl PartialEq for WebView {
    fn eq(&self, other: &Self) -> bool {
        self.app_id == other.app_id && self.id == other.id
    }
}

impl Eq for WebView {}

impl fmt::Debug for WebView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebView")
            .field("window", &self.window_name)
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_path_strips_origin_query_and_fragment() {
        assert_eq!(
            resource_path("webview://localhost/index.html"),
            Some("index.html")
        );
        assert_eq!(
            resource_path("http://webview.localhost/js/app.js?v=2#top"),
            Some("js/app.js")
        );
        assert_eq!(resource_path("https://example.com/index.html"), None);
    }

    #[test]
    fn resource_paths_are_relative() {
        let resource = Resource::new("/css/site.css", "text/css", "body {}");
        assert_eq!(resource.path, "css/site.css");
        assert_eq!(resource.content, b"body {}".to_vec());
    }
}
