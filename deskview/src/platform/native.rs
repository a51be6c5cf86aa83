//! `tao` windows hosting `wry` web views.
//!
//! The loop is a `tao` event loop whose user events are tasks; posting a
//! task wakes the loop through its proxy. A process gets one such loop.
use parking_lot::Mutex;
use scoped_tls::scoped_thread_local;
use std::any::Any;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tao::dpi::{PhysicalPosition, PhysicalSize};
use tao::event::{Event, WindowEvent};
use tao::event_loop::{
    ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy,
    EventLoopWindowTarget,
};
use tao::platform::run_return::EventLoopExtRunReturn;
use tao::window::{Window as TaoWindow, WindowBuilder, WindowId};
use wry::http::header::{CONTENT_TYPE, HeaderValue};
use wry::http::{Request, Response, StatusCode};
use wry::{PageLoadEvent, Rect, WebView as WryWebView, WebViewBuilder};

use super::{LoopWaker, Platform, PlatformLoop, WebViewBackend, WindowBackend};
use crate::framework::logging::*;
use crate::framework::util::{BoxError, HashMap};
use crate::runtime::config::{WebViewOptions, WindowOptions};
use crate::runtime::dispatch::Task;
use crate::runtime::geometry::{Rgb, ViewRect, ViewSize};
use crate::runtime::hooks::{WebViewHooks, WindowHooks};
use crate::runtime::web_view::RESOURCE_SCHEME;
use crate::runtime::web_view_bridge;

const IPC_FUNCTION: &str = "window.ipc.postMessage";

static LOOP_CREATED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static EVENT_LOOP: RefCell<Option<EventLoop<Task>>> =
        const { RefCell::new(None) };

    static WINDOW_HOOKS: RefCell<HashMap<WindowId, WindowHooks>> =
        RefCell::new(HashMap::default());
}

// Set for the duration of each loop callback, so code reached from inside
// it can build windows against the running loop.
scoped_thread_local!(static ACTIVE_TARGET: EventLoopWindowTarget<Task>);

fn with_target<R>(f: impl FnOnce(&EventLoopWindowTarget<Task>) -> R) -> Option<R> {
    if ACTIVE_TARGET.is_set() {
        return Some(ACTIVE_TARGET.with(f));
    }

    EVENT_LOOP.with(|slot| slot.borrow().as_ref().map(|event_loop| f(&**event_loop)))
}

fn window_hooks(id: WindowId) -> Option<WindowHooks> {
    WINDOW_HOOKS.with(|hooks| hooks.borrow().get(&id).cloned())
}

fn physical_size(size: ViewSize) -> PhysicalSize<u32> {
    PhysicalSize::new(size.width as u32, size.height as u32)
}

fn view_size(size: PhysicalSize<u32>) -> ViewSize {
    ViewSize::new(size.width as usize, size.height as usize)
}

#[derive(Debug, Default)]
pub struct NativePlatform;

impl NativePlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for NativePlatform {
    fn create_loop(&self) -> Result<Box<dyn PlatformLoop>, BoxError> {
        if LOOP_CREATED.swap(true, Ordering::SeqCst) {
            return Err("an event loop already exists in this process".into());
        }

        let mut builder = EventLoopBuilder::<Task>::with_user_event();
        #[cfg(any(
            target_os = "linux",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        {
            use tao::platform::unix::EventLoopBuilderExtUnix;
            builder.with_any_thread(true);
        }
        #[cfg(target_os = "windows")]
        {
            use tao::platform::windows::EventLoopBuilderExtWindows;
            builder.with_any_thread(true);
        }

        let event_loop = builder.build();
        let stop = Arc::new(AtomicBool::new(false));
        let waker = Arc::new(NativeWaker {
            proxy: Mutex::new(event_loop.create_proxy()),
            stop: stop.clone(),
        });

        EVENT_LOOP.with(|slot| *slot.borrow_mut() = Some(event_loop));
        debug!("Created native event loop");

        Ok(Box::new(NativeLoop { waker, stop }))
    }

    fn create_window(
        &self,
        name: &str,
        options: &WindowOptions,
        hooks: WindowHooks,
    ) -> Result<Box<dyn WindowBackend>, BoxError> {
        if options.external.is_some() {
            return Err("external windows are not supported natively".into());
        }

        let builder = WindowBuilder::new()
            .with_title(&options.title)
            .with_inner_size(tao::dpi::LogicalSize::new(
                options.size.width as f64,
                options.size.height as f64,
            ))
            .with_resizable(options.resizable)
            .with_decorations(options.decorations)
            .with_visible(options.visible);

        let window = with_target(|target| builder.build(target))
            .ok_or("event loop is not available on this thread")?
            .map_err(|e| format!("unable to build window '{}': {}", name, e))?;

        WINDOW_HOOKS.with(|all| all.borrow_mut().insert(window.id(), hooks));

        Ok(Box::new(NativeWindow {
            window,
            enabled: Cell::new(true),
        }))
    }

    fn create_web_view(
        &self,
        parent: &dyn WindowBackend,
        name: &str,
        options: &WebViewOptions,
        hooks: WebViewHooks,
    ) -> Result<Box<dyn WebViewBackend>, BoxError> {
        let parent = parent
            .as_any()
            .downcast_ref::<NativeWindow>()
            .ok_or("parent is not a native window")?;

        let inner = Rc::new(NativeWebViewInner::default());
        let size = parent.window.inner_size();

        let ipc_hooks = hooks.clone();
        let navigation_hooks = hooks.clone();
        let load_hooks = hooks.clone();
        let load_inner = Rc::downgrade(&inner);
        let resource_hooks = hooks;

        let builder = WebViewBuilder::new()
            .with_bounds(Rect {
                position: wry::dpi::PhysicalPosition::new(0, 0).into(),
                size: wry::dpi::PhysicalSize::new(size.width, size.height).into(),
            })
            .with_devtools(options.dev_tools)
            .with_hotkeys_zoom(options.zoom)
            .with_initialization_script(&web_view_bridge::bootstrap_script(
                IPC_FUNCTION,
            ))
            .with_ipc_handler(move |request: Request<String>| {
                ipc_hooks.on_native_message(request.body());
            })
            .with_navigation_handler(move |url: String| {
                navigation_hooks.on_navigation_starting(&url)
            })
            .with_on_page_load_handler(move |event, url| match event {
                PageLoadEvent::Started => load_hooks.on_source_changed(&url),
                PageLoadEvent::Finished => {
                    if let Some(inner) = load_inner.upgrade() {
                        inner.run_injected_scripts();
                    }
                    load_hooks.on_content_loaded(true);
                }
            })
            .with_custom_protocol(
                RESOURCE_SCHEME.into(),
                move |_web_view_id, request: Request<Vec<u8>>| {
                    let uri = request.uri().to_string();
                    match resource_hooks.resource(&uri) {
                        Some(resource) => respond(
                            StatusCode::OK,
                            &resource.mime_type,
                            resource.content,
                        ),
                        None => {
                            warn!("No resource for {}", uri);
                            respond(
                                StatusCode::NOT_FOUND,
                                "text/plain",
                                b"Not Found".to_vec(),
                            )
                        }
                    }
                },
            );

        #[cfg(target_os = "windows")]
        let builder = match options.remote_debugging_port {
            Some(port) => {
                use wry::WebViewBuilderExtWindows;
                builder.with_additional_browser_args(format!(
                    "--remote-debugging-port={}",
                    port
                ))
            }
            None => builder,
        };
        #[cfg(not(target_os = "windows"))]
        if let Some(port) = options.remote_debugging_port {
            warn!("Remote debugging port {} is only honored on Windows", port);
        }

        let web_view = builder
            .build_as_child(&parent.window)
            .map_err(|e| format!("unable to build web view '{}': {}", name, e))?;

        if options.dev_tools {
            web_view.open_devtools();
        }

        *inner.web_view.borrow_mut() = Some(web_view);
        if !options.context_menu || !options.accelerator_keys {
            debug!(
                "Web view '{}' keeps context menu and accelerator keys enabled",
                name
            );
        }

        Ok(Box::new(NativeWebView { inner }))
    }
}

fn respond(
    status: StatusCode,
    mime_type: &str,
    body: Vec<u8>,
) -> Response<Cow<'static, [u8]>> {
    let mut response = Response::new(Cow::Owned(body));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(mime_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

struct NativeLoop {
    waker: Arc<NativeWaker>,
    stop: Arc<AtomicBool>,
}

impl PlatformLoop for NativeLoop {
    fn enter(&self) {
        let Some(mut event_loop) =
            EVENT_LOOP.with(|slot| slot.borrow_mut().take())
        else {
            error!("Native event loop is already running");
            return;
        };

        let stop = self.stop.clone();
        event_loop.run_return(|event, target, control_flow| {
            *control_flow = ControlFlow::Wait;

            ACTIVE_TARGET.set(target, || match event {
                Event::UserEvent(task) => task(),
                Event::WindowEvent {
                    window_id, event, ..
                } => handle_window_event(window_id, event),
                _ => {}
            });

            if stop.swap(false, Ordering::SeqCst) {
                *control_flow = ControlFlow::Exit;
            }
        });

        EVENT_LOOP.with(|slot| *slot.borrow_mut() = Some(event_loop));
    }

    fn waker(&self) -> Arc<dyn LoopWaker> {
        self.waker.clone()
    }
}

fn handle_window_event(window_id: WindowId, event: WindowEvent<'_>) {
    let Some(hooks) = window_hooks(window_id) else {
        return;
    };

    match event {
        WindowEvent::Resized(size) => hooks.on_native_resize(view_size(size)),
        WindowEvent::CloseRequested => {
            hooks.on_native_close_requested();
        }
        WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
            hooks.on_native_scale_factor_changed(scale_factor as f32)
        }
        _ => {}
    }
}

struct NativeWaker {
    proxy: Mutex<EventLoopProxy<Task>>,
    stop: Arc<AtomicBool>,
}

impl LoopWaker for NativeWaker {
    fn post(&self, task: Task) -> Result<(), Task> {
        self.proxy.lock().send_event(task).map_err(|e| e.0)
    }

    fn exit(&self) {
        let stop = self.stop.clone();
        let _ = self.post(Box::new(move || stop.store(true, Ordering::SeqCst)));
    }
}

pub struct NativeWindow {
    window: TaoWindow,
    enabled: Cell<bool>,
}

impl NativeWindow {
    fn forget_hooks(&self) -> Option<WindowHooks> {
        WINDOW_HOOKS
            .try_with(|hooks| hooks.borrow_mut().remove(&self.window.id()))
            .ok()
            .flatten()
    }
}

impl WindowBackend for NativeWindow {
    fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    fn title(&self) -> String {
        self.window.title()
    }

    fn set_size(&self, size: ViewSize) {
        self.window.set_inner_size(physical_size(size));
    }

    fn size(&self) -> ViewSize {
        view_size(self.window.inner_size())
    }

    fn set_size_constraints(&self, min: Option<ViewSize>, max: Option<ViewSize>) {
        self.window.set_min_inner_size(min.map(physical_size));
        self.window.set_max_inner_size(max.map(physical_size));
    }

    fn set_position(&self, rect: ViewRect) {
        self.window.set_outer_position(PhysicalPosition::new(
            rect.left as i32,
            rect.top as i32,
        ));
        self.window.set_inner_size(physical_size(rect.size()));
    }

    fn position(&self) -> ViewRect {
        let position = self
            .window
            .outer_position()
            .unwrap_or_else(|_| PhysicalPosition::new(0, 0));
        let size = self.window.outer_size();
        let left = position.x.max(0) as usize;
        let top = position.y.max(0) as usize;
        ViewRect::new(
            left,
            top,
            left + size.width as usize,
            top + size.height as usize,
        )
    }

    fn set_resizable(&self, resizable: bool) {
        self.window.set_resizable(resizable);
    }

    fn is_resizable(&self) -> bool {
        self.window.is_resizable()
    }

    fn set_decorations(&self, decorations: bool) {
        self.window.set_decorations(decorations);
    }

    fn is_decorated(&self) -> bool {
        self.window.is_decorated()
    }

    fn set_visible(&self, visible: bool) {
        if self.window.is_visible() == visible {
            return;
        }
        self.window.set_visible(visible);
        if let Some(hooks) = window_hooks(self.window.id()) {
            hooks.on_native_show(visible);
        }
    }

    fn is_visible(&self) -> bool {
        self.window.is_visible()
    }

    fn center(&self) {
        let Some(monitor) = self.window.current_monitor() else {
            return;
        };

        let area = monitor.size();
        let origin = monitor.position();
        let size = self.window.outer_size();
        let left = origin.x + (area.width.saturating_sub(size.width) / 2) as i32;
        let top = origin.y + (area.height.saturating_sub(size.height) / 2) as i32;
        self.window
            .set_outer_position(PhysicalPosition::new(left, top));
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
        #[cfg(target_os = "windows")]
        {
            use tao::platform::windows::WindowExtWindows;
            self.window.set_enable(enabled);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_background_color(&self, color: Rgb) {
        self.window.set_background_color(Some((
            color.red,
            color.green,
            color.blue,
            255,
        )));
    }

    fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn detach(&self) {
        self.forget_hooks();
    }

    fn close(&self) {
        self.forget_hooks();
        self.window.set_visible(false);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        self.forget_hooks();
    }
}

#[derive(Default)]
struct NativeWebViewInner {
    web_view: RefCell<Option<WryWebView>>,
    injected_scripts: RefCell<Vec<String>>,
}

impl NativeWebViewInner {
    fn with_web_view(&self, f: impl FnOnce(&WryWebView)) {
        if let Some(web_view) = self.web_view.borrow().as_ref() {
            f(web_view);
        }
    }

    fn evaluate(&self, script: &str) {
        self.with_web_view(|web_view| {
            if let Err(e) = web_view.evaluate_script(script) {
                error!("Unable to run script: {}", e);
            }
        });
    }

    /// wry takes document-start scripts at build time only, so later
    /// registrations are replayed after every load.
    fn run_injected_scripts(&self) {
        let scripts = self.injected_scripts.borrow().clone();
        for script in scripts {
            self.evaluate(&script);
        }
    }
}

pub struct NativeWebView {
    inner: Rc<NativeWebViewInner>,
}

impl WebViewBackend for NativeWebView {
    fn load_url(&self, url: &str) {
        self.inner.with_web_view(|web_view| {
            if let Err(e) = web_view.load_url(url) {
                error!("Unable to load {}: {}", url, e);
            }
        });
    }

    fn load_html(&self, html: &str) {
        self.inner.with_web_view(|web_view| {
            if let Err(e) = web_view.load_html(html) {
                error!("Unable to load html: {}", e);
            }
        });
    }

    fn inject_script(&self, script: &str) {
        self.inner
            .injected_scripts
            .borrow_mut()
            .push(script.to_string());
    }

    fn execute_script(&self, script: &str) {
        self.inner.evaluate(script);
    }

    fn url(&self) -> String {
        self.inner
            .web_view
            .borrow()
            .as_ref()
            .and_then(|web_view| web_view.url().ok())
            .unwrap_or_default()
    }

    fn set_bounds(&self, rect: ViewRect) {
        self.inner.with_web_view(|web_view| {
            let bounds = Rect {
                position: wry::dpi::PhysicalPosition::new(
                    rect.left as i32,
                    rect.top as i32,
                )
                .into(),
                size: wry::dpi::PhysicalSize::new(
                    rect.width() as u32,
                    rect.height() as u32,
                )
                .into(),
            };
            if let Err(e) = web_view.set_bounds(bounds) {
                error!("Unable to move web view: {}", e);
            }
        });
    }

    fn set_visible(&self, visible: bool) {
        self.inner.with_web_view(|web_view| {
            if let Err(e) = web_view.set_visible(visible) {
                error!("Unable to change web view visibility: {}", e);
            }
        });
    }

    fn set_dev_tools(&self, enabled: bool) {
        self.inner.with_web_view(|web_view| {
            if enabled {
                web_view.open_devtools();
            } else {
                web_view.close_devtools();
            }
        });
    }

    fn set_context_menu(&self, enabled: bool) {
        debug!("Context menu toggling ({}) is not supported by wry", enabled);
    }

    fn set_zoom(&self, enabled: bool) {
        if !enabled {
            self.inner.with_web_view(|web_view| {
                if let Err(e) = web_view.zoom(1.0) {
                    error!("Unable to reset zoom: {}", e);
                }
            });
        }
    }

    fn set_accelerator_keys(&self, enabled: bool) {
        debug!("Accelerator key toggling ({}) is not supported by wry", enabled);
    }

    fn ipc_function(&self) -> &'static str {
        IPC_FUNCTION
    }

    fn close(&self) {
        self.inner.web_view.borrow_mut().take();
        self.inner.injected_scripts.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
