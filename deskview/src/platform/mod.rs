//! Capability interfaces the runtime consumes from a windowing backend.
//!
//! The runtime never branches on which platform it is running on. It asks a
//! [`Platform`] for an event loop, native windows and native web views, and
//! receives native notifications through the hook objects it hands over at
//! construction time. Every backend method is called on the loop thread.
use std::any::Any;
use std::sync::Arc;

use crate::framework::util::BoxError;
use crate::runtime::config::{WebViewOptions, WindowOptions};
use crate::runtime::dispatch::Task;
use crate::runtime::geometry::{Rgb, ViewRect, ViewSize};
use crate::runtime::hooks::{WebViewHooks, WindowHooks};

pub mod headless;
#[cfg(feature = "native")]
pub mod native;

pub trait Platform {
    fn create_loop(&self) -> Result<Box<dyn PlatformLoop>, BoxError>;

    fn create_window(
        &self,
        name: &str,
        options: &WindowOptions,
        hooks: WindowHooks,
    ) -> Result<Box<dyn WindowBackend>, BoxError>;

    fn create_web_view(
        &self,
        parent: &dyn WindowBackend,
        name: &str,
        options: &WebViewOptions,
        hooks: WebViewHooks,
    ) -> Result<Box<dyn WebViewBackend>, BoxError>;
}

pub trait PlatformLoop {
    /// Runs posted tasks and native events on the calling thread until
    /// [`LoopWaker::exit`] is requested. May be entered again afterwards.
    fn enter(&self);

    fn waker(&self) -> Arc<dyn LoopWaker>;
}

/// Thread-safe side of a [`PlatformLoop`].
pub trait LoopWaker: Send + Sync {
    /// Queues `task` and wakes the loop. Hands the task back when the loop
    /// has been torn down.
    fn post(&self, task: Task) -> Result<(), Task>;

    /// Asks the loop to return from `enter` once the tasks queued before
    /// this request have run.
    fn exit(&self);
}

/// Native window chrome. Sizes and positions are physical pixels.
pub trait WindowBackend {
    fn set_title(&self, title: &str);
    fn title(&self) -> String;

    fn set_size(&self, size: ViewSize);
    fn size(&self) -> ViewSize;

    /// `None` removes the corresponding bound.
    fn set_size_constraints(&self, min: Option<ViewSize>, max: Option<ViewSize>);

    fn set_position(&self, rect: ViewRect);
    fn position(&self) -> ViewRect;

    fn set_resizable(&self, resizable: bool);
    fn is_resizable(&self) -> bool;

    fn set_decorations(&self, decorations: bool);
    fn is_decorated(&self) -> bool;

    fn set_visible(&self, visible: bool);
    fn is_visible(&self) -> bool;

    fn center(&self);

    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;

    fn set_background_color(&self, color: Rgb);

    fn scale_factor(&self) -> f32;

    /// Stops forwarding native notifications for a window this crate does
    /// not own. The native handle stays alive.
    fn detach(&self);

    /// Destroys the native window.
    fn close(&self);

    fn as_any(&self) -> &dyn Any;
}

/// Embedded web content surface. Load operations report their progress
/// through [`WebViewHooks`].
pub trait WebViewBackend {
    fn load_url(&self, url: &str);
    fn load_html(&self, html: &str);

    /// Registers a script that runs at the start of every document.
    fn inject_script(&self, script: &str);

    /// Runs a script in the current document.
    fn execute_script(&self, script: &str);

    fn url(&self) -> String;

    fn set_bounds(&self, rect: ViewRect);
    fn set_visible(&self, visible: bool);

    fn set_dev_tools(&self, enabled: bool);
    fn set_context_menu(&self, enabled: bool);
    fn set_zoom(&self, enabled: bool);
    fn set_accelerator_keys(&self, enabled: bool);

    /// Script expression of the function that carries a string from the page
    /// back to native code.
    fn ipc_function(&self) -> &'static str;

    /// Destroys the native web view.
    fn close(&self);

    fn as_any(&self) -> &dyn Any;
}

/// Platform selected by [`crate::runtime::app::App::new`].
pub fn default_platform() -> Box<dyn Platform> {
    #[cfg(feature = "native")]
    {
        Box::new(native::NativePlatform::new())
    }
    #[cfg(not(feature = "native"))]
    {
        Box::new(headless::HeadlessPlatform::new())
    }
}
