//! Entry points for native notifications.
//!
//! Platforms receive one hook object per window or web view and call it from
//! the loop thread whenever the native side reports something. Hooks hold ids
//! only; a notification for an entity that has already been destroyed is
//! ignored.
use std::rc::Rc;
use std::sync::Arc;

use crate::framework::logging::*;
use crate::runtime::event_bus::Cancelable;
use crate::runtime::events::*;
use crate::runtime::geometry::ViewSize;
use crate::runtime::registry::{self, AppId, EntityId};
use crate::runtime::web_view::{Resource, WebViewState};
use crate::runtime::window::WindowState;

#[derive(Clone, Debug)]
pub struct WindowHooks {
    app_id: AppId,
    name: Arc<str>,
    id: EntityId,
}

impl WindowHooks {
    pub(crate) fn new(app_id: AppId, name: Arc<str>, id: EntityId) -> Self {
        Self { app_id, name, id }
    }

    pub fn window_name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<Rc<WindowState>> {
        registry::window(self.app_id, &self.name, self.id)
    }

    /// Reports a new physical client size. Bursts are throttled so listeners
    /// only see the latest size of each burst.
    pub fn on_native_resize(&self, size: ViewSize) {
        if let Some(window) = self.target() {
            window.queue_resize(size);
        }
    }

    pub fn on_native_show(&self, visible: bool) {
        if let Some(window) = self.target() {
            window.events().emit(&mut WindowShow { visible });
        }
    }

    /// Reports that the user asked to close the window. Returns false when a
    /// listener vetoed the close; otherwise the window is destroyed on the
    /// next loop iteration.
    pub fn on_native_close_requested(&self) -> bool {
        let Some(window) = self.target() else {
            return true;
        };

        let mut event = WindowClose::new();
        window.events().emit(&mut event);
        if event.is_cancelled() {
            debug!("Close of window '{}' cancelled by listener", self.name);
            return false;
        }

        if let Some(app) = registry::app(self.app_id) {
            app.notify_window_closed_from_ui(self.name.clone(), self.id);
        }

        true
    }

    pub fn on_native_scale_factor_changed(&self, scale_factor: f32) {
        if let Some(window) = self.target() {
            window.update_scale_factor(scale_factor);
        }
    }
}

#[derive(Clone, Debug)]
pub struct WebViewHooks {
    app_id: AppId,
    window_name: Arc<str>,
    window_id: EntityId,
    name: Arc<str>,
    id: EntityId,
}

impl WebViewHooks {
    pub(crate) fn new(
        app_id: AppId,
        window_name: Arc<str>,
        window_id: EntityId,
        name: Arc<str>,
        id: EntityId,
    ) -> Self {
        Self {
            app_id,
            window_name,
            window_id,
            name,
            id,
        }
    }

    pub fn web_view_name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<Rc<WebViewState>> {
        registry::web_view(
            self.app_id,
            &self.window_name,
            self.window_id,
            &self.name,
            self.id,
        )
    }

    /// Delivers a raw message posted by the page.
    pub fn on_native_message(&self, raw: &str) {
        let Some(web_view) = self.target() else {
            return;
        };

        if web_view.on_message(raw) {
            self.schedule_response_flush();
        }
    }

    /// Returns false when a listener cancelled the navigation.
    pub fn on_navigation_starting(&self, url: &str) -> bool {
        let Some(web_view) = self.target() else {
            return true;
        };

        let mut event = NavigationStarting::new(url);
        web_view.events().emit(&mut event);
        if event.is_cancelled() {
            debug!("Navigation to {} cancelled by listener", url);
        }
        !event.is_cancelled()
    }

    pub fn on_source_changed(&self, url: &str) {
        if let Some(web_view) = self.target() {
            web_view.events().emit(&mut SourceChanged {
                url: url.to_string(),
            });
        }
    }

    pub fn on_content_loaded(&self, success: bool) {
        if let Some(web_view) = self.target() {
            web_view.events().emit(&mut ContentLoaded { success });
        }
    }

    /// Looks up the in-memory resource for a request to the reserved origin.
    pub fn resource(&self, uri: &str) -> Option<Resource> {
        self.target()?.resource_for_uri(uri)
    }

    fn schedule_response_flush(&self) {
        let Some(app) = registry::app(self.app_id) else {
            return;
        };

        let hooks = self.clone();
        let result = app.dispatcher().dispatch(move || {
            if let Some(web_view) = hooks.target() {
                web_view.process_pending_responses();
            }
        });

        if let Err(e) = result {
            warn!("Unable to schedule bind responses: {}", e);
        }
    }
}
