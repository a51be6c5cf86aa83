//! Loop-thread ownership of live apps.
//!
//! App, window and web view state never leaves the thread that runs the
//! event loop. Handles carry ids instead of pointers and look their target
//! up here from inside tasks that already run on that thread, so a handle
//! that outlives its target simply finds nothing.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::framework::util::HashMap;
use crate::runtime::app::AppState;
use crate::runtime::web_view::WebViewState;
use crate::runtime::window::WindowState;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct AppId(u64);

/// Generation id of a window or web view. Never reused, so a new entity
/// created under an old name is not mistaken for the old one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EntityId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl AppId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl EntityId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

thread_local! {
    static APPS: RefCell<HashMap<AppId, Rc<AppState>>> =
        RefCell::new(HashMap::default());
}

pub(crate) fn register(state: Rc<AppState>) {
    APPS.with(|apps| {
        apps.borrow_mut().insert(state.id(), state);
    });
}

pub(crate) fn unregister(id: AppId) -> Option<Rc<AppState>> {
    APPS.try_with(|apps| apps.borrow_mut().remove(&id))
        .ok()
        .flatten()
}

pub(crate) fn app(id: AppId) -> Option<Rc<AppState>> {
    APPS.try_with(|apps| apps.borrow().get(&id).cloned())
        .ok()
        .flatten()
}

pub(crate) fn window(
    app_id: AppId,
    name: &str,
    id: EntityId,
) -> Option<Rc<WindowState>> {
    app(app_id)?.window(name).filter(|window| window.id() == id)
}

pub(crate) fn web_view(
    app_id: AppId,
    window_name: &str,
    window_id: EntityId,
    name: &str,
    id: EntityId,
) -> Option<Rc<WebViewState>> {
    window(app_id, window_name, window_id)?
        .web_view(name)
        .filter(|web_view| web_view.id() == id)
}
