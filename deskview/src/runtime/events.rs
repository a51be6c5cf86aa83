use crate::runtime::event_bus::{Cancelable, Event};
use crate::runtime::geometry::ViewSize;

/// Emitted once per throttle window with the most recent physical size.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WindowResize {
    pub size: ViewSize,
}

impl WindowResize {
    pub fn new(size: ViewSize) -> Self {
        Self { size }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WindowShow {
    pub visible: bool,
}

/// Emitted when the user asks to close a window. Cancelling keeps the window
/// open.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WindowClose {
    cancelled: bool,
}

impl WindowClose {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cancelable for WindowClose {
    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WindowScaleFactorChanged {
    pub scale_factor: f32,
}

/// Emitted before the web view leaves its current document. Cancelling
/// aborts the navigation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NavigationStarting {
    pub url: String,
    cancelled: bool,
}

impl NavigationStarting {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cancelled: false,
        }
    }
}

impl Cancelable for NavigationStarting {
    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceChanged {
    pub url: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentLoaded {
    pub success: bool,
}

/// Raw text received from script, emitted for every inbound message whether
/// or not it matched a callback or bind function.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WebViewMessage {
    pub message: String,
}

impl Event for WindowResize {}
impl Event for WindowShow {}
impl Event for WindowClose {}
impl Event for WindowScaleFactorChanged {}
impl Event for NavigationStarting {}
impl Event for SourceChanged {}
impl Event for ContentLoaded {}
impl Event for WebViewMessage {}
