//! Native windows hosting web views, driven by a single main-thread event
//! loop and reachable from any thread through lightweight handles.
pub mod framework;
pub mod platform;
pub mod prelude;
pub mod runtime;

pub use crate::runtime::app::App;
pub use crate::runtime::web_view::WebView;
pub use crate::runtime::window::Window;
