pub use crate::framework::logging::init_logger;
pub use crate::framework::logging::{debug, error, info, trace, warn};
pub use crate::framework::util::BoxError;
pub use crate::platform::headless::HeadlessPlatform;
#[cfg(feature = "native")]
pub use crate::platform::native::NativePlatform;
pub use crate::runtime::app::App;
pub use crate::runtime::config::{
    AppConfig, ExternalWindow, WebViewConfig, WebViewOptions, WindowConfig,
    WindowOptions, from_yaml_str,
};
pub use crate::runtime::dispatch::{DispatchError, Dispatcher};
pub use crate::runtime::event_bus::{Cancelable, Event, EventBus, ListenerId};
pub use crate::runtime::events::*;
pub use crate::runtime::geometry::{PixelsType, Rgb, ViewRect, ViewSize};
pub use crate::runtime::web_view::{Resource, WebView};
pub use crate::runtime::window::Window;
