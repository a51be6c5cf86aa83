use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::framework::util::BoxError;
use crate::runtime::geometry::ViewSize;
use crate::runtime::throttle::DEFAULT_RESIZE_THROTTLE_MS;

pub const DEFAULT_WINDOW_SIZE: ViewSize = ViewSize::new(800, 600);

/// Opaque native handle of a window owned by the host application. Windows
/// created over one are only detached on teardown, never destroyed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ExternalWindow(pub usize);

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowOptions {
    pub title: String,
    /// Initial size in logical pixels
    pub size: ViewSize,
    pub resizable: bool,
    pub decorations: bool,
    pub visible: bool,
    pub resize_throttle_ms: u64,

    #[serde(skip)]
    pub external: Option<ExternalWindow>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            size: DEFAULT_WINDOW_SIZE,
            resizable: true,
            decorations: true,
            visible: true,
            resize_throttle_ms: DEFAULT_RESIZE_THROTTLE_MS,
            external: None,
        }
    }
}

impl WindowOptions {
    pub fn external(handle: ExternalWindow) -> Self {
        Self {
            external: Some(handle),
            ..Self::default()
        }
    }
}

/// Settings applied once when the native web view is constructed.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebViewOptions {
    pub dev_tools: bool,
    pub context_menu: bool,
    pub zoom: bool,
    pub accelerator_keys: bool,
    pub remote_debugging_port: Option<u16>,
}

impl Default for WebViewOptions {
    fn default() -> Self {
        Self {
            dev_tools: false,
            context_menu: true,
            zoom: true,
            accelerator_keys: true,
            remote_debugging_port: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebViewConfig {
    #[serde(flatten)]
    pub options: WebViewOptions,
    /// Navigated to right after construction
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    #[serde(flatten)]
    pub options: WindowOptions,
    pub web_views: IndexMap<String, WebViewConfig>,
}

/// Declarative description of the windows and web views an app starts with,
/// keyed by name and created in file order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub windows: IndexMap<String, WindowConfig>,
}

pub fn from_yaml_str<T: DeserializeOwned>(yaml: &str) -> Result<T, BoxError> {
    Ok(serde_yml::from_str(yaml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options: WebViewOptions = from_yaml_str("dev_tools: true").unwrap();
        assert!(options.dev_tools);
        assert!(options.context_menu);
        assert!(options.zoom);
        assert!(options.accelerator_keys);
        assert_eq!(options.remote_debugging_port, None);

        let options: WindowOptions = from_yaml_str("title: Main").unwrap();
        assert_eq!(options.title, "Main");
        assert_eq!(options.size, DEFAULT_WINDOW_SIZE);
        assert_eq!(options.resize_throttle_ms, DEFAULT_RESIZE_THROTTLE_MS);
        assert_eq!(options.external, None);
    }

    #[test]
    fn app_config_preserves_declaration_order() {
        let yaml = r#"
windows:
  second:
    title: Second
    size:
      width: 300
      height: 200
    resize_throttle_ms: 0
  first:
    title: First
    web_views:
      content:
        url: https://example.com
        dev_tools: true
        remote_debugging_port: 9222
      overlay: {}
"#;
        let config: AppConfig = from_yaml_str(yaml).unwrap();
        let names: Vec<_> = config.windows.keys().cloned().collect();
        assert_eq!(names, vec!["second", "first"]);

        let second = &config.windows["second"];
        assert_eq!(second.options.size, ViewSize::new(300, 200));
        assert_eq!(second.options.resize_throttle_ms, 0);
        assert!(second.web_views.is_empty());

        let first = &config.windows["first"];
        let views: Vec<_> = first.web_views.keys().cloned().collect();
        assert_eq!(views, vec!["content", "overlay"]);

        let content = &first.web_views["content"];
        assert_eq!(content.url.as_deref(), Some("https://example.com"));
        assert!(content.options.dev_tools);
        assert_eq!(content.options.remote_debugging_port, Some(9222));
        assert_eq!(first.web_views["overlay"], WebViewConfig::default());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(from_yaml_str::<AppConfig>("windows: [1, 2").is_err());
    }
}
