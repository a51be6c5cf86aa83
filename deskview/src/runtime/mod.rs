pub mod app;
pub mod config;
pub mod dispatch;
pub mod event_bus;
pub mod events;
pub mod geometry;
pub mod hooks;
pub(crate) mod registry;
pub mod throttle;
pub mod web_view;
pub mod web_view_bridge;
pub mod window;
