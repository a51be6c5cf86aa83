mod support;

use deskview::platform::WebViewBackend;
use deskview::prelude::*;
use support::{Recorder, headless_app};

fn app_with_web_view() -> (App, HeadlessPlatform, Window, WebView) {
    let (app, platform) = headless_app("content");
    let window = app.create_window("main", WindowOptions::default()).unwrap();
    let web_view = window
        .create_web_view("view", WebViewOptions::default())
        .unwrap();
    (app, platform, window, web_view)
}

#[derive(Clone, Debug, PartialEq)]
enum Load {
    Starting(String),
    Source(String),
    Loaded(bool),
}

fn record_loads(web_view: &WebView) -> Recorder<Load> {
    let loads = Recorder::new();

    let recorder = loads.clone();
    web_view.events().connect(move |event: &mut NavigationStarting| {
        recorder.push(Load::Starting(event.url.clone()))
    });
    let recorder = loads.clone();
    web_view.events().connect(move |event: &mut SourceChanged| {
        recorder.push(Load::Source(event.url.clone()))
    });
    let recorder = loads.clone();
    web_view.events().connect(move |event: &mut ContentLoaded| {
        recorder.push(Load::Loaded(event.success))
    });

    loads
}

#[test]
fn web_view_lookup_and_duplicates() {
    let (_app, platform, window, web_view) = app_with_web_view();

    assert_eq!(window.web_view("view"), Some(web_view.clone()));
    assert_eq!(web_view.window_name(), "main");
    assert!(
        window
            .create_web_view("view", WebViewOptions::default())
            .is_none()
    );

    platform.fail_next_web_view();
    assert!(
        window
            .create_web_view("broken", WebViewOptions::default())
            .is_none()
    );
    assert_eq!(window.web_view_names(), vec!["view"]);
}

#[test]
fn construction_options_reach_the_engine() {
    let (app, platform) = headless_app("options");
    let window = app.create_window("main", WindowOptions::default()).unwrap();
    let options = WebViewOptions {
        dev_tools: true,
        context_menu: false,
        remote_debugging_port: Some(9222),
        ..WebViewOptions::default()
    };

    let web_view = window.create_web_view("view", options.clone()).unwrap();

    let native = platform.web_view("main", "view").unwrap();
    assert_eq!(native.options(), &options);
    assert!(native.dev_tools());
    assert!(!native.context_menu());

    web_view.enable_dev_tools(false);
    web_view.enable_zoom(false);
    web_view.enable_accelerator_keys(false);
    web_view.enable_context_menu(true);
    assert!(!native.dev_tools());
    assert!(!native.zoom());
    assert!(!native.accelerator_keys());
    assert!(native.context_menu());
}

#[test]
fn bridge_bootstrap_is_installed_at_construction() {
    let (_app, platform, _window, _web_view) = app_with_web_view();

    let native = platform.web_view("main", "view").unwrap();
    let injected = native.injected_scripts();

    assert_eq!(injected.len(), 1);
    assert!(injected[0].contains("window.ipc.postMessage"));
    assert_eq!(native.executed_scripts(), injected);
}

#[test]
fn navigation_reports_start_source_and_load() {
    let (_app, _platform, _window, web_view) = app_with_web_view();
    let loads = record_loads(&web_view);

    web_view.navigate("https://example.com/");

    assert_eq!(
        loads.entries(),
        vec![
            Load::Starting("https://example.com/".into()),
            Load::Source("https://example.com/".into()),
            Load::Loaded(true),
        ]
    );
    assert_eq!(web_view.url(), "https://example.com/");
}

#[test]
fn cancelled_navigation_never_changes_the_source() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let loads = record_loads(&web_view);
    web_view.events().connect(|event: &mut NavigationStarting| {
        if event.url.contains("blocked") {
            event.cancel();
        }
    });

    web_view.navigate("https://example.com/");
    platform
        .web_view("main", "view")
        .unwrap()
        .navigate_from_page("https://blocked.example.com/");

    assert_eq!(
        loads.entries(),
        vec![
            Load::Starting("https://example.com/".into()),
            Load::Source("https://example.com/".into()),
            Load::Loaded(true),
            Load::Starting("https://blocked.example.com/".into()),
        ]
    );
    assert_eq!(web_view.url(), "https://example.com/");
}

#[test]
fn load_html_replaces_the_document_without_navigation_start() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let loads = record_loads(&web_view);

    web_view.load_html("<h1>Hello</h1>");

    let native = platform.web_view("main", "view").unwrap();
    assert_eq!(native.html().as_deref(), Some("<h1>Hello</h1>"));
    assert_eq!(native.url(), "about:blank");
    assert_eq!(
        loads.entries(),
        vec![Load::Source("about:blank".into()), Load::Loaded(true)]
    );
}

#[test]
fn load_file_navigates_to_a_file_url() {
    let (_app, _platform, _window, web_view) = app_with_web_view();

    web_view.load_file("/tmp/page.html");

    assert_eq!(web_view.url(), "file:///tmp/page.html");
}

#[test]
fn resources_are_served_from_the_reserved_origin() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let loads = record_loads(&web_view);
    let index = Resource::new("index.html", "text/html", "<p>index</p>");
    web_view.load_resources(vec![
        index.clone(),
        Resource::new("app.js", "text/javascript", "void 0"),
    ]);

    web_view.serve_resource("/index.html");

    let native = platform.web_view("main", "view").unwrap();
    assert_eq!(native.last_resource(), Some(index));
    assert_eq!(web_view.url(), "webview://localhost/index.html");
    assert_eq!(loads.entries().last(), Some(&Load::Loaded(true)));

    web_view.clear_resources();
    web_view.serve_resource("index.html");
    assert_eq!(native.last_resource(), None);
    assert_eq!(loads.entries().last(), Some(&Load::Loaded(false)));
}

#[test]
fn callbacks_receive_page_payloads() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let received = Recorder::new();
    let recorder = received.clone();

    assert!(web_view.add_callback("greet", move |payload| {
        recorder.push(payload.to_string())
    }));
    assert!(!web_view.add_callback("greet", |_| {}));

    let native = platform.web_view("main", "view").unwrap();
    native.post_from_page(r#"{"key":"greet","payload":"hello"}"#);
    native.post_from_page(r#"{"key":"greet","payload":{"n":1}}"#);
    native.post_from_page(r#"{"key":"unknown","payload":1}"#);

    assert_eq!(received.entries(), vec!["hello", r#"{"n":1}"#]);
    assert!(
        native
            .injected_scripts()
            .iter()
            .any(|script| script.contains(r#"window["greet"]"#))
    );
}

#[test]
fn removed_callback_is_no_longer_called() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let received = Recorder::new();
    let recorder = received.clone();
    web_view.add_callback("ping", move |payload| {
        recorder.push(payload.to_string())
    });

    web_view.remove_callback("ping");
    platform
        .web_view("main", "view")
        .unwrap()
        .post_from_page(r#"{"key":"ping","payload":"x"}"#);

    assert_eq!(received.len(), 0);
    assert!(web_view.add_callback("ping", |_| {}));
}

#[test]
fn bound_function_resolves_the_page_promise() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    web_view.bind("add", |payload| {
        let numbers: Vec<i64> = serde_json::from_str(payload)?;
        Ok(numbers.iter().sum::<i64>().to_string())
    });
    let native = platform.web_view("main", "view").unwrap();

    native.post_from_page(
        r#"{"type":"bind","key":"add","payload":"[2,3]","requestId":"r1"}"#,
    );

    let pending = web_view.pending_responses();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].contains(r#"calls["r1"]"#));
    assert!(pending[0].contains("call.resolve(5)"));

    web_view.process_pending_responses();

    assert!(web_view.pending_responses().is_empty());
    assert_eq!(native.executed_scripts().last(), Some(&pending[0]));
}

#[test]
fn bind_failures_reject_the_page_promise() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    web_view.bind("fail", |_| Err("nope".into()));
    web_view.bind("explode", |_| panic!("kaboom"));
    web_view.bind("echo", |payload| Ok(payload.to_string()));
    let native = platform.web_view("main", "view").unwrap();

    for (key, id) in [("fail", "a"), ("explode", "b"), ("missing", "c"), ("echo", "d")] {
        native.post_from_page(&format!(
            r#"{{"type":"bind","key":"{}","payload":"text","requestId":"{}"}}"#,
            key, id
        ));
    }

    let pending = web_view.pending_responses();
    assert_eq!(pending.len(), 4);
    assert!(pending[0].contains(r#"call.reject("nope")"#));
    assert!(pending[1].contains(r#"call.reject("kaboom")"#));
    assert!(pending[2].contains(r#"No function bound to 'missing'"#));
    assert!(pending[3].contains(r#"call.resolve("text")"#));
}

#[test]
fn duplicate_bind_keeps_the_first_function() {
    let (_app, platform, _window, web_view) = app_with_web_view();

    assert!(web_view.bind("value", |_| Ok("1".into())));
    assert!(!web_view.bind("value", |_| Ok("2".into())));

    platform.web_view("main", "view").unwrap().post_from_page(
        r#"{"type":"bind","key":"value","requestId":"r"}"#,
    );
    assert!(web_view.pending_responses()[0].contains("call.resolve(1)"));

    web_view.unbind("value");
    assert!(web_view.bind("value", |_| Ok("2".into())));
}

#[test]
fn page_messages_are_emitted_as_events() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let messages = Recorder::new();
    let recorder = messages.clone();
    web_view.events().connect(move |event: &mut WebViewMessage| {
        recorder.push(event.message.clone())
    });

    platform
        .web_view("main", "view")
        .unwrap()
        .post_from_page("plain text");

    assert_eq!(messages.entries(), vec!["plain text"]);
}

#[test]
fn post_message_reaches_the_page_handler() {
    let (_app, platform, _window, web_view) = app_with_web_view();

    web_view.post_message("it's \"quoted\"");

    assert_eq!(
        platform
            .web_view("main", "view")
            .unwrap()
            .executed_scripts()
            .last()
            .map(String::as_str),
        Some(r#"window.webview.onMessage("it's \"quoted\"");"#)
    );
}

#[test]
fn scripts_and_bounds_reach_the_engine() {
    let (_app, platform, _window, web_view) = app_with_web_view();
    let native = platform.web_view("main", "view").unwrap();

    web_view.inject_script("window.injected = true;");
    web_view.execute_script("window.executed = true;");
    web_view.set_position(ViewRect::new(10, 20, 110, 220));
    web_view.resize(ViewSize::new(50, 60));
    web_view.show(false);

    assert_eq!(
        native.injected_scripts().last().map(String::as_str),
        Some("window.injected = true;")
    );
    assert_eq!(
        native.executed_scripts().last().map(String::as_str),
        Some("window.executed = true;")
    );
    assert_eq!(native.bounds(), ViewRect::new(10, 20, 60, 80));
    assert!(!native.is_visible());
}

#[test]
fn destroyed_web_view_ignores_calls() {
    let (_app, platform, window, web_view) = app_with_web_view();

    window.destroy_web_view("view");
    window.destroy_web_view("view");

    assert!(!web_view.is_alive());
    assert!(!web_view.add_callback("late", |_| {}));
    web_view.navigate("https://example.com/");

    let native = platform.web_view("main", "view").unwrap();
    assert!(native.is_closed());
    assert_ne!(native.url(), "https://example.com/");
    assert!(window.is_alive());
}
