use std::error::Error;

use deskview::prelude::*;

const PAGE: &str = r#"<!doctype html>
<html>
  <body>
    <h1>deskview</h1>
    <button id="greet">Greet</button>
    <button id="add">2 + 3</button>
    <pre id="log"></pre>
    <script src="app.js"></script>
  </body>
</html>
"#;

const SCRIPT: &str = r#"
const log = (line) => {
  document.getElementById('log').textContent += line + '\n';
};

window.webview.onMessage = (message) => log('native: ' + message);

document.getElementById('greet').onclick = () => window.greet('hello');
document.getElementById('add').onclick = async () => {
  try {
    log('sum: ' + (await window.add([2, 3])));
  } catch (e) {
    log('error: ' + e);
  }
};
"#;

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();

    let app = App::new("callback_demo")?;
    let options = WindowOptions {
        title: "deskview callbacks".to_string(),
        size: ViewSize::new(640, 480),
        ..WindowOptions::default()
    };
    let window = app
        .create_window("main", options)
        .ok_or("unable to create main window")?;
    window.center();

    let web_view = window
        .create_web_view(
            "content",
            WebViewOptions {
                dev_tools: cfg!(debug_assertions),
                ..WebViewOptions::default()
            },
        )
        .ok_or("unable to create web view")?;

    let reply = web_view.clone();
    web_view.add_callback("greet", move |payload| {
        info!("Page says {}", payload);
        reply.post_message(&format!("received {}", payload));
    });

    web_view.bind("add", |payload| {
        let numbers: Vec<i64> = serde_json::from_str(payload)?;
        Ok(numbers.iter().sum::<i64>().to_string())
    });

    let resized = web_view.clone();
    window.events().connect(move |event: &mut WindowResize| {
        debug!("Window resized to {:?}", event.size);
        resized.resize(event.size);
    });

    web_view.load_resources(vec![
        Resource::new("index.html", "text/html", PAGE),
        Resource::new("app.js", "text/javascript", SCRIPT),
    ]);
    web_view.serve_resource("index.html");

    app.run();

    Ok(())
}
