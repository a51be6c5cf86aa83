//! Script side of the native/page message bridge.
//!
//! Pages talk to native code with JSON objects posted through
//! `window.webview.postMessage`:
//!
//! - `{ "key": string, "payload": any }` invokes a message callback
//! - `{ "type": "bind", "key": string, "payload": any, "requestId": string }`
//!   invokes a bind function; the page keeps the promise for `requestId`
//!   until native code runs the matching resolve or reject script
//!
//! Everything here is pure string work so it can be tested without a web
//! engine. Every identifier spliced into a script goes through
//! [`js_string`].
use serde_json::Value;

/// Script expression holding the promises of in-flight bind calls.
const PENDING_CALLS: &str =
    "(window.webview._calls = window.webview._calls || {})";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BridgeMessage {
    Callback {
        key: String,
        payload: String,
    },
    Bind {
        key: String,
        payload: String,
        request_id: String,
    },
}

/// Parses a raw page message. Returns `None` for anything that is not a
/// well-formed callback or bind message.
pub fn parse_message(raw: &str) -> Option<BridgeMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    if object.get("type").and_then(Value::as_str) == Some("bind") {
        let key = object.get("key")?.as_str()?;
        let request_id = object.get("requestId")?.as_str()?;
        return Some(BridgeMessage::Bind {
            key: key.to_string(),
            payload: object.get("payload").map(payload_text).unwrap_or_default(),
            request_id: request_id.to_string(),
        });
    }

    let key = object.get("key")?.as_str()?;
    let payload = object.get("payload")?;
    Some(BridgeMessage::Callback {
        key: key.to_string(),
        payload: payload_text(payload),
    })
}

/// String payloads are handed over as-is; any other JSON value as its
/// serialized text.
fn payload_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Quotes `text` as a script string literal.
pub fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

/// Bind results that already are JSON are spliced in as values, anything
/// else is delivered as a string.
fn js_value(result: &str) -> String {
    match serde_json::from_str::<Value>(result) {
        Ok(_) => result.trim().to_string(),
        Err(_) => js_string(result),
    }
}

pub fn bootstrap_script(ipc_function: &str) -> String {
    format!(
        r#"(function() {{
  window.webview = window.webview || {{}};
  window.webview.postMessage = function(message) {{
    {ipc_function}(JSON.stringify(message));
  }};
  window.webview.onMessage = window.webview.onMessage || function() {{}};
}})();"#
    )
}

pub fn callback_script(key: &str) -> String {
    let key = js_string(key);
    format!(
        r#"window[{key}] = function(payload) {{
  window.webview.postMessage({{ key: {key}, payload: payload }});
}};"#
    )
}

pub fn remove_callback_script(key: &str) -> String {
    format!("delete window[{}];", js_string(key))
}

pub fn bind_script(key: &str) -> String {
    let key = js_string(key);
    format!(
        r#"window[{key}] = function(payload) {{
  return new Promise(function(resolve, reject) {{
    const bytes = new Uint8Array(16);
    window.crypto.getRandomValues(bytes);
    const requestId = Array.from(bytes)
      .map(function(n) {{ return n.toString(16).padStart(2, '0'); }})
      .join('');
    {PENDING_CALLS}[requestId] = {{ key: {key}, resolve: resolve, reject: reject }};
    window.webview.postMessage({{
      type: 'bind',
      key: {key},
      payload: payload,
      requestId: requestId
    }});
  }});
}};"#
    )
}

/// Removes the page function and rejects its in-flight calls.
pub fn unbind_script(key: &str) -> String {
    let key = js_string(key);
    format!(
        r#"delete window[{key}];
(function(calls) {{
  Object.keys(calls).forEach(function(requestId) {{
    if (calls[requestId].key === {key}) {{
      calls[requestId].reject('Function unbound');
      delete calls[requestId];
    }}
  }});
}})({PENDING_CALLS});"#
    )
}

pub fn resolve_script(request_id: &str, result: &str) -> String {
    settle_script(request_id, "resolve", &js_value(result))
}

pub fn reject_script(request_id: &str, message: &str) -> String {
    settle_script(request_id, "reject", &js_string(message))
}

fn settle_script(request_id: &str, method: &str, argument: &str) -> String {
    let request_id = js_string(request_id);
    format!(
        r#"(function(calls) {{
  const call = calls[{request_id}];
  if (call) {{
    delete calls[{request_id}];
    call.{method}({argument});
  }}
}})({PENDING_CALLS});"#
    )
}

pub fn post_message_script(message: &str) -> String {
    format!("window.webview.onMessage({});", js_string(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bind_message_with_string_payload() {
        let raw =
            r#"{"type":"bind","key":"add","payload":"[2,3]","requestId":"r1"}"#;
        assert_eq!(
            parse_message(raw),
            Some(BridgeMessage::Bind {
                key: "add".into(),
                payload: "[2,3]".into(),
                request_id: "r1".into(),
            })
        );
    }

    #[test]
    fn structured_payload_is_passed_as_json_text() {
        let raw = r#"{"key":"save","payload":{"a":[1,2]}}"#;
        assert_eq!(
            parse_message(raw),
            Some(BridgeMessage::Callback {
                key: "save".into(),
                payload: r#"{"a":[1,2]}"#.into(),
            })
        );

        let raw = r#"{"type":"bind","key":"now","requestId":"r2"}"#;
        assert_eq!(
            parse_message(raw),
            Some(BridgeMessage::Bind {
                key: "now".into(),
                payload: String::new(),
                request_id: "r2".into(),
            })
        );
    }

    #[test]
    fn malformed_messages_are_rejected() {
        for raw in [
            "not json",
            "[1, 2]",
            r#"{"payload": 1}"#,
            r#"{"key": 3, "payload": 1}"#,
            r#"{"key": "missing payload"}"#,
            r#"{"type":"bind","key":"add","payload":1}"#,
            r#"{"type":"bind","key":"add","requestId":7}"#,
        ] {
            assert_eq!(parse_message(raw), None, "{}", raw);
        }
    }

    #[test]
    fn resolve_inserts_json_results_as_values() {
        let script = resolve_script("r1", "5");
        assert!(script.contains(r#"calls["r1"]"#));
        assert!(script.contains("call.resolve(5);"));

        let script = resolve_script("r1", "plain text");
        assert!(script.contains(r#"call.resolve("plain text");"#));
    }

    #[test]
    fn reject_quotes_message() {
        let script = reject_script("r9", "it's \"bad\"");
        assert!(script.contains(r#"call.reject("it's \"bad\"");"#));
    }

    #[test]
    fn keys_are_escaped() {
        let script = callback_script("a'b\"c");
        assert!(script.contains(r#"window["a'b\"c"]"#));
        assert_eq!(remove_callback_script("k"), r#"delete window["k"];"#);
    }

    #[test]
    fn unbind_rejects_only_matching_calls() {
        let script = unbind_script("add");
        assert!(script.starts_with(r#"delete window["add"];"#));
        assert!(script.contains(r#"calls[requestId].key === "add""#));
        assert!(script.contains("reject('Function unbound')"));
    }

    #[test]
    fn bootstrap_uses_platform_transport() {
        let script = bootstrap_script("window.ipc.postMessage");
        assert!(script.contains("window.ipc.postMessage(JSON.stringify(message));"));
    }

    #[test]
    fn post_message_escapes_text() {
        assert_eq!(
            post_message_script("hi 'there'\n"),
            r#"window.webview.onMessage("hi 'there'\n");"#
        );
    }
}
