use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use inlook_dashboard::client::{ApiClient, RootAction};
use inlook_dashboard::registry::{RegistryCache, RegistryStatus};

type Routes = Vec<(&'static str, u16, String)>;

/// Minimal HTTP/1.1 responder. Records `METHOD PATH` and the body of every
/// request and answers from `routes` by exact path, 404 otherwise.
struct Backend {
    base: String,
    seen: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl Backend {
    fn start(routes: Routes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind backend");
        let port = listener.local_addr().expect("local addr").port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let (log, body_log) = (Arc::clone(&seen), Arc::clone(&bodies));
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                handle(stream, &routes, &log, &body_log);
            }
        });
        Self {
            base: format!("http://127.0.0.1:{port}"),
            seen,
            bodies,
        }
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(&self.base, Duration::from_secs(5)).expect("client")
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

fn handle(
    stream: TcpStream,
    routes: &Routes,
    seen: &Mutex<Vec<String>>,
    bodies: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => {}
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }
    bodies.lock().unwrap().push(String::from_utf8_lossy(&body).into_owned());

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    seen.lock().unwrap().push(format!("{method} {path}"));

    let (status, body) = routes
        .iter()
        .find(|(p, _, _)| *p == path)
        .map(|(_, s, b)| (*s, b.clone()))
        .unwrap_or((404, "not found".to_string()));
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let mut stream = stream;
    let _ = write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.flush();
}

#[test]
fn fetches_instance_tree() {
    let backend = Backend::start(vec![(
        "/api/v1/fetch-plugin-instance-tree",
        200,
        r#"{
            "instanceID": "root",
            "createFunc": "SerialPluginExecutor",
            "state": "LOADED",
            "schema": {"properties": {"name": {"type": "string"}}},
            "config": {"name": "svc"},
            "children": [
                {"instanceID": "c1", "createFunc": "EmailLoader", "state": "COMPLETE", "children": []}
            ]
        }"#
        .to_string(),
    )]);

    let tree = backend.client().fetch_instance_tree().expect("tree");
    assert_eq!(tree.display_name(), "root");
    assert_eq!(tree.count(), 2);
    assert_eq!(tree.children[0].create_func, "EmailLoader");
    assert_eq!(tree.children[0].state.as_str(), "COMPLETE");
    assert_eq!(
        backend.seen(),
        vec!["GET /api/v1/fetch-plugin-instance-tree".to_string()]
    );
}

#[test]
fn registry_lookup_encodes_create_func() {
    let backend = Backend::start(vec![(
        "/api/v1/fetch-plugin-registry-implements/Email%20Loader",
        200,
        r#"["A","B"]"#.to_string(),
    )]);

    let got = backend
        .client()
        .fetch_registry_implements("Email Loader")
        .expect("implements");
    assert_eq!(got, vec!["A", "B"]);
}

#[test]
fn plugin_names_and_error_status() {
    let backend = Backend::start(vec![
        ("/api/v1/fetch-plugin-name", 200, r#"["EmailLoader","EmailSaver"]"#.to_string()),
        ("/api/v1/fetch-plugin-registry-implements/Broken", 500, "boom".to_string()),
    ]);
    let client = backend.client();

    assert_eq!(
        client.fetch_plugin_names().expect("names"),
        vec!["EmailLoader", "EmailSaver"]
    );

    let err = client.fetch_registry_implements("Broken").unwrap_err();
    assert!(err.to_string().contains("failed with status 500"), "{err}");
}

#[test]
fn malformed_body_is_an_error() {
    let backend = Backend::start(vec![(
        "/api/v1/fetch-plugin-name",
        200,
        "{not json".to_string(),
    )]);
    let err = backend.client().fetch_plugin_names().unwrap_err();
    assert!(err.to_string().contains("unexpected response body"), "{err}");
}

#[test]
fn root_actions_are_posted() {
    let backend = Backend::start(vec![
        ("/api/v1/instantiate-root-recursive", 200, "{}".to_string()),
        ("/api/v1/execute-root-recursive", 200, "{}".to_string()),
        ("/api/v1/reset-all-instances", 200, "{}".to_string()),
    ]);
    let client = backend.client();
    for action in [RootAction::Instantiate, RootAction::Execute, RootAction::Reset] {
        client.run_action(action).expect("action");
    }
    assert_eq!(
        backend.seen(),
        vec![
            "POST /api/v1/instantiate-root-recursive".to_string(),
            "POST /api/v1/execute-root-recursive".to_string(),
            "POST /api/v1/reset-all-instances".to_string(),
        ]
    );
}

#[test]
fn endpoint_keeps_base_path_prefix() {
    let client = ApiClient::new("http://127.0.0.1:9/dash/", Duration::from_secs(1)).unwrap();
    let url = client.endpoint(&["fetch-plugin-name"]).unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:9/dash/api/v1/fetch-plugin-name");

    assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    assert!(ApiClient::new("mailto:x@y", Duration::from_secs(1)).is_err());
}

#[test]
fn registry_cache_over_http_fetches_once_per_type() {
    let backend = Backend::start(vec![
        (
            "/api/v1/fetch-plugin-registry-implements/SerialPluginExecutor",
            200,
            r#"["EmailLoader","EmailLoader","EmailSaver"]"#.to_string(),
        ),
        (
            "/api/v1/fetch-plugin-registry-implements/Broken",
            500,
            "boom".to_string(),
        ),
    ]);
    let mut cache = RegistryCache::new(Arc::new(backend.client()));

    assert!(cache.request("PluginRunnable", "SerialPluginExecutor"));
    assert!(!cache.request("PluginRunnable", "SerialPluginExecutor"));
    assert!(cache.request("Saver", "Broken"));
    assert!(cache.wait_idle(Duration::from_secs(10)));

    assert_eq!(
        cache.status("PluginRunnable"),
        &RegistryStatus::Done(vec!["EmailLoader".into(), "EmailSaver".into()])
    );
    assert_eq!(cache.status("Saver"), &RegistryStatus::Done(vec![]));
    assert!(!cache.request("Saver", "Broken"));
    assert_eq!(cache.fetches_started(), 2);
    assert_eq!(backend.seen().len(), 2);
}

#[test]
fn lists_and_selects_workflows() {
    let backend = Backend::start(vec![
        (
            "/api/v1/fetch-workflows",
            200,
            r#"["default.json","nightly.json"]"#.to_string(),
        ),
        ("/api/v1/set-workflow", 200, String::new()),
    ]);
    let client = backend.client();

    assert_eq!(
        client.fetch_workflows().expect("workflows"),
        vec!["default.json", "nightly.json"]
    );
    client.set_workflow("nightly.json").expect("set workflow");

    assert_eq!(
        backend.seen(),
        vec![
            "GET /api/v1/fetch-workflows".to_string(),
            "POST /api/v1/set-workflow".to_string(),
        ]
    );
    let sent: serde_json::Value =
        serde_json::from_str(&backend.bodies()[1]).expect("json body");
    assert_eq!(sent, serde_json::json!({ "workflow": "nightly.json" }));
}

#[test]
fn empty_workflow_selection_never_reaches_backend() {
    let backend = Backend::start(vec![("/api/v1/set-workflow", 200, String::new())]);
    let client = backend.client();

    for blank in ["", "   "] {
        let err = client.set_workflow(blank).unwrap_err();
        assert!(err.to_string().contains("no workflow selected"), "{err}");
    }
    assert!(backend.seen().is_empty());
}

#[test]
fn set_workflow_rejection_is_an_error() {
    let backend = Backend::start(vec![("/api/v1/set-workflow", 500, "bad file".to_string())]);
    let err = backend.client().set_workflow("missing.json").unwrap_err();
    assert!(err.to_string().contains("failed with status 500"), "{err}");
}

#[test]
fn shutdown_is_posted() {
    let backend = Backend::start(vec![("/api/v1/shutdown", 200, String::new())]);
    backend
        .client()
        .run_action(RootAction::Shutdown)
        .expect("shutdown");
    assert_eq!(backend.seen(), vec!["POST /api/v1/shutdown".to_string()]);
    assert_eq!(backend.bodies(), vec![String::new()]);
}
