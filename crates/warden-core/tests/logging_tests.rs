use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use warden_core::logging::{self, LogFormat};

/// Collects everything the subscriber writes.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_log_format_parsing() {
    assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
    assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
    assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Text);
    assert_eq!(LogFormat::parse(None), LogFormat::Text);
}

#[test]
fn test_json_subscriber_emits_one_object_per_event() {
    let out = Captured::default();
    let subscriber = logging::subscriber(LogFormat::Json, "info", out.clone());

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "warden::audit", action = "login_success", "security log write dropped");
        tracing::debug!("below the default level");
    });

    let text = out.text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1, "Debug events are filtered out at info: {text}");

    let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(event["target"], "warden::audit");
    assert_eq!(event["level"], "ERROR");
    assert_eq!(event["fields"]["action"], "login_success");
    assert_eq!(event["fields"]["message"], "security log write dropped");
}

#[test]
fn test_text_subscriber_writes_target_and_message() {
    let out = Captured::default();
    let subscriber = logging::subscriber(LogFormat::Text, "info", out.clone());

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(target: "warden::cleanup", table = "rate_limits", "cleanup step failed");
    });

    let text = out.text();
    assert!(text.contains("warden::cleanup"), "{text}");
    assert!(text.contains("cleanup step failed"), "{text}");
    assert!(text.contains("rate_limits"), "{text}");
}

#[test]
fn test_global_init_installs_subscriber() {
    // Only this test touches the global dispatcher in this binary.
    logging::init_logging(LogFormat::Json);
    tracing::info!(target: "warden::audit", "subscriber installed");
}
