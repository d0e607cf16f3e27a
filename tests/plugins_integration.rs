//! Plugin removal against a scripted plugin tool.
#![cfg(unix)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use startline::config::Product;
use startline::install::{PluginTool, ProgressReporter, RemovePluginsTask};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn begin(&self, total_weight: u32, name: &str, _description: &str, _template: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("begin {total_weight} {name}"));
    }

    fn advance(&self, weight: u32, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("advance {weight} {message}"));
    }
}

/// Install a scripted `kibana-plugin` under `<home>/bin`. Removals are
/// appended to `<home>/removed.log` for inspection.
fn write_plugin_tool(home: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let bin = home.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let script = bin.join("kibana-plugin");
    std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn remove_plugins_end_to_end() {
    let home = TempDir::new().unwrap();
    write_plugin_tool(
        home.path(),
        concat!(
            "case \"$1\" in\n",
            "  list) printf 'x-pack@6.2.4\\nsense@2.0.0\\n' ;;\n",
            "  remove) shift; echo \"$@\" >> \"$(dirname \"$0\")/../removed.log\" ;;\n",
            "esac\n",
        ),
    );

    let product = Product::new("kibana");
    let config_dir = home.path().join("config");
    let reporter = Arc::new(RecordingReporter::default());
    let manager = PluginTool::new(product.clone(), reporter.clone());
    let task = RemovePluginsTask::new(product, home.path().to_path_buf(), config_dir.clone());

    let removed = task.execute(&manager, reporter.as_ref()).await.unwrap();
    assert_eq!(removed, 2);

    let log = std::fs::read_to_string(home.path().join("removed.log")).unwrap();
    let expected_config = config_dir.join("kibana.yml");
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(
        lines,
        vec![
            format!("x-pack --config {}", expected_config.display()),
            format!("sense --config {}", expected_config.display()),
        ]
    );

    let events = reporter.events();
    assert_eq!(events.len(), 7);
    assert_eq!(events[0], "begin 4000 remove-plugins");
    assert_eq!(events[1], "advance 20 removing x-pack");
    assert_eq!(events[2], "advance 1930 plugin x-pack removed");
    assert_eq!(events[3], "advance 50 removed x-pack");
    assert_eq!(events[4], "advance 20 removing sense");
}

#[tokio::test]
async fn no_installed_plugins_touches_nothing() {
    let home = TempDir::new().unwrap();
    write_plugin_tool(home.path(), "exit 0\n");

    let product = Product::new("kibana");
    let reporter = Arc::new(RecordingReporter::default());
    let manager = PluginTool::new(product.clone(), reporter.clone());
    let task = RemovePluginsTask::new(
        product,
        home.path().to_path_buf(),
        home.path().join("config"),
    );

    let removed = task.execute(&manager, reporter.as_ref()).await.unwrap();
    assert_eq!(removed, 0);
    assert!(reporter.events().is_empty());
    assert!(!home.path().join("removed.log").exists());
}

#[tokio::test]
async fn tool_failure_stops_removal() {
    let home = TempDir::new().unwrap();
    write_plugin_tool(
        home.path(),
        concat!(
            "case \"$1\" in\n",
            "  list) printf 'broken@1.0\\nnext@1.0\\n' ;;\n",
            "  remove) echo \"refusing $2\" >&2; exit 64 ;;\n",
            "esac\n",
        ),
    );

    let product = Product::new("kibana");
    let reporter = Arc::new(RecordingReporter::default());
    let manager = PluginTool::new(product.clone(), reporter.clone());
    let task = RemovePluginsTask::new(
        product,
        home.path().to_path_buf(),
        home.path().join("config"),
    );

    let err = task.execute(&manager, reporter.as_ref()).await.unwrap_err();
    assert!(err.to_string().contains("broken"));
    assert!(err.to_string().contains("refusing broken"));

    // The failing plugin was announced but never confirmed
    let events = reporter.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], "advance 20 removing broken");
    assert!(!home.path().join("removed.log").exists());
}
