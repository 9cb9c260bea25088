//! Configuration integration tests
//!
//! Load a config file from disk and drive a connection and session with it.

mod common;

use common::{tool, FakeLauncher, ScriptedFactory, ServerBehavior, Step};
use eclair_core::{ConfigFile, ConnectionManager, SessionCoordinator};
use std::sync::Arc;
use tempfile::tempdir;

const CONFIG: &str = r#"
[servers.notes]
command = "notes-server"
args = ["--stdio", "  "]
timeout = 10
retry_attempts = 2

[default_session]
server_name = "notes"
system_prompt = "You test the notes server."
max_context_length = 5000
"#;

#[tokio::test]
async fn test_loaded_config_drives_a_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eclair").join("config.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, CONFIG).unwrap();

    let config = ConfigFile::load(&path).unwrap();
    let server = config.get_server("notes").unwrap();
    assert_eq!(server.name, "notes");
    assert_eq!(server.args, vec!["--stdio"]);

    let launcher = FakeLauncher::new(ServerBehavior::Ready(vec![tool("search")]));
    let manager = Arc::new(ConnectionManager::new(launcher.clone()));
    manager.connect(server).await.unwrap();
    assert_eq!(manager.server_name().as_deref(), Some("notes"));

    let session = config.session_for("notes");
    assert_eq!(session.max_context_length, 5000);

    let factory = ScriptedFactory::new(vec![Step::Text("ok")]);
    let coordinator = SessionCoordinator::new(manager.clone(), factory, session);
    coordinator.start_session().await.unwrap();
    assert_eq!(coordinator.info().server_name, "notes");

    coordinator.end_session();
    manager.disconnect().await;
    assert_eq!(launcher.counters.terminates(), 1);
}

#[test]
fn test_save_then_load_keeps_servers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = ConfigFile::from_toml_str(CONFIG).unwrap();
    config.save(&path).unwrap();

    let reloaded = ConfigFile::load(&path).unwrap();
    assert_eq!(reloaded.server_names(), vec!["notes"]);
    assert_eq!(reloaded.get_server("notes"), config.get_server("notes"));
    assert_eq!(
        reloaded.session_for("notes").system_prompt,
        "You test the notes server."
    );
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[servers.bad]\ncommand = \"   \"\n").unwrap();

    let err = ConfigFile::load(&path).unwrap_err();
    assert!(err.to_string().contains("command cannot be empty"));
    assert!(!err.suggestions().is_empty());
}
