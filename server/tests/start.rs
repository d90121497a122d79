//! Start und Shutdown des vollstaendigen Servers

use std::time::Duration;

use palaver_server::{config::ServerConfig, Server};
use tokio::sync::watch;

fn test_config(dir: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.tcp_port = 0;
    config.observability.aktiviert = false;
    config.auth.benutzer_datei = dir.join("users.txt").to_string_lossy().into_owned();
    config.auth.hash_speicher_kib = 8;
    config.auth.hash_iterationen = 1;
    config.logging.audit_datei = Some(dir.join("server.log").to_string_lossy().into_owned());
    config
}

#[tokio::test]
async fn start_und_shutdown_schreiben_audit() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(Server::neu(config).laufen(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Benutzerdatei wird angelegt
    assert!(dir.path().join("users.txt").exists());

    let audit = std::fs::read_to_string(dir.path().join("server.log")).unwrap();
    let zeilen: Vec<&str> = audit.lines().collect();
    assert!(zeilen[0].contains("[INFO] Server started on 127.0.0.1:"));
    assert!(zeilen.last().unwrap().ends_with("[INFO] Server shutting down."));
}

#[tokio::test]
async fn belegter_port_ist_fehler() {
    let dir = tempfile::tempdir().unwrap();
    let belegt = std::net::TcpListener::bind("127.0.0.1:0").unwrap();

    let mut config = test_config(dir.path());
    config.netzwerk.tcp_port = belegt.local_addr().unwrap().port();

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let ergebnis = Server::neu(config).laufen(shutdown_rx).await;
    assert!(ergebnis.is_err());
}
