//! End-to-End-Tests ueber echte TCP-Verbindungen auf 127.0.0.1

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use palaver_auth::{HashParameter, InMemoryCredentialStore};
use palaver_chat::{ChatEinstellungen, MessageRouter};
use palaver_core::AuditLog;
use palaver_observability::{ChatMetriken, TracingAuditLog};
use palaver_signaling::{ChatServer, SignalingConfig, SignalingState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const WARTEZEIT: Duration = Duration::from_secs(5);

type TestState = Arc<SignalingState<InMemoryCredentialStore>>;

struct TestServer {
    addr: SocketAddr,
    state: TestState,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

async fn server_starten(config: SignalingConfig) -> TestServer {
    let audit: Arc<dyn AuditLog> = Arc::new(TracingAuditLog);
    let store = Arc::new(InMemoryCredentialStore::neu(HashParameter {
        speicher_kib: 8,
        iterationen: 1,
    }));
    let router = MessageRouter::neu(store, Arc::clone(&audit), ChatEinstellungen::default());
    let state = SignalingState::neu(config, router, audit, ChatMetriken::neu().unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = ChatServer::neu(Arc::clone(&state));
    let task = tokio::spawn(async move {
        server
            .starten_mit_listener(listener, shutdown_rx)
            .await
            .unwrap();
    });

    TestServer {
        addr,
        state,
        shutdown_tx,
        task,
    }
}

async fn standard_server() -> TestServer {
    server_starten(SignalingConfig::default()).await
}

struct TestClient {
    lesen: Lines<BufReader<OwnedReadHalf>>,
    schreiben: OwnedWriteHalf,
}

impl TestClient {
    async fn verbinden(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (lesen, schreiben) = stream.into_split();
        Self {
            lesen: BufReader::new(lesen).lines(),
            schreiben,
        }
    }

    /// Naechste Zeile oder `None` bei geschlossener Verbindung
    async fn zeile(&mut self) -> Option<String> {
        tokio::time::timeout(WARTEZEIT, self.lesen.next_line())
            .await
            .expect("Zeitueberschreitung beim Lesen")
            .unwrap_or(None)
    }

    /// Liest bis eine Zeile `teil` enthaelt
    async fn erwarte(&mut self, teil: &str) -> String {
        loop {
            match self.zeile().await {
                Some(z) if z.contains(teil) => return z,
                Some(_) => continue,
                None => panic!("Verbindung geschlossen, erwartet: {teil}"),
            }
        }
    }

    async fn senden(&mut self, zeile: &str) {
        self.schreiben
            .write_all(format!("{zeile}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn ist_geschlossen(&mut self) -> bool {
        loop {
            match self.zeile().await {
                Some(_) => continue,
                None => return true,
            }
        }
    }
}

async fn anmelden(addr: SocketAddr, wahl: &str, name: &str, passwort: &str) -> TestClient {
    let mut client = TestClient::verbinden(addr).await;
    assert_eq!(
        client.zeile().await.as_deref(),
        Some("Type '/register' to sign up or '/login' to sign in.")
    );
    client.senden(wahl).await;
    assert_eq!(client.zeile().await.as_deref(), Some("Enter username:"));
    client.senden(name).await;
    assert_eq!(client.zeile().await.as_deref(), Some("Enter password:"));
    client.senden(passwort).await;
    client
}

async fn registriert(addr: SocketAddr, name: &str) -> TestClient {
    let mut client = anmelden(addr, "/register", name, "geheim").await;
    client.erwarte("Registration successful!").await;
    client
}

#[tokio::test]
async fn registrieren_quit_und_wieder_anmelden() {
    let server = standard_server().await;

    let mut alice = anmelden(server.addr, "/register", "alice", "geheim").await;
    assert_eq!(
        alice.zeile().await.as_deref(),
        Some("Registration successful! Welcome alice.")
    );
    alice.senden("/quit").await;
    assert_eq!(alice.zeile().await.as_deref(), Some("Goodbye!"));
    assert!(alice.ist_geschlossen().await);

    let mut alice = anmelden(server.addr, "/LOGIN", "alice", "geheim").await;
    assert_eq!(
        alice.zeile().await.as_deref(),
        Some("Login successful! Welcome back alice.")
    );
}

#[tokio::test]
async fn falsches_passwort_trennt() {
    let server = standard_server().await;
    let mut alice = registriert(server.addr, "alice").await;
    alice.senden("/quit").await;
    assert!(alice.ist_geschlossen().await);

    let mut eindringling = anmelden(server.addr, "/login", "alice", "falsch").await;
    assert_eq!(
        eindringling.zeile().await.as_deref(),
        Some("Invalid username or password. Disconnecting.")
    );
    assert!(eindringling.ist_geschlossen().await);
    assert_eq!(server.state.metriken.auth_failures_total.get(), 1);
}

#[tokio::test]
async fn join_und_abschied_zaehlen_als_zustellungen() {
    let server = standard_server().await;
    let mut alice = registriert(server.addr, "alice").await;
    let mut bob = registriert(server.addr, "bob").await;
    alice.erwarte("'bob' joined the chat!").await;
    // Willkommen an beide, Join-Hinweis an alice
    assert_eq!(server.state.metriken.deliveries_total.get(), 3);

    bob.senden("/quit").await;
    assert!(bob.ist_geschlossen().await);
    alice.erwarte("'bob' left the chat.").await;

    // "Goodbye!" an bob, Abschied an alice
    let metriken = &server.state.metriken;
    tokio::time::timeout(WARTEZEIT, async {
        while metriken.deliveries_total.get() < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Abschied nicht gezaehlt");
    assert_eq!(metriken.deliveries_total.get(), 5);
    assert_eq!(metriken.deliveries_dropped_total.get(), 0);
}

#[tokio::test]
async fn ungueltige_wahl_trennt() {
    let server = standard_server().await;
    let mut client = TestClient::verbinden(server.addr).await;
    client.erwarte("/register").await;
    client.senden("/hallo").await;
    assert_eq!(
        client.zeile().await.as_deref(),
        Some("Invalid choice. Disconnecting.")
    );
    assert!(client.ist_geschlossen().await);
}

#[tokio::test]
async fn zweites_geraet_wird_abgelehnt() {
    let server = standard_server().await;
    let mut alice = registriert(server.addr, "alice").await;

    let mut zweites = anmelden(server.addr, "/login", "alice", "geheim").await;
    assert_eq!(
        zweites.zeile().await.as_deref(),
        Some("User already logged in from another device.")
    );
    assert!(zweites.ist_geschlossen().await);

    // Erste Sitzung laeuft weiter
    alice.senden("/list").await;
    assert_eq!(alice.erwarte("Online Users:").await, "Online Users: alice");
}

#[tokio::test]
async fn raum_gespraech_ueber_tcp() {
    let server = standard_server().await;
    let mut alice = registriert(server.addr, "alice").await;
    let mut bob = registriert(server.addr, "bob").await;
    alice.erwarte("'bob' joined the chat!").await;

    alice.senden("/create_room lobby").await;
    alice.erwarte("Room 'lobby' created.").await;
    alice.senden("/join lobby").await;
    alice.erwarte("Joined room 'lobby'.").await;
    bob.senden("/join lobby").await;
    bob.erwarte("Joined room 'lobby'.").await;
    alice.erwarte("[lobby] 'bob' joined the room.").await;

    alice.senden("hallo zusammen").await;
    assert_eq!(bob.erwarte("[lobby]").await, "[lobby] alice: hallo zusammen");

    bob.senden("/private alice psst").await;
    assert_eq!(bob.erwarte("(Private").await, "(Private to alice): psst");
    assert_eq!(alice.erwarte("(Private").await, "(Private - bob): psst");
}

#[tokio::test]
async fn abbruch_raeumt_sitzung_und_raeume_auf() {
    let server = standard_server().await;
    let mut alice = registriert(server.addr, "alice").await;
    let bob = registriert(server.addr, "bob").await;
    alice.erwarte("'bob' joined the chat!").await;

    let mut bob = bob;
    bob.senden("/create_room kammer").await;
    bob.erwarte("created").await;
    bob.senden("/join kammer").await;
    bob.erwarte("Joined room 'kammer'.").await;

    // Verbindung hart schliessen
    drop(bob);
    alice.erwarte("'bob' left the chat.").await;

    let router = &server.state.router;
    assert!(!router.raum_existiert("kammer"));
    assert_eq!(router.online_anzahl(), 1);
}

#[tokio::test]
async fn zu_lange_zeile_beendet_sitzung() {
    let server = server_starten(SignalingConfig {
        zeilenlimit_bytes: 64,
        ..SignalingConfig::default()
    })
    .await;
    let mut alice = registriert(server.addr, "alice").await;
    let mut bob = registriert(server.addr, "bob").await;
    alice.erwarte("'bob' joined the chat!").await;

    bob.senden(&"x".repeat(200)).await;
    assert!(bob.ist_geschlossen().await);
    alice.erwarte("'bob' left the chat.").await;
    assert!(!server
        .state
        .router
        .ist_online(&palaver_core::Username::parse("bob").unwrap()));
}

#[tokio::test]
async fn verbindungslimit_lehnt_ab() {
    let server = server_starten(SignalingConfig {
        max_clients: 1,
        ..SignalingConfig::default()
    })
    .await;

    let mut erster = TestClient::verbinden(server.addr).await;
    erster.erwarte("/register").await;

    let mut zweiter = TestClient::verbinden(server.addr).await;
    assert!(zweiter.ist_geschlossen().await);
    assert_eq!(server.state.aktive_verbindungen(), 1);
}

#[tokio::test]
async fn shutdown_beendet_listener() {
    let server = standard_server().await;
    let mut alice = registriert(server.addr, "alice").await;

    server.shutdown_tx.send(true).unwrap();
    tokio::time::timeout(WARTEZEIT, server.task)
        .await
        .unwrap()
        .unwrap();
    assert!(alice.ist_geschlossen().await);
}
