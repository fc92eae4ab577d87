//! End-to-end relay over real Unix sockets.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use lirc_relay::{Config, Relay, RelayError, ShutdownSignals};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

fn config(dir: &Path) -> Config {
    Config {
        input_path: dir.join("lircd"),
        output_path: dir.join("lircd1"),
        grace: Duration::from_millis(500),
        ..Config::default()
    }
}

/// Binds a fake lircd and returns (our end, relay's end).
async fn fake_lircd(path: &Path, cfg: &Config) -> (UnixStream, UnixStream) {
    let lircd = UnixListener::bind(path).unwrap();
    let (accepted, connected) = tokio::join!(lircd.accept(), Relay::connect(cfg));
    (accepted.unwrap().0, connected.unwrap())
}

async fn next_line(lines: &mut Lines<BufReader<UnixStream>>) -> Option<String> {
    timeout(Duration::from_secs(2), lines.next_line())
        .await
        .expect("client read timed out")
        .unwrap()
}

#[tokio::test]
async fn relays_coalesced_events_to_every_client() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let (mut lircd, upstream) = fake_lircd(&cfg.input_path, &cfg).await;

    let relay = Relay::bind(cfg.clone()).unwrap();
    let mode = std::fs::metadata(&cfg.output_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o666);

    let registry = relay.registry().clone();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(relay.run(upstream, async move {
        let _ = stop_rx.await;
    }));

    let mut a = BufReader::new(UnixStream::connect(&cfg.output_path).await.unwrap()).lines();
    let mut b = BufReader::new(UnixStream::connect(&cfg.output_path).await.unwrap()).lines();
    timeout(Duration::from_secs(2), async {
        while registry.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // A press split across writes, then a short repeat burst, then a different key.
    lircd.write_all(b"0000f40bf0 00 KEY").await.unwrap();
    lircd.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    lircd.write_all(b"_UP devinput\n").await.unwrap();
    for n in 1..=3u8 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        lircd
            .write_all(format!("0000f40bf0 {n:02x} KEY_UP devinput\n").as_bytes())
            .await
            .unwrap();
    }
    lircd.write_all(b"not an event\n").await.unwrap();
    lircd.write_all(b"0000f40bf1 00 KEY_DOWN devinput\n").await.unwrap();

    for client in [&mut a, &mut b] {
        assert_eq!(next_line(client).await.unwrap(), "0000f40bf0 0 KEY_UP devinput");
        assert_eq!(next_line(client).await.unwrap(), "0000f40bf1 0 KEY_DOWN devinput");
    }

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(next_line(&mut a).await.is_none());
    assert!(next_line(&mut b).await.is_none());
    assert!(registry.is_empty());
    assert!(!cfg.output_path.exists());
}

#[tokio::test]
async fn sustained_hold_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    // Generous quiet period so scheduler jitter cannot split the repeat chain.
    let cfg = Config {
        quiet_period: Duration::from_millis(300),
        ..config(dir.path())
    };
    let (mut lircd, upstream) = fake_lircd(&cfg.input_path, &cfg).await;

    let relay = Relay::bind(cfg.clone()).unwrap();
    let registry = relay.registry().clone();
    let handle = tokio::spawn(relay.run(upstream, std::future::pending::<()>()));

    let mut client = BufReader::new(UnixStream::connect(&cfg.output_path).await.unwrap()).lines();
    while registry.is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for n in 0..40u32 {
        lircd
            .write_all(format!("id {n:x} KEY_OK remote\n").as_bytes())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(next_line(&mut client).await.unwrap(), "id 0 KEY_OK_HOLD remote");

    // Losing lircd is fatal.
    drop(lircd);
    let err = timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RelayError::UpstreamRead { .. }));
    assert!(next_line(&mut client).await.is_none());
}

#[tokio::test]
async fn runs_until_termination_signal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let (_lircd, upstream) = fake_lircd(&cfg.input_path, &cfg).await;

    // Keeps SIGTERM handled for the whole test binary before the relay starts.
    let _installed = ShutdownSignals::register().unwrap();

    let relay = Relay::bind(cfg.clone()).unwrap();
    let handle = tokio::spawn(relay.run_until_signal(upstream));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished(), "relay stopped without a signal");
    assert!(cfg.output_path.exists());

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!cfg.output_path.exists());
}
