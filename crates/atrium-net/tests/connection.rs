use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use atrium_config::GameServerConfig;
use atrium_net::{BanLookup, ConnectionManager, DispatchContext, DispatchError, PacketHandler};
use atrium_wire::{Frame, PacketBuilder, encode_b64};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(2);

fn raw_frame(payload: &str) -> Vec<u8> {
    let mut out = vec![b'@'];
    out.extend_from_slice(encode_b64(payload.len() as u32, 2).as_bytes());
    out.extend_from_slice(payload.as_bytes());
    out
}

fn no_bans() -> Arc<dyn BanLookup> {
    Arc::new(|_: IpAddr| None::<String>)
}

fn ignore_frames() -> Arc<dyn PacketHandler> {
    Arc::new(|_: &DispatchContext<'_>, _: Frame| -> Result<(), DispatchError> { Ok(()) })
}

async fn start(
    max_connections: u32,
    bans: Arc<dyn BanLookup>,
    handler: Arc<dyn PacketHandler>,
) -> (SocketAddr, Arc<ConnectionManager>, JoinHandle<()>) {
    let config = GameServerConfig {
        bind_address: "127.0.0.1".into(),
        port: 0,
        max_connections,
        ..Default::default()
    };
    let manager = Arc::new(ConnectionManager::new(&config, bans, handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::clone(&manager);
    let task = tokio::spawn(async move {
        server.run_with_listener(listener).await.unwrap();
    });
    (addr, manager, task)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn read_packet(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = tokio::time::timeout(TIMEOUT, stream.read(&mut byte))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 1, "stream closed mid-packet after {out:?}");
        out.push(byte[0]);
        if byte[0] == 0x01 {
            return out;
        }
    }
}

async fn read_to_eof(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    out
}

#[tokio::test]
async fn test_frames_dispatched_in_arrival_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let handler = move |_: &DispatchContext<'_>, frame: Frame| -> Result<(), DispatchError> {
        record.lock().unwrap().push(frame.payload);
        Ok(())
    };
    let (addr, _manager, _task) = start(8, no_bans(), Arc::new(handler)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut bytes = raw_frame("@Aone");
    bytes.extend(raw_frame("@Atwo"));
    bytes.extend(raw_frame("@Athree"));
    for chunk in bytes.chunks(4) {
        client.write_all(chunk).await.unwrap();
        client.flush().await.unwrap();
    }

    wait_until(|| seen.lock().unwrap().len() == 3).await;
    assert_eq!(*seen.lock().unwrap(), ["@Aone", "@Atwo", "@Athree"]);
}

#[tokio::test]
async fn test_handler_error_keeps_connection_open() {
    let handler = |ctx: &DispatchContext<'_>, frame: Frame| -> Result<(), DispatchError> {
        match frame.body() {
            "fail" => Err("handler rejected frame".into()),
            _ => {
                ctx.session
                    .send(PacketBuilder::for_message(1).append_raw("pong").build())?;
                Ok(())
            }
        }
    };
    let (addr, _manager, _task) = start(8, no_bans(), Arc::new(handler)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&raw_frame("@Afail")).await.unwrap();
    client.write_all(&raw_frame("@Aping")).await.unwrap();

    assert_eq!(read_packet(&mut client).await, b"@Apong\x01");
}

#[tokio::test]
async fn test_handler_panic_keeps_connection_open() {
    let handler = |ctx: &DispatchContext<'_>, frame: Frame| -> Result<(), DispatchError> {
        let empty: Vec<u8> = Vec::new();
        if frame.body() == "boom" {
            let _ = empty[frame.body().len()];
        }
        ctx.session
            .send(PacketBuilder::for_message(1).append_raw("pong").build())?;
        Ok(())
    };
    let (addr, manager, _task) = start(8, no_bans(), Arc::new(handler)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&raw_frame("@Aboom")).await.unwrap();
    client.write_all(&raw_frame("@Aping")).await.unwrap();

    assert_eq!(read_packet(&mut client).await, b"@Apong\x01");
    assert_eq!(manager.stats().active, 1);
    assert_eq!(manager.registry().len(), 1);
}

#[tokio::test]
async fn test_noise_before_frame_is_skipped() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let handler = move |_: &DispatchContext<'_>, frame: Frame| -> Result<(), DispatchError> {
        record.lock().unwrap().push(frame.payload);
        Ok(())
    };
    let (addr, _manager, _task) = start(8, no_bans(), Arc::new(handler)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut bytes = b"\x00\x00\x00".to_vec();
    let mut frame = raw_frame("@Aok");
    frame[0] = b'#';
    bytes.extend(frame);
    client.write_all(&bytes).await.unwrap();

    wait_until(|| !seen.lock().unwrap().is_empty()).await;
    assert_eq!(*seen.lock().unwrap(), ["@Aok"]);
}

#[tokio::test]
async fn test_banned_peer_gets_notice_then_close() {
    let bans: Arc<dyn BanLookup> = Arc::new(|ip: IpAddr| ip.is_loopback().then(|| "cheating".to_string()));
    let (addr, manager, _task) = start(8, bans, ignore_frames()).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert_eq!(read_to_eof(&mut client).await, b"@ccheating\x01");

    wait_until(|| manager.stats().active == 0).await;
    assert_eq!(manager.stats().accepted, 1);
    assert!(manager.registry().is_empty());
}

#[tokio::test]
async fn test_empty_ban_reason_is_not_a_ban() {
    let bans: Arc<dyn BanLookup> = Arc::new(|_: IpAddr| Some(String::new()));
    let (addr, manager, _task) = start(8, bans, ignore_frames()).await;

    let _client = TcpStream::connect(addr).await.unwrap();
    wait_until(|| manager.registry().len() == 1).await;
}

#[tokio::test]
async fn test_full_pool_rejects_immediately() {
    let (addr, manager, _task) = start(1, no_bans(), ignore_frames()).await;

    let _first = TcpStream::connect(addr).await.unwrap();
    wait_until(|| manager.stats().active == 1).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    assert!(read_to_eof(&mut second).await.is_empty());

    let stats = manager.stats();
    assert_eq!((stats.accepted, stats.active, stats.capacity), (1, 1, 1));
}

#[tokio::test]
async fn test_kick_closes_and_frees_slot() {
    let (addr, manager, _task) = start(2, no_bans(), ignore_frames()).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_until(|| manager.registry().len() == 1).await;
    let slot = manager.registry().sessions()[0].slot();
    assert_eq!(slot.get(), 1);

    assert!(manager.kick(slot));
    assert!(read_to_eof(&mut client).await.is_empty());
    wait_until(|| manager.stats().active == 0).await;
    assert!(!manager.kick(slot));

    let _again = TcpStream::connect(addr).await.unwrap();
    wait_until(|| manager.registry().len() == 1).await;
    assert_eq!(manager.registry().sessions()[0].slot(), slot, "freed slot is reused");
    assert_eq!(manager.stats().accepted, 2);
}

#[tokio::test]
async fn test_peer_close_tears_down_session() {
    let (addr, manager, _task) = start(2, no_bans(), ignore_frames()).await;

    let client = TcpStream::connect(addr).await.unwrap();
    wait_until(|| manager.stats().active == 1).await;
    drop(client);
    wait_until(|| manager.stats().active == 0).await;
    assert!(manager.registry().is_empty());
}

#[tokio::test]
async fn test_login_indexes_user() {
    let handler = |ctx: &DispatchContext<'_>, frame: Frame| -> Result<(), DispatchError> {
        let user_id: u32 = frame.body().parse()?;
        ctx.login(user_id, 4);
        Ok(())
    };
    let (addr, manager, _task) = start(2, no_bans(), Arc::new(handler)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&raw_frame("@A77")).await.unwrap();

    let registry = manager.registry();
    wait_until(|| registry.by_user(77).is_some()).await;
    let session = registry.by_user(77).unwrap();
    assert_eq!(session.rank(), 4);
    assert_eq!(registry.with_min_rank(4).len(), 1);

    session.send(PacketBuilder::for_message(2).build()).unwrap();
    assert_eq!(read_packet(&mut client).await, b"@B\x01");
}

#[tokio::test]
async fn test_shutdown_drains_and_is_idempotent() {
    let (addr, manager, task) = start(4, no_bans(), ignore_frames()).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_until(|| manager.stats().active == 1).await;

    assert!(manager.shutdown(Duration::from_millis(200)));
    assert!(!manager.shutdown(Duration::from_secs(30)));

    tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert!(read_to_eof(&mut client).await.is_empty());
    assert_eq!(manager.stats().active, 0);
    assert!(TcpStream::connect(addr).await.is_err(), "listener is closed");
}

#[tokio::test]
async fn test_shutdown_forces_stalled_connection_closed() {
    // Enough outbound data to fill both socket buffers while the client
    // is not reading, leaving the writer parked.
    const PACKETS: usize = 16_384;
    const CHUNK: usize = 4096;
    let chunk = "x".repeat(CHUNK);
    let queued = Arc::new(Mutex::new(false));
    let done = Arc::clone(&queued);
    let handler = move |ctx: &DispatchContext<'_>, _: Frame| -> Result<(), DispatchError> {
        for _ in 0..PACKETS {
            ctx.session.send(PacketBuilder::new().append_raw(&chunk).build())?;
        }
        *done.lock().unwrap() = true;
        Ok(())
    };
    let (addr, manager, task) = start(4, no_bans(), Arc::new(handler)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&raw_frame("@Aflood")).await.unwrap();
    wait_until(|| *queued.lock().unwrap()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let grace = Duration::from_millis(150);
    let started = std::time::Instant::now();
    assert!(manager.shutdown(grace));
    tokio::time::timeout(TIMEOUT, task)
        .await
        .expect("listener did not stop after its grace period")
        .unwrap();
    assert!(started.elapsed() >= grace, "stalled connection held the drain open");
    assert_eq!(manager.stats().active, 0);
    assert!(manager.registry().is_empty());

    let received = read_to_eof(&mut client).await;
    assert!(received.len() < PACKETS * (CHUNK + 1), "queued packets were cut off");
}
