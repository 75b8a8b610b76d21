use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use freshen::session::{handshake_request, IN_BUF_SIZE};
use freshen::ws::{read_frame_header, unmask, WsFrameOpcode, CLIENT_MASK};
use freshen::{
    Agent, Connection, Connector, Endpoint, PollOutcome, Session, SessionConfig, SessionEvent,
    TransportError,
};
use freshen_json::{find_number, print_int};
use freshen_rpc::builtins::{register_all, DeviceInfo};
use freshen_rpc::memory::{MemoryFs, MemoryKv, MemoryOta};
use freshen_rpc::{KvStore, Ota, RpcContext, ROLLBACK_KEY};
use serde_json::{json, Value};

const UPGRADE_RESPONSE: &[u8] =
    b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";

enum Inbound {
    Data(Vec<u8>),
    Eof,
}

#[derive(Default)]
struct Wire {
    connects: usize,
    refuse: usize,
    closes: usize,
    fail_send: bool,
    inbound: VecDeque<Inbound>,
    sent: Vec<Vec<u8>>,
}

type SharedWire = Rc<RefCell<Wire>>;

struct MockConnector(SharedWire);

struct MockConnection(SharedWire);

impl Connector for MockConnector {
    fn connect(&mut self, _endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError> {
        let mut wire = self.0.borrow_mut();
        if wire.refuse > 0 {
            wire.refuse -= 1;
            return Err(TransportError::Closed);
        }
        wire.connects += 1;
        Ok(Box::new(MockConnection(self.0.clone())))
    }
}

impl Connection for MockConnection {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut wire = self.0.borrow_mut();
        if wire.fail_send {
            return Err(TransportError::Closed);
        }
        wire.sent.push(data.to_vec());
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut wire = self.0.borrow_mut();
        match wire.inbound.pop_front() {
            None => Ok(0),
            Some(Inbound::Eof) => Err(TransportError::Closed),
            Some(Inbound::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    wire.inbound.push_front(Inbound::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn close(&mut self) {
        self.0.borrow_mut().closes += 1;
    }
}

/// Unmasked server frame.
fn server_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 126);
    let mut frame = vec![0x80 | opcode, payload.len() as u8];
    frame.extend_from_slice(payload);
    frame
}

fn text(payload: &str) -> Vec<u8> {
    server_frame(1, payload.as_bytes())
}

/// Decodes one client frame, checking it is masked with the fixed key.
fn client_frame(bytes: &[u8]) -> (WsFrameOpcode, Vec<u8>) {
    let header = read_frame_header(bytes).unwrap().unwrap();
    assert_eq!(header.mask, Some(CLIENT_MASK));
    assert_eq!(header.frame_len(), bytes.len());
    let mut payload = bytes[header.payload_range()].to_vec();
    unmask(header.mask, &mut payload);
    (header.opcode, payload)
}

fn client_json(bytes: &[u8]) -> Value {
    let (opcode, payload) = client_frame(bytes);
    assert_eq!(opcode, WsFrameOpcode::Text);
    serde_json::from_slice(&payload).unwrap()
}

fn math_rpc() -> RpcContext {
    let mut rpc = RpcContext::new();
    rpc.register("Math.Add", |req| {
        let a = find_number(req.params, "$[0]", 0.0);
        let b = find_number(req.params, "$[1]", 0.0);
        print_int(req.out, (a + b) as i64);
        Ok(())
    })
    .unwrap();
    rpc
}

fn session(wire: &SharedWire, cooldown: Duration) -> Session {
    let endpoint = Endpoint::parse("ws://device.test:8080/rpc?v=2").unwrap();
    let mut config = SessionConfig::new(endpoint, "tok");
    config.reconnect_cooldown = cooldown;
    Session::new(config, Box::new(MockConnector(wire.clone())))
}

fn push(wire: &SharedWire, data: Vec<u8>) {
    wire.borrow_mut().inbound.push_back(Inbound::Data(data));
}

fn poll(session: &mut Session, rpc: &mut RpcContext, events: &mut Vec<SessionEvent>) -> PollOutcome {
    session.poll(rpc, &mut |event| events.push(event))
}

fn established(wire: &SharedWire, rpc: &mut RpcContext) -> Session {
    let mut session = session(wire, Duration::from_secs(3));
    let mut events = Vec::new();
    poll(&mut session, rpc, &mut events);
    push(wire, UPGRADE_RESPONSE.to_vec());
    assert_eq!(poll(&mut session, rpc, &mut events), PollOutcome::Idle);
    session
}

#[test]
fn connect_sends_upgrade_request() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Pending);
    assert_eq!(events, [SessionEvent::Connected]);
    let wire = wire.borrow();
    let sent = &wire.sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        String::from_utf8(sent[0].clone()).unwrap(),
        "GET /rpc?v=2 HTTP/1.1\r\n\
         Host: device.test:8080\r\n\
         Authorization: Bearer tok\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: p0EAAPE61hDZrLdgKgy1Og==\r\n\
         Sec-WebSocket-Protocol: dash.freshen.cc\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Origin: http://device.test\r\n\
         \r\n"
    );
    assert_eq!(
        sent[0],
        handshake_request(&session.config().endpoint, "tok").into_bytes()
    );
}

#[test]
fn split_upgrade_response() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();

    poll(&mut session, &mut rpc, &mut events);
    push(&wire, UPGRADE_RESPONSE[..20].to_vec());
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Pending);
    assert!(!session.is_established());
    push(&wire, UPGRADE_RESPONSE[20..].to_vec());
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Idle);
    assert!(session.is_established());
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Idle);
}

#[test]
fn frame_split_across_reads() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);

    let frame = text(r#"{"id":1,"method":"Math.Add","params":[2,3]}"#);
    let mut first = UPGRADE_RESPONSE.to_vec();
    first.extend_from_slice(&frame[..10]);
    push(&wire, first);
    push(&wire, frame[10..].to_vec());

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Idle);
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Exchanged(1));
    let wire = wire.borrow();
    let sent = &wire.sent;
    assert_eq!(sent.len(), 2);
    assert_eq!(client_json(&sent[1]), json!({"id":1,"result":5}));
}

#[test]
fn ping_is_answered_before_request() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    push(&wire, UPGRADE_RESPONSE.to_vec());
    poll(&mut session, &mut rpc, &mut events);

    let mut chunk = server_frame(9, b"hb");
    chunk.extend(text(r#"{"id":7,"method":"Math.Add","params":[40,2]}"#));
    push(&wire, chunk);
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Exchanged(2));

    let wire = wire.borrow();
    let sent = &wire.sent;
    assert_eq!(sent.len(), 3);
    assert_eq!(client_frame(&sent[1]), (WsFrameOpcode::Pong, b"hb".to_vec()));
    assert_eq!(client_json(&sent[2]), json!({"id":7,"result":42}));
}

#[test]
fn masked_frames_and_trailing_bytes() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    push(&wire, UPGRADE_RESPONSE.to_vec());
    poll(&mut session, &mut rpc, &mut events);

    let key = [1, 2, 3, 4];
    let mut payload = br#"{"id":"m","method":"Math.Add","params":[1,1]}"#.to_vec();
    payload.extend_from_slice(b"\n\0\0");
    let mut frame = vec![0x81, 0x80 | payload.len() as u8];
    frame.extend_from_slice(&key);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    push(&wire, frame);

    // Pong and notification produce nothing.
    let mut chunk = server_frame(10, b"late");
    chunk.extend(text(r#"{"method":"Math.Add","params":[1,2]}"#));
    push(&wire, chunk);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Exchanged(1));
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Exchanged(2));
    let wire = wire.borrow();
    let sent = &wire.sent;
    assert_eq!(sent.len(), 2);
    assert_eq!(client_json(&sent[1]), json!({"id":"m","result":2}));
}

#[test]
fn close_frame_reconnects_after_cooldown() {
    let wire = SharedWire::default();
    let cooldown = Duration::from_millis(100);
    let mut session = session(&wire, cooldown);
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    let mut chunk = UPGRADE_RESPONSE.to_vec();
    chunk.extend(server_frame(8, &[0x03, 0xe8]));
    push(&wire, chunk);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Disconnected);
    assert_eq!(events, [SessionEvent::Connected, SessionEvent::Disconnected]);
    assert!(!session.is_connected());
    assert_eq!(wire.borrow().closes, 1);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Backoff);
    thread::sleep(cooldown + Duration::from_millis(20));
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Pending);

    let wire = wire.borrow();
    assert_eq!(wire.connects, 2);
    assert_eq!(wire.sent.len(), 2);
    assert_eq!(wire.sent[0], wire.sent[1]);
}

#[test]
fn failed_connect_backs_off() {
    let wire = SharedWire::default();
    wire.borrow_mut().refuse = 1;
    let cooldown = Duration::from_millis(50);
    let mut session = session(&wire, cooldown);
    let mut rpc = math_rpc();
    let mut events = Vec::new();

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Disconnected);
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Backoff);
    thread::sleep(cooldown + Duration::from_millis(20));
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Pending);
    assert_eq!(wire.borrow().connects, 1);
}

#[test]
fn eof_tears_down() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    wire.borrow_mut().inbound.push_back(Inbound::Eof);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Disconnected);
    assert_eq!(wire.borrow().closes, 1);
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Backoff);
}

#[test]
fn oversized_frame_tears_down() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    let mut chunk = UPGRADE_RESPONSE.to_vec();
    // Text frame announcing 5000 bytes.
    chunk.extend_from_slice(&[0x81, 126, 0x13, 0x88, b'{']);
    push(&wire, chunk);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Disconnected);
    assert!(!session.is_connected());
}

#[test]
fn huge_length_header_tears_down() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    let mut chunk = UPGRADE_RESPONSE.to_vec();
    chunk.extend_from_slice(&[0x81, 127]);
    chunk.extend_from_slice(&(u64::MAX - 9).to_be_bytes());
    push(&wire, chunk);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Disconnected);
    assert!(!session.is_connected());
    assert_eq!(wire.borrow().closes, 1);
}

#[test]
fn endless_upgrade_response_tears_down() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    push(&wire, vec![b'x'; IN_BUF_SIZE + 10]);

    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Disconnected);
    assert_eq!(wire.borrow().closes, 1);
}

#[test]
fn first_exchange_commits_new_image() {
    let wire = SharedWire::default();
    let platform = Rc::new(RefCell::new(MemoryOta::new()));
    let kv = Rc::new(RefCell::new(MemoryKv::new()));
    kv.borrow_mut().set(ROLLBACK_KEY, Some("ota_1")).unwrap();

    let mut ota = Ota::new(Box::new(platform.clone()), Box::new(kv.clone()));
    ota.init().unwrap();
    assert_eq!(platform.borrow().boot, "ota_1");
    let ota = ota.into_shared();

    let mut rpc = RpcContext::new();
    let fs = Rc::new(RefCell::new(MemoryFs::new()));
    register_all(&mut rpc, DeviceInfo::new("2.0.0"), fs, ota.clone()).unwrap();
    let mut agent = Agent::new(rpc, ota.clone(), session(&wire, Duration::from_secs(3)));

    assert_eq!(agent.poll(), PollOutcome::Pending);
    push(&wire, UPGRADE_RESPONSE.to_vec());
    assert_eq!(agent.poll(), PollOutcome::Idle);
    assert!(ota.borrow().can_rollback());

    push(&wire, text(r#"{"id":1,"method":"Sys.GetInfo"}"#));
    assert_eq!(agent.poll(), PollOutcome::Exchanged(1));
    assert!(!ota.borrow().can_rollback());
    assert_eq!(platform.borrow().boot, "ota_0");
    assert_eq!(kv.borrow().get(ROLLBACK_KEY), None);

    let reply = client_json(&wire.borrow().sent[1]);
    assert_eq!(reply["result"]["fw_version"], "2.0.0");
}

#[test]
fn notify_requires_established_session() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    let note = br#"{"method":"Dash.Event","params":{"temp":21}}"#;

    assert_eq!(session.notify(note).unwrap(), 0);
    poll(&mut session, &mut rpc, &mut events);
    assert_eq!(session.notify(note).unwrap(), 0);
    assert_eq!(wire.borrow().sent.len(), 1);

    push(&wire, UPGRADE_RESPONSE.to_vec());
    poll(&mut session, &mut rpc, &mut events);
    assert_eq!(session.notify(note).unwrap(), note.len());

    let wire = wire.borrow();
    assert_eq!(wire.sent.len(), 2);
    assert_eq!(
        client_json(&wire.sent[1]),
        json!({"method":"Dash.Event","params":{"temp":21}})
    );
}

#[test]
fn notify_send_failure_tears_down() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();
    poll(&mut session, &mut rpc, &mut events);
    push(&wire, UPGRADE_RESPONSE.to_vec());
    poll(&mut session, &mut rpc, &mut events);

    wire.borrow_mut().fail_send = true;
    assert!(matches!(session.notify(b"{}"), Err(TransportError::Closed)));
    assert!(!session.is_connected());
    assert_eq!(wire.borrow().closes, 1);
    assert_eq!(poll(&mut session, &mut rpc, &mut events), PollOutcome::Backoff);
}

#[test]
fn close_sends_normal_closure() {
    let wire = SharedWire::default();
    let mut session = session(&wire, Duration::from_secs(3));
    let mut rpc = math_rpc();
    let mut events = Vec::new();

    // Before the upgrade completes, no Close frame goes out.
    poll(&mut session, &mut rpc, &mut events);
    session.close();
    assert_eq!(wire.borrow().sent.len(), 1);
    assert_eq!(wire.borrow().closes, 1);
    assert!(!session.is_connected());

    let mut session = established(&wire, &mut rpc);
    session.close();
    session.close();

    let wire = wire.borrow();
    assert_eq!(wire.closes, 2);
    assert_eq!(wire.sent.len(), 3);
    assert_eq!(
        client_frame(&wire.sent[2]),
        (WsFrameOpcode::Close, vec![0x03, 0xe8])
    );
}

#[test]
fn agent_notifies_and_closes_on_shutdown() {
    let wire = SharedWire::default();
    let platform = Rc::new(RefCell::new(MemoryOta::new()));
    let kv = Rc::new(RefCell::new(MemoryKv::new()));
    let ota = Ota::new(Box::new(platform), Box::new(kv)).into_shared();
    let mut rpc = RpcContext::new();
    let fs = Rc::new(RefCell::new(MemoryFs::new()));
    register_all(&mut rpc, DeviceInfo::new("2.0.0"), fs, ota.clone()).unwrap();
    let mut agent = Agent::new(rpc, ota, session(&wire, Duration::from_secs(3)));

    push(&wire, UPGRADE_RESPONSE.to_vec());
    let mut polls = 0;
    agent.run_while(|| {
        polls += 1;
        polls <= 2
    });
    assert!(!agent.session().is_connected());
    assert_eq!(agent.notify(b"{}").unwrap(), 0);

    let wire = wire.borrow();
    assert_eq!(wire.closes, 1);
    assert_eq!(wire.sent.len(), 2);
    assert_eq!(client_frame(&wire.sent[1]).0, WsFrameOpcode::Close);
}
