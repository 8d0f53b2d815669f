/// End-to-end exercises of the daemon against the simulated motion
/// backend: real TCP sessions, real framing, assertions on the sim's call
/// log and state.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arm_cc::backend::BackendConfig;
use cc_server::config::ServerConfig;
use cc_server::context::Shared;
use cc_server::listener::Server;
use serde_json::{json, Value};
use sim::{BackendSim, SimState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

struct Harness {
    addr: SocketAddr,
    sim: Arc<Mutex<SimState>>,
}

async fn start() -> Harness {
    let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend_listener.local_addr().unwrap().port();
    let backend_sim = BackendSim::new();
    let sim_state = Arc::clone(&backend_sim.state);
    tokio::spawn(async move {
        backend_sim.serve(backend_listener).await;
    });

    let config = ServerConfig {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        backend: BackendConfig::new("127.0.0.1".to_string(), backend_port as u32),
        program_interpreter: "sh".to_string(),
    };
    let ctx = Shared::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = Server::new(ctx).serve(listener).await;
    });

    Harness {
        addr,
        sim: sim_state,
    }
}

struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
        }
    }

    async fn send_raw(&mut self, raw: &[u8]) {
        self.stream.write_all(raw).await.unwrap();
    }

    async fn read_reply(&mut self) -> Value {
        let mut msg = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed the connection mid-reply");
            msg.extend_from_slice(&buf[..n]);
            if let Ok(value) = serde_json::from_slice::<Value>(&msg) {
                return value;
            }
        }
    }

    async fn request(&mut self, cd: u16, dt: u8, da: Value) -> Value {
        let envelope = json!({"CD": cd, "PR": "test", "DT": dt, "DA": da.to_string()});
        self.send_raw(envelope.to_string().as_bytes()).await;
        self.read_reply().await
    }

    /// `DT = 3`: ask for exclusive operation permission.
    async fn acquire_operation(&mut self) {
        let reply = self.request(0xFFF, 3, json!({})).await;
        assert_eq!(reply["RE"], 0, "operation permission not granted");
    }

    /// `DT = 2`: liveness check, also forces the session to be fully set
    /// up before the test goes on.
    async fn connect_check(&mut self) -> Value {
        self.request(0xFFF, 2, json!({})).await
    }

    fn payload(reply: &Value) -> Value {
        serde_json::from_str(reply["DA"].as_str().expect("DA must be a string")).unwrap()
    }
}

#[tokio::test]
async fn speed_set_becomes_the_move_default() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;
    client.acquire_operation().await;

    // the exchange from the protocol documentation, verbatim
    let reply = client.request(0x103, 0, json!({"SP": 50})).await;
    assert_eq!(reply["CD"], 0x103);
    assert_eq!(reply["RE"], 0);
    assert_eq!(reply["DA"], "{}");

    let reply = client
        .request(
            0x102,
            0,
            json!({"X":0,"Y":0,"Z":0,"Rx":0,"Ry":0,"Rz":0,"P":-1}),
        )
        .await;
    assert_eq!(reply["RE"], 0);
    assert_eq!(h.sim.lock().await.last_speed, Some(50.0));
}

#[tokio::test]
async fn out_of_range_ptp_speed_is_rejected_and_not_stored() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;
    client.acquire_operation().await;

    for speed in [0, 101] {
        let reply = client.request(0x103, 0, json!({"SP": speed})).await;
        assert_eq!(reply["RE"], 1, "speed {} must be a data error", speed);
    }
    let boundary = client.request(0x103, 0, json!({"SP": 100})).await;
    assert_eq!(boundary["RE"], 0);

    let reply = client
        .request(0x101, 0, json!({"J1":0,"J2":0,"J3":0,"J4":0,"J5":0,"J6":0}))
        .await;
    assert_eq!(reply["RE"], 0);
    // the rejected values never became the default
    assert_eq!(h.sim.lock().await.last_speed, Some(100.0));
}

#[tokio::test]
async fn fourth_session_is_denied_every_request() {
    let h = start().await;
    let mut first = Client::connect(h.addr).await;
    let mut second = Client::connect(h.addr).await;
    let mut third = Client::connect(h.addr).await;
    assert_eq!(first.connect_check().await["RE"], 0);
    assert_eq!(second.connect_check().await["RE"], 0);
    assert_eq!(third.connect_check().await["RE"], 0);

    let mut fourth = Client::connect(h.addr).await;
    let reply = fourth.connect_check().await;
    assert_eq!(reply["CD"], 0xFFF);
    assert_eq!(reply["RE"], 6);
    let reply = fourth.request(0x201, 0, json!({"SA": 0})).await;
    assert_eq!(reply["RE"], 6);

    // a freed slot is reusable once its session task has finished
    drop(first);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut fifth = Client::connect(h.addr).await;
    assert_eq!(fifth.connect_check().await["RE"], 0);
}

#[tokio::test]
async fn digital_write_read_round_trip_preserves_untouched_lines() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;

    let reply = client.request(0x200, 0, json!({"AD": 5, "SL": "1111"})).await;
    assert_eq!(reply["RE"], 0);
    let reply = client.request(0x200, 0, json!({"AD": 5, "SL": "10*1"})).await;
    assert_eq!(reply["RE"], 0);

    let reply = client.request(0x201, 0, json!({"SA": 5, "EA": 8})).await;
    assert_eq!(reply["RE"], 0);
    // line 8 down to line 5; the `*` at line 6 kept its earlier 1
    assert_eq!(Client::payload(&reply)["SL"], "1011");

    let reply = client.request(0x201, 0, json!({"SA": 6})).await;
    assert_eq!(Client::payload(&reply)["SL"], "1");
}

#[tokio::test]
async fn failed_tool_offset_restores_the_active_tool() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;
    client.acquire_operation().await;

    let offset = json!({"X":1,"Y":2,"Z":3,"Rx":0,"Ry":0,"Rz":0});
    let reply = client.request(0x107, 0, offset.clone()).await;
    assert_eq!(reply["RE"], 0);
    assert_eq!(h.sim.lock().await.tool, 1);

    h.sim
        .lock()
        .await
        .fail
        .insert("SetToolOffset".to_string(), (2, 9));
    let reply = client.request(0x107, 0, offset).await;
    assert_eq!(reply["RE"], 5);
    // the previously active offset is re-applied after the failure
    let state = h.sim.lock().await;
    assert_eq!(state.tool, 1);
    let tail: Vec<&str> = state
        .calls
        .iter()
        .rev()
        .take(3)
        .map(String::as_str)
        .collect();
    assert_eq!(tail, ["ChangeTool", "SetToolOffset", "ChangeTool"]);
}

#[tokio::test]
async fn backend_opens_once_for_concurrent_sessions() {
    let h = start().await;
    let mut first = Client::connect(h.addr).await;
    let mut second = Client::connect(h.addr).await;
    let mut third = Client::connect(h.addr).await;
    assert_eq!(first.connect_check().await["RE"], 0);
    assert_eq!(second.connect_check().await["RE"], 0);
    assert_eq!(third.connect_check().await["RE"], 0);

    {
        let state = h.sim.lock().await;
        assert_eq!(state.connections, 1, "one shared backend connection");
        assert_eq!(state.permission_acquires, 1);
    }

    drop(first);
    drop(second);
    drop(third);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // all sessions gone: the next one reopens the connection
    let mut again = Client::connect(h.addr).await;
    assert_eq!(again.connect_check().await["RE"], 0);
    let state = h.sim.lock().await;
    assert_eq!(state.connections, 2);
    assert_eq!(state.permission_acquires, 2);
}

#[tokio::test]
async fn mode_switches_wait_for_motion_and_are_cached() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;
    client.acquire_operation().await;

    let joints = json!({"J1":0,"J2":0,"J3":0,"J4":0,"J5":0,"J6":0});
    assert_eq!(client.request(0x106, 0, joints.clone()).await["RE"], 0);
    assert_eq!(client.request(0x106, 0, joints.clone()).await["RE"], 0);

    {
        let state = h.sim.lock().await;
        let look_aheads: Vec<usize> = state
            .calls
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() == "SetLookAhead")
            .map(|(i, _)| i)
            .collect();
        // the second look-ahead move hit the cache, no second batch
        assert_eq!(look_aheads.len(), 1);
        // reconfiguration only happens after in-flight motion drained
        assert_eq!(state.calls[look_aheads[0] - 1], "WaitMotion");
    }

    let pose = json!({"X":0,"Y":0,"Z":0,"Rx":0,"Ry":0,"Rz":0,"P":-1});
    assert_eq!(client.request(0x102, 0, pose).await["RE"], 0);
    let state = h.sim.lock().await;
    let look_aheads: Vec<usize> = state
        .calls
        .iter()
        .enumerate()
        .filter(|(_, name)| name.as_str() == "SetLookAhead")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(look_aheads.len(), 2, "switching back reconfigures");
    assert_eq!(state.calls[look_aheads[1] - 1], "WaitMotion");
}

#[tokio::test]
async fn motion_requires_operation_permission_but_queries_do_not() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;

    let reply = client
        .request(
            0x102,
            0,
            json!({"X":0,"Y":0,"Z":0,"Rx":0,"Ry":0,"Rz":0,"P":-1}),
        )
        .await;
    assert_eq!(reply["RE"], 3);

    let reply = client.request(0x10C, 0, json!({})).await;
    assert_eq!(reply["RE"], 0);
    assert_eq!(Client::payload(&reply)["P"], 7);

    let reply = client.request(0x110, 0, json!({"TYPE": 4})).await;
    assert_eq!(reply["RE"], 0);
    assert_eq!(Client::payload(&reply)["RE"], 4);
}

#[tokio::test]
async fn malformed_and_unknown_requests_get_error_replies() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;

    client.send_raw(b"}{ not json").await;
    let reply = client.read_reply().await;
    assert_eq!(reply["CD"], 0xFFF);
    assert_eq!(reply["RE"], 1);

    let reply = client.request(0x999, 0, json!({})).await;
    assert_eq!(reply["RE"], 2);

    // bad data type
    let reply = client.request(0x100, 9, json!({})).await;
    assert_eq!(reply["RE"], 1);

    // the session survives all of it
    assert_eq!(client.connect_check().await["RE"], 0);
}

#[tokio::test]
async fn posture_is_shared_across_sessions() {
    let h = start().await;
    let mut writer = Client::connect(h.addr).await;
    let mut reader = Client::connect(h.addr).await;
    writer.acquire_operation().await;

    assert_eq!(writer.request(0x10B, 0, json!({"P": 3})).await["RE"], 0);
    let reply = reader.request(0x10C, 0, json!({})).await;
    assert_eq!(Client::payload(&reply)["P"], 3);

    assert_eq!(writer.request(0x10B, 0, json!({"P": 8})).await["RE"], 1);
    let reply = reader.request(0x10C, 0, json!({})).await;
    assert_eq!(Client::payload(&reply)["P"], 3, "rejected posture not stored");
}

#[tokio::test]
async fn conversion_and_mark_round_trips() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;

    let reply = client
        .request(
            0x105,
            0,
            json!({"X":1,"Y":2,"Z":3,"Rx":4,"Ry":5,"Rz":6,"P":-1}),
        )
        .await;
    assert_eq!(reply["RE"], 0);
    let payload = Client::payload(&reply);
    assert_eq!(payload["J1"], 1.0);
    assert_eq!(payload["J6"], 6.0);

    let reply = client.request(0x10D, 0, json!({})).await;
    assert_eq!(reply["RE"], 0);
    let payload = Client::payload(&reply);
    for key in ["X", "Y", "Z", "Rx", "Ry", "Rz", "P"] {
        assert!(payload.get(key).is_some(), "missing {} in mark reply", key);
    }

    let reply = client.request(0x10E, 0, json!({})).await;
    assert_eq!(reply["RE"], 0);
    assert!(Client::payload(&reply).get("J1").is_some());

    let reply = client.request(0x10F, 0, json!({})).await;
    assert_eq!(reply["RE"], 0);
    assert!(Client::payload(&reply).get("ID").is_some());
}

#[tokio::test]
async fn adc_configuration_and_readback() {
    let h = start().await;
    // seed measurement bits the way the hardware would publish them
    h.sim.lock().await.columns.insert(2, 0x0234_0AB0);

    let mut client = Client::connect(h.addr).await;
    let reply = client.request(0x203, 0, json!({})).await;
    assert_eq!(reply["RE"], 0);
    assert_eq!(Client::payload(&reply)["ADC"], json!([0x0AB0, 0x0234]));

    assert_eq!(client.request(0x202, 0, json!({"CH":0,"MO":2})).await["RE"], 0);
    {
        let state = h.sim.lock().await;
        let word = state.columns[&2];
        assert_eq!((word >> 12) & 0x3, 2, "channel 0 mode field");
        // the measurement bits survived the masked write
        assert_eq!(word & 0x0FFF, 0xAB0);
        assert_eq!((word >> 16) & 0x0FFF, 0x234);
    }

    assert_eq!(client.request(0x202, 0, json!({"CH":2,"MO":0})).await["RE"], 1);
    assert_eq!(client.request(0x202, 0, json!({"CH":0,"MO":3})).await["RE"], 1);
}

#[tokio::test]
async fn program_run_reports_diagnostics_and_deletes_upload() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;
    client.acquire_operation().await;

    let dir = std::env::temp_dir().join(format!("cc_prog_{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let ok_path = dir.join("ok.sh");
    tokio::fs::write(&ok_path, "exit 0\n").await.unwrap();

    let reply = client
        .request(0x000, 1, json!({"PATH": ok_path.to_str().unwrap(), "DEL": 0}))
        .await;
    assert_eq!(reply["CD"], 0);
    assert_eq!(reply["RE"], 0);

    let bad_path = dir.join("bad.sh");
    tokio::fs::write(&bad_path, "echo boom 1>&2\n").await.unwrap();
    let reply = client
        .request(0x000, 1, json!({"PATH": bad_path.to_str().unwrap(), "DEL": 1}))
        .await;
    assert_eq!(reply["RE"], 7);
    // DEL=1 removed the upload directory
    assert!(tokio::fs::metadata(&dir).await.is_err());

    // permission survived the release/reacquire dance
    let reply = client.request(0x103, 0, json!({"SP": 10})).await;
    assert_eq!(reply["RE"], 0);
}

#[tokio::test]
async fn program_without_permission_is_refused_but_still_deleted() {
    let h = start().await;
    let mut client = Client::connect(h.addr).await;

    let dir = std::env::temp_dir().join(format!("cc_prog_denied_{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("prog.sh");
    tokio::fs::write(&path, "exit 0\n").await.unwrap();

    let reply = client
        .request(0x000, 1, json!({"PATH": path.to_str().unwrap(), "DEL": 1}))
        .await;
    assert_eq!(reply["RE"], 3);
    assert!(tokio::fs::metadata(&dir).await.is_err());
}

#[tokio::test]
async fn denied_permission_request_reports_operation_get_error() {
    let h = start().await;
    h.sim.lock().await.deny_permission = true;

    let mut client = Client::connect(h.addr).await;
    let reply = client.request(0xFFF, 3, json!({})).await;
    assert_eq!(reply["RE"], 4);
}
