//! End-to-end tests over real sockets: the storage node with a live expiry
//! service behind it, the expiry service surviving a restart, and the
//! stats collector's two listeners.

use assert_fs::TempDir;
use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tilesmith::config::NodeConfig;
use tilesmith::expiry::{Command, ExpiryServer, encode_request};
use tilesmith::server::{NodeState, build_router};
use tilesmith::stats::StatsServer;

async fn start_expiry(dir: &Path) -> u16 {
	let server = ExpiryServer::bind("127.0.0.1:0", dir, 20).await.unwrap();
	let port = server.local_addr().unwrap().port();
	tokio::spawn(server.run());
	port
}

async fn start_node(root: &Path, expiry_port: u16) -> String {
	let config = NodeConfig::from_string(&format!(
		r"
root: {}
bind: 127.0.0.1:0
versions: [v1]
expiry: {{ host: 127.0.0.1, port: {expiry_port}, max_z: 20 }}
stats: {{ host: 127.0.0.1, port: 9 }}
",
		root.display()
	))
	.unwrap();

	let state = Arc::new(NodeState::from_config(&config).unwrap());
	let router = build_router(state);
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let address = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, router).await.unwrap();
	});
	format!("http://{address}")
}

fn tile_post_form() -> reqwest::multipart::Form {
	let part = reqwest::multipart::Part::bytes(b"not really a png".to_vec())
		.file_name("15/19294/24642.png")
		.mime_str("image/png")
		.unwrap();
	reqwest::multipart::Form::new().part("file", part)
}

const EPOCH_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[tokio::test(flavor = "multi_thread")]
async fn posting_with_epoch_date_reports_the_tile_expired() {
	let dir = TempDir::new().unwrap();
	let expiry_port = start_expiry(&dir.path().join("expiry")).await;
	let base = start_node(&dir.path().join("tiles"), expiry_port).await;
	let client = reqwest::Client::new();
	let url = format!("{base}/v1/map/15/19294/24642.png");

	// store the tile pre-expired
	let response = client
		.post(&url)
		.header("Last-Modified", EPOCH_DATE)
		.multipart(tile_post_form())
		.send()
		.await
		.unwrap();
	assert!(response.status().is_success());

	// even though the file on disk is fresh, the expiry bit wins
	let response = client.get(&url).send().await.unwrap();
	assert_eq!(response.status(), 200);
	assert_eq!(
		response.headers()["last-modified"].to_str().unwrap(),
		EPOCH_DATE
	);
	let body = response.bytes().await.unwrap();
	assert_eq!(body.as_ref(), b"not really a png");

	// re-posting with a real date clears the bit again
	let response = client
		.post(&url)
		.header("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT")
		.multipart(tile_post_form())
		.send()
		.await
		.unwrap();
	assert!(response.status().is_success());

	let response = client.get(&url).send().await.unwrap();
	assert_eq!(
		response.headers()["last-modified"].to_str().unwrap(),
		"Sun, 06 Nov 1994 08:49:37 GMT"
	);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_tiles_and_bad_coordinates() {
	let dir = TempDir::new().unwrap();
	let expiry_port = start_expiry(&dir.path().join("expiry")).await;
	let base = start_node(&dir.path().join("tiles"), expiry_port).await;
	let client = reqwest::Client::new();

	let response = client
		.get(format!("{base}/v1/map/15/19294/24642.png"))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 404);

	// x out of range for the zoom
	let response = client
		.get(format!("{base}/v1/map/0/1/0.png"))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 403);

	let response = client
		.get(format!("{base}/v1/map/15/abc/0.png"))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 403);

	// unknown version reads as an unconfigured cache root
	let response = client
		.get(format!("{base}/v9/map/15/19294/24642.png"))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 502);
}

fn expiry_exchange(socket: &UdpSocket, port: u16, packet: &[u8]) -> Vec<u8> {
	socket.send_to(packet, ("127.0.0.1", port)).unwrap();
	let mut buffer = [0u8; 64];
	let (length, _) = socket.recv_from(&mut buffer).unwrap();
	buffer[..length].to_vec()
}

#[tokio::test(flavor = "multi_thread")]
async fn expiry_bits_survive_a_restart() {
	let dir = TempDir::new().unwrap();
	let expiry_dir = dir.path().join("expiry");

	let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
	socket
		.set_read_timeout(Some(Duration::from_secs(2)))
		.unwrap();

	let first_port = start_expiry(&expiry_dir).await;
	assert_eq!(
		expiry_exchange(&socket, first_port, &encode_request(42, 1, Command::Set, "map")),
		b"OK"
	);
	assert_eq!(
		expiry_exchange(&socket, first_port, &encode_request(42, 0, Command::Get, "map")),
		vec![1]
	);
	assert_eq!(
		expiry_exchange(&socket, first_port, &encode_request(43, 0, Command::Get, "map")),
		vec![0]
	);

	// a fresh instance over the same directory still has the bit
	let second_port = start_expiry(&expiry_dir).await;
	assert_eq!(
		expiry_exchange(&socket, second_port, &encode_request(42, 0, Command::Get, "map")),
		vec![1]
	);
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_flow_from_udp_to_tcp_snapshot() {
	let server = StatsServer::bind("127.0.0.1:0").await.unwrap();
	let port = server.local_addr().unwrap().port();
	tokio::spawn(server.run());

	let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
	for microseconds in [1000u32, 3000] {
		let mut packet = vec![b'g'];
		packet.extend_from_slice(&microseconds.to_be_bytes());
		socket.send_to(&packet, ("127.0.0.1", port)).unwrap();
	}
	tokio::time::sleep(Duration::from_millis(200)).await;

	let snapshot = tokio::task::spawn_blocking(move || {
		use std::io::Read;
		let mut stream = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
		stream
			.set_read_timeout(Some(Duration::from_secs(2)))
			.unwrap();
		let mut body = String::new();
		stream.read_to_string(&mut body).unwrap();
		serde_json::from_str::<serde_json::Value>(body.trim()).unwrap()
	})
	.await
	.unwrap();

	assert_eq!(snapshot["gets"][0]["n"], 2);
	assert_eq!(snapshot["gets"][0]["avg"], 2000.0);
	assert_eq!(snapshot["get"], "pass");
	assert_eq!(snapshot["post"], "fail");
	assert_eq!(snapshot["posts"][0]["n"], 0);
}
