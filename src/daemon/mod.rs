pub mod protocol;

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};

use crate::service::PreviewService;

pub use protocol::{CommandResult, Request, Response};

enum DaemonCommand {
    Execute(Request, oneshot::Sender<Response>),
}

pub async fn run_daemon(service: Arc<PreviewService>, socket_path: PathBuf) -> crate::error::Result<()> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::Error::Io(e.to_string()))?;
    }

    let _ = std::fs::remove_file(&socket_path);

    let listener = UnixListener::bind(&socket_path)
        .map_err(|e| crate::error::Error::Io(format!("Failed to bind socket: {}", e)))?;
    tracing::info!(socket = %socket_path.display(), "daemon listening");

    let (cmd_tx, cmd_rx) = mpsc::channel::<DaemonCommand>(100);
    tokio::spawn(run_worker(service, cmd_rx));

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    handle_client(reader, writer, cmd_tx).await;
                });
            }
            Err(e) => tracing::error!(error = %e, "accept failed"),
        }
    }
}

/// Executes requests one at a time, off the async threads
async fn run_worker(service: Arc<PreviewService>, mut cmd_rx: mpsc::Receiver<DaemonCommand>) {
    let mut served = 0u64;
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            DaemonCommand::Execute(request, response_tx) => {
                served += 1;
                let response = if request.command == "status" {
                    CommandResult::ok(serde_json::json!({
                        "ready": true,
                        "served": served,
                    }))
                    .into_response(request.id)
                } else {
                    let service = Arc::clone(&service);
                    let id = request.id.clone();
                    match tokio::task::spawn_blocking(move || handle_command(&service, request)).await {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::error!(id = %id, error = %e, "request worker panicked");
                            CommandResult::err(e.to_string()).into_response(id)
                        }
                    }
                };
                let _ = response_tx.send(response);
            }
        }
    }
}

async fn handle_client<R, W>(reader: R, mut writer: W, cmd_tx: mpsc::Sender<DaemonCommand>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await.is_ok() && !line.is_empty() {
        match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let (response_tx, response_rx) = oneshot::channel();

                if cmd_tx.send(DaemonCommand::Execute(request, response_tx)).await.is_ok() {
                    if let Ok(response) = response_rx.await {
                        let json = serde_json::to_string(&response).unwrap_or_default();
                        let _ = writer.write_all(json.as_bytes()).await;
                        let _ = writer.write_all(b"\n").await;
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "ignoring malformed request line"),
        }
        line.clear();
    }
}

/// Base64 file bytes from `args.data`, or `args.code` for schematics
fn upload_bytes(request: &Request) -> Result<Vec<u8>, CommandResult> {
    let keys: &[&str] = if request.command == "schematic" { &["data", "code"] } else { &["data"] };
    let encoded = keys
        .iter()
        .find_map(|key| request.args.get(*key).and_then(|v| v.as_str()))
        .ok_or_else(|| CommandResult::bad_request(format!("missing {}", keys.join(" or "))))?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| CommandResult::bad_request(format!("invalid base64: {}", e)))
}

pub fn handle_command(service: &PreviewService, request: Request) -> Response {
    let result = match request.command.as_str() {
        "map" => match upload_bytes(&request) {
            Ok(data) => match service.preview_map(&data) {
                Ok(preview) => CommandResult::ok(serde_json::to_value(preview).unwrap_or_default()),
                Err(e) => e.into(),
            },
            Err(bad) => bad,
        },
        "schematic" => match upload_bytes(&request) {
            Ok(data) => match service.preview_schematic(&data) {
                Ok(preview) => CommandResult::ok(serde_json::to_value(preview).unwrap_or_default()),
                Err(e) => e.into(),
            },
            Err(bad) => bad,
        },
        other => CommandResult::bad_request(format!("Unknown command: {}", other)),
    };

    if let Some(error) = &result.error {
        if result.status >= 500 {
            tracing::error!(id = %request.id, command = %request.command, error = %error, "request failed");
        } else {
            tracing::debug!(id = %request.id, command = %request.command, error = %error, "request rejected");
        }
    }
    result.into_response(request.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    use crate::codec::map::tests::sample_map;
    use crate::codec::schematic::tests::build_schematic;
    use crate::content::registry::tests::test_registry;
    use crate::renderer::MemorySprites;

    fn service() -> Arc<PreviewService> {
        let mut sprites = MemorySprites::new();
        sprites.insert("metal-floor", RgbaImage::from_pixel(32, 32, Rgba([80, 80, 80, 255])));
        Arc::new(PreviewService::new(Box::new(test_registry()), Box::new(sprites)))
    }

    fn request(command: &str, args: serde_json::Value) -> Request {
        Request { id: "1".into(), command: command.into(), args }
    }

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_map_command() {
        let service = service();
        let response = handle_command(&service, request("map", serde_json::json!({ "data": encode(&sample_map(0)) })));
        assert!(response.success);
        assert_eq!(response.status, 200);
        assert_eq!(response.result.unwrap()["name"], "Frozen Forest");
    }

    #[test]
    fn test_schematic_accepts_code() {
        let service = service();
        let data = build_schematic(1, 1, 1, &[("name", "Empty")], &[], &[]);
        let response = handle_command(&service, request("schematic", serde_json::json!({ "code": encode(&data) })));
        assert_eq!(response.status, 200);
        assert_eq!(response.result.unwrap()["name"], "Empty");
    }

    #[test]
    fn test_bad_uploads_are_400() {
        let service = service();
        let response = handle_command(&service, request("map", serde_json::json!({})));
        assert_eq!(response.status, 400);
        assert!(!response.success);

        let response = handle_command(&service, request("map", serde_json::json!({ "data": "@@@" })));
        assert_eq!(response.status, 400);

        let response = handle_command(&service, request("schematic", serde_json::json!({ "data": encode(b"nope") })));
        assert_eq!(response.status, 400);
        assert!(response.error.unwrap().contains("header"));

        let response = handle_command(&service, request("render", serde_json::Value::Null));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_client_round_trip() {
        tokio_test::block_on(async {
            let (cmd_tx, cmd_rx) = mpsc::channel(4);
            tokio::spawn(run_worker(service(), cmd_rx));

            let (client, server) = tokio::io::duplex(1 << 16);
            let (server_read, server_write) = tokio::io::split(server);
            tokio::spawn(handle_client(server_read, server_write, cmd_tx));

            let (client_read, mut client_write) = tokio::io::split(client);
            let line = serde_json::to_string(&request("status", serde_json::Value::Null)).unwrap();
            client_write.write_all(format!("not json\n{line}\n").as_bytes()).await.unwrap();

            let mut reader = BufReader::new(client_read);
            let mut reply = String::new();
            reader.read_line(&mut reply).await.unwrap();
            let response: Response = serde_json::from_str(&reply).unwrap();
            assert_eq!(response.id, "1");
            assert_eq!(response.status, 200);
            assert_eq!(response.result.unwrap()["served"], 1);
        });
    }
}
