use crate::{router, Services};
use bytes::Bytes;
use copost_core::ipc::{CopostRequest, CopostResponse};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Serve `CopostRequest`s on a Unix socket until the shutdown signal fires.
///
/// Each frame is a 4-byte little-endian length prefix followed by a
/// MessagePack payload, in both directions.
pub async fn run_unix_server(
    socket_path: &str,
    services: Arc<Services>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC Server listening on {}", socket_path);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let services = services.clone();
                tokio::spawn(async move {
                    let (read, write) = stream.into_split();
                    let le_codec = || LengthDelimitedCodec::builder().little_endian().new_codec();
                    let mut framed_read = FramedRead::new(read, le_codec());
                    let mut framed_write = FramedWrite::new(write, le_codec());

                    while let Some(frame) = framed_read.next().await {
                        let bytes_mut = match frame {
                            Ok(b) => b,
                            Err(e) => {
                                tracing::error!("Frame error: {}", e);
                                break;
                            }
                        };

                        let response = match rmp_serde::from_slice::<CopostRequest>(&bytes_mut) {
                            Ok(request) => router::handle_request(request, &services).await,
                            Err(e) => CopostResponse::err_kind(
                                "validation",
                                format!("Deserialization error: {}", e),
                            ),
                        };

                        match rmp_serde::to_vec_named(&response) {
                            Ok(resp_bytes) => {
                                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                                    tracing::error!("Failed to send response: {}", e);
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to serialize response: {}", e);
                                break;
                            }
                        }
                    }
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use copost_core::chat::{ChatBackend, ChatError, ChatRequest};
    use copost_core::embeddings::{EmbeddingBackend, EmbeddingError};
    use copost_core::state::{AppState, StateStore};
    use copost_core::store::MemoryVectorStore;
    use copost_core::CopostConfig;
    use tokio::net::UnixStream;

    struct ZeroEmbedder;

    #[async_trait]
    impl EmbeddingBackend for ZeroEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0; 4])
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "zero"
        }
    }

    struct SilentChat;

    #[async_trait]
    impl ChatBackend for SilentChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ChatError> {
            Err(ChatError::EmptyResponse)
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn services() -> Arc<Services> {
        let mut config = CopostConfig::in_memory();
        config.embedding.dimensions = 4;
        Arc::new(
            Services::new(
                config,
                Arc::new(MemoryVectorStore::new(4)),
                Arc::new(ZeroEmbedder),
                Arc::new(SilentChat),
                Arc::new(StateStore::in_memory(AppState::default())),
            )
            .unwrap(),
        )
    }

    async fn roundtrip<W, R>(
        write: &mut FramedWrite<W, LengthDelimitedCodec>,
        read: &mut FramedRead<R, LengthDelimitedCodec>,
        payload: Vec<u8>,
    ) -> CopostResponse
    where
        W: tokio::io::AsyncWrite + Unpin,
        R: tokio::io::AsyncRead + Unpin,
    {
        write.send(Bytes::from(payload)).await.unwrap();
        let frame = read.next().await.unwrap().unwrap();
        rmp_serde::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_bad_frame_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("copost.sock");
        let socket_str = socket.to_string_lossy().to_string();

        let (tx, _rx) = broadcast::channel(1);
        let server = tokio::spawn(run_unix_server_owned(socket_str.clone(), services(), tx.subscribe()));

        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(&socket).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let (read, write) = stream.expect("server did not start").into_split();
        let codec = || LengthDelimitedCodec::builder().little_endian().new_codec();
        let mut framed_read = FramedRead::new(read, codec());
        let mut framed_write = FramedWrite::new(write, codec());

        let ping = rmp_serde::to_vec_named(&CopostRequest::Ping).unwrap();
        let resp = roundtrip(&mut framed_write, &mut framed_read, ping).await;
        assert!(resp.is_ok());
        assert_eq!(resp.data.unwrap()["pong"], true);

        let resp = roundtrip(&mut framed_write, &mut framed_read, vec![0xc1, 0x00]).await;
        assert!(!resp.is_ok());
        assert_eq!(resp.kind.as_deref(), Some("validation"));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    async fn run_unix_server_owned(
        socket_path: String,
        services: Arc<Services>,
        shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        run_unix_server(&socket_path, services, shutdown).await
    }
}
