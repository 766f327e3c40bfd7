// UDP parameter responder
// Answers "REQUEST_PARAM,agent=<id>" from a static table. Independent of the
// telemetry pipeline.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::constants::MAX_DATAGRAM;
use crate::params::ParamTable;

pub struct ParamServer {
    socket: Arc<UdpSocket>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ParamServer {
    /// Bind to address and start answering requests
    pub async fn start(addr: SocketAddr, table: Arc<ParamTable>) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let server = ParamServer {
            socket: socket.clone(),
            shutdown_tx,
        };

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];
            loop {
                tokio::select! {
                    res = socket.recv_from(&mut buf) => {
                        match res {
                            Ok((size, peer)) => {
                                let request = String::from_utf8_lossy(&buf[..size]);
                                let Some(reply) = table.respond(&request) else {
                                    debug!("Ignoring non-parameter datagram from {}", peer);
                                    continue;
                                };
                                if reply.starts_with("ERROR") {
                                    warn!("Parameter request from {}: {}", peer, reply);
                                } else {
                                    debug!("Parameters to {}: {}", peer, reply);
                                }
                                if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
                                    error!("Failed to send parameters to {}: {}", peer, e);
                                }
                            }
                            Err(e) => {
                                error!("UDP receive error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Parameter server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    pub fn addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn request(client: &UdpSocket, server: SocketAddr, msg: &str) -> String {
        client.send_to(msg.as_bytes(), server).await.unwrap();
        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_param_round_trip() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = ParamServer::start(addr, Arc::new(ParamTable::default())).await.unwrap();
        let server_addr = server.addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = request(&client, server_addr, "REQUEST_PARAM,agent=1").await;
        assert!(reply.starts_with("PARAM,omega="));
        assert!(reply.ends_with(",kappa=1.0,alpha=0.5"));

        let reply = request(&client, server_addr, "REQUEST_PARAM,agent=99").await;
        assert_eq!(reply, "ERROR, unknown agent id 99");

        let reply = request(&client, server_addr, "REQUEST_PARAM,agent=").await;
        assert!(reply.starts_with("ERROR, invalid request"));

        server.shutdown().await;
    }
}
