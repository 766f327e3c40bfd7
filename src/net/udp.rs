// UDP telemetry listener
// One datagram per sample: "ID=<int>,PHI=<rad>,TS=<s>,V=<volts>,Vbat=<volts>".
// Malformed records are logged and dropped; the receive loop never stops on them.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::constants::MAX_DATAGRAM;
use crate::coordinator::{unix_now, Coordinator};
use crate::sample::parse_record;

/// UDP server feeding telemetry samples into the coordinator
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    shutdown_tx: mpsc::Sender<()>,
}

impl UdpServer {
    /// Bind to address and start listening
    pub async fn start(addr: SocketAddr, coordinator: Arc<Coordinator>) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let server = UdpServer {
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
                                let recv_time = unix_now();
                                Self::process_packet(&buf[..size], peer, recv_time, &coordinator).await;
                            }
                            Err(e) => {
                                error!("UDP receive error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Telemetry listener shutting down");
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

    /// Decode one datagram and hand the sample to the coordinator.
    async fn process_packet(data: &[u8], peer: SocketAddr, recv_time: f64, coordinator: &Coordinator) {
        let msg = String::from_utf8_lossy(data);
        let msg = msg.trim();
        match parse_record(msg) {
            Ok(sample) => {
                debug!("Sample from {} ({}): phase {:.4}", sample.agent_id, peer, sample.phase);
                coordinator.handle_sample(sample, recv_time).await;
            }
            Err(e) => {
                warn!("Parse error: {}, msg={:?}", e, msg);
                coordinator.record_rejected().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_udp_ingest() {
        let coordinator = Arc::new(Coordinator::new());
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = UdpServer::start(addr, coordinator.clone()).await.unwrap();
        let server_addr = server.addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"ID=3,PHI=1.25,TS=1000.0,V=3.3,Vbat=3.9", server_addr)
            .await
            .unwrap();
        client.send_to(b"ID=3,PHI=oops", server_addr).await.unwrap();
        client
            .send_to(b"ID=3,PHI=1.5,TS=1000.1,V=3.3,Vbat=3.9\r\n", server_addr)
            .await
            .unwrap();

        wait_for(|| {
            let c = coordinator.clone();
            async move { c.history_len(3).await == 2 && c.records_rejected().await == 1 }
        })
        .await;

        let latest = coordinator.latest_sample(3).await.unwrap();
        assert_eq!(latest.phase, 1.5);
        assert_eq!(coordinator.agent_ids().await, vec![3]);

        server.shutdown().await;
    }
}
