//! UDP listener: one receive task producing datagrams into a channel,
//! N worker tasks consuming and processing them. Workers run
//! concurrently across datagrams; a single request is always handled
//! sequentially end to end.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::agent::incoming::{process_datagram, AgentContext};

/// Largest UDP payload this core accepts: the UDP maximum.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

struct Received {
    data: Vec<u8>,
    from: SocketAddr,
}

/// Owns the UDP socket, the shared [`AgentContext`], and the worker
/// pool's join handles. Dropping this (or calling [`Agent::shutdown`])
/// stops the receive loop and, once queued work drains, the workers.
pub struct Agent {
    context: Arc<AgentContext>,
    socket: Arc<UdpSocket>,
    receive_task: JoinHandle<()>,
    worker_tasks: Vec<JoinHandle<()>>,
}

impl Agent {
    /// Bind `addr` and spawn the receive loop plus `worker_count`
    /// worker tasks sharing `context`.
    pub async fn bind(addr: SocketAddr, context: AgentContext, worker_count: usize) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let context = Arc::new(context);
        let (tx, rx) = mpsc::channel::<Received>(1024);

        let worker_count = worker_count.max(1);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let mut worker_tasks = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = Arc::clone(&rx);
            let context = Arc::clone(&context);
            let socket = Arc::clone(&socket);
            worker_tasks.push(tokio::spawn(async move {
                loop {
                    let received = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Received { data, from } = match received {
                        Some(r) => r,
                        None => break,
                    };
                    debug!(worker = id, from = %from, bytes = data.len(), "processing datagram");
                    if let Some(response) = process_datagram(&context, &data).await {
                        if let Err(err) = socket.send_to(&response, from).await {
                            error!(%err, to = %from, "failed to send response");
                        }
                    }
                }
            }));
        }

        let recv_socket = Arc::clone(&socket);
        let receive_task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                match recv_socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        let data = buf[..len].to_vec();
                        if tx.send(Received { data, from }).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!(%err, "UDP receive error, stopping listener");
                        break;
                    }
                }
            }
        });

        info!(%addr, workers = worker_count, "agent listening");
        Ok(Agent {
            context,
            socket,
            receive_task,
            worker_tasks,
        })
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Stop the receive loop first, then let queued work drain and
    /// stop the workers.
    pub async fn shutdown(self) {
        self.receive_task.abort();
        let _ = self.receive_task.await;
        for task in self.worker_tasks {
            task.abort();
            let _ = task.await;
        }
    }
}
