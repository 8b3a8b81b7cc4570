// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fieldbus dispatcher
//!
//! The dispatcher binds one TCP listener per configured fieldbus port and
//! runs an accept loop for each until shutdown. Every accepted connection is
//! handed to a freshly spawned session task owned by the module bound to
//! that port; sessions run independently and end on client disconnect or
//! error without affecting each other.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ListenerConfig;

use super::{FieldbusManager, FieldbusModule};

/// Dispatcher owning the accept loops for every bound fieldbus port.
pub struct Dispatcher {
    tasks: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl Dispatcher {
    /// Bind every configured port and start the accept loops.
    ///
    /// All listeners are bound before any accept loop starts, so a bind
    /// failure surfaces as a startup error with nothing left running.
    pub async fn start(conf: &ListenerConfig, manager: FieldbusManager) -> Result<Self> {
        let (shutdown, _) = watch::channel(false);

        let mut bound = Vec::with_capacity(manager.len());
        for (port, module) in manager.modules() {
            let listener = bind_listener(&conf.host, port, conf.backlog)
                .await
                .with_context(|| format!("Failed to bind {}:{}", conf.host, port))?;
            info!("Listening on {}:{} ({})", conf.host, port, module.id());
            bound.push((listener, module.clone()));
        }

        let mut tasks = Vec::with_capacity(bound.len());
        for (listener, module) in bound {
            let mut rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                accept_loop(listener, module, &mut rx).await;
            }));
        }

        Ok(Dispatcher { tasks, shutdown })
    }

    /// Signal the accept loops to stop. Established sessions run on until
    /// their clients disconnect.
    pub fn shutdown(&self) {
        info!("Stopping fieldbus dispatcher");
        let _ = self.shutdown.send(true);
    }

    /// Wait for the accept loops to exit.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Dispatcher task panicked: {}", e);
            }
        }
    }
}

/// Bind a listening socket with the configured backlog. The host may be a
/// name; the first resolved address is used.
async fn bind_listener(host: &str, port: u16, backlog: u32) -> Result<TcpListener> {
    let addr = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve listener host {}", host))?
        .next()
        .with_context(|| format!("Listener host {} resolved to no addresses", host))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    Ok(socket.listen(backlog)?)
}

async fn accept_loop(
    listener: TcpListener,
    module: Arc<dyn FieldbusModule>,
    shutdown: &mut watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Accept loop for {} shutting down", module.id());
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("New backend to service client on {}", peer);
                    let module = module.clone();
                    tokio::spawn(async move {
                        if let Err(e) = module.serve(stream, peer).await {
                            error!("Session error for {}: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                }
            }
        }
    }
}
