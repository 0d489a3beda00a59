//! A worker owns one SO_REUSEPORT listener and spawns one thread per
//! accepted connection. The kernel load-balances accepts across
//! workers; each connection thread then runs to completion independent of
//! every other connection.
use crate::config::ServerConfig;
use crate::connection;
use crate::error::ChopinResult;
use crate::router::Router;
use crate::syscalls;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

pub struct Worker {
    id: usize,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    listen_fd: i32,
}

impl Worker {
    pub fn new(id: usize, router: Arc<Router>, config: Arc<ServerConfig>, listen_fd: i32) -> Self {
        Self {
            id,
            router,
            config,
            listen_fd,
        }
    }

    pub fn run(&mut self, shutdown: Arc<AtomicBool>) -> ChopinResult<()> {
        tracing::info!(worker = self.id, "entering accept loop");

        // Bound how long `accept` can block so the shutdown flag is polled
        // even with no incoming connections.
        unsafe {
            let tv = libc::timeval {
                tv_sec: 1,
                tv_usec: 0,
            };
            libc::setsockopt(
                self.listen_fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const _ as *const libc::c_void,
                std::mem::size_of_val(&tv) as libc::socklen_t,
            );
        }

        let mut handles = Vec::new();
        while !shutdown.load(Ordering::Acquire) {
            match syscalls::accept_connection(self.listen_fd) {
                Ok(stream) => {
                    let router = self.router.clone();
                    let config = self.config.clone();
                    let worker_id = self.id;
                    let handle = thread::Builder::new()
                        .name(format!("chopin-conn-{worker_id}"))
                        .spawn(move || {
                            connection::serve_connection(stream, &router, &config);
                        });
                    if let Ok(h) = handle {
                        handles.push(h);
                    }
                }
                Err(_) => {
                    // EAGAIN/EWOULDBLOCK from SO_RCVTIMEO, or a transient
                    // accept failure; either way, loop back and re-check
                    // the shutdown flag.
                    continue;
                }
            }
            handles.retain(|h| !h.is_finished());
        }

        tracing::info!(worker = self.id, "draining in-flight connections");
        for handle in handles {
            let _ = handle.join();
        }
        Ok(())
    }
}
