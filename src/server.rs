//! Top-level server: binds one SO_REUSEPORT listener per worker thread and
//! drives them until a shutdown signal arrives.
use crate::config::ServerConfig;
use crate::error::ChopinError;
use crate::router::Router;
use crate::syscalls;
use crate::worker::Worker;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Convenience constructor for `"host:port"` strings, keeping the
    /// remaining [`ServerConfig`] fields at their defaults.
    pub fn bind(host_port: &str) -> crate::error::ChopinResult<Self> {
        let (host, port) = parse_host_port(host_port)?;
        let mut config = ServerConfig::default();
        config.host = host;
        config.port = port;
        Ok(Self { config })
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn serve(self, router: Router) -> crate::error::ChopinResult<()> {
        let router = Arc::new(router);
        let config = Arc::new(self.config);
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let shutdown_signal = shutdown_flag.clone();
        ctrlc::set_handler(move || {
            tracing::info!("received shutdown signal, draining connections");
            shutdown_signal.store(true, Ordering::Release);
        })
        .expect("error installing Ctrl-C handler");

        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        tracing::info!(
            workers = config.workers,
            host = %config.host,
            port = config.port,
            "starting server"
        );

        let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let core_id = core_ids.get(i % core_ids.len().max(1)).copied();
            let router = router.clone();
            let config = config.clone();
            let shutdown = shutdown_flag.clone();

            let handle = thread::Builder::new()
                .name(format!("chopin-worker-{i}"))
                .spawn(move || {
                    if let Some(id) = core_id {
                        core_affinity::set_for_current(id);
                    }
                    match syscalls::create_listen_socket_reuseport(&config.host, config.port) {
                        Ok(listen_fd) => {
                            let mut worker = Worker::new(i, router, config, listen_fd);
                            if let Err(e) = worker.run(shutdown) {
                                tracing::error!(worker = i, error = %e, "worker exited with error");
                            }
                            syscalls::close_fd(listen_fd);
                        }
                        Err(e) => {
                            tracing::error!(worker = i, error = %e, "failed to create listen socket");
                        }
                    }
                })
                .map_err(ChopinError::from)?;

            handles.push(handle);
        }

        for handle in handles {
            let _ = handle.join();
        }

        Ok(())
    }
}

fn parse_host_port(hp: &str) -> crate::error::ChopinResult<(String, u16)> {
    let (host, port) = hp
        .rsplit_once(':')
        .ok_or_else(|| ChopinError::Other("address must be host:port".to_string()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| ChopinError::Other("invalid port number".to_string()))?;
    Ok((host.to_string(), port))
}
