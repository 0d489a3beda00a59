// src/syscalls.rs
use crate::error::ChopinResult;
use libc::{c_int, c_void, socklen_t};
use std::io;
use std::mem;
use std::net::TcpStream;
use std::os::fd::FromRawFd;
use std::ptr;

// ---- Socket Operations ----
//
// The listener is still built with raw syscalls so every worker can bind
// the same port via SO_REUSEPORT and let the kernel load-balance accepts
// across cores. Once a connection is accepted it is handed to a blocking
// `std::net::TcpStream` and the worker owns it for its whole lifetime —
// there is no non-blocking mode or epoll loop past the listener.

/// Create a blocking listener with SO_REUSEPORT so every worker thread can
/// bind the same `host:port` and let the kernel distribute incoming
/// connections across them.
pub fn create_listen_socket_reuseport(host: &str, port: u16) -> ChopinResult<c_int> {
    let addr_str = format!("{}:{}", host, port);
    let addr: std::net::SocketAddr = addr_str
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid listen address"))?;

    let is_ipv6 = matches!(addr, std::net::SocketAddr::V6(_));
    let domain = if is_ipv6 {
        libc::AF_INET6
    } else {
        libc::AF_INET
    };

    unsafe {
        let fd = libc::socket(domain, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let one: c_int = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const _ as *const c_void,
            mem::size_of_val(&one) as socklen_t,
        );
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &one as *const _ as *const c_void,
            mem::size_of_val(&one) as socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }

        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &one as *const _ as *const c_void,
            mem::size_of_val(&one) as socklen_t,
        );

        bind_addr(fd, &addr)?;

        if libc::listen(fd, 1024) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }

        Ok(fd)
    }
}

fn bind_addr(fd: c_int, addr: &std::net::SocketAddr) -> ChopinResult<()> {
    unsafe {
        match addr {
            std::net::SocketAddr::V4(a) => {
                let sin = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: a.port().to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_ne_bytes(a.ip().octets()),
                    },
                    sin_zero: [0; 8],
                };
                if libc::bind(
                    fd,
                    &sin as *const _ as *const libc::sockaddr,
                    mem::size_of_val(&sin) as socklen_t,
                ) < 0
                {
                    let err = io::Error::last_os_error();
                    libc::close(fd);
                    return Err(err.into());
                }
            }
            std::net::SocketAddr::V6(a) => {
                let sin6 = libc::sockaddr_in6 {
                    sin6_family: libc::AF_INET6 as libc::sa_family_t,
                    sin6_port: a.port().to_be(),
                    sin6_flowinfo: a.flowinfo(),
                    sin6_addr: libc::in6_addr {
                        s6_addr: a.ip().octets(),
                    },
                    sin6_scope_id: a.scope_id(),
                };
                if libc::bind(
                    fd,
                    &sin6 as *const _ as *const libc::sockaddr,
                    mem::size_of_val(&sin6) as socklen_t,
                ) < 0
                {
                    let err = io::Error::last_os_error();
                    libc::close(fd);
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }
}

/// Blocking accept. Returns an owned [`TcpStream`] built from the raw fd so
/// the rest of the connection path can use ordinary `Read`/`Write`.
pub fn accept_connection(listen_fd: c_int) -> ChopinResult<TcpStream> {
    unsafe {
        let fd = libc::accept(listen_fd, ptr::null_mut(), ptr::null_mut());
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let one: c_int = 1;
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &one as *const _ as *const c_void,
            mem::size_of_val(&one) as socklen_t,
        );

        Ok(TcpStream::from_raw_fd(fd))
    }
}

pub fn close_fd(fd: c_int) {
    unsafe {
        libc::close(fd);
    }
}
