//! SOCK_SEQPACKET Unix socket listener/connection pair.
//!
//! Connections are blocking with symmetric send/receive timeouts
//! (`SO_SNDTIMEO`/`SO_RCVTIMEO`); the listener is non-blocking because the
//! daemon only touches it after a readiness notification.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::socket::{
    accept, bind, connect, getsockopt, listen, recv, send, socket, socketpair, sockopt,
    AddressFamily, Backlog, MsgFlags, SockFlag, SockType, UnixAddr,
};
use nix::sys::time::TimeVal;
use tracing::debug;

/// Listening side of the control socket. Accepts one connection at a time.
pub struct UdsListener {
    fd: OwnedFd,
}

impl UdsListener {
    /// Bind a SEQPACKET listener at `path`, removing a stale socket file first.
    pub fn bind(path: &Path) -> io::Result<Self> {
        let fd = socket(
            AddressFamily::Unix,
            SockType::SeqPacket,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            None,
        )?;
        let _ = std::fs::remove_file(path);
        let addr = UnixAddr::new(path)?;
        bind(fd.as_raw_fd(), &addr)?;
        listen(&fd, Backlog::new(1)?)?;
        Ok(Self { fd })
    }

    /// Accept one pending connection. The accepted socket is blocking;
    /// its I/O is governed by [`UdsConnection::set_timeout`].
    pub fn accept(&self) -> io::Result<UdsConnection> {
        let raw = accept(self.fd.as_raw_fd())?;
        // accept() does not inherit O_NONBLOCK from the listener
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        UdsConnection::from_fd(fd)
    }
}

impl AsRawFd for UdsListener {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for UdsListener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// One accepted or connected SEQPACKET link.
pub struct UdsConnection {
    fd: OwnedFd,
    send_buf: usize,
    recv_buf: usize,
}

impl UdsConnection {
    fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        // man 7 socket: the kernel doubles SO_SNDBUF/SO_RCVBUF for
        // bookkeeping and getsockopt returns the doubled value
        let send_buf = getsockopt(&fd, sockopt::SndBuf)? / 2;
        let recv_buf = getsockopt(&fd, sockopt::RcvBuf)? / 2;
        Ok(Self {
            fd,
            send_buf,
            recv_buf,
        })
    }

    /// Connect to the daemon socket at `path`.
    pub fn connect(path: &Path) -> io::Result<Self> {
        let fd = socket(
            AddressFamily::Unix,
            SockType::SeqPacket,
            SockFlag::SOCK_CLOEXEC,
            None,
        )?;
        let addr = UnixAddr::new(path)?;
        connect(fd.as_raw_fd(), &addr)?;
        Self::from_fd(fd)
    }

    /// Connected socketpair, used by the simulation event channel and tests.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = socketpair(
            AddressFamily::Unix,
            SockType::SeqPacket,
            None,
            SockFlag::SOCK_CLOEXEC,
        )?;
        Ok((Self::from_fd(a)?, Self::from_fd(b)?))
    }

    /// Apply `timeout` to both send and receive.
    pub fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        let tv = TimeVal::new(
            timeout.as_secs() as libc::time_t,
            timeout.subsec_micros() as libc::suseconds_t,
        );
        setsockopt_timeout(&self.fd, &tv)
    }

    /// Send one message, chunking to the socket send-buffer size and looping
    /// until every byte is written. Interrupts are retried; a timeout or hard
    /// error fails the call without retry.
    pub fn send(&self, data: &[u8]) -> io::Result<()> {
        let mut total = 0;
        while total < data.len() {
            let end = total + self.send_buf.min(data.len() - total);
            match send(self.fd.as_raw_fd(), &data[total..end], MsgFlags::empty()) {
                Ok(n) => total += n,
                Err(Errno::EINTR) => {
                    debug!("send interrupted by a signal, retrying");
                }
                Err(Errno::EAGAIN) => return Err(io::ErrorKind::TimedOut.into()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Receive one message. SEQPACKET preserves record boundaries, so a
    /// single successful recv is a complete message.
    pub fn recv(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.recv_buf];
        loop {
            match recv(self.fd.as_raw_fd(), &mut buf, MsgFlags::empty()) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(Errno::EINTR) => {
                    debug!("recv interrupted by a signal, retrying");
                }
                Err(Errno::EAGAIN) => return Err(io::ErrorKind::TimedOut.into()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn setsockopt_timeout(fd: &OwnedFd, tv: &TimeVal) -> io::Result<()> {
    nix::sys::socket::setsockopt(fd, sockopt::SendTimeout, tv)?;
    nix::sys::socket::setsockopt(fd, sockopt::ReceiveTimeout, tv)?;
    Ok(())
}

impl AsRawFd for UdsConnection {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for UdsConnection {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
