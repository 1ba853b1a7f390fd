//! Pluggable per-session byte streams.
//!
//! §9 Open Question 4: the original's FIFO-pair-plus-`SIGRTMIN` handshake is
//! replaced here by TCP, since the core only ever needs "two ordered,
//! lossless, per-direction byte streams" per session — it never inspects
//! how a session was established. `server::handle_session` and
//! `client::Replica` are generic directly over `R: BufRead` / `W: Write`,
//! so there's no separate transport trait to implement: [`TcpTransport`] is
//! the transport both shipped binaries run on; [`in_memory_pair`] gives
//! tests and in-process embedding a socket-free equivalent.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender};

/// The transport both shipped binaries use.
pub struct TcpTransport;

impl TcpTransport {
    /// Splits a connected stream into independent read/write halves backed
    /// by the same socket, via `TcpStream::try_clone` (a cheap fd dup).
    pub fn split(stream: TcpStream) -> io::Result<(BufReader<TcpStream>, TcpStream)> {
        let writer = stream.try_clone()?;
        Ok((BufReader::new(stream), writer))
    }
}

/// Read half of an in-memory duplex pipe; each `write` on the peer arrives
/// here as one `Vec<u8>` chunk, consumed in order.
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0), // peer dropped its writer: EOF
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Write half of an in-memory duplex pipe.
#[derive(Clone)]
pub struct ChannelWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped its reader"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds a connected pair of in-memory duplex endpoints: `(client_end,
/// server_end)`, each a `(reader, writer)` half.
pub fn in_memory_pair() -> (
    (BufReader<ChannelReader>, ChannelWriter),
    (BufReader<ChannelReader>, ChannelWriter),
) {
    let (c2s_tx, c2s_rx) = mpsc::channel();
    let (s2c_tx, s2c_rx) = mpsc::channel();
    let client_end = (BufReader::new(ChannelReader { rx: s2c_rx, buf: Vec::new(), pos: 0 }), ChannelWriter { tx: c2s_tx });
    let server_end = (BufReader::new(ChannelReader { rx: c2s_rx, buf: Vec::new(), pos: 0 }), ChannelWriter { tx: s2c_tx });
    (client_end, server_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead as _;

    #[test]
    fn in_memory_pair_roundtrips_lines() {
        let (mut client, mut server) = in_memory_pair();
        client.1.write_all(b"hello\n").unwrap();
        let mut line = String::new();
        server.0.read_line(&mut line).unwrap();
        assert_eq!(line, "hello\n");

        server.1.write_all(b"world\n").unwrap();
        let mut line = String::new();
        client.0.read_line(&mut line).unwrap();
        assert_eq!(line, "world\n");
    }

    #[test]
    fn dropping_writer_yields_eof() {
        let (client, server) = in_memory_pair();
        drop(client.1);
        let mut reader = server.0;
        let mut line = String::new();
        let n = reader.read_line(&mut line).unwrap();
        assert_eq!(n, 0);
    }
}
