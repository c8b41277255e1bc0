//! Scripted in-process gateway for bridge tests.
//!
//! Runs on a plain std thread so the session under test keeps its own
//! runtime to itself.

#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use tws_bridge::SessionConfig;

pub const SERVER_VERSION: &str = "176";

/// One accepted client connection.
pub struct Conn {
    stream: TcpStream,
}

impl Conn {
    /// Consume the connect request, acknowledge with `server_version`, then
    /// consume START_API.
    pub fn handshake(&mut self, server_version: &str) {
        let mut sign = [0u8; 4];
        self.stream.read_exact(&mut sign).unwrap();
        assert_eq!(&sign, b"API\0");
        let versions = self.read_frame().unwrap();
        assert!(versions.starts_with(b"v100..200"));

        self.send(&[server_version, "20260101 12:00:00 EST"]);

        let start_api = self.read_fields().unwrap();
        assert_eq!(start_api[0], "71");
    }

    fn read_frame(&mut self) -> Option<Vec<u8>> {
        let mut header = [0u8; 4];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return None,
            Err(e) if e.kind() == ErrorKind::ConnectionReset => return None,
            Err(e) => panic!("mock gateway read failed: {e}"),
        }
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
        self.stream.read_exact(&mut body).ok()?;
        Some(body)
    }

    /// Next request as text fields, `None` once the client has hung up.
    pub fn read_fields(&mut self) -> Option<Vec<String>> {
        let body = self.read_frame()?;
        let mut fields: Vec<String> = body
            .split(|&b| b == 0)
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        // Trailing terminator leaves one empty element behind.
        fields.pop();
        Some(fields)
    }

    pub fn send(&mut self, fields: &[&str]) {
        let mut body = Vec::new();
        for f in fields {
            body.extend_from_slice(f.as_bytes());
            body.push(0);
        }
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend(body);
        self.stream.write_all(&frame).unwrap();
    }

    /// Read and collect requests until the client disconnects.
    pub fn drain_until_eof(&mut self) -> Vec<Vec<String>> {
        let mut requests = Vec::new();
        while let Some(fields) = self.read_fields() {
            requests.push(fields);
        }
        requests
    }

    pub fn close(self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// A gateway that accepts a single client and runs `script` against it.
pub struct MockGateway<T> {
    pub port: u16,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> MockGateway<T> {
    pub fn spawn(script: impl FnOnce(Conn) -> T + Send + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            script(Conn { stream })
        });
        Self { port, handle }
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            port: self.port,
            ..SessionConfig::default()
        }
    }

    /// Wait for the script to finish and return what it collected.
    pub fn join(self) -> T {
        self.handle.join().unwrap()
    }
}

// ============================================================================
// Message builders
// ============================================================================

pub fn position_fields(account: &str, con_id: &str, symbol: &str, position: &str, avg_cost: &str) -> Vec<String> {
    [
        "61", "3", account, con_id, symbol, "STK", "", "0", "", "", "", "USD", symbol, symbol,
        position, avg_cost,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn symbol_samples_fields(req_id: &str, symbols: &[(&str, &str)]) -> Vec<String> {
    let mut fields = vec!["79".to_string(), req_id.to_string(), symbols.len().to_string()];
    for (con_id, symbol) in symbols {
        fields.extend(
            [*con_id, *symbol, "STK", "ARCA", "USD", "1", "OPT", "", ""]
                .iter()
                .map(|s| s.to_string()),
        );
    }
    fields
}

pub fn as_strs(fields: &[String]) -> Vec<&str> {
    fields.iter().map(String::as_str).collect()
}
