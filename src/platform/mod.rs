// ESP-IDF glue: everything that touches the chip, the radio or the flash lives here

pub mod firmware;
pub mod hardware;
pub mod http_client;
pub mod mqtt;
pub mod ota_server;
pub mod ota_sink;
pub mod storage;
pub mod wifi;

use std::io;

/// Bridges an `embedded_svc` reader (HTTP request or response body) to `std::io::Read`
pub struct IoReader<R>(pub R);

impl<R> io::Read for IoReader<R>
where
    R: embedded_svc::io::Read,
    R::Error: core::fmt::Debug,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0
            .read(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{:?}", e)))
    }
}
