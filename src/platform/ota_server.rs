// Push update endpoint: POST the raw image to /ota/update

use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Result;
use embedded_svc::io::Write;
use esp_idf_svc::http::server::{Configuration as ServerConfig, EspHttpServer};
use esp_idf_svc::http::Method;

use super::hardware;
use super::ota_sink::EspOtaSink;
use super::IoReader;
use crate::ota::{PushUpdateHandler, UpdateCoordinator, UpdateError};
use crate::system::LogDisplay;

pub const OTA_PASSWORD_HEADER: &str = "X-OTA-Password";
const HTTP_STACK_SIZE: usize = 10 * 1024;

pub fn start(coordinator: UpdateCoordinator, password: &str) -> Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&ServerConfig {
        stack_size: HTTP_STACK_SIZE,
        ..Default::default()
    })?;

    let password = Some(password.to_string()).filter(|p| !p.is_empty());
    let handler = Arc::new(Mutex::new(PushUpdateHandler::new(coordinator, LogDisplay::default(), password)));

    server.fn_handler("/ota/update", Method::Post, move |mut req| {
        let total = req
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok());
        let credential = req.header(OTA_PASSWORD_HEADER).map(str::to_string);
        log::info!("Push update requested, size: {:?} bytes", total);

        let result = match (handler.lock(), EspOtaSink::new()) {
            (Ok(mut handler), Ok(mut sink)) => {
                handler.receive(&mut IoReader(&mut req), total, credential.as_deref(), &mut sink)
            }
            (Err(e), _) => Err(UpdateError::Begin(format!("update handler unavailable: {}", e))),
            (_, Err(e)) => Err(e),
        };

        match result {
            Ok(report) => {
                let mut response = req.into_ok_response()?;
                response.write_all(format!("OK {}\n", report.digest_hex()).as_bytes())?;
                thread::spawn(|| hardware::restart());
            }
            Err(e) => {
                let status = match e {
                    UpdateError::Auth => 401,
                    UpdateError::Busy(_) => 409,
                    _ => 500,
                };
                let mut response = req.into_status_response(status)?;
                response.write_all(format!("{}: {}\n", e.category(), e).as_bytes())?;
            }
        }
        Ok::<(), anyhow::Error>(())
    })?;

    log::info!("Push update endpoint listening on /ota/update");
    Ok(server)
}
