use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

const PASSWORD_HEADER: &str = "X-OTA-Password";

#[derive(Parser)]
#[command(name = "presence-ota")]
#[command(about = "Push a firmware image to a presence node", long_about = None)]
struct Cli {
    /// Device IP address or hostname
    host: String,

    /// Firmware image to upload (defaults to the release build)
    #[arg(short, long)]
    firmware: Option<PathBuf>,

    /// Port number (default: 80)
    #[arg(short, long, default_value = "80")]
    port: u16,

    /// OTA password configured on the device
    #[arg(long, env = "PRESENCE_OTA_PASSWORD")]
    password: Option<String>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "❌".red(), message);
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let firmware_path = cli
        .firmware
        .unwrap_or_else(|| PathBuf::from("target/xtensa-esp32-espidf/release/presence-node.bin"));

    if !firmware_path.exists() {
        eprintln!("{} Firmware not found: {}", "❌".red(), firmware_path.display());
        eprintln!("   Build and convert it with: espflash save-image --chip esp32 <elf> <bin>");
        process::exit(1);
    }

    let firmware_data = fs::read(&firmware_path).unwrap_or_else(|e| fail(format!("Failed to read firmware: {}", e)));

    let file_size = firmware_data.len();
    println!("{} Presence node push update", "🚀".blue());
    println!("{}Device: {}:{}", "   ".dimmed(), cli.host, cli.port);
    println!(
        "{}Firmware: {} bytes ({:.2} MB)",
        "   ".dimmed(),
        file_size,
        file_size as f64 / 1024.0 / 1024.0
    );

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Uploading {} bytes...", file_size));

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|e| fail(format!("Failed to create HTTP client: {}", e)));

    let url = format!("http://{}:{}/ota/update", cli.host, cli.port);
    let mut request = client
        .post(&url)
        .header("Content-Length", file_size.to_string())
        .body(firmware_data);
    if let Some(password) = &cli.password {
        request = request.header(PASSWORD_HEADER, password);
    }

    match request.send() {
        Ok(response) => {
            pb.finish_and_clear();
            let status = response.status();
            let body = response.text().unwrap_or_default();
            if status.is_success() {
                println!("{} Upload successful! Device will restart.", "✅".green());
                println!("{}{}", "   ".dimmed(), body.trim());
            } else {
                eprintln!("{} Upload failed: HTTP {} {}", "❌".red(), status, body.trim());
                match status.as_u16() {
                    401 => eprintln!("   Wrong or missing OTA password (use --password)"),
                    409 => eprintln!("   Device is already applying an update, try again later"),
                    404 => eprintln!("   No push update endpoint on this device"),
                    _ => {}
                }
                process::exit(1);
            }
        }
        Err(e) => {
            pb.finish_and_clear();
            fail(format!("Error: {}", e));
        }
    }
}
