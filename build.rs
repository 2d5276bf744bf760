use std::fs;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    // Necessary for ESP-IDF; host builds (tests, dry run) skip it
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }

    // Release pipeline stamps these; both are optional
    println!("cargo:rerun-if-env-changed=PRESENCE_FIRMWARE");
    println!("cargo:rerun-if-env-changed=PRESENCE_VERSION");

    // Read WiFi configuration if it exists
    let wifi_config_path = "wifi_config.h";
    println!("cargo:rerun-if-changed={}", wifi_config_path);
    let contents = if Path::new(wifi_config_path).exists() {
        fs::read_to_string(wifi_config_path)?
    } else {
        String::new()
    };

    // Missing defines fall back to empty credentials
    println!("cargo:rustc-env=WIFI_SSID={}", define_value(&contents, "WIFI_SSID"));
    println!("cargo:rustc-env=WIFI_PASSWORD={}", define_value(&contents, "WIFI_PASSWORD"));

    Ok(())
}

fn define_value<'a>(contents: &'a str, name: &str) -> &'a str {
    let needle = format!("#define {}", name);
    contents
        .lines()
        .find(|l| l.contains(&needle))
        .and_then(|l| l.split('"').nth(1))
        .unwrap_or("")
}
