fn main() {
    // Build scripts run on the host, so the ESP-IDF environment is only
    // exported when cross-compiling for an ESP-IDF target
    if let Ok(target) = std::env::var("TARGET") {
        if target.ends_with("-espidf") {
            embuild::espidf::sysenv::output();
        }
    }
}
