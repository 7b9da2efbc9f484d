use std::fs;
use std::path::Path;

fn main() {
    // The compiled-in PDF settings must parse, since they are read without a fallback path.
    let config_path = "src/default_config.toml";
    println!("cargo:rerun-if-changed={config_path}");

    let content = fs::read_to_string(config_path).expect("Failed to read default_config.toml");
    if let Err(e) = content.parse::<toml::Table>() {
        panic!("Invalid default_config.toml: {e}");
    }

    // `generate` falls back to the "modern" template, so it has to ship.
    let default_template = Path::new("templates/modern.html");
    println!("cargo:rerun-if-changed=templates");
    if !default_template.is_file() {
        panic!("Missing bundled template {}", default_template.display());
    }
}
