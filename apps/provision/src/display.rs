//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::Style;
use provision_progress::Units;
use provision_provisioner::{ImageManifest, ProvisionReport};
use serde::Serialize;
use std::io;

/// Final result of a command, rendered once it completes
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Provisioned(ProvisionReport),
    ImageList(Vec<ImageManifest>),
    ImageInfo(ImageManifest),
}

/// Output renderer for CLI results
#[derive(Debug, Clone)]
pub struct OutputRenderer {
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render command result
    pub fn render_result(&self, result: &CommandResult) -> io::Result<()> {
        if self.json_output {
            println!("{}", render_json(result)?);
            return Ok(());
        }

        match result {
            CommandResult::Provisioned(report) => Self::render_report(report),
            CommandResult::ImageList(images) => {
                if images.is_empty() {
                    println!("No images stored.");
                } else {
                    println!("{}", image_table(images));
                }
            }
            CommandResult::ImageInfo(manifest) => Self::render_manifest(manifest),
        }
        Ok(())
    }

    fn render_report(report: &ProvisionReport) {
        let ok = Style::new().green().bold();
        println!("{} {}", ok.apply_to("[OK]"), report.name);
        println!("Path:     {}", report.path.display());
        println!("Size:     {}", format_size(report.size));
        println!("BLAKE3:   {}", report.blake3);
        println!("Duration: {:.2}s", report.elapsed.as_secs_f64());
    }

    fn render_manifest(manifest: &ImageManifest) {
        println!("{}", Style::new().bold().apply_to(&manifest.name));
        println!();
        println!("Size:        {}", format_size(manifest.size));
        println!("BLAKE3:      {}", manifest.blake3);
        println!("Provisioner: {}", manifest.provisioner);
        println!(
            "Created:     {}",
            manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

fn render_json(result: &CommandResult) -> io::Result<String> {
    serde_json::to_string_pretty(result).map_err(io::Error::other)
}

fn image_table(images: &[ImageManifest]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Image").add_attribute(Attribute::Bold),
        Cell::new("Size").add_attribute(Attribute::Bold),
        Cell::new("BLAKE3").add_attribute(Attribute::Bold),
        Cell::new("Created").add_attribute(Attribute::Bold),
    ]);

    for image in images {
        table.add_row(vec![
            Cell::new(&image.name).fg(Color::Cyan),
            Cell::new(format_size(image.size)),
            Cell::new(short_digest(&image.blake3)),
            Cell::new(image.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }
    table
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    Units::Bytes.format(bytes as f64)
}

fn short_digest(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn manifest(name: &str) -> ImageManifest {
        ImageManifest {
            name: name.to_string(),
            size: 3 * 1024 * 1024,
            blake3: "0123456789abcdef".repeat(4),
            provisioner: "local".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_image_table_lists_every_image() {
        let table = image_table(&[manifest("alpine"), manifest("debian")]).to_string();
        assert!(table.contains("alpine"));
        assert!(table.contains("debian"));
        assert!(table.contains("0123456789abcdef"));
        assert!(!table.contains(&"0123456789abcdef".repeat(2)));
    }

    #[test]
    fn test_json_list_is_an_array() {
        let json = render_json(&CommandResult::ImageList(vec![manifest("alpine")])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "alpine");
        assert_eq!(value[0]["provisioner"], "local");
    }

    #[test]
    fn test_short_digest() {
        assert_eq!(short_digest("abc"), "abc");
        assert_eq!(short_digest(&"f".repeat(64)).len(), 16);
    }
}
