//! Inspect command implementation.

use crate::Format;
use serde::Serialize;
use std::path::Path;
use tdmsio_core::{Channel, Properties, TdmsReader};
use tracing::info;

/// File inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// File path.
    pub path: String,
    /// Bytes covered by the index.
    pub size: u64,
    /// Number of segments.
    pub segments: usize,
    /// File (root) properties.
    pub properties: Vec<PropertyEntry>,
    /// Groups in first-seen order.
    pub groups: Vec<GroupInfo>,
}

/// One property.
#[derive(Debug, Serialize)]
pub struct PropertyEntry {
    /// Property name.
    pub name: String,
    /// Type name.
    pub data_type: &'static str,
    /// Rendered value.
    pub value: String,
}

/// A group and its channels.
#[derive(Debug, Serialize)]
pub struct GroupInfo {
    /// Group name.
    pub name: String,
    /// Group properties.
    pub properties: Vec<PropertyEntry>,
    /// Channels in first-seen order.
    pub channels: Vec<ChannelInfo>,
}

/// A channel summary.
#[derive(Debug, Serialize)]
pub struct ChannelInfo {
    /// Channel name.
    pub name: String,
    /// Element type, absent if the channel never held data.
    pub data_type: Option<&'static str>,
    /// Number of values.
    pub length: u64,
    /// Channel properties.
    pub properties: Vec<PropertyEntry>,
    /// Leading values (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format, values: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let reader = TdmsReader::open(path)?;
    info!(path = %path.display(), segments = reader.index().segments().len(), "indexed file");

    let mut groups = Vec::new();
    for name in reader.groups() {
        let group = reader.group(name)?;
        let mut channels = Vec::new();
        for channel in group.channels() {
            channels.push(channel_info(&channel, values)?);
        }
        groups.push(GroupInfo {
            name: name.to_string(),
            properties: property_entries(group.properties()),
            channels,
        });
    }

    let result = InspectResult {
        path: path.display().to_string(),
        size: reader.index().indexed_len(),
        segments: reader.index().segments().len(),
        properties: property_entries(&reader.file_properties()),
        groups,
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }

    Ok(())
}

fn channel_info(channel: &Channel<'_>, values: Option<u64>) -> Result<ChannelInfo, Box<dyn std::error::Error>> {
    let leading = match (values, channel.data_type()) {
        (Some(n), Some(_)) => {
            let slice = channel.slice(0, n)?;
            Some((0..slice.len()).filter_map(|i| slice.display_value(i)).collect())
        }
        (Some(_), None) => Some(Vec::new()),
        (None, _) => None,
    };
    Ok(ChannelInfo {
        name: channel.name().to_string(),
        data_type: channel.data_type().map(|t| t.name()),
        length: channel.len(),
        properties: property_entries(channel.properties()),
        values: leading,
    })
}

fn property_entries(properties: &Properties) -> Vec<PropertyEntry> {
    properties
        .iter()
        .map(|(name, value)| PropertyEntry {
            name: name.to_string(),
            data_type: value.data_type().name(),
            value: value.to_string(),
        })
        .collect()
}

fn print_properties(indent: &str, properties: &[PropertyEntry]) {
    for p in properties {
        println!("{indent}{} ({}): {}", p.name, p.data_type, p.value);
    }
}

fn print_text_output(result: &InspectResult) {
    println!("TDMS File Inspection");
    println!("====================");
    println!();
    println!("Path:     {}", result.path);
    println!("Size:     {}", format_size(result.size));
    println!("Segments: {}", result.segments);

    if !result.properties.is_empty() {
        println!();
        println!("Properties:");
        print_properties("  ", &result.properties);
    }

    if result.groups.is_empty() {
        println!();
        println!("No groups.");
        return;
    }

    for group in &result.groups {
        println!();
        println!("[GROUP] '{}'", group.name);
        print_properties("    ", &group.properties);
        if group.channels.is_empty() {
            println!("  (no channels)");
        }
        for channel in &group.channels {
            println!(
                "  [CHANNEL] '{}' {} x {}",
                channel.name,
                channel.data_type.unwrap_or("-"),
                channel.length
            );
            print_properties("      ", &channel.properties);
            if let Some(values) = &channel.values {
                println!("      values: [{}]", values.join(", "));
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
