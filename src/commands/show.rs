//! `autonum show` and `autonum streams` commands.

use std::path::Path;
use std::sync::Arc;

use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::id_gen::UuidIdGenerator;
use crate::context::ServiceContext;
use crate::model::{ConfigStatus, NumberingConfig};
use crate::store::FileStore;

use super::Output;

/// Execute the `show` command.
///
/// When `config` is provided, prints that config as YAML (or JSON).
/// Otherwise lists every stored config.
///
/// # Errors
///
/// Returns an error string if configs cannot be read or the named config
/// does not exist.
pub fn run(store_root: &Path, config: Option<&str>, output: Output) -> Result<(), String> {
    let store = FileStore::new(store_root, Arc::new(LiveFileSystem), Arc::new(UuidIdGenerator));
    let configs = store.list_configs().map_err(|e| format!("failed to list configs: {e}"))?;

    if let Some(wanted) = config {
        let config = configs
            .iter()
            .find(|c| c.id == wanted || c.name == wanted)
            .ok_or_else(|| format!("config '{wanted}' not found"))?;
        if output.json {
            return output.print_json(config);
        }
        let yaml = serde_yaml::to_string(config).map_err(|e| format!("failed to encode config: {e}"))?;
        print!("{yaml}");
        return Ok(());
    }

    if output.json {
        return output.print_json(&configs);
    }
    if configs.is_empty() {
        println!("No configs found in store.");
        return Ok(());
    }
    print_table(&configs);
    Ok(())
}

/// Execute the `streams` command: list a config's stream counters.
///
/// # Errors
///
/// Returns an error string if the streams cannot be read.
pub fn streams(ctx: &ServiceContext, config: &str, output: Output) -> Result<(), String> {
    let streams = ctx.configs.list_streams(config).map_err(|e| format!("failed to list streams: {e}"))?;
    if output.json {
        return output.print_json(&streams);
    }
    if streams.is_empty() {
        println!("No streams for config '{config}'.");
        return Ok(());
    }
    for stream in &streams {
        let value = stream.field_value.as_deref().unwrap_or("(none)");
        println!("{}={value}\t{}", stream.field_name, stream.current_index);
    }
    Ok(())
}

fn print_table(configs: &[NumberingConfig]) {
    let id_width = configs.iter().map(|c| c.id.len()).max().unwrap_or(0).max("ID".len());
    let name_width = configs.iter().map(|c| c.name.len()).max().unwrap_or(0).max("NAME".len());

    println!("{:<id_width$}  {:<name_width$}  {:<8}  FORMAT", "ID", "NAME", "STATUS");
    for config in configs {
        println!(
            "{:<id_width$}  {:<name_width$}  {:<8}  {}",
            config.id,
            config.name,
            format_status(config.status),
            config.format.as_deref().unwrap_or(""),
        );
    }
}

fn format_status(status: ConfigStatus) -> &'static str {
    match status {
        ConfigStatus::Active => "active",
        ConfigStatus::Inactive => "inactive",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: Output = Output { json: false };

    fn temp_store(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("autonum-show-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn show_lists_empty_store() {
        assert!(run(&temp_store("empty"), None, TEXT).is_ok());
    }

    #[test]
    fn show_with_unknown_config_fails() {
        assert!(run(&temp_store("unknown"), Some("NOPE"), TEXT).is_err());
    }

    #[test]
    fn show_finds_config_by_name() {
        let root = temp_store("named");
        let store = FileStore::new(&root, Arc::new(LiveFileSystem), Arc::new(UuidIdGenerator));
        store
            .put_config(&NumberingConfig { id: "inv".into(), name: "Invoices".into(), ..NumberingConfig::default() })
            .unwrap();

        assert!(run(&root, Some("Invoices"), TEXT).is_ok());
        assert!(run(&root, Some("inv"), Output { json: true }).is_ok());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn format_status_returns_lowercase_names() {
        assert_eq!(format_status(ConfigStatus::Active), "active");
        assert_eq!(format_status(ConfigStatus::Inactive), "inactive");
    }
}
