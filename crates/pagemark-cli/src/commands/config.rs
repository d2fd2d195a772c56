//! `pagemark config`

use anyhow::{anyhow, Context, Result};

use pagemark_core::Config;

use crate::output::{Output, OutputFormat};

const KEYS: &str = "data_dir, deletion_delay_ms, page_count, log_file";

pub fn show(output: &Output) -> Result<()> {
    let config = Config::load()?;

    match output.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Quiet => println!("{}", config.data_dir.display()),
        OutputFormat::Human => {
            print!("{}", toml::to_string_pretty(&config)?);
            if config.log_file.is_none() {
                println!("# log_file defaults to {}", config.log_path().display());
            }
            println!("\n# read from {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load()?;
    apply(&mut config, &key, &value)?;
    config.save()?;

    output.success(&format!("{} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "deletion_delay_ms" => {
            config.deletion_delay_ms = value
                .parse()
                .with_context(|| format!("deletion_delay_ms takes milliseconds, got '{}'", value))?
        }
        "page_count" => {
            config.page_count = value
                .parse()
                .with_context(|| format!("page_count takes a page number, got '{}'", value))?
        }
        "log_file" => {
            config.log_file = match value {
                "" | "none" => None,
                path => Some(path.into()),
            }
        }
        _ => return Err(anyhow!("No setting '{}' (known: {})", key, KEYS)),
    }
    Ok(())
}
