//! Provider listing command

use anyhow::Result;
use toc_providers::{available_tools, ImageTool, NarrationTool, ProviderStatus, TocConfig, VideoTool};

fn describe(status: ProviderStatus) -> String {
    match status {
        ProviderStatus::Available => "ready".to_string(),
        ProviderStatus::Offline => "offline".to_string(),
        ProviderStatus::NoApiKey(var) => format!("missing {}", var),
    }
}

pub fn run() -> Result<()> {
    let config = TocConfig::load()?;

    println!("Image tools:");
    for tool in ImageTool::ALL {
        println!(
            "  {:<24} {:<32} {}",
            tool.name(),
            tool.model_label(&config),
            describe(tool.status(&config))
        );
    }

    println!("\nVideo tools:");
    for tool in VideoTool::ALL {
        let durations = match tool.allowed_durations() {
            Some(allowed) => format!("{:?}s", allowed),
            None => "any length".to_string(),
        };
        println!(
            "  {:<24} {:<32} {:<12} {}",
            tool.name(),
            tool.model_label(&config),
            durations,
            describe(tool.status(&config))
        );
    }

    println!("\nNarration tools:");
    for tool in NarrationTool::ALL {
        println!("  {:<24} {}", tool.name(), describe(tool.status(&config)));
    }

    println!("\nAccepted manifest names:");
    for (pass, names) in available_tools() {
        println!("  {}: {}", pass, names.join(", "));
    }
    Ok(())
}
