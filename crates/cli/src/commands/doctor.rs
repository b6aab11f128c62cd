//! `agora doctor` — Diagnose configuration.

use agora_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Agora Doctor — Configuration Diagnostics");
    println!("==========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid: {}", config_path.display());
                Some(config)
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  ⚠️  No config file at {} — using defaults", config_path.display());
        println!("\n  Example config.toml:\n");
        for line in AppConfig::default_toml().lines() {
            println!("    {line}");
        }
        println!();
        AppConfig::load().ok()
    };

    if let Some(config) = config {
        if config.has_api_key() {
            println!("  ✅ API key configured");
        } else {
            println!("  ❌ No API key — add api_key to config.toml or set OPENAI_API_KEY");
            issues += 1;
        }

        match agora_providers::build_from_config(&config) {
            Ok(provider) => println!("  ✅ Upstream client ready ({})", provider.name()),
            Err(e) => {
                println!("  ❌ Upstream client unavailable: {e}");
                issues += 1;
            }
        }

        println!("  ℹ️  Endpoint: {} (model {})", config.base_url, config.model);
        println!(
            "  ℹ️  Streaming: {} ms between frames, error frame {}",
            config.streaming.frame_delay_ms,
            if config.streaming.error_frame { "on" } else { "off" }
        );
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
