use crate::config::{Config, DEFAULT_API_PORT, expand_home};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to Noted onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();

    println!("\n[1/3] API port");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Port for the API server")
        .default(DEFAULT_API_PORT)
        .interact_text()
        .context("Failed to read API port")?;
    println!("  ✓ API will listen on 127.0.0.1:{api_port}");

    println!("\n[2/3] API token");
    println!("  With a token set, requests must send Authorization: Bearer <token>.");
    let require_token = Confirm::with_theme(&theme)
        .with_prompt("  Protect the API with a bearer token?")
        .default(false)
        .interact()
        .context("Failed to read token prompt input")?;

    let api_token = if require_token {
        let token: String = Input::with_theme(&theme)
            .with_prompt("  Enter the token")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Token must not be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .context("Failed to read token")?;
        println!("  ✓ Token configured");
        Some(token.trim().to_string())
    } else {
        println!("  ✓ API left open (no token)");
        None
    };

    println!("\n[3/3] Database location");
    let default_db_path = Config::default().db_path.display().to_string();
    let db_path_input: String = Input::with_theme(&theme)
        .with_prompt("  SQLite database file")
        .default(default_db_path)
        .interact_text()
        .context("Failed to read database path")?;

    let db_path = expand_home(&db_path_input);
    println!("  ✓ {}", db_path.display());

    let config = Config {
        db_path,
        api_port,
        api_token,
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.db_path)?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run noted serve to start the API server.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
