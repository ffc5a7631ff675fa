use colored::Colorize;

use crate::error::Result;
use crate::settings::{config_dir, load_settings, load_stored_settings, save_settings, set_value};

pub fn show() -> Result<()> {
    let settings = load_settings();
    let token = match settings.api_token.as_deref() {
        Some(t) if !t.is_empty() => mask(t),
        _ => "(not set)".to_string(),
    };
    println!("Config dir:    {}", config_dir().display());
    println!("base_url:      {}", settings.base_url);
    println!("api_token:     {token}");
    println!("export_dir:    {}", settings.export_dir);
    println!("timeout_secs:  {}", settings.timeout_secs);
    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    // Environment overrides are not written back.
    let mut settings = load_stored_settings();
    set_value(&mut settings, key, value)?;
    save_settings(&settings)?;
    tracing::info!(key, "setting updated");
    println!("{} {key}", "Updated".green());
    Ok(())
}

/// Keep the last four characters of a token visible.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask("secret-token-1234"), "****1234");
    }
}
