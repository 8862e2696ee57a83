use hearth_domain::config::{Config, ConfigSeverity};

/// Print every validation issue in `config`.  Returns `false` when any of
/// them is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    for issue in &issues {
        println!("{issue}");
    }
    println!(
        "\n{errors} error(s), {} warning(s) in {config_path}",
        issues.len() - errors
    );

    errors == 0
}

/// The resolved config, defaults included, as TOML.
pub fn render(config: &Config) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_defaults_parse_back() {
        let text = render(&Config::default()).unwrap();
        assert!(text.contains("[heartbeat]"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.store.session_key, "companion");
        assert!(parsed.is_valid());
    }

    #[test]
    fn validate_reports_errors() {
        let mut config = Config::default();
        assert!(validate(&config, "hearth.toml"));
        config.backend.base_url = String::new();
        assert!(!validate(&config, "hearth.toml"));
    }
}
