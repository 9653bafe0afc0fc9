//! Resolving server connection settings for the client commands

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use pumpkins::client::Credentials;
use pumpkins::host::Host;
use pumpkins::infrastructure::Config;

use super::ConnectionArgs;

/// Asks for a value on the terminal; `None` when stdin is not a terminal
fn prompt(label: &str) -> Result<Option<String>> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(None);
    }

    let mut stderr = io::stderr();
    write!(stderr, "{label}: ").context("Failed to write prompt")?;
    stderr.flush().context("Failed to write prompt")?;

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("Failed to read from terminal")?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    Ok((!value.is_empty()).then_some(value))
}

/// Flags first, then configuration; `ask` fills in what is still missing
fn resolve_credentials(
    args: &ConnectionArgs,
    config: &Config,
    ask: impl Fn(&str) -> Result<Option<String>>,
) -> Result<Option<Credentials>> {
    let username = match args.user.clone().or_else(|| config.username.clone()) {
        Some(user) => user,
        None => match ask("Username")? {
            Some(user) => user,
            None => return Ok(None),
        },
    };
    let password = match args.password.clone().or_else(|| config.password.clone()) {
        Some(password) => password,
        None => ask("Password")?.unwrap_or_default(),
    };
    Ok(Some(Credentials::new(username, password)))
}

/// Host for the connection flags, falling back to `config`
pub fn host(args: &ConnectionArgs, config: &Config) -> Result<Host> {
    let url = args.url.as_deref().unwrap_or(&config.url);
    let credentials = resolve_credentials(args, config, prompt)?;
    Host::new(url, credentials).with_context(|| format!("Invalid Jenkins URL: {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn never(_: &str) -> Result<Option<String>> {
        Ok(None)
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            username: Some("config-user".to_string()),
            password: Some("config-pass".to_string()),
            ..Config::default()
        };
        let args = ConnectionArgs {
            user: Some("flag-user".to_string()),
            ..ConnectionArgs::default()
        };

        let creds = resolve_credentials(&args, &config, never).unwrap().unwrap();

        assert_eq!(creds, Credentials::new("flag-user", "config-pass"));
    }

    #[test]
    fn test_missing_user_without_terminal_is_anonymous() {
        let creds = resolve_credentials(&ConnectionArgs::default(), &Config::default(), never).unwrap();
        assert_eq!(creds, None);
    }

    #[test]
    fn test_missing_password_is_prompted() {
        let args = ConnectionArgs {
            user: Some("admin".to_string()),
            ..ConnectionArgs::default()
        };

        let creds = resolve_credentials(&args, &Config::default(), |label| {
            assert_eq!(label, "Password");
            Ok(Some("typed".to_string()))
        })
        .unwrap();

        assert_eq!(creds, Some(Credentials::new("admin", "typed")));
    }

    #[test]
    fn test_invalid_url_is_reported() {
        let args = ConnectionArgs {
            url: Some("ftp://example.com".to_string()),
            user: Some("u".to_string()),
            password: Some("p".to_string()),
        };
        assert!(host(&args, &Config::default()).is_err());
    }
}
