use anyhow::{Context, Result, bail};
use chrono::Utc;
use finboard_api::{ApiClient, TokenStore};
use finboard_core::{Credentials, Registration};
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s).context("read stdin")?;
    Ok(s.trim().to_string())
}

fn email_or_prompt(email: Option<String>) -> Result<String> {
    match email {
        Some(e) => Ok(e),
        None => prompt("Email"),
    }
}

/// Password from `FINBOARD_PASSWORD` when set (for scripts), otherwise
/// prompted. Input is echoed.
fn password() -> Result<String> {
    if let Ok(p) = std::env::var("FINBOARD_PASSWORD") {
        return Ok(p);
    }
    prompt("Password")
}

pub async fn register(api: &ApiClient, email: Option<String>, full_name: Option<String>) -> Result<()> {
    let registration = Registration {
        email: email_or_prompt(email)?,
        password: password()?,
        full_name,
    };
    let user = api.register(&registration).await?;
    println!("Registered {} ({})", user.email, user.id);
    println!("Next: finboard auth login --email {}", user.email);
    Ok(())
}

pub async fn login(api: &ApiClient, email: Option<String>) -> Result<()> {
    let credentials = Credentials {
        email: email_or_prompt(email)?,
        password: password()?,
    };
    api.login(&credentials).await?;
    println!("Logged in as {}", credentials.email);
    Ok(())
}

pub async fn refresh(api: &ApiClient) -> Result<()> {
    if api.tokens().load().is_none() {
        bail!("not logged in. Run: finboard auth login");
    }
    api.refresh().await?;
    println!("Session refreshed");
    Ok(())
}

pub fn logout(api: &ApiClient) {
    api.logout();
    println!("Logged out");
}

pub fn status(api: &ApiClient) {
    match api.tokens().load() {
        None => println!("Not logged in"),
        Some(t) if t.is_expired(Utc::now()) => {
            println!("Session expired at {}. Run: finboard auth login", t.expires_at)
        }
        Some(t) => println!("Logged in (session valid until {})", t.expires_at),
    }
}
