//! Planventure CLI - a terminal front end for the Planventure trip planner.
//!
//! The CLI plays the part of the web pages: a login form, a registration
//! form, and protected pages (trips, arbitrary API reads) that render only
//! behind the route gate.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use planventure_core::models::{AuthPayload, LoginRequest, RegisterRequest};
use planventure_core::{
    ApiClient, ApiError, Config, ErrorKind, Gated, History, Navigator, RouteGate, SessionManager,
    LOGIN_ROUTE,
};

const USAGE: &str = "\
Usage: planventure <command>

Commands:
  login [username]            Log in (prompts for missing values)
  register <username> <email> Create an account
  verify <token>              Verify an email address and log in
  resend <email>              Resend the verification email
  logout                      Forget the stored session
  status                      Show the current session
  trips                       List your trips
  get <path>                  GET an API path and print the JSON
  health                      Check that the API is reachable

Environment:
  PLANVENTURE_API_BASE_URL    API address (default http://localhost:5000)
  PLANVENTURE_STORAGE         file | keyring | memory (default file)
  PLANVENTURE_DATA_DIR        Directory for the file store
  PLANVENTURE_USERNAME        Default username for login
  PLANVENTURE_PASSWORD        Password for non-interactive login
  RUST_LOG                    Log filter (default warn)";

/// Route shown when the CLI starts
const HOME_ROUTE: &str = "/";

/// Route of the trips page
const TRIPS_ROUTE: &str = "/trips";

#[derive(Debug, PartialEq)]
enum Command {
    Login { username: Option<String> },
    Register { username: String, email: String },
    Verify { token: String },
    Resend { email: String },
    Logout,
    Status,
    Trips,
    Get { path: String },
    Health,
}

impl Command {
    fn parse(args: &[String]) -> Result<Option<Self>> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(None);
        };
        let arg = |i: usize, what: &str| {
            rest.get(i)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Missing {} for `{}`\n\n{}", what, name, USAGE))
        };

        let command = match name.as_str() {
            "login" => Command::Login {
                username: rest.first().cloned(),
            },
            "register" => Command::Register {
                username: arg(0, "username")?,
                email: arg(1, "email")?,
            },
            "verify" => Command::Verify {
                token: arg(0, "token")?,
            },
            "resend" => Command::Resend {
                email: arg(0, "email")?,
            },
            "logout" => Command::Logout,
            "status" => Command::Status,
            "trips" => Command::Trips,
            "get" => Command::Get {
                path: arg(0, "path")?,
            },
            "health" => Command::Health,
            "help" | "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("Unknown command `{}`\n\n{}", other, USAGE),
        };
        Ok(Some(command))
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

struct App {
    session: Arc<SessionManager>,
    history: Arc<History>,
    api: ApiClient,
}

impl App {
    fn new(config: &Config) -> Result<Self> {
        let store = config.open_store()?;
        let session = Arc::new(SessionManager::new(store));
        session.initialize();

        let history = Arc::new(History::new(HOME_ROUTE));
        let api = ApiClient::new(config, Arc::clone(&session), history.clone())?;

        Ok(Self {
            session,
            history,
            api,
        })
    }

    async fn run(&self, command: Command) -> Result<()> {
        debug!(?command, "Running command");
        match command {
            Command::Login { username } => self.login(username).await,
            Command::Register { username, email } => self.register(username, email).await,
            Command::Verify { token } => {
                let payload = self.api.verify_email(&token).await?;
                self.adopt(&payload)
            }
            Command::Resend { email } => {
                let response = self.api.resend_verification(&email).await?;
                print_message(&response, "Verification email sent");
                Ok(())
            }
            Command::Logout => {
                self.session.logout();
                println!("Logged out.");
                Ok(())
            }
            Command::Status => {
                self.status();
                Ok(())
            }
            Command::Trips => self.trips().await,
            Command::Get { path } => {
                self.open_protected(&path)?;
                let value: Value = self.guarded(self.api.get(&path).await)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Command::Health => {
                let value = self.api.health().await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| std::env::var("PLANVENTURE_USERNAME").ok()) {
            Some(username) if !username.is_empty() => username,
            _ => prompt_username()?,
        };
        let password = match std::env::var("PLANVENTURE_PASSWORD") {
            Ok(password) if !password.is_empty() => password,
            _ => prompt_password()?,
        };
        if username.is_empty() || password.is_empty() {
            anyhow::bail!("Username and password required");
        }

        println!("Authenticating...");
        let payload = self
            .api
            .login(&LoginRequest { username, password })
            .await
            .map_err(login_failure)?;
        self.adopt(&payload)
    }

    async fn register(&self, username: String, email: String) -> Result<()> {
        let password = prompt_password()?;
        let payload = self
            .api
            .register(&RegisterRequest {
                username,
                email,
                password,
            })
            .await?;

        if payload.access_credential().is_some() {
            return self.adopt(&payload);
        }
        println!(
            "{}",
            payload
                .message
                .as_deref()
                .unwrap_or("Registration successful. Please verify your email.")
        );
        Ok(())
    }

    /// Hand a server auth payload to the session manager.
    fn adopt(&self, payload: &AuthPayload) -> Result<()> {
        self.session
            .login(payload)
            .context("Server response could not be used to log in")?;
        info!("Login successful");

        let name = payload
            .user
            .as_ref()
            .map(|u| u.display_name().to_string())
            .unwrap_or_else(|| "you".to_string());
        println!("Logged in as {}.", name);
        Ok(())
    }

    fn status(&self) {
        let session = self.session.current_session();
        println!("API:        {}", self.api.base_url());
        if !session.is_authenticated() {
            println!("Session:    not logged in");
            return;
        }
        println!("Session:    logged in");
        if let Some(ref user) = session.user {
            println!("User:       {}", user.display_name());
            if let Some(ref email) = user.email {
                println!("Email:      {}", email);
            }
            if let Some(last_login) = user.last_login_at() {
                println!("Last login: {}", last_login.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        println!(
            "Refresh:    {}",
            if session.refresh_token.is_some() { "stored" } else { "none" }
        );
    }

    // =========================================================================
    // Protected pages
    // =========================================================================

    /// Navigate to a protected route through the route gate.
    fn open_protected(&self, route: &str) -> Result<()> {
        self.history.navigate(route);
        let gate = RouteGate::new(&self.session);
        match gate.render(self.history.as_ref(), |_| ()) {
            Gated::Rendered(()) => Ok(()),
            Gated::Redirected(to) => anyhow::bail!(
                "{} requires a session (redirected to {}). Run `planventure login` first.",
                route,
                to
            ),
            Gated::Pending => anyhow::bail!("Session state is not known yet"),
        }
    }

    async fn trips(&self) -> Result<()> {
        self.open_protected(TRIPS_ROUTE)?;

        let cached_id = self.session.current_session().user.and_then(|u| u.id);
        let user_id = match cached_id {
            Some(id) => id,
            None => self
                .guarded(self.api.current_user().await)?
                .id
                .context("Server did not return a user id")?,
        };

        let trips: Value = self.guarded(self.api.get(&format!("/users/{}/trips", user_id)).await)?;
        match trips.as_array() {
            Some(list) if list.is_empty() => println!("No trips yet."),
            _ => println!("{}", serde_json::to_string_pretty(&trips)?),
        }
        Ok(())
    }

    /// Pass a protected page's result through, explaining a forced logout.
    fn guarded<T>(&self, result: Result<T, ApiError>) -> Result<T> {
        result.map_err(|e| {
            if e.kind() == ErrorKind::Unauthorized && self.history.current() == LOGIN_ROUTE {
                anyhow::anyhow!("{} Run `planventure login`.", e)
            } else {
                e.into()
            }
        })
    }
}

/// Translate a failed login into a message for the form.
fn login_failure(e: ApiError) -> anyhow::Error {
    match e.kind() {
        ErrorKind::Unauthorized => anyhow::anyhow!("Invalid username or password"),
        ErrorKind::Network => {
            anyhow::anyhow!("Unable to connect to server. Check your internet connection.")
        }
        _ => anyhow::anyhow!("Login failed: {}", e),
    }
}

fn print_message(response: &Value, fallback: &str) {
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(fallback);
    println!("{}", message);
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args)? else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::from_env()?;
    debug!(api = %config.api_base_url, storage = ?config.storage, "Config loaded");

    let app = App::new(&config)?;
    app.run(command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), None);
        assert_eq!(Command::parse(&args(&["--help"])).unwrap(), None);
        assert_eq!(
            Command::parse(&args(&["login"])).unwrap(),
            Some(Command::Login { username: None })
        );
        assert_eq!(
            Command::parse(&args(&["login", "ana"])).unwrap(),
            Some(Command::Login {
                username: Some("ana".to_string())
            })
        );
        assert_eq!(
            Command::parse(&args(&["register", "ana", "ana@example.com"])).unwrap(),
            Some(Command::Register {
                username: "ana".to_string(),
                email: "ana@example.com".to_string()
            })
        );
        assert_eq!(
            Command::parse(&args(&["get", "/trips/3"])).unwrap(),
            Some(Command::Get {
                path: "/trips/3".to_string()
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse(&args(&["register", "ana"])).is_err());
        assert!(Command::parse(&args(&["get"])).is_err());
        assert!(Command::parse(&args(&["teleport"])).is_err());
    }

    #[test]
    fn test_login_failure_messages() {
        assert_eq!(
            login_failure(ApiError::Unauthorized).to_string(),
            "Invalid username or password"
        );
        let validation = ApiError::Validation {
            status: 400,
            message: "Missing username or password".to_string(),
        };
        assert_eq!(
            login_failure(validation).to_string(),
            "Login failed: Missing username or password"
        );
    }

    #[test]
    fn test_protected_page_requires_session() {
        let config = Config {
            storage: planventure_core::config::StorageBackend::Memory,
            ..Config::default()
        };
        let app = App::new(&config).unwrap();

        let err = app.open_protected(TRIPS_ROUTE).unwrap_err();
        assert!(err.to_string().contains("requires a session"));
        assert_eq!(app.history.current(), LOGIN_ROUTE);

        app.adopt(&AuthPayload {
            token: Some("abc".to_string()),
            ..Default::default()
        })
        .unwrap();
        app.open_protected(TRIPS_ROUTE).unwrap();
        assert_eq!(app.history.current(), TRIPS_ROUTE);
    }
}
