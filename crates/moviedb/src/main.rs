use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

const ENDPOINTS: &str = "\
Endpoints:

POST /api/auth
    Authenticate with the server. Accepts a JSON body:
        {\"username\": \"USERNAME\", \"password\": \"PASSWORD\"}
    On success returns:
        {\"bearer\": \"TOKEN\", \"timeout\": TOKEN_LIFETIME}

GET /api/movies/$YEAR/$PAGE
    Requires the bearer token in the Authorization header.
    Returns a JSON list of up to 10 movies.";

#[derive(Parser)]
#[command(
    name = "moviedb",
    about = "Serves movie lists via a REST API",
    after_long_help = ENDPOINTS,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the movie database HTTP server
    Serve {
        /// Port to listen on (default: $MOVIEDB_PORT or 8080)
        #[arg(long, env = "MOVIEDB_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $MOVIEDB_HOST or 0.0.0.0)
        #[arg(long, env = "MOVIEDB_HOST", default_value = "0.0.0.0")]
        host: String,
    },
    /// Count the movies a server holds for each year
    Count {
        /// Year(s) to count
        #[arg(required = true)]
        years: Vec<i32>,
        /// Server URL
        #[arg(long, env = "MOVIEDB_SERVER", default_value = "http://localhost:8080")]
        server: String,
        #[arg(long, default_value = "username")]
        username: String,
        #[arg(long, default_value = "password")]
        password: String,
        /// Per-request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MOVIEDB_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(host, port).await,
        Commands::Count {
            years,
            server,
            username,
            password,
            timeout,
        } => {
            let client =
                MovieClient::new(&server, &username, &password, Duration::from_secs(timeout))?;
            cmd_count(client, years).await
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "movie database rest server");

    let cfg = moviedb_server::ServerConfig {
        host,
        port,
        ..Default::default()
    };

    moviedb_server::run(cfg).await
}

async fn cmd_count(mut client: MovieClient, mut years: Vec<i32>) -> Result<()> {
    let present = chrono::Local::now().year();
    validate_years(&years, present)?;
    years.sort_unstable();

    println!("Connecting to server: {}", client.server);
    let results = count_years(&mut client, &years).await;

    println!("\nResults:");
    println!("{}", "-".repeat(20));
    for (year, count) in results {
        println!("{year}: {count} movies");
    }
    Ok(())
}

/// Count each year in turn. A year that fails is reported and counted as 0;
/// the remaining years are still queried.
async fn count_years(client: &mut MovieClient, years: &[i32]) -> Vec<(i32, usize)> {
    let mut results = Vec::with_capacity(years.len());
    for &year in years {
        match client.count_movies(year).await {
            Ok(count) => {
                println!("Querying year {year}... found {count} movies");
                results.push((year, count));
            }
            Err(e) => {
                eprintln!("Error querying year {year}: {e:#}");
                results.push((year, 0));
            }
        }
    }
    results
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Full pages hold this many records; a shorter page is the last one.
const PAGE_SIZE: usize = 10;

fn validate_years(years: &[i32], present: i32) -> Result<()> {
    if let Some(bad) = years.iter().find(|y| !(1800..=present).contains(*y)) {
        anyhow::bail!("invalid year {bad}: expected 1800..={present}");
    }
    Ok(())
}

#[derive(Deserialize)]
struct AuthResponse {
    bearer: String,
    timeout: u64,
}

struct CachedToken {
    bearer: String,
    timeout: Duration,
    issued_at: Instant,
}

impl CachedToken {
    /// Renew a second early so a token never expires in flight.
    fn is_stale(&self) -> bool {
        self.issued_at.elapsed() + Duration::from_secs(1) >= self.timeout
    }
}

struct MovieClient {
    http: Client,
    server: String,
    username: String,
    password: String,
    token: Option<CachedToken>,
}

impl MovieClient {
    fn new(server: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            token: None,
        })
    }

    async fn authenticate(&mut self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/api/auth", self.server))
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .context("HTTP request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let json: Value = resp.json().await.unwrap_or_default();
            anyhow::bail!(
                "authentication failed ({status}): {}",
                json["error"].as_str().unwrap_or("")
            );
        }

        let auth: AuthResponse = resp.json().await.context("parse auth response")?;
        let bearer = auth.bearer.clone();
        self.token = Some(CachedToken {
            bearer: auth.bearer,
            timeout: Duration::from_secs(auth.timeout),
            issued_at: Instant::now(),
        });
        Ok(bearer)
    }

    async fn bearer(&mut self) -> Result<String> {
        match &self.token {
            Some(t) if !t.is_stale() => Ok(t.bearer.clone()),
            _ => self.authenticate().await,
        }
    }

    /// One page of movies; an empty list when the year or page does not exist.
    async fn movies_page(&mut self, year: i32, page: u32) -> Result<Vec<Value>> {
        let bearer = self.bearer().await?;
        let resp = self
            .http
            .get(format!("{}/api/movies/{year}/{page}", self.server))
            .bearer_auth(bearer)
            .send()
            .await
            .context("HTTP request failed")?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            s if s.is_success() => resp.json().await.context("parse movies page"),
            s => anyhow::bail!("server returned {s} for {year}/{page}"),
        }
    }

    async fn count_movies(&mut self, year: i32) -> Result<usize> {
        let mut total = 0;
        for page in 1.. {
            let movies = self.movies_page(year, page).await?;
            total += movies.len();
            if movies.len() < PAGE_SIZE {
                break;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(n: usize) -> Value {
        Value::Array((0..n).map(|i| serde_json::json!({"title": format!("m{i}")})).collect())
    }

    async fn mount_auth(mock: &MockServer, timeout: u64) {
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bearer": "tok",
                "timeout": timeout
            })))
            .mount(mock)
            .await;
    }

    fn client(mock: &MockServer) -> MovieClient {
        MovieClient::new(&mock.uri(), "username", "password", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn year_bounds() {
        assert!(validate_years(&[1800, 1999, 2024], 2024).is_ok());
        assert!(validate_years(&[1799], 2024).is_err());
        assert!(validate_years(&[1999, 2025], 2024).is_err());
    }

    #[tokio::test]
    async fn counts_until_short_page() {
        let mock = MockServer::start().await;
        mount_auth(&mock, 10).await;
        Mock::given(method("GET"))
            .and(path("/api/movies/1999/1"))
            .and(bearer_token("tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(10)))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/movies/1999/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(3)))
            .mount(&mock)
            .await;

        let mut client = client(&mock);
        assert_eq!(client.count_movies(1999).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn not_found_ends_the_year() {
        let mock = MockServer::start().await;
        mount_auth(&mock, 10).await;
        Mock::given(method("GET"))
            .and(path("/api/movies/2000/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(10)))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/movies/2000/2"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "year or page not found"
            })))
            .mount(&mock)
            .await;

        let mut client = client(&mock);
        assert_eq!(client.count_movies(2000).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn token_is_reused_while_fresh() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bearer": "tok",
                "timeout": 10
            })))
            .expect(1)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0)))
            .mount(&mock)
            .await;

        let mut client = client(&mock);
        client.count_movies(1999).await.unwrap();
        client.count_movies(2000).await.unwrap();
    }

    #[tokio::test]
    async fn short_lived_token_is_renewed() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bearer": "tok",
                "timeout": 1
            })))
            .expect(2)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0)))
            .mount(&mock)
            .await;

        let mut client = client(&mock);
        client.count_movies(1999).await.unwrap();
        client.count_movies(2000).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_credentials_surface_the_error() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid username or password"
            })))
            .mount(&mock)
            .await;

        let mut client =
            MovieClient::new(&mock.uri(), "username", "nope", Duration::from_secs(10)).unwrap();
        let err = client.count_movies(1999).await.unwrap_err();
        assert!(err.to_string().contains("invalid username or password"));
    }

    #[tokio::test]
    async fn failing_year_does_not_stop_the_rest() {
        let mock = MockServer::start().await;
        mount_auth(&mock, 10).await;
        Mock::given(method("GET"))
            .and(path("/api/movies/1999/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/movies/2000/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(4)))
            .mount(&mock)
            .await;

        let mut client = client(&mock);
        let results = count_years(&mut client, &[1999, 2000]).await;
        assert_eq!(results, vec![(1999, 0), (2000, 4)]);
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"bearer": "tok", "timeout": 10}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock)
            .await;

        let mut client =
            MovieClient::new(&mock.uri(), "username", "password", Duration::from_millis(200))
                .unwrap();
        let started = Instant::now();
        assert!(client.count_movies(1999).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
