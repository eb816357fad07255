use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "console-cli")]
#[command(about = "Smoke-test client for the console gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CONSOLE_GATEWAY_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Send this access token as a bearer instead of relying on cookies.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Log in, then run follow-up requests on the same cookie session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// API path to GET after login (repeatable)
        #[arg(long = "then")]
        then: Vec<String>,
        /// Log out once the follow-up requests are done
        #[arg(long)]
        logout: bool,
    },
    /// GET an API path, e.g. `coupons` or `/api/shops/1`
    Get { path: String },
    /// DELETE an API path
    Delete { path: String },
    /// Log out and print the cleared cookies
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::builder().cookie_store(true).build()?;
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/healthz", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Login {
            email,
            password,
            then,
            logout,
        } => {
            let res = traced(client.post(format!("{}/api/auth/login", base)))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            let logged_in = res.status().is_success();
            print_response(res).await?;
            if !logged_in {
                return Ok(());
            }

            for path in then {
                let res = traced(client.get(api_url(&base, &path))).send().await?;
                print_response(res).await?;
            }
            if logout {
                let res = traced(client.post(format!("{}/api/auth/logout", base))).send().await?;
                print_response(res).await?;
            }
        }
        Commands::Get { path } => {
            let res = send(&client, Method::GET, &api_url(&base, &path), headers).await?;
            print_response(res).await?;
        }
        Commands::Delete { path } => {
            let res = send(&client, Method::DELETE, &api_url(&base, &path), headers).await?;
            print_response(res).await?;
        }
        Commands::Logout => {
            let res = traced(client.post(format!("{}/api/auth/logout", base)))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// `coupons` and `/coupons` both become `<base>/api/coupons`.
fn api_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    let path = path.strip_prefix("api/").unwrap_or(path);
    format!("{}/api/{}", base, path)
}

fn traced(builder: RequestBuilder) -> RequestBuilder {
    builder.header("x-request-id", Uuid::new_v4().to_string())
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    headers: HeaderMap,
) -> Result<reqwest::Response, reqwest::Error> {
    traced(client.request(method, url)).headers(headers).send().await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    for cookie in res.headers().get_all(reqwest::header::SET_COOKIE) {
        eprintln!("Set-Cookie: {}", cookie.to_str().unwrap_or("<non-ascii>"));
    }

    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if text.is_empty() => println!("({})", status),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
