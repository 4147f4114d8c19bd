use anyhow::Context;
use clap::Parser;
use servicemesh_api::api::jwt::JwtService;
use servicemesh_api::config::AppConfig;

/// Mint a bearer token for the servicemesh API.
///
/// Reads SECRET_KEY and ACCESS_TOKEN_EXPIRE_MINUTES from the environment
/// (or a .env file), the same way the server does.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Subject claim of the token
    #[arg(long, default_value = "admin")]
    sub: String,

    /// Print an OAuth-style JSON body instead of the bare token
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let jwt = JwtService::from_config(&config)
        .context("SECRET_KEY is not set; the API accepts unauthenticated requests")?;
    let token = jwt.issue(&args.sub)?;

    if args.json {
        let body = serde_json::json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": jwt.ttl().as_secs(),
        });
        println!("{}", body);
    } else {
        println!("{}", token);
    }

    Ok(())
}
