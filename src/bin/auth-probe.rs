use clap::{Parser, ValueEnum};

use auth_relay::config::SchemeKind;

#[derive(Parser)]
#[command(name = "auth-probe")]
#[command(about = "Request a protected resource through a running auth-relay", long_about = None)]
struct Cli {
    /// Relay address, as printed by auth-relay on startup.
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    proxy: String,

    /// Scheme whose protected resource to fetch.
    #[arg(short, long, value_enum, default_value_t = Scheme::Digest)]
    scheme: Scheme,

    /// Origin hostname the request is addressed to.
    #[arg(long, default_value = "www.seleniumhq-test.test")]
    host: String,

    #[arg(long, default_value_t = 5000)]
    port: u16,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scheme {
    Digest,
    Ntlm,
}

impl From<Scheme> for SchemeKind {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Digest => SchemeKind::Digest,
            Scheme::Ntlm => SchemeKind::Ntlm,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let scheme = SchemeKind::from(cli.scheme);

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(&cli.proxy)?)
        .build()?;

    let url = format!("http://{}:{}{}", cli.host, cli.port, scheme.probe_path());
    let res = client.get(&url).send().await?;

    let status = res.status();
    let body = res.text().await?;
    println!("GET {} -> {}", url, status);
    println!("{}", body);

    if !status.is_success() {
        eprintln!("Error: relay delivered status {} for {} authentication", status, scheme);
        std::process::exit(1);
    }
    Ok(())
}
