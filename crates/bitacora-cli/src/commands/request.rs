//! Request command implementation.

use anyhow::{Context, Result, bail};
use bitacora::http::{ApiRequest, Method};
use clap::Args;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API base URL (e.g. /activities)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", short = 'q')]
    pub query: Vec<String>,
}

pub async fn run(args: RequestArgs, api_url: &str) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let mut request = ApiRequest::new(method, &args.path);
    for pair in &args.query {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid query parameter '{pair}', expected key=value");
        };
        request = request.query(key, value);
    }
    if let Some(data) = &args.data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(&body)?;
    }

    let client = session::client(api_url)?;
    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            output::notice(&client.notice_for(&e));
            return Err(e).context("Request failed");
        }
    };

    match response.json::<serde_json::Value>() {
        Ok(body) => output::json_pretty(&body)?,
        Err(_) if response.body.is_empty() => {}
        Err(_) => println!("{}", response.text()),
    }

    Ok(())
}
