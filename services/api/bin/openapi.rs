//! Writes the service's OpenAPI document to disk, for clients that generate
//! bindings without running the server.

use sparring_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("wrote {path}");
    Ok(())
}
