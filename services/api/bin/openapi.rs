use std::path::PathBuf;
use tutor_api::router::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

/// Writes the tutoring API's OpenAPI document to the path given as the
/// first argument, or `openapi.json` in the working directory.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let doc = ApiDoc::openapi();
    std::fs::write(&output, doc.to_pretty_json()?)?;
    println!(
        "Wrote {} paths to {}",
        doc.paths.paths.len(),
        output.display()
    );
    Ok(())
}
