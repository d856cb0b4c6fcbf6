use actix_web::HttpResponse;

/// Formats an error followed by every source in its chain.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;

    let mut current = e.source();

    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t({})", cause)?;
        current = cause.source();
    }

    Ok(())
}

#[derive(serde::Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

pub fn error_response(status: actix_web::http::StatusCode, reason: &str) -> HttpResponse {
    HttpResponse::build(status).json(ErrorBody { error: reason })
}
