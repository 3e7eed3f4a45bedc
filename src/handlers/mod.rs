pub mod google_oauth;

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// GET / -> the static landing page that starts the consent flow.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
