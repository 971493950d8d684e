use crate::guard::{self, CallerIdentity, GuardDecision};
use crate::repository::ProfileRepository;
use rocket::response::Redirect;
use rocket::response::content::RawHtml;
use rocket::{Responder, State, get, routes};
use std::path::PathBuf;
use std::sync::Arc;

/// Bootstrap document served for every guarded page; the client runtime
/// renders the actual route.
const SHELL: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Staygate</title>
  <link rel="stylesheet" href="/static/app.css">
</head>
<body>
  <div id="root"></div>
  <script type="module" src="/static/app.js"></script>
</body>
</html>
"#;

#[derive(Responder)]
pub enum PageOutcome {
    Shell(RawHtml<&'static str>),
    Redirect(Redirect),
}

/// Fallback for everything no explicit route claims. Asset-shaped paths
/// fall through to the 404 catcher; page paths go through the guard.
#[get("/<path..>", rank = 20)]
pub async fn page(
    path: PathBuf,
    caller: Option<CallerIdentity>,
    profiles: &State<Arc<dyn ProfileRepository>>,
) -> Option<PageOutcome> {
    let path = format!("/{}", path.display());
    if !guard::intercepts(&path) {
        return None;
    }

    match guard::decide(&path, caller.as_ref(), profiles.inner().as_ref()).await {
        GuardDecision::PassThrough => Some(PageOutcome::Shell(RawHtml(SHELL))),
        GuardDecision::Redirect(target) => Some(PageOutcome::Redirect(Redirect::to(target))),
    }
}

pub fn page_routes() -> Vec<rocket::Route> {
    routes![page]
}
