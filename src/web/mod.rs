//! Local web preview of the dashboard.
//!
//! Runs the refresh schedule into a [`SharedDisplay`] and serves it with a
//! lightweight sync HTTP server (`tiny_http`):
//! - `GET /` the latest rendered page
//! - `GET /api/overview` overview slots and table as JSON
//! - `GET /api/health` server and backend status
//! - `POST /api/refresh` requests an immediate cycle
//!
//! Launched via `segdash serve` (default: `http://127.0.0.1:9747`).

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::api::HttpBackend;
use crate::config::DashboardConfig;
use crate::controller::Dashboard;
use crate::display::{PageOptions, SharedDisplay, render_page};
use crate::scheduler;

/// Seconds between automatic page reloads in the browser.
const PAGE_RELOAD_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the refresh schedule and serve the dashboard on `addr`.
///
/// Blocks the current thread. Requests are handled sequentially, which is
/// plenty for a local single-user preview.
pub fn serve(addr: &str, config: &DashboardConfig) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    let display = SharedDisplay::new();
    let backend = HttpBackend::from_config(&config.backend);
    let dashboard = Dashboard::from_config(backend, display.clone(), config);
    let handle = scheduler::start(
        dashboard,
        Duration::from_secs(config.refresh.interval_secs.max(1)),
    );

    println!("segdash dashboard running at http://{addr}");
    println!("Backend: {}", config.backend.base_url);
    println!("Press Ctrl+C to stop.\n");

    let url = format!("http://{addr}");
    let _ = open_browser(&url);

    let trigger = || handle.trigger();
    let ctx = WebContext {
        display: &display,
        trigger: &trigger,
        backend_url: &config.backend.base_url,
    };

    for request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let response = dispatch(&method, &url, &ctx).unwrap_or_else(|e| ApiResponse {
            status: 500,
            content_type: JSON,
            body: json!({ "error": e.to_string() }).to_string().into_bytes(),
        });

        let status = response.status;
        let _ = request.respond(response.into_http());

        // Brief access log
        println!(
            "{} {} {} {}",
            method,
            url,
            status,
            chrono::Local::now().format("%H:%M:%S")
        );
    }

    handle.stop().map(|_| ())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// What the request handlers can see.
pub struct WebContext<'a> {
    pub display: &'a SharedDisplay,
    /// Requests an immediate cycle; `false` if the schedule is gone.
    pub trigger: &'a dyn Fn() -> bool,
    pub backend_url: &'a str,
}

const JSON: &str = "application/json; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

/// A response before it is handed to `tiny_http`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json(status: u16, value: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            status,
            content_type: JSON,
            body: serde_json::to_vec(value).context("failed to serialize response")?,
        })
    }

    fn into_http(self) -> Response<std::io::Cursor<Vec<u8>>> {
        let response = Response::from_data(self.body).with_status_code(StatusCode(self.status));
        match Header::from_bytes("Content-Type", self.content_type) {
            Ok(header) => response.with_header(header),
            Err(()) => response,
        }
    }
}

/// Dispatch an incoming request to the appropriate handler.
pub fn dispatch(method: &Method, url: &str, ctx: &WebContext<'_>) -> Result<ApiResponse> {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(page(ctx)),
        (&Method::Get, "/api/overview") => overview(ctx),
        (&Method::Get, "/api/health") => health(ctx),
        (&Method::Post, "/api/refresh") => refresh(ctx),
        _ => ApiResponse::json(404, &json!({ "error": "not found" })),
    }
}

fn page(ctx: &WebContext<'_>) -> ApiResponse {
    let options = PageOptions {
        auto_reload_secs: Some(PAGE_RELOAD_SECS),
        refresh_endpoint: Some("/api/refresh".to_string()),
        ..PageOptions::default()
    };
    ApiResponse {
        status: 200,
        content_type: HTML,
        body: render_page(&ctx.display.snapshot(), &options).into_bytes(),
    }
}

fn overview(ctx: &WebContext<'_>) -> Result<ApiResponse> {
    let state = ctx.display.snapshot();
    ApiResponse::json(
        200,
        &json!({
            "loading": state.loading,
            "updated_at": state.updated_at.map(|t| t.to_rfc3339()),
            "slots": state.slots,
            "table": state.table,
            "alert": state.active_alert,
        }),
    )
}

fn health(ctx: &WebContext<'_>) -> Result<ApiResponse> {
    let state = ctx.display.snapshot();
    ApiResponse::json(
        200,
        &json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "backend": ctx.backend_url,
            "loading": state.loading,
            "updated_at": state.updated_at.map(|t| t.to_rfc3339()),
            "charts": state.charts.len(),
        }),
    )
}

fn refresh(ctx: &WebContext<'_>) -> Result<ApiResponse> {
    if (ctx.trigger)() {
        ApiResponse::json(202, &json!({ "status": "scheduled" }))
    } else {
        ApiResponse::json(503, &json!({ "error": "refresh worker is not running" }))
    }
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::display::{DisplayTarget, Slot};

    fn body_json(response: &ApiResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn routes_by_method_and_path() {
        let mut display = SharedDisplay::new();
        display.set_text(Slot::TotalClients, "200");
        let calls = Cell::new(0);
        let trigger = || {
            calls.set(calls.get() + 1);
            true
        };
        let ctx = WebContext {
            display: &display,
            trigger: &trigger,
            backend_url: "http://127.0.0.1:5000",
        };

        let page = dispatch(&Method::Get, "/?x=1", &ctx).unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.content_type, HTML);
        assert!(String::from_utf8(page.body).unwrap().contains("<p id=\"total-clients\">200</p>"));

        let overview = dispatch(&Method::Get, "/api/overview", &ctx).unwrap();
        assert_eq!(body_json(&overview)["slots"]["total-clients"], "200");
        assert!(body_json(&overview)["alert"].is_null());

        let health = dispatch(&Method::Get, "/api/health", &ctx).unwrap();
        assert_eq!(body_json(&health)["status"], "ok");
        assert_eq!(body_json(&health)["backend"], "http://127.0.0.1:5000");

        let refresh = dispatch(&Method::Post, "/api/refresh", &ctx).unwrap();
        assert_eq!(refresh.status, 202);
        assert_eq!(calls.get(), 1);

        assert_eq!(dispatch(&Method::Get, "/api/refresh", &ctx).unwrap().status, 404);
        assert_eq!(dispatch(&Method::Get, "/nope", &ctx).unwrap().status, 404);
    }

    #[test]
    fn refresh_reports_stopped_worker() {
        let display = SharedDisplay::new();
        let trigger = || false;
        let ctx = WebContext {
            display: &display,
            trigger: &trigger,
            backend_url: "",
        };
        assert_eq!(dispatch(&Method::Post, "/api/refresh", &ctx).unwrap().status, 503);
    }
}
