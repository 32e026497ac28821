use axum::{extract::State, response::Html};
use chrono::{DateTime, Utc};
use shared::types::ServiceSnapshot;
use crate::api::routes::{AppState, ApiError};

/// Human-readable view over the same listing the JSON API serves
pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let services = state
        .registry
        .list()
        .await
        .map_err(crate::api::routes::store_error)?;

    Ok(Html(render_dashboard(&services, Utc::now())))
}

fn render_dashboard(services: &[ServiceSnapshot], now: DateTime<Utc>) -> String {
    let mut rows = String::new();
    for s in services {
        rows.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            if s.status == shared::types::ServiceStatus::Up { "up" } else { "down" },
            s.id,
            escape(&s.name),
            escape(&s.address),
            s.status,
            s.last_heartbeat.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }

    if rows.is_empty() {
        rows.push_str("<tr><td colspan=\"5\" class=\"empty\">No services registered</td></tr>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Service Registry</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; min-width: 40em; }}
th, td {{ border: 1px solid #ccc; padding: 0.4em 0.8em; text-align: left; }}
tr.up td:nth-child(4) {{ color: #2a7f2a; font-weight: bold; }}
tr.down td:nth-child(4) {{ color: #b02a2a; font-weight: bold; }}
td.empty {{ color: #888; font-style: italic; }}
.server-time {{ color: #555; }}
</style>
</head>
<body>
<h1>Service Registry</h1>
<p class="server-time">Server time: {}</p>
<table>
<tr><th>ID</th><th>Name</th><th>Address</th><th>Status</th><th>Last heartbeat</th></tr>
{}</table>
</body>
</html>
"#,
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        rows,
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::ServiceStatus;

    fn snapshot(name: &str, status: ServiceStatus) -> ServiceSnapshot {
        ServiceSnapshot {
            id: 1,
            name: name.to_string(),
            address: "10.0.0.1:80".to_string(),
            status,
            last_heartbeat: Utc::now(),
        }
    }

    #[test]
    fn test_render_lists_services() {
        let html = render_dashboard(
            &[snapshot("svcA", ServiceStatus::Up), snapshot("svcB", ServiceStatus::Down)],
            Utc::now(),
        );
        assert!(html.contains("svcA"));
        assert!(html.contains("UP"));
        assert!(html.contains("svcB"));
        assert!(html.contains("DOWN"));
        assert!(html.contains("Server time:"));
    }

    #[test]
    fn test_render_empty_registry() {
        let html = render_dashboard(&[], Utc::now());
        assert!(html.contains("No services registered"));
    }

    #[test]
    fn test_render_escapes_values() {
        let html = render_dashboard(
            &[snapshot("<script>alert(1)</script>", ServiceStatus::Up)],
            Utc::now(),
        );
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
