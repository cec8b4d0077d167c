//! HTML rendering for the dashboard.
//!
//! Pages are plain server-rendered HTML with a small inline stylesheet.
//! Navigation is done with links and GET forms, so every state the browser
//! can reach is addressable by URL.

use crate::table::{Cell, PagerView, TableRender};

/// Escape text for HTML bodies and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Informational strip above the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Error(String),
    /// Non-error empty result.
    NoData(String),
    Info(String),
}

pub fn render_banner(banner: &Banner) -> String {
    let (class, body) = match banner {
        Banner::Error(message) => (
            "banner banner-error",
            format!("<strong>Error: </strong><span>{}</span>", escape_html(message)),
        ),
        Banner::NoData(message) => ("banner banner-nodata", format!("<span>{}</span>", escape_html(message))),
        Banner::Info(message) => ("banner banner-info", format!("<span>{}</span>", escape_html(message))),
    };
    format!(r#"<div class="{class}" role="alert">{body}</div>"#)
}

/// URLs used by the pager.
pub trait PagerLinks {
    fn page_href(&self, page: usize) -> String;
    fn page_size_href(&self, page_size: usize) -> String;
    /// Target of the jump-to-page form.
    fn form_action(&self) -> String;
    /// Query parameters the jump-to-page form must carry along.
    fn hidden_fields(&self) -> Vec<(String, String)>;
}

pub fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text { text } => escape_html(text),
        Cell::Badge { label, class } => format!(
            r#"<span class="badge {}">{}</span>"#,
            escape_html(class),
            escape_html(label)
        ),
        Cell::Meter { fill, label, class } => format!(
            r#"<div class="meter"><div class="meter-track"><div class="meter-fill {}" style="width: {:.0}%"></div></div><span>{}</span></div>"#,
            escape_html(class),
            fill.clamp(0.0, 100.0),
            escape_html(label)
        ),
        Cell::Link { label, href, title } => format!(
            r#"<a class="map-link" href="{}" title="{}" target="_blank" rel="noopener">{}</a>"#,
            escape_html(href),
            escape_html(title),
            escape_html(label)
        ),
    }
}

pub fn render_table(render: &TableRender, links: &dyn PagerLinks) -> String {
    match render {
        TableRender::Loading { message } => format!(
            r#"<div class="table-state"><div class="spinner"></div><p>{}</p></div>"#,
            escape_html(message)
        ),
        TableRender::Empty { message } => format!(
            r#"<div class="table-state"><p>{}</p></div>"#,
            escape_html(message)
        ),
        TableRender::Rows {
            search,
            headers,
            rows,
            pager,
        } => {
            let mut html = String::from(r#"<div class="table-card">"#);

            if let Some(search) = search {
                html.push_str(&format!(
                    r#"<form class="table-search" method="get" action="{}"><input type="text" name="table_search" placeholder="{}" value="{}"></form>"#,
                    escape_html(&links.form_action()),
                    escape_html(&search.placeholder),
                    escape_html(&search.term)
                ));
            }

            html.push_str("<table><thead><tr>");
            for header in headers {
                html.push_str(&format!(
                    r#"<th class="{}">{}</th>"#,
                    escape_html(header.class.as_deref().unwrap_or("")),
                    escape_html(&header.label)
                ));
            }
            html.push_str("</tr></thead><tbody>");

            for row in rows {
                html.push_str(&format!(r#"<tr data-key="{}">"#, escape_html(&row.key)));
                for cell in &row.cells {
                    html.push_str(&format!(
                        r#"<td class="{}">{}</td>"#,
                        escape_html(cell.class.as_deref().unwrap_or("")),
                        render_cell(&cell.cell)
                    ));
                }
                html.push_str("</tr>");
            }
            html.push_str("</tbody></table>");

            if let Some(pager) = pager {
                html.push_str(&render_pager(pager, links));
            }

            html.push_str("</div>");
            html
        }
    }
}

fn nav_button(label: &str, target: Option<String>, class: &str) -> String {
    match target {
        Some(href) => format!(
            r#"<a class="page-btn {class}" href="{}">{}</a>"#,
            escape_html(&href),
            escape_html(label)
        ),
        None => format!(
            r#"<span class="page-btn disabled {class}">{}</span>"#,
            escape_html(label)
        ),
    }
}

fn render_pager(pager: &PagerView, links: &dyn PagerLinks) -> String {
    let mut html = String::from(r#"<div class="pager">"#);

    html.push_str(&format!(
        r#"<p class="pager-summary">Showing <b>{}</b> to <b>{}</b> of <b>{}</b> results</p>"#,
        pager.first_index, pager.last_index, pager.total_records
    ));

    html.push_str(r#"<div class="page-sizes">"#);
    for &size in &pager.page_size_options {
        if size == pager.page_size {
            html.push_str(&format!(
                r#"<span class="page-size active">{size} per page</span>"#
            ));
        } else {
            html.push_str(&format!(
                r#"<a class="page-size" href="{}">{size} per page</a>"#,
                escape_html(&links.page_size_href(size))
            ));
        }
    }
    html.push_str("</div>");

    html.push_str(r#"<nav class="pages" aria-label="Pagination">"#);
    let previous = pager.current_page.saturating_sub(1);
    let next = pager.current_page + 1;
    html.push_str(&nav_button(
        "« First",
        pager.has_previous.then(|| links.page_href(1)),
        "first",
    ));
    html.push_str(&nav_button(
        "‹ Prev",
        pager.has_previous.then(|| links.page_href(previous)),
        "prev",
    ));
    for &page in &pager.window {
        let target = (page != pager.current_page).then(|| links.page_href(page));
        let class = if page == pager.current_page {
            "number current"
        } else {
            "number"
        };
        html.push_str(&nav_button(&page.to_string(), target, class));
    }
    html.push_str(&nav_button(
        "Next ›",
        pager.has_next.then(|| links.page_href(next)),
        "next",
    ));
    html.push_str(&nav_button(
        "Last »",
        pager.has_next.then(|| links.page_href(pager.total_pages)),
        "last",
    ));
    html.push_str(&format!(
        r#"<span class="page-of">Page {} of {}</span>"#,
        pager.current_page, pager.total_pages
    ));

    html.push_str(&format!(
        r#"<form class="jump" method="get" action="{}">"#,
        escape_html(&links.form_action())
    ));
    for (name, value) in links.hidden_fields() {
        html.push_str(&format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            escape_html(&name),
            escape_html(&value)
        ));
    }
    html.push_str(&format!(
        r#"<input type="text" name="jump" inputmode="numeric" pattern="[0-9]*" placeholder="Go to" value="{}"><button type="submit">Go</button></form>"#,
        escape_html(&pager.jump_input)
    ));

    html.push_str("</nav></div>");
    html
}

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f9fafb; color: #1f2937; display: flex; flex-direction: column; min-height: 100vh; }
nav.top { background: #1f2937; color: #fff; padding: 0 24px; height: 64px; display: flex; align-items: center; justify-content: space-between; }
nav.top a { color: #fff; text-decoration: none; margin-left: 12px; }
main { flex: 1; padding: 32px 24px; }
footer { background: #1f2937; color: #fff; text-align: center; padding: 16px; }
.banner { padding: 12px 16px; border-radius: 4px; margin-bottom: 16px; border: 1px solid; }
.banner-error { background: #fee2e2; border-color: #f87171; color: #b91c1c; }
.banner-nodata { background: #fef9c3; border-color: #facc15; color: #a16207; }
.banner-info { background: #dbeafe; border-color: #60a5fa; color: #1d4ed8; }
.filters { background: #fff; padding: 16px; border-radius: 8px; margin-bottom: 24px; display: flex; flex-wrap: wrap; gap: 12px; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th, td { padding: 12px 16px; text-align: left; border-bottom: 1px solid #e5e7eb; font-size: 14px; }
.badge { padding: 2px 8px; border-radius: 9999px; font-size: 12px; font-weight: 600; }
.tone-warning { background: #fef9c3; color: #854d0e; }
.tone-danger { background: #fee2e2; color: #991b1b; }
.tone-ok { background: #dcfce7; color: #166534; }
.tone-info { background: #dbeafe; color: #1e40af; }
.meter { display: flex; align-items: center; gap: 8px; }
.meter-track { width: 64px; height: 8px; background: #e5e7eb; border-radius: 9999px; overflow: hidden; }
.meter-fill { height: 100%; }
.battery-critical { background: #ef4444; }
.battery-low { background: #eab308; }
.battery-ok { background: #22c55e; }
.battery-unknown { background: #d1d5db; }
.table-state { text-align: center; padding: 48px; color: #6b7280; }
.pager { display: flex; flex-wrap: wrap; justify-content: space-between; align-items: center; padding: 12px 16px; background: #fff; }
.page-btn { padding: 6px 10px; border: 1px solid #d1d5db; text-decoration: none; color: #374151; }
.page-btn.disabled { color: #d1d5db; }
.page-btn.current { background: #2563eb; color: #fff; }
.page-size { margin-right: 8px; }
.page-size.active { font-weight: 600; }
"#;

/// Wrap a body in the site shell: navigation bar, main area and footer.
pub fn page_shell(title: &str, body: &str, year: i32) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<nav class="top"><span><b>TrackingSystem</b></span><span><a href="/">Dashboard</a><a href="/alerts">Alerts</a></span></nav>
<main>
{body}
</main>
<footer><p>&copy; {year} Tracking System. All rights reserved.</p></footer>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

/// Body of the landing page.
pub fn landing_body() -> String {
    r#"<div class="landing" style="text-align: center; padding-top: 96px;">
<h1>Dashboard</h1>
<p>Welcome to the device tracking system</p>
<a class="page-btn current" href="/alerts">View Alerts</a>
</div>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{HeaderCell, RenderedCell, RenderedRow};

    struct TestLinks;

    impl PagerLinks for TestLinks {
        fn page_href(&self, page: usize) -> String {
            format!("/t?page={page}")
        }

        fn page_size_href(&self, page_size: usize) -> String {
            format!("/t?limit={page_size}")
        }

        fn form_action(&self) -> String {
            "/t".to_string()
        }

        fn hidden_fields(&self) -> Vec<(String, String)> {
            vec![("imei".to_string(), "7\"0".to_string())]
        }
    }

    fn rows_render(current_page: usize, total_pages: usize) -> TableRender {
        TableRender::Rows {
            search: None,
            headers: vec![HeaderCell {
                label: "IMEI".to_string(),
                class: None,
            }],
            rows: vec![RenderedRow {
                key: "k1".to_string(),
                cells: vec![RenderedCell {
                    cell: Cell::text("<b>700</b>"),
                    class: None,
                }],
            }],
            pager: Some(PagerView {
                current_page,
                total_pages,
                page_size: 10,
                page_size_options: vec![10, 25],
                total_records: total_pages * 10,
                first_index: (current_page - 1) * 10 + 1,
                last_index: current_page * 10,
                window: crate::pagination::page_window(current_page, total_pages),
                has_previous: current_page > 1,
                has_next: current_page < total_pages,
                jump_input: String::new(),
            }),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_render_table_escapes_cells() {
        let html = render_table(&rows_render(1, 3), &TestLinks);

        assert!(html.contains("&lt;b&gt;700&lt;/b&gt;"));
        assert!(html.contains(r#"<tr data-key="k1">"#));
        assert!(html.contains(r#"name="imei" value="7&quot;0""#));
    }

    #[test]
    fn test_pager_disables_edges() {
        let html = render_table(&rows_render(1, 3), &TestLinks);
        assert!(html.contains(r#"<span class="page-btn disabled first">"#));
        assert!(html.contains(r#"href="/t?page=3""#));
        assert!(html.contains("Page 1 of 3"));
        assert!(html.contains(r#"<span class="page-size active">10 per page</span>"#));
        assert!(html.contains(r#"href="/t?limit=25""#));

        let html = render_table(&rows_render(3, 3), &TestLinks);
        assert!(html.contains(r#"<span class="page-btn disabled last">"#));
    }

    #[test]
    fn test_render_states() {
        let loading = TableRender::Loading {
            message: "Loading alerts...".to_string(),
        };
        assert!(render_table(&loading, &TestLinks).contains("Loading alerts..."));

        let empty = TableRender::Empty {
            message: "No <alerts>".to_string(),
        };
        assert!(render_table(&empty, &TestLinks).contains("No &lt;alerts&gt;"));
    }

    #[test]
    fn test_render_cells() {
        let meter = Cell::Meter {
            fill: 140.0,
            label: "N/A".to_string(),
            class: "battery-unknown".to_string(),
        };
        assert!(render_cell(&meter).contains("width: 100%"));

        let link = Cell::Link {
            label: "Map".to_string(),
            href: "/map?lat=1&lng=2".to_string(),
            title: "1, 2".to_string(),
        };
        assert!(render_cell(&link).contains(r#"href="/map?lat=1&amp;lng=2""#));
    }

    #[test]
    fn test_banners() {
        assert!(render_banner(&Banner::Error("boom".into())).contains("banner-error"));
        assert!(render_banner(&Banner::NoData("none".into())).contains("banner-nodata"));
        assert!(render_banner(&Banner::Info("pick".into())).contains("banner-info"));
    }
}
