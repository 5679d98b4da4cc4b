//! HTML page generation
//!
//! Renders a [`PageModel`] as one self-contained page: inline CSS, inline
//! SVG charts, and a plain GET form for the sidebar. No JavaScript; the
//! rotation timer is a `<meta http-equiv="refresh">` that is emitted only
//! while auto-rotation is on.

use crate::analyzer::{
    format_number, ChartMetric, Domains, KpiSummary, MetricMode, Profile, Selector,
};
use crate::charts::{self, year_label};
use crate::dashboard::{PageModel, ReadyView, ViewOutcome};
use crate::geo;
use crate::models::{Field, Record};
use crate::wheel;

/// Render the whole dashboard page.
pub fn render_page(page: &PageModel) -> String {
    let refresh = match &page.outcome {
        ViewOutcome::Ready(view) if view.state.auto_rotate => format!(
            r#"<meta http-equiv="refresh" content="{secs};url={url}">"#,
            secs = page.settings.refresh_interval_secs,
            url = html_escape(&page.request.href_with("/", &[("action", "tick")])),
        ),
        _ => String::new(),
    };

    let main = match &page.outcome {
        ViewOutcome::Empty => {
            r#"<div class="notice warning" id="empty">No data for these filters.</div>"#.to_string()
        }
        ViewOutcome::Ready(view) => render_ready(page, view),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    {refresh}
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <aside class="sidebar">{sidebar}</aside>
    <main class="content">
        {header}
        {profile}
        {main}
    </main>
</body>
</html>"#,
        refresh = refresh,
        title = html_escape(&page.settings.title),
        css = inline_css(),
        sidebar = render_sidebar(page),
        header = render_header(page),
        profile = page.profile.as_ref().map(render_profile).unwrap_or_default(),
        main = main,
    )
}

fn render_header(page: &PageModel) -> String {
    let logo = if page.settings.logo_available {
        r#"<img src="/logo" alt="Institution logo" class="logo">"#.to_string()
    } else {
        format!(
            r#"<div class="notice info" id="logo-missing">{} not found. Please place it in the app directory.</div>"#,
            html_escape(&page.settings.logo_name)
        )
    };
    format!(
        r#"<header class="header">{logo}<h1>{title}</h1></header>"#,
        logo = logo,
        title = html_escape(&page.settings.title),
    )
}

fn render_sidebar(page: &PageModel) -> String {
    let request = page.request;
    let mut form = String::from(
        r#"<form method="get" action="/" id="filters"><input type="hidden" name="submitted" value="1"><h2>Participant</h2>"#,
    );

    form.push_str(&format!(
        r#"<label><input type="checkbox" name="eligible_only"{checked}> Show only participants with &ge; {hours} hours ({count})</label>"#,
        checked = checked(request.eligible_only),
        hours = format_number(page.settings.eligibility_hours),
        count = page.eligible_count,
    ));

    let mut names = String::from(r#"<option value="">All participants</option>"#);
    for name in &page.name_options {
        names.push_str(&option(name, name, page.name == Some(*name)));
    }
    form.push_str(&format!(
        r#"<label>Search by Name<select name="name">{names}</select></label><h2>Filters</h2>"#
    ));

    form.push_str(&render_domain_filters(&page.domains, page));
    form.push_str(&render_metric_controls(page));

    if let ViewOutcome::Ready(view) = &page.outcome {
        let mut types = String::new();
        for label in view.labels.iter() {
            types.push_str(&option(label, label, view.state.selected_types.contains(label)));
        }
        form.push_str(&format!(
            r#"<h2>Participation</h2><input type="hidden" name="pts_field" value="1"><label><input type="checkbox" name="select_all_pts"> Select all participation types</label><label>Participation types<select name="pts" multiple size="{size}">{types}</select></label><label><input type="checkbox" name="auto"{auto}> Auto-rotate</label>"#,
            size = view.labels.len().min(8),
            auto = checked(view.state.auto_rotate),
        ));
    }

    form.push_str(r#"<button type="submit" name="action" value="apply">Apply</button></form>"#);
    form
}

fn render_domain_filters(domains: &Domains, page: &PageModel) -> String {
    let criteria = &page.request.criteria;

    let years: Vec<(String, String, bool)> = domains
        .years
        .iter()
        .map(|y| (y.to_string(), year_label(*y), criteria.years.admits(y)))
        .collect();
    let schools: Vec<(String, String, bool)> = domains
        .schools
        .iter()
        .map(|s| (s.clone(), s.clone(), criteria.schools.admits(s)))
        .collect();
    let states: Vec<(String, String, bool)> = domains
        .states
        .iter()
        .map(|s| (s.clone(), s.clone(), criteria.states.admits(s)))
        .collect();

    [
        multiselect("all_years", "Select All Years", "year", "Year", &years, &criteria.years),
        multiselect(
            "all_schools",
            "Select All Schools",
            "school",
            "School",
            &schools,
            &criteria.schools,
        ),
        multiselect(
            "all_states",
            "Select All State/Central",
            "state",
            "State/Central",
            &states,
            &criteria.states,
        ),
    ]
    .concat()
}

fn multiselect<T: Ord>(
    all_name: &str,
    all_label: &str,
    name: &str,
    label: &str,
    options: &[(String, String, bool)],
    selector: &Selector<T>,
) -> String {
    let body: String = options
        .iter()
        .map(|(value, text, selected)| option(value, text, *selected))
        .collect();
    format!(
        r#"<label><input type="checkbox" name="{all_name}"{all_checked}> {all_label}</label><label>{label}<select name="{name}" multiple size="{size}">{body}</select></label>"#,
        all_checked = checked(selector.is_all()),
        size = options.len().clamp(1, 6),
    )
}

fn render_metric_controls(page: &PageModel) -> String {
    let kpis = &page.request.kpis;
    let select = |name: &str, label: &str, current: MetricMode| {
        let body: String = MetricMode::ALL
            .iter()
            .map(|mode| option(mode.param(), mode.label(), *mode == current))
            .collect();
        format!(r#"<label>{label}<select name="{name}">{body}</select></label>"#)
    };
    let chart: String = ChartMetric::ALL
        .iter()
        .map(|m| option(m.param(), m.label(), *m == page.request.chart_metric))
        .collect();

    format!(
        r#"<h2>Metrics</h2>{sessions}{hours}{participants}<label>Chart metric<select name="chart_metric">{chart}</select></label>"#,
        sessions = select("metric_sessions", "Sessions", kpis.sessions),
        hours = select("metric_hours", "Hours", kpis.hours),
        participants = select("metric_participants", "Participants", kpis.participants),
    )
}

fn render_profile(profile: &Profile) -> String {
    let item = |key: &str, value: &str| {
        format!("<li><strong>{}</strong>: {}</li>", key, html_escape(value))
    };
    let total = profile.total_hours.map(|h| format!("{} hrs", format_number(h)));
    let trainings = (!profile.trainings.is_empty()).then(|| profile.trainings.join(", "));

    let lines: String = [
        ("Name", Some(profile.name.as_str())),
        ("Designation", profile.designation.as_deref()),
        ("Email", profile.email.as_deref()),
        ("Phone", profile.contact_number.as_deref()),
        ("Gender", profile.gender.as_deref()),
        ("Total Hours Completed", total.as_deref()),
        ("School", profile.school.as_deref()),
        ("State", profile.state.as_deref()),
        ("Trainings Attended", trainings.as_deref()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| item(key, v)))
    .collect();

    let certificate = match &profile.certificate {
        Some(cert) => format!(
            r#"<div class="notice success">Eligible for Certificate of Completion</div>
<section class="certificate" id="certificate"><h3>Certificate of Completion</h3>
<p>This is to certify that <strong>{name}</strong> has successfully completed training(s) at <strong>Rashtriya Raksha University</strong>.</p>
<ul><li><strong>Training(s)</strong>: {trainings}</li><li><strong>Total Duration</strong>: {hours} Hours</li></ul></section>"#,
            name = html_escape(&cert.name),
            trainings = html_escape(&cert.trainings.join(", ")),
            hours = format_number(cert.total_hours),
        ),
        None => String::new(),
    };

    format!(
        r#"<section class="profile" id="profile"><h2>Participant Profile</h2><ul>{}</ul>{}</section>"#,
        lines, certificate
    )
}

fn render_ready(page: &PageModel, view: &ReadyView) -> String {
    let request = page.request;
    let showing = if view.state.selected_types.is_empty() {
        "None".to_string()
    } else {
        view.state
            .selected_types
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let nav = format!(
        r#"<nav class="rotation"><a class="button" id="prev" href="{prev}">&#9664; Prev</a><a class="button" id="next" href="{next}">Next &#9654;</a></nav><h3 id="showing">Currently showing <strong>{showing}</strong></h3>"#,
        prev = html_escape(&request.href_with("/", &[("action", "prev")])),
        next = html_escape(&request.href_with("/", &[("action", "next")])),
        showing = html_escape(&showing),
    );

    let wheel = wheel::render_wheel_svg(
        &view.slots,
        page.settings.wheel_radius,
        |label| request.href_with("/", &[("pt", label)]),
        &request.href_with("/", &[("action", "pause")]),
    );

    let bars = if view.rows.is_empty() {
        r#"<div class="notice warning">No data to display.</div>"#.to_string()
    } else {
        let metric = request.chart_metric;
        format!(
            "<h3>Yearly Comparison by School</h3>{}",
            charts::render_bar_chart_svg(
                &view.bars,
                &format!("{} by School & Year", metric.label()),
                metric.label(),
            )
        )
    };

    let map = if view.bubbles.is_empty() {
        r#"<div class="notice info">No data for map view.</div>"#.to_string()
    } else {
        geo::render_bubble_map_svg(&view.bubbles)
    };

    format!(
        r#"{nav}
{kpis}
<div class="columns"><div class="column">{wheel}</div><div class="column">{bars}</div></div>
<section class="map"><h3>Geographic Spread of Participants (State/Central)</h3>{map}</section>
{raw}
<p><a class="button" id="export" href="{export}">Download CSV</a></p>"#,
        nav = nav,
        kpis = render_kpis(page, &view.kpis),
        wheel = wheel,
        bars = bars,
        map = map,
        raw = render_raw_table(&view.rows),
        export = html_escape(&request.href_with("/export.csv", &[])),
    )
}

fn render_kpis(page: &PageModel, kpis: &KpiSummary) -> String {
    let modes = &page.request.kpis;
    let card = |value: String, caption: String| {
        format!(
            r#"<div class="card"><div class="value">{}</div><div class="caption">{}</div></div>"#,
            html_escape(&value),
            html_escape(&caption)
        )
    };
    format!(
        r#"<div class="card-container" id="kpis">{}{}{}{}{}</div>"#,
        card(kpis.sessions.to_string(), format!("{} Sessions", modes.sessions.label())),
        card(kpis.hours.to_string(), format!("{} Hours", modes.hours.label())),
        card(kpis.participants.to_string(), format!("{} Participants", modes.participants.label())),
        card(format_number(kpis.female as f64), "Female Participants".to_string()),
        card(format_number(kpis.male as f64), "Male Participants".to_string()),
    )
}

fn render_raw_table(rows: &[&Record]) -> String {
    let head: String = Field::ALL
        .iter()
        .map(|f| format!("<th>{}</th>", f.canonical_name()))
        .collect();
    let body: String = rows
        .iter()
        .map(|record| {
            let cells: String = Field::ALL
                .iter()
                .map(|f| format!("<td>{}</td>", html_escape(&record.field_text(*f))))
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    format!(
        r#"<details id="raw-data"><summary>Show raw data ({count} rows)</summary><div class="table-wrap"><table><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table></div></details>"#,
        count = rows.len(),
    )
}

fn option(value: &str, text: &str, selected: bool) -> String {
    format!(
        r#"<option value="{}"{}>{}</option>"#,
        html_escape(value),
        if selected { " selected" } else { "" },
        html_escape(text)
    )
}

fn checked(on: bool) -> &'static str {
    if on {
        " checked"
    } else {
        ""
    }
}

/// Escape text for HTML element content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn inline_css() -> &'static str {
    r#"
* { box-sizing: border-box; }
body {
    margin: 0;
    display: flex;
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    color: #1f2933;
    background: #ffffff;
}
.sidebar {
    width: 300px;
    min-height: 100vh;
    padding: 20px;
    background: #f0f2f6;
    font-size: 14px;
}
.sidebar label { display: block; margin: 8px 0; }
.sidebar select { width: 100%; margin-top: 4px; }
.sidebar h2 { font-size: 16px; margin: 18px 0 6px; }
.content { flex: 1; padding: 24px 32px; max-width: 1400px; }
.header { display: flex; align-items: center; gap: 16px; }
.header h1 { font-size: 28px; color: #0a2b49; }
.logo { height: 72px; }
.notice { padding: 12px 16px; border-radius: 8px; margin: 12px 0; }
.notice.info { background: #e8f1fb; color: #0b4a8b; }
.notice.warning { background: #fff8e1; color: #8a6d00; }
.notice.success { background: #e7f6ec; color: #1b6b36; }
.button {
    display: inline-block;
    padding: 6px 14px;
    margin-right: 8px;
    border: 1px solid #c7ccd4;
    border-radius: 6px;
    text-decoration: none;
    color: #1f2933;
}
.card-container { display: flex; gap: 20px; flex-wrap: wrap; margin: 16px 0; }
.card {
    flex: 1;
    min-width: 180px;
    background: #f9f9f9;
    border-radius: 12px;
    box-shadow: 0 1px 6px rgba(0,0,0,0.1);
    padding: 20px;
    text-align: center;
}
.card:hover { background: #e6f0ff; }
.card .value { font-size: 26px; font-weight: 600; color: #0a2b49; }
.card .caption { font-size: 14px; color: #666; }
.columns { display: flex; gap: 24px; flex-wrap: wrap; }
.column { flex: 1; min-width: 420px; }
#wheel .wedge { cursor: pointer; }
.bar-chart, .bubble-map { width: 100%; height: auto; }
.certificate { border: 2px solid #0a2b49; border-radius: 8px; padding: 12px 20px; }
.table-wrap { overflow-x: auto; }
table { border-collapse: collapse; font-size: 12px; }
th, td { border: 1px solid #e1e4e8; padding: 4px 8px; text-align: left; }
"#
}
