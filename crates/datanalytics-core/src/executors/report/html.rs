//! HTML rendering of a dataset profile.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};

use super::profile::DatasetProfile;

const TEMPLATE_NAME: &str = "report.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; margin-bottom: 1.5em; }
th, td { border: 1px solid #ccc; padding: 0.3em 0.6em; text-align: left; }
.muted { color: #777; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<p class="muted">Generated {{ generated_at }}</p>
<h2>Overview</h2>
<table>
<tr><th>Rows</th><td>{{ profile.rows }}</td></tr>
<tr><th>Columns</th><td>{{ profile.columns | length }}</td></tr>
<tr><th>Missing cells</th><td>{{ missing_cells }}</td></tr>
</table>
{% for column in profile.columns %}
<h2>{{ column.name }}</h2>
<table>
<tr><th>Type</th><td>{{ column.summary.kind }}</td></tr>
<tr><th>Present</th><td>{{ column.present }}</td></tr>
<tr><th>Missing</th><td>{{ column.missing }}</td></tr>
<tr><th>Distinct</th><td>{{ column.distinct }}</td></tr>
{% if column.summary.kind == "numeric" %}
<tr><th>Min</th><td>{{ column.summary.min }}</td></tr>
<tr><th>Max</th><td>{{ column.summary.max }}</td></tr>
<tr><th>Mean</th><td>{{ column.summary.mean | round(precision=4) }}</td></tr>
<tr><th>Median</th><td>{{ column.summary.median }}</td></tr>
{% if column.summary.std_dev %}<tr><th>Std dev</th><td>{{ column.summary.std_dev | round(precision=4) }}</td></tr>{% endif %}
{% elif column.summary.kind == "categorical" %}
{% for entry in column.summary.top %}<tr><th>{{ entry.value }}</th><td>{{ entry.count }}</td></tr>
{% endfor %}
{% endif %}
</table>
{% endfor %}
</body>
</html>
"#;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Tera template rendering error: {0}")]
    Tera(#[from] tera::Error),
}

#[derive(Serialize)]
struct ReportView<'a> {
    title: &'a str,
    generated_at: String,
    missing_cells: usize,
    profile: &'a DatasetProfile,
}

/// Renders profiles with a built-in template. Values are HTML-escaped.
pub struct ReportRenderer {
    tera: Tera,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        tera.autoescape_on(vec![TEMPLATE_NAME]);
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        title: &str,
        profile: &DatasetProfile,
        generated_at: DateTime<Utc>,
    ) -> Result<String, RenderError> {
        let view = ReportView {
            title,
            generated_at: generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            missing_cells: profile.missing_cells(),
            profile,
        };
        let context = Context::from_serialize(&view)?;
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::report::profile::profile_table;
    use crate::ports::Table;
    use chrono::TimeZone;

    #[test]
    fn renders_columns_and_escapes_values() {
        let table = Table::new(
            vec!["score".into(), "label".into()],
            vec![
                vec!["1.5".into(), "<b>a</b>".into()],
                vec!["2.5".into(), "b".into()],
            ],
        );
        let profile = profile_table(&table);
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        let html = ReportRenderer::new()
            .unwrap()
            .render("alice_proj1", &profile, at)
            .unwrap();

        assert!(html.contains("<h1>alice_proj1</h1>"));
        assert!(html.contains("Generated 2024-01-02 12:00:00 UTC"));
        assert!(html.contains("<h2>score</h2>"));
        assert!(html.contains("numeric"));
        assert!(html.contains("&lt;b&gt;a&lt;&#x2F;b&gt;"));
        assert!(!html.contains("<b>a</b>"));
    }
}
