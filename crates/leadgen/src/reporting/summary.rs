use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::leads::DayMetrics;

pub fn report_subject(date: NaiveDate, metrics: &DayMetrics) -> String {
    format!(
        "[LeadGen] Daily Report - {} | {} sent | {} clicks",
        date.format("%Y-%m-%d"),
        metrics.emails_sent,
        metrics.links_clicked
    )
}

pub fn render_report_html(date: NaiveDate, metrics: &DayMetrics) -> String {
    let mut html = String::new();
    writeln!(
        html,
        "<html><body><h2>Daily Lead Generation Report: {}</h2>",
        date.format("%Y-%m-%d")
    )
    .expect("write report heading");
    html.push_str(
        "<table border=\"1\" cellpadding=\"5\" style=\"border-collapse: collapse;\">\
         <tr><th>Metric</th><th>Value</th></tr>",
    );
    for (label, value) in [
        ("Leads Discovered", metrics.leads_discovered),
        ("Leads Qualified", metrics.leads_qualified),
        ("Emails Sent", metrics.emails_sent),
        ("Emails Opened", metrics.emails_opened),
        ("Links Clicked", metrics.links_clicked),
        ("Replies Received", metrics.replies_received),
    ] {
        writeln!(html, "<tr><td>{label}</td><td>{value}</td></tr>").expect("write metric row");
    }
    html.push_str("</table><p>The summary and lead detail sheets are attached.</p></body></html>");
    html
}
