use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use super::ReportError;
use crate::leads::{DayMetrics, Lead};

#[derive(Debug, Serialize)]
struct LeadSheetRow<'a> {
    #[serde(rename = "Business")]
    business: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Email Sent")]
    email_sent: &'static str,
    #[serde(rename = "Opened")]
    opened: &'static str,
    #[serde(rename = "Clicked")]
    clicked: &'static str,
    #[serde(rename = "Replied")]
    replied: &'static str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Phone")]
    phone: &'a str,
    #[serde(rename = "Google Maps")]
    google_maps: &'a str,
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    #[serde(rename = "Metric")]
    metric: &'static str,
    #[serde(rename = "Value")]
    value: i64,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn lead_sheet_csv(leads: &[Lead]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if leads.is_empty() {
        writer.write_record([
            "Business",
            "Category",
            "Location",
            "Email Sent",
            "Opened",
            "Clicked",
            "Replied",
            "Status",
            "Phone",
            "Google Maps",
        ])?;
    }
    for lead in leads {
        writer.serialize(LeadSheetRow {
            business: &lead.business_name,
            category: lead.category.as_deref().unwrap_or(""),
            location: lead.city.clone().unwrap_or_default(),
            email_sent: yes_no(lead.email_sent_at.is_some()),
            opened: yes_no(lead.first_opened_at.is_some()),
            clicked: yes_no(lead.first_clicked_at.is_some()),
            replied: yes_no(lead.first_replied_at.is_some()),
            status: lead.status.label(),
            phone: lead.phone.as_deref().unwrap_or(""),
            google_maps: lead.google_maps_url.as_deref().unwrap_or(""),
        })?;
    }
    finish(writer)
}

pub fn summary_csv(metrics: &DayMetrics) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (metric, value) in [
        ("Total leads discovered", metrics.leads_discovered),
        ("Qualified leads", metrics.leads_qualified),
        ("Emails sent", metrics.emails_sent),
        ("Emails opened", metrics.emails_opened),
        ("Links clicked", metrics.links_clicked),
        ("Replies received", metrics.replies_received),
    ] {
        writer.serialize(SummaryRow { metric, value })?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ReportError> {
    writer
        .into_inner()
        .map_err(|err| ReportError::Io(err.into_error()))
}

/// Paths of the two report attachments for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub summary: PathBuf,
    pub leads: PathBuf,
}

impl ReportFiles {
    pub fn for_date(dir: &Path, date: NaiveDate) -> Self {
        let stem = format!("LeadGen_Report_{}", date.format("%Y-%m-%d"));
        Self {
            summary: dir.join(format!("{stem}_Summary.csv")),
            leads: dir.join(format!("{stem}_Leads.csv")),
        }
    }

    pub fn paths(&self) -> [&Path; 2] {
        [&self.summary, &self.leads]
    }
}

pub async fn write_report_files(
    dir: &Path,
    date: NaiveDate,
    metrics: &DayMetrics,
    leads: &[Lead],
) -> Result<ReportFiles, ReportError> {
    let files = ReportFiles::for_date(dir, date);
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&files.summary, summary_csv(metrics)?).await?;
    tokio::fs::write(&files.leads, lead_sheet_csv(leads)?).await?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::{LeadStatus, NewLead};
    use chrono::Utc;

    fn lead(name: &str) -> Lead {
        Lead::from_new(
            NewLead {
                place_id: name.to_string(),
                business_name: name.to_string(),
                category: Some("Gyms".to_string()),
                city: Some("Pune".to_string()),
                phone: Some("020 555".to_string()),
                ..NewLead::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn lead_sheet_has_headers_and_yes_no_flags() {
        let mut clicked = lead("Iron Temple, Baner");
        clicked.status = LeadStatus::Clicked;
        clicked.email_sent_at = Some(Utc::now());
        clicked.first_opened_at = Some(Utc::now());
        clicked.first_clicked_at = Some(Utc::now());

        let csv = String::from_utf8(lead_sheet_csv(&[clicked]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Business,Category,Location,Email Sent,Opened,Clicked,Replied,Status,Phone,Google Maps")
        );
        assert_eq!(
            lines.next(),
            Some("\"Iron Temple, Baner\",Gyms,Pune,Yes,Yes,Yes,No,clicked,020 555,")
        );
    }

    #[test]
    fn empty_lead_sheet_still_has_headers() {
        let csv = String::from_utf8(lead_sheet_csv(&[]).unwrap()).unwrap();
        assert!(csv.starts_with("Business,Category"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn summary_lists_every_metric() {
        let metrics = DayMetrics {
            leads_discovered: 12,
            emails_sent: 4,
            links_clicked: 1,
            ..DayMetrics::default()
        };
        let csv = String::from_utf8(summary_csv(&metrics).unwrap()).unwrap();
        assert!(csv.starts_with("Metric,Value\n"));
        assert!(csv.contains("Total leads discovered,12"));
        assert!(csv.contains("Links clicked,1"));
        assert_eq!(csv.lines().count(), 7);
    }

    #[tokio::test]
    async fn report_files_are_named_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        let files = write_report_files(dir.path(), date, &DayMetrics::default(), &[lead("A")])
            .await
            .unwrap();

        assert!(files
            .summary
            .ends_with("LeadGen_Report_2025-06-03_Summary.csv"));
        assert!(files.leads.exists());
    }
}
