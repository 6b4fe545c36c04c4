//! Message layout.
//!
//! Every text block that reaches the chat is built here. Builders turn
//! aggregated values into [`ReportFragment`]s; [`render`] joins fragments in
//! fixed section order, whatever order they were produced in. Output is
//! Telegram HTML.

use std::fmt::Write as _;

use crate::report::aging::AgingEntity;
use crate::report::counts::{ClosedTicketCounts, OpenTicketCounts};
use crate::report::ranking::{SlaBucket, TOP_ENTITIES};
use crate::report::summary::KipTableRow;
use crate::window::{QueryFormat, ReportWindow};

pub const SEPARATOR: &str = "-------------------------------";
pub const WIDE_SEPARATOR: &str =
    "------------------------------------------------------------------";

/// Sections in the order they appear in a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Preamble,
    Header,
    OpenTickets,
    Ranking,
    ClosedTickets,
    Aging,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFragment {
    pub section: Section,
    pub body: String,
}

impl ReportFragment {
    pub fn new(section: Section, body: impl Into<String>) -> Self {
        Self {
            section,
            body: body.into(),
        }
    }
}

/// Rule drawn around the header block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub header_rule: &'static str,
}

impl Layout {
    pub const DAILY: Layout = Layout {
        header_rule: SEPARATOR,
    };
    pub const SUMMARY: Layout = Layout {
        header_rule: WIDE_SEPARATOR,
    };
}

pub fn render(fragments: &[ReportFragment]) -> String {
    render_with(Layout::DAILY, fragments)
}

pub fn render_with(layout: Layout, fragments: &[ReportFragment]) -> String {
    let mut ordered: Vec<&ReportFragment> = fragments.iter().collect();
    ordered.sort_by_key(|fragment| fragment.section);

    let mut out = String::new();
    for fragment in ordered {
        match fragment.section {
            Section::Preamble | Section::Footer => out.push_str(&fragment.body),
            Section::Header => {
                push_line(&mut out, layout.header_rule);
                out.push_str(&fragment.body);
                push_line(&mut out, layout.header_rule);
            }
            Section::OpenTickets => {
                out.push('\n');
                out.push_str(&fragment.body);
                out.push('\n');
                push_line(&mut out, SEPARATOR);
            }
            Section::Ranking => {
                out.push('\n');
                out.push_str(&fragment.body);
                push_line(&mut out, SEPARATOR);
            }
            Section::ClosedTickets | Section::Aging => {
                out.push('\n');
                out.push_str(&fragment.body);
            }
        }
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Escape text coming from the ticket monitor before it is placed in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn report_header(window: &ReportWindow) -> ReportFragment {
    ReportFragment::new(
        Section::Header,
        format!("<b>Report {}</b>\n", window.display_range()),
    )
}

pub fn open_counts(counts: &OpenTicketCounts) -> ReportFragment {
    ReportFragment::new(
        Section::OpenTickets,
        format!(
            "• <b>Ticket - Unclosed : </b>{}\n• <b>Ticket - Open In SLA : </b>{}\n• <b>Ticket - Open Out SLA : </b>{}\n",
            counts.unclosed, counts.open_in_sla, counts.open_out_sla
        ),
    )
}

pub fn ranking(buckets: &[SlaBucket]) -> ReportFragment {
    let mut body = String::new();
    for bucket in buckets {
        let _ = write!(
            body,
            "<b>TOP {TOP_ENTITIES} KIP out of SLA {}:\n</b>",
            escape_html(&bucket.label)
        );
        for entry in &bucket.entries {
            let _ = writeln!(body, "• {}: {}", escape_html(&entry.entity), entry.count);
        }
        body.push('\n');
    }
    ReportFragment::new(Section::Ranking, body)
}

pub fn closed_counts(counts: &ClosedTicketCounts) -> ReportFragment {
    ReportFragment::new(
        Section::ClosedTickets,
        format!(
            "<b>• Ticket - Closed : </b>{}\n<b>• Ticket - Closed In SLA : </b>{}\n<b>• Ticket - Closed Out SLA : </b>{}\n",
            counts.closed, counts.closed_in_sla, counts.closed_out_sla
        ),
    )
}

/// Footer telling whether the detailed export was queued
pub fn detail_export_footer(accepted: bool, year: i32) -> ReportFragment {
    let body = if accepted {
        format!(
            "{SEPARATOR}\nReport {year} is being generated on the background and will send after complete\n{SEPARATOR}\n"
        )
    } else {
        "Failed to fetch the detailed report data.\n".to_string()
    };
    ReportFragment::new(Section::Footer, body)
}

pub fn aging_header(window: &ReportWindow) -> ReportFragment {
    ReportFragment::new(
        Section::Header,
        format!(
            "<b>Aging cluster for ticket open out of SLA </b>\n<b>{}</b>\n",
            window.display_range()
        ),
    )
}

pub fn aging_entities(entities: &[AgingEntity]) -> ReportFragment {
    let mut body = String::new();
    for entity in entities {
        let _ = writeln!(body, "<b> • {}</b>", escape_html(&entity.name));
        let _ = writeln!(body, "Total Tickets: {}", entity.total_tickets);
        body.push_str("<b>Details :</b>\n");
        for (label, count) in entity.buckets().rows() {
            let _ = writeln!(body, "Aging {label} : {count}");
        }
        body.push('\n');
    }
    ReportFragment::new(Section::Aging, body)
}

pub fn summary_preamble(window: &ReportWindow) -> ReportFragment {
    ReportFragment::new(
        Section::Preamble,
        format!(
            "Data will only count for ticket created in {}\n",
            window.start().format("%Y")
        ),
    )
}

pub fn summary_header(window: &ReportWindow) -> ReportFragment {
    ReportFragment::new(
        Section::Header,
        format!(
            "<b>Summary ticket report {}\n{}</b>\n",
            window.start().format("%Y"),
            window.query_range(QueryFormat::DateTime)
        ),
    )
}

/// KIP In/Out SLA tables of the yearly summary; empty tables are left out
pub fn kip_tables(out_of_sla: &[KipTableRow], in_sla: &[KipTableRow]) -> ReportFragment {
    let mut body = String::new();
    for (title, rows) in [("KIP Out of SLA", out_of_sla), ("KIP In SLA", in_sla)] {
        if rows.is_empty() {
            continue;
        }
        let _ = write!(body, "<b>{title}:\n</b>");
        for row in rows {
            let _ = write!(body, "• {}: {}\n\n", escape_html(&row.title), row.count);
        }
    }
    ReportFragment::new(Section::Ranking, body)
}

/// Plain-text notice sent in place of a report that could not be built
pub fn error_notice(error: &dyn std::fmt::Display) -> String {
    format!("Error generating report: {error}")
}
