//! Page composition: turns a `PageView` into a standalone HTML document.

use crate::{
    chart::{escape, fmt_num},
    dashboard::{PageView, ProfileView, SectionView},
};
use std::fmt::Write as _;

const STYLE: &str = "body{margin:0;font-family:sans-serif;color:#08105c;background:#f3f9fd}\
header{padding:12px 24px;background:#08105c;color:#fff}\
aside{float:left;width:260px;padding:16px 24px}\
main{margin-left:310px;padding:16px 24px}\
dt{font-weight:bold;margin-top:6px}\
.error{padding:8px 12px;background:#fde8e6;border-left:4px solid #EF553B}\
figure.chart{margin:12px 0}figcaption{font-weight:bold}";

impl PageView {
    /// Standalone page. The session id is left out so that the same view
    /// state always yields the same document.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<!DOCTYPE html><html lang=\"fr\"><head><meta charset=\"utf-8\"><title>Credit scoring</title>");
        let _ = write!(html, "<style>{STYLE}</style></head><body>");
        html.push_str("<header><h1>CREDIT SCORING</h1></header>");
        html.push_str(&profile_html(&self.profile));
        html.push_str("<main>");
        for (id, section) in [
            ("prediction", &self.prediction),
            ("explanation", &self.explanation),
            ("comparison", &self.comparison),
        ] {
            html.push_str(&section_html(id, section));
        }
        html.push_str("</main></body></html>");
        html
    }
}

fn profile_html(p: &ProfileView) -> String {
    let mut html = String::from("<aside><h2>Information du client</h2><dl>");
    for (label, value) in [
        ("CLIENT ID", p.customer_id.to_string()),
        ("GENRE", p.gender.clone()),
        ("SITUATION", p.family_status.clone()),
        ("ÂGE", format!("{} years", p.age_years)),
        ("REVENUE TOTALE", fmt_num(p.income_total)),
        ("TYPE DE REVENUE", p.income_type.clone()),
        ("ANCIENNETE", p.tenure.clone()),
    ] {
        let _ = write!(html, "<dt>{label}</dt><dd>{}</dd>", escape(&value));
    }
    html.push_str("</dl></aside>");
    html
}

pub fn section_html(id: &str, section: &SectionView) -> String {
    match section {
        SectionView::Hidden => String::new(),
        SectionView::Ready { html } => format!("<section id=\"{id}\">{html}</section>"),
        SectionView::Partial { html, message } => format!(
            "<section id=\"{id}\">{html}<div class=\"error\">{}</div></section>",
            escape(message)
        ),
        SectionView::Failed { message } => format!(
            "<section id=\"{id}\"><div class=\"error\">{}</div></section>",
            escape(message)
        ),
    }
}
