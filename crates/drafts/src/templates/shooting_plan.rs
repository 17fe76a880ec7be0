//! Next-shoot plan announcement

use chrono::{Datelike, NaiveDateTime};

use super::{EmailContent, FormError, weekday_ja};

const SUBJECT: &str = "次回撮影企画の詳細について";

const CIRCLED_NUMBERS: [&str; 10] = ["①", "②", "③", "④", "⑤", "⑥", "⑦", "⑧", "⑨", "⑩"];

/// Marker for the `number`th entry (1-based): ①..⑩, then `⑪+n`
pub fn circled_number(number: usize) -> String {
    match number.checked_sub(1).and_then(|i| CIRCLED_NUMBERS.get(i)) {
        Some(marker) => marker.to_string(),
        None => format!("⑪+{}", number.saturating_sub(10)),
    }
}

/// Shoot date and time as `MM/DD（曜）HH:MM`
pub fn format_schedule(at: NaiveDateTime) -> String {
    format!(
        "{}（{}）{}",
        at.format("%m/%d"),
        weekday_ja(at.weekday()),
        at.format("%H:%M")
    )
}

/// Plans for one shoot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShootingPlan {
    scheduled_at: NaiveDateTime,
    projects: Vec<String>,
}

impl ShootingPlan {
    /// Build from one project title per line; blank lines are dropped
    pub fn from_lines(scheduled_at: NaiveDateTime, projects: &str) -> Result<Self, FormError> {
        Self::new(scheduled_at, projects.lines())
    }

    pub fn new<I, S>(scheduled_at: NaiveDateTime, projects: I) -> Result<Self, FormError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let projects: Vec<String> = projects
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if projects.is_empty() {
            return Err(FormError::NoProjects);
        }

        Ok(Self {
            scheduled_at,
            projects,
        })
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    /// Numbered plan list, one `<marker><title>\n→` entry per project
    pub fn plan_list(&self) -> String {
        self.projects
            .iter()
            .enumerate()
            .map(|(i, title)| format!("{}{}\n→", circled_number(i + 1), title))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render the announcement, closing with `signature` when given
    pub fn render(&self, signature: Option<&str>) -> EmailContent {
        let mut body = format!(
            "xxさん、xxさん\n\
             \n\
             お世話になっております。\n\
             \n\
             次回撮影分の企画の詳細についてご共有いたします。\n\
             \n\
             ◆{}〜 xxさん・xxさん\n\
             \n\
             {}\n\
             \n\
             お忙しいところ大変恐縮ですが、よろしくお願いいたします。",
            format_schedule(self.scheduled_at),
            self.plan_list(),
        );
        if let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) {
            body.push_str("\n\n");
            body.push_str(signature);
        }

        EmailContent {
            subject: SUBJECT.to_string(),
            body,
        }
    }
}
