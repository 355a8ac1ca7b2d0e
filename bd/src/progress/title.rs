//! Default goal titles in Portuguese

use chrono::{Datelike, NaiveDate};

use crate::domain::PeriodType;

const MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

fn month_name(date: NaiveDate) -> &'static str {
    MONTHS[date.month0() as usize]
}

/// Human-readable title for a goal period
pub fn goal_title(period: PeriodType, start: NaiveDate, end: NaiveDate) -> String {
    match period {
        PeriodType::Weekly => format!("Meta Semanal {}", start.format("%d/%m")),
        PeriodType::Biweekly => format!("Meta Quinzenal {}", start.format("%d/%m")),
        PeriodType::Monthly => format!("Meta de {}", month_name(start)),
        PeriodType::Quarterly => format!("Meta Q{} {}", start.month0() / 3 + 1, start.year()),
        PeriodType::Custom => {
            let days = ((end - start).num_days() + 1).max(1);
            format!("Meta de {} dias", days)
        }
    }
}

/// Title for a period given by name; unknown periods get a generic title
pub fn goal_title_for(period: &str, start: NaiveDate, end: NaiveDate) -> String {
    match period.parse::<PeriodType>() {
        Ok(period) => goal_title(period, start, end),
        Err(_) => "Meta".to_string(),
    }
}
