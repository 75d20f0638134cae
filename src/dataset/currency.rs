use serde::{Deserialize, Serialize};

use super::EmployeeRecord;

/// Locations whose salaries are quoted in rupees.
pub const INDIAN_CITIES: [&str; 12] = [
    "Bangalore",
    "Mumbai",
    "Delhi",
    "Hyderabad",
    "Chennai",
    "Pune",
    "Kolkata",
    "Gurgaon",
    "Noida",
    "Ahmedabad",
    "Jaipur",
    "Kochi",
];

const LAKH: f64 = 100_000.0;
const CRORE: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Inr,
    Usd,
}

impl Currency {
    pub fn for_location(location: &str) -> Self {
        if INDIAN_CITIES.contains(&location.trim()) {
            Currency::Inr
        } else {
            Currency::Usd
        }
    }

    /// Currency of the majority of records; rupees win a tie.
    pub fn for_records(records: &[EmployeeRecord]) -> Self {
        let inr = records
            .iter()
            .filter(|r| Currency::for_location(&r.profile.location) == Currency::Inr)
            .count();
        if inr * 2 >= records.len() {
            Currency::Inr
        } else {
            Currency::Usd
        }
    }

    /// Rupee amounts of a lakh or more are shortened to `L` / `Cr` with one decimal.
    pub fn format(self, amount: f64) -> String {
        match self {
            Currency::Inr if amount >= CRORE => format!("₹{:.1} Cr", amount / CRORE),
            Currency::Inr if amount >= LAKH => format!("₹{:.1} L", amount / LAKH),
            Currency::Inr => format!("₹{}", group_thousands(amount)),
            Currency::Usd => format!("${}", group_thousands(amount)),
        }
    }
}

fn group_thousands(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample_record;

    #[test]
    fn location_picks_currency() {
        assert_eq!(Currency::for_location("Bangalore"), Currency::Inr);
        assert_eq!(Currency::for_location(" Pune "), Currency::Inr);
        assert_eq!(Currency::for_location("San Francisco"), Currency::Usd);
    }

    #[test]
    fn rupees_use_lakh_and_crore() {
        assert_eq!(Currency::Inr.format(15_000_000.0), "₹1.5 Cr");
        assert_eq!(Currency::Inr.format(1_500_000.0), "₹15.0 L");
        assert_eq!(Currency::Inr.format(100_000.0), "₹1.0 L");
        assert_eq!(Currency::Inr.format(99_999.4), "₹99,999");
        assert_eq!(Currency::Inr.format(750.0), "₹750");
    }

    #[test]
    fn dollars_group_thousands() {
        assert_eq!(Currency::Usd.format(1_234_567.0), "$1,234,567");
        assert_eq!(Currency::Usd.format(120_000.0), "$120,000");
        assert_eq!(Currency::Usd.format(999.0), "$999");
        assert_eq!(Currency::Usd.format(-4_500.0), "$-4,500");
    }

    #[test]
    fn majority_location_decides_dataset_currency() {
        let mut abroad = sample_record(3.0, "Software Engineer", &[], 120_000.0);
        abroad.profile.location = "New York".to_string();
        let local = sample_record(3.0, "Software Engineer", &[], 1_200_000.0);

        assert_eq!(Currency::for_records(&[abroad.clone(), abroad.clone(), local.clone()]), Currency::Usd);
        assert_eq!(Currency::for_records(&[abroad, local]), Currency::Inr);
    }
}
