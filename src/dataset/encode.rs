use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{EmployeeProfile, EmployeeRecord};

/// Ordered category lists shared by whoever produces and consumes encoded rows.
///
/// A category's code is its position in the list; categories that are not
/// listed encode as `-1`. Lists are append-only: reordering them changes the
/// meaning of every previously encoded row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabularies {
    pub education_levels: Vec<String>,
    pub job_titles: Vec<String>,
    pub locations: Vec<String>,
    pub company_sizes: Vec<String>,
    pub industries: Vec<String>,
    pub work_modes: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabularies {
    fn default() -> Self {
        Self {
            education_levels: owned(&["High School", "Bachelor's", "Master's", "PhD", "MBA"]),
            job_titles: owned(&[
                "Junior Software Engineer",
                "Software Engineer",
                "Senior Software Engineer",
                "Tech Lead",
                "Engineering Manager",
                "Principal Engineer",
                "CTO",
                "Frontend Developer",
                "Backend Developer",
                "Full Stack Developer",
                "Mobile Developer",
                "Data Scientist",
                "Senior Data Scientist",
                "Data Analyst",
                "Machine Learning Engineer",
                "AI Engineer",
                "Research Engineer",
                "Product Manager",
                "Senior Product Manager",
                "Associate Product Manager",
                "DevOps Engineer",
                "Senior DevOps Engineer",
                "Cloud Architect",
                "UX Designer",
                "UI Designer",
                "Product Designer",
                "QA Engineer",
                "Test Engineer",
                "SDET",
                "Business Analyst",
                "Financial Analyst",
                "Management Consultant",
                "Digital Marketing Manager",
                "Marketing Manager",
                "Growth Manager",
                "Sales Executive",
                "Sales Manager",
                "Account Manager",
                "Blockchain Developer",
                "Cybersecurity Analyst",
                "Security Engineer",
            ]),
            locations: owned(&[
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
                "San Francisco",
                "New York",
                "London",
                "Toronto",
                "Singapore",
                "Dubai",
                "Berlin",
                "Amsterdam",
                "Sydney",
                "Tokyo",
            ]),
            company_sizes: owned(&["Small", "Medium", "Large"]),
            industries: owned(&[
                "Technology",
                "Finance",
                "E-commerce",
                "Healthcare",
                "Consulting",
                "Manufacturing",
                "Education",
                "Government",
            ]),
            work_modes: owned(&["Office", "Remote", "Hybrid"]),
        }
    }
}

impl Vocabularies {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read vocabulary file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("{}: invalid vocabulary JSON", path.display()))
    }
}

fn index_of(vocabulary: &[String], value: &str) -> i32 {
    vocabulary
        .iter()
        .position(|known| known == value)
        .map_or(-1, |idx| idx as i32)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedRecord {
    pub years_experience: f64,
    pub education_level: i32,
    pub job_title: i32,
    pub location: i32,
    pub company_size: i32,
    pub skills_count: usize,
    pub industry: i32,
    pub work_mode: i32,
    pub salary: Option<f64>,
}

impl EncodedRecord {
    /// Feature vector in the fixed column order of `FEATURE_COLUMNS`.
    pub fn features(&self) -> Vec<f64> {
        vec![
            self.years_experience,
            f64::from(self.education_level),
            f64::from(self.job_title),
            f64::from(self.location),
            f64::from(self.company_size),
            self.skills_count as f64,
            f64::from(self.industry),
            f64::from(self.work_mode),
        ]
    }
}

pub fn encode_profile(profile: &EmployeeProfile, vocab: &Vocabularies) -> EncodedRecord {
    EncodedRecord {
        years_experience: profile.years_experience,
        education_level: index_of(&vocab.education_levels, &profile.education_level),
        job_title: index_of(&vocab.job_titles, &profile.job_title),
        location: index_of(&vocab.locations, &profile.location),
        company_size: index_of(&vocab.company_sizes, &profile.company_size),
        skills_count: profile.skills.len(),
        industry: index_of(&vocab.industries, &profile.industry),
        work_mode: index_of(&vocab.work_modes, &profile.work_mode),
        salary: None,
    }
}

pub fn encode_record(record: &EmployeeRecord, vocab: &Vocabularies) -> EncodedRecord {
    EncodedRecord {
        salary: Some(record.salary),
        ..encode_profile(&record.profile, vocab)
    }
}

/// Encode every record into a feature matrix and the aligned salary vector.
pub fn encode_records(records: &[EmployeeRecord], vocab: &Vocabularies) -> (Vec<Vec<f64>>, Vec<f64>) {
    records
        .iter()
        .map(|record| (encode_record(record, vocab).features(), record.salary))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample_record;

    #[test]
    fn known_categories_encode_to_their_position() {
        let vocab = Vocabularies::default();
        let record = sample_record(3.0, "Tech Lead", &["Java", "Kubernetes"], 2_000_000.0);
        let encoded = encode_record(&record, &vocab);

        assert_eq!(encoded.education_level, 1);
        assert_eq!(encoded.job_title, 3);
        assert_eq!(encoded.location, 0);
        assert_eq!(encoded.company_size, 2);
        assert_eq!(encoded.skills_count, 2);
        assert_eq!(encoded.industry, 0);
        assert_eq!(encoded.work_mode, 2);
        assert_eq!(encoded.salary, Some(2_000_000.0));
        assert_eq!(
            encoded.features(),
            vec![3.0, 1.0, 3.0, 0.0, 2.0, 2.0, 0.0, 2.0]
        );
    }

    #[test]
    fn unknown_categories_encode_as_minus_one() {
        let vocab = Vocabularies::default();
        let mut record = sample_record(1.0, "Astronaut", &[], 500_000.0);
        record.profile.location = "Atlantis".to_string();

        let encoded = encode_record(&record, &vocab);
        assert_eq!(encoded.job_title, -1);
        assert_eq!(encoded.location, -1);
        assert_eq!(encoded.skills_count, 0);
    }

    #[test]
    fn encode_records_keeps_row_alignment() {
        let vocab = Vocabularies::default();
        let records = vec![
            sample_record(1.0, "CTO", &["Go"], 100.0),
            sample_record(2.0, "SDET", &[], 200.0),
        ];

        let (features, targets) = encode_records(&records, &vocab);
        assert_eq!(features.len(), 2);
        assert_eq!(targets, vec![100.0, 200.0]);
        assert!(features.iter().all(|row| row.len() == 8));
        assert_eq!(features[1][0], 2.0);
        assert_eq!(features[1][2], 28.0);
    }

    #[test]
    fn vocabularies_round_trip_through_json_file() {
        let mut vocab = Vocabularies::default();
        vocab.work_modes.push("Flexible".to_string());

        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), serde_json::to_string(&vocab).unwrap()).unwrap();

        let loaded = Vocabularies::from_json_file(file.path()).expect("vocab");
        assert_eq!(loaded.work_modes.last().map(String::as_str), Some("Flexible"));
    }
}
