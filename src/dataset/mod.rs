mod currency;
mod encode;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

pub use currency::{Currency, INDIAN_CITIES};
pub use encode::{encode_profile, encode_record, encode_records, EncodedRecord, Vocabularies};

pub const FEATURE_COLUMNS: [&str; 8] = [
    "yearsExperience",
    "educationLevel",
    "jobTitle",
    "location",
    "companySize",
    "skillsCount",
    "industry",
    "workMode",
];

/// Employee attributes without the salary; what a prediction request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    pub years_experience: f64,
    pub education_level: String,
    pub job_title: String,
    pub location: String,
    pub company_size: String,
    pub skills: BTreeSet<String>,
    pub industry: String,
    pub work_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub profile: EmployeeProfile,
    pub salary: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow {
    years_experience: f64,
    education_level: String,
    job_title: String,
    location: String,
    company_size: String,
    #[serde(default)]
    skills: String,
    salary: f64,
    industry: String,
    work_mode: String,
}

impl From<CsvRow> for EmployeeRecord {
    fn from(row: CsvRow) -> Self {
        EmployeeRecord {
            profile: EmployeeProfile {
                years_experience: row.years_experience,
                education_level: row.education_level.trim().to_string(),
                job_title: row.job_title.trim().to_string(),
                location: row.location.trim().to_string(),
                company_size: row.company_size.trim().to_string(),
                skills: parse_skills(&row.skills),
                industry: row.industry.trim().to_string(),
                work_mode: row.work_mode.trim().to_string(),
            },
            salary: row.salary,
        }
    }
}

/// Split a `;`-separated skill list into a set of trimmed labels.
pub fn parse_skills(raw: &str) -> BTreeSet<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_records(path: &Path) -> Result<Vec<EmployeeRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))?;

    let mut records = Vec::new();
    for (row_idx, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| {
            format!("{}: failed to parse CSV row {}", path.display(), row_idx + 2)
        })?;
        ensure!(
            row.years_experience.is_finite() && row.salary.is_finite(),
            "{}: non-finite numeric value at row {}",
            path.display(),
            row_idx + 2
        );
        records.push(EmployeeRecord::from(row));
    }

    if records.is_empty() {
        bail!(
            "dataset '{}' does not contain any records after header row",
            path.display()
        );
    }

    tracing::debug!(rows = records.len(), "loaded dataset {}", path.display());
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCount {
    pub skill: String,
    pub count: usize,
}

/// Summary figures shown alongside the training results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStats {
    pub total_records: usize,
    pub avg_salary: f64,
    pub avg_experience: f64,
    pub unique_roles: usize,
    pub salary_min: f64,
    pub salary_max: f64,
    pub top_skills: Vec<SkillCount>,
    pub currency: Currency,
}

const TOP_SKILLS: usize = 10;

impl DataStats {
    pub fn from_records(records: &[EmployeeRecord]) -> Result<Self> {
        ensure!(!records.is_empty(), "cannot summarize an empty dataset");

        let n = records.len() as f64;
        let avg_salary = records.iter().map(|r| r.salary).sum::<f64>() / n;
        let avg_experience = records
            .iter()
            .map(|r| r.profile.years_experience)
            .sum::<f64>()
            / n;

        let unique_roles = records
            .iter()
            .map(|r| r.profile.job_title.as_str())
            .collect::<HashSet<_>>()
            .len();

        let salary_min = records.iter().map(|r| r.salary).fold(f64::INFINITY, f64::min);
        let salary_max = records
            .iter()
            .map(|r| r.salary)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records {
            for skill in &record.profile.skills {
                *counts.entry(skill.as_str()).or_default() += 1;
            }
        }

        // BTreeMap iteration is alphabetical and the sort is stable, so ties stay alphabetical.
        let mut top_skills: Vec<SkillCount> = counts
            .into_iter()
            .map(|(skill, count)| SkillCount {
                skill: skill.to_string(),
                count,
            })
            .collect();
        top_skills.sort_by(|a, b| b.count.cmp(&a.count));
        top_skills.truncate(TOP_SKILLS);

        Ok(DataStats {
            total_records: records.len(),
            avg_salary,
            avg_experience,
            unique_roles,
            salary_min,
            salary_max,
            top_skills,
            currency: Currency::for_records(records),
        })
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Records: {}", self.total_records),
            format!("Average salary: {}", self.currency.format(self.avg_salary)),
            format!("Average experience: {:.2} years", self.avg_experience),
            format!("Unique roles: {}", self.unique_roles),
            format!(
                "Salary range: {} - {}",
                self.currency.format(self.salary_min),
                self.currency.format(self.salary_max)
            ),
        ];

        if !self.top_skills.is_empty() {
            lines.push(String::new());
            lines.push("Top skills:".to_string());
            for entry in &self.top_skills {
                lines.push(format!("  {:<24} {:>4}", entry.skill, entry.count));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
pub(crate) fn sample_record(experience: f64, job_title: &str, skills: &[&str], salary: f64) -> EmployeeRecord {
    EmployeeRecord {
        profile: EmployeeProfile {
            years_experience: experience,
            education_level: "Bachelor's".to_string(),
            job_title: job_title.to_string(),
            location: "Bangalore".to_string(),
            company_size: "Large".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            industry: "Technology".to_string(),
            work_mode: "Hybrid".to_string(),
        },
        salary,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn parse_skills_trims_and_deduplicates() {
        let skills = parse_skills(" Rust; Go ;;Rust; ");
        assert_eq!(skills.len(), 2);
        assert!(skills.contains("Rust"));
        assert!(skills.contains("Go"));
    }

    #[test]
    fn load_records_reads_camel_case_headers() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "id,yearsExperience,educationLevel,jobTitle,location,companySize,skills,salary,industry,workMode"
        )
        .unwrap();
        writeln!(
            file,
            "1,2,Bachelor's,Software Engineer,Bangalore,Large,JavaScript;React;Node.js,800000,Technology,Hybrid"
        )
        .unwrap();
        writeln!(
            file,
            "2,5,Master's,Tech Lead,Mumbai,Large,,2800000,Technology,Office"
        )
        .unwrap();

        let records = load_records(file.path()).expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].profile.skills.len(), 3);
        assert_eq!(records[0].profile.job_title, "Software Engineer");
        assert!(records[1].profile.skills.is_empty());
        assert_abs_diff_eq!(records[1].salary, 2_800_000.0);
    }

    #[test]
    fn load_records_reports_bad_row_number() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "yearsExperience,educationLevel,jobTitle,location,companySize,skills,salary,industry,workMode"
        )
        .unwrap();
        writeln!(file, "abc,PhD,CTO,Pune,Small,Go,1,Technology,Remote").unwrap();

        let err = load_records(file.path()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn load_records_rejects_header_only_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "yearsExperience,educationLevel,jobTitle,location,companySize,skills,salary,industry,workMode"
        )
        .unwrap();

        let err = load_records(file.path()).unwrap_err();
        assert!(err.to_string().contains("does not contain any records"));
    }

    #[test]
    fn data_stats_summarizes_salaries_and_skills() {
        let records = vec![
            sample_record(2.0, "Software Engineer", &["Rust", "Go"], 1_000_000.0),
            sample_record(4.0, "Software Engineer", &["Rust"], 2_000_000.0),
            sample_record(6.0, "Data Scientist", &["Python", "Rust"], 3_000_000.0),
        ];

        let stats = DataStats::from_records(&records).expect("stats");
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.unique_roles, 2);
        assert_abs_diff_eq!(stats.avg_salary, 2_000_000.0);
        assert_abs_diff_eq!(stats.avg_experience, 4.0);
        assert_abs_diff_eq!(stats.salary_min, 1_000_000.0);
        assert_abs_diff_eq!(stats.salary_max, 3_000_000.0);
        assert_eq!(stats.top_skills[0].skill, "Rust");
        assert_eq!(stats.top_skills[0].count, 3);
        assert_eq!(stats.top_skills[1].skill, "Go");
        assert_eq!(stats.top_skills[2].skill, "Python");

        assert_eq!(stats.currency, Currency::Inr);
        let text = stats.render();
        assert!(text.contains("Average salary: ₹20.0 L"));
        assert!(text.contains("Salary range: ₹10.0 L - ₹30.0 L"));
    }
}
