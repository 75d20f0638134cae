use std::fs;

use salary_models::config::ModelSettings;
use salary_models::dataset::{self, Vocabularies};
use salary_models::regression::{build_model, compute_metrics, train_models, DecisionTree};
use salary_models::ModelKind;

const HEADER: &str =
    "id,yearsExperience,educationLevel,jobTitle,location,companySize,skills,salary,industry,workMode";

fn experience_csv() -> String {
    let mut lines = vec![HEADER.to_string()];
    for years in 0..20 {
        let salary = 500_000 + 200_000 * years;
        lines.push(format!(
            "{},{},Bachelor's,Software Engineer,Bangalore,Large,Java;Spring Boot,{},Technology,Hybrid",
            years + 1,
            years,
            salary
        ));
    }
    lines.join("\n")
}

fn load_experience_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("employees.csv");
    fs::write(&path, experience_csv()).expect("write csv");

    let records = dataset::load_records(&path).expect("load records");
    assert_eq!(records.len(), 20);
    dataset::encode_records(&records, &Vocabularies::default())
}

fn in_sample_settings() -> ModelSettings {
    ModelSettings {
        test_ratio: 0.0,
        ..ModelSettings::default()
    }
}

#[test]
fn experience_driven_salaries_are_learnt_by_every_model() {
    let (features, targets) = load_experience_dataset();
    let session = train_models(&features, &targets, &in_sample_settings()).expect("train");

    let linear = session.outcome(ModelKind::Linear).expect("linear");
    assert!(linear.metrics.r2_score > 0.95, "linear r2 = {}", linear.metrics.r2_score);

    let forest = session.outcome(ModelKind::RandomForest).expect("forest");
    assert!(forest.metrics.r2_score > 0.8, "forest r2 = {}", forest.metrics.r2_score);

    let mut five_years = features[0].clone();
    five_years[0] = 5.0;
    for kind in ModelKind::ALL {
        let predicted = session.predict(kind, &[five_years.clone()]).expect("predict")[0];
        let relative = (predicted - 1_500_000.0).abs() / 1_500_000.0;
        assert!(relative < 0.15, "{} predicted {} at five years", kind, predicted);
    }
}

#[test]
fn decision_tree_fits_the_normalized_features() {
    let (features, targets) = load_experience_dataset();
    let session = train_models(&features, &targets, &in_sample_settings()).expect("train");
    let normalizer = session.normalizer().expect("normalizer");

    let scaled = normalizer.transform(&features).expect("transform");
    let mut tree = DecisionTree::new();
    tree.fit(&scaled, &targets).expect("fit tree");

    let metrics = compute_metrics(&targets, &tree.predict(&scaled)).expect("metrics");
    assert!(metrics.r2_score > 0.8, "tree r2 = {}", metrics.r2_score);
}

#[test]
fn repeated_prediction_is_stable() {
    let (features, targets) = load_experience_dataset();
    let session = train_models(&features, &targets, &in_sample_settings()).expect("train");

    for kind in ModelKind::ALL {
        let first = session.predict(kind, &features).expect("predict");
        let second = session.predict(kind, &features).expect("predict");
        assert_eq!(first, second, "{} changed between calls", kind);
    }
}

#[test]
fn r2_stays_within_unit_interval() {
    let (features, targets) = load_experience_dataset();
    let session = train_models(
        &features,
        &targets,
        &ModelSettings {
            test_ratio: 0.25,
            ..ModelSettings::default()
        },
    )
    .expect("train");

    for outcome in session.outcomes() {
        let holdout = outcome.holdout.as_ref().expect("holdout metrics");
        for r2 in [outcome.metrics.r2_score, holdout.r2_score] {
            assert!((0.0..=1.0).contains(&r2), "{} r2 = {}", outcome.kind, r2);
        }
    }

    // A model predicting a constant far from the data still reports zero, not a negative score.
    let constant = vec![0.0; targets.len()];
    let metrics = compute_metrics(&targets, &constant).expect("metrics");
    assert_eq!(metrics.r2_score, 0.0);
}

#[test]
fn untrained_models_predict_nothing() {
    let settings = ModelSettings::default();
    for kind in ModelKind::ALL {
        let model = build_model(kind, &settings);
        assert!(model.predict(&[vec![1.0; 8]]).is_empty());
    }
}
