//! The settings and plan files shipped with the crate must stay loadable.

use serial_test::serial;
use std::path::PathBuf;

use stm_tasks::bounds::InstrumentLimits;
use stm_tasks::config::{FailurePolicy, Settings};
use stm_tasks::plan::Plan;
use stm_tasks::taskset::{expand, SweepParameter};

fn repo_file(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

#[test]
#[serial]
fn test_shipped_settings_load() {
    let settings = Settings::load(Some(&repo_file("config/stm_tasks.toml"))).unwrap();
    assert_eq!(settings.scheduler.failure_policy, FailurePolicy::Abort);
    assert_eq!(settings.limits, InstrumentLimits::default());
}

#[test]
fn test_terrace_survey_plan() {
    let plan = Plan::load(&repo_file("plans/terrace_survey.toml")).unwrap();
    let names: Vec<&str> = plan.task_sets.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["overview", "bias series", "zoom"]);

    let bias = expand(&plan.task_sets[1]).unwrap();
    assert_eq!(bias.len(), 5);
    assert!((bias[0].params().bias.to_real() + 0.5).abs() < 1e-12);
    assert!(bias[2].params().bias.to_real().abs() < 1e-12);

    let zoom = &plan.task_sets[2];
    assert_eq!(zoom.sweep.parameter, SweepParameter::Size);
    let sizes: Vec<f64> = expand(zoom)
        .unwrap()
        .iter()
        .map(|t| t.params().size.to_real() * 1e9)
        .collect();
    assert_eq!(sizes.len(), 4);
    assert!((sizes[3] - 50.0).abs() < 1e-6);

    let estimates = plan.estimates().unwrap();
    assert_eq!(estimates[2].1.image_count, 8);
}
