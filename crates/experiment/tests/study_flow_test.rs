//! End-to-end study runs on a tiny environment, written to a scratch
//! directory.

#[cfg(test)]
mod tests {
    use clue_core::config::{AppConfig, EnvironmentConfig, ExperimentConfig};
    use clue_experiment::{run_study, Study};
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn tiny_config(output_dir: &PathBuf) -> AppConfig {
        AppConfig {
            environment: EnvironmentConfig {
                num_chance: 3,
                num_decision: 1,
                ..EnvironmentConfig::default()
            },
            experiment: ExperimentConfig {
                trials: 30,
                runs: 2,
                workers: 2,
                output_dir: output_dir.to_string_lossy().into_owned(),
                ..ExperimentConfig::default()
            },
            ..AppConfig::default()
        }
    }

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("clue-study-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_baseline_study_writes_results() {
        let root = scratch();
        let config = tiny_config(&root);
        let study = Study::from_job("UCB").unwrap();
        let dir = run_study(&study, &config).await.unwrap();

        assert_eq!(dir, root.join("Random (3,1)").join("ucb_test").join("30_trials_2_runs"));
        let baseline = fs::read_to_string(dir.join("rewards").join("UCB Baseline Agent.csv")).unwrap();
        let lines: Vec<&str> = baseline.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].split(',').count(), 30);
        assert!(dir.join("rewards").join("CLUE_Varied_Panel.csv").exists());
        assert!(dir.join("rhos").join("CLUE_Varied_Panel_0.5.csv").exists());
        assert!(dir.join("regret").join("Single_Good.csv").exists());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["trials"], 30);
        assert_eq!(manifest["config"]["environment"]["num_chance"], 3);
        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_partial_observability_study_writes_agreement() {
        let root = scratch();
        let config = tiny_config(&root);
        let dir = run_study(&Study::PartialObservability, &config).await.unwrap();

        let agreement = fs::read_to_string(dir.join("agreement").join("agreement.csv")).unwrap();
        // Header plus hidden counts 0..=3.
        assert_eq!(agreement.lines().count(), 5);
        assert!(dir.join("rewards").join("CLUE_Varied.csv").exists());
        assert!(dir.join("rewards").join("CLUE_3.csv").exists());
        assert!(!dir.join("rewards").join("CLUE_5.csv").exists());
        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_nonuniform_study_runs() {
        let root = scratch();
        let config = tiny_config(&root);
        let dir = run_study(&Study::Nonuniform, &config).await.unwrap();
        assert!(dir.join("rewards").join("NAF_Single_Extreme.csv").exists());
        fs::remove_dir_all(&root).unwrap();
    }
}
