use std::fs;

use anyhow::{anyhow, Context, Result};
use serde_yaml::from_str;

use crate::cli::Backend;
use crate::config::{IndexSettings, RunConfig, Stage};
use crate::{bench, compare, index, logging};

pub fn run_from_config(path: &str) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
    let cfg: RunConfig = from_str(&raw).context("invalid ctxbench config")?;
    run_pipeline(cfg, index::run_with_settings, bench::run, compare::run)
}

/// Runs the requested stages in fixed order, stopping at the first failure.
fn run_pipeline<FIndex, FBench, FCompare>(
    cfg: RunConfig,
    index_fn: FIndex,
    bench_fn: FBench,
    compare_fn: FCompare,
) -> Result<()>
where
    FIndex: Fn(&str, &IndexSettings) -> Result<()>,
    FBench: Fn(Backend, String, Option<String>, String) -> Result<()>,
    FCompare: Fn(String, String, String, Option<String>) -> Result<()>,
{
    if cfg.stages.is_empty() {
        return Err(anyhow!("run config must list at least one stage"));
    }
    if cfg.wants(Stage::Index) {
        logging::stage("run", "stage index");
        index_fn(&cfg.repo_root, &cfg.index)?;
    }
    for (stage, backend, dir) in [
        (Stage::Pattern, Backend::Pattern, &cfg.pattern_dir),
        (Stage::Semantic, Backend::Semantic, &cfg.semantic_dir),
    ] {
        if !cfg.wants(stage) {
            continue;
        }
        logging::stage("run", format!("stage {}", backend.tool().as_str()));
        bench_fn(
            backend,
            cfg.queries.clone(),
            Some(dir.clone()),
            cfg.repo_root.clone(),
        )?;
    }
    if cfg.wants(Stage::Compare) {
        logging::stage("run", "stage compare");
        compare_fn(
            cfg.pattern_dir.clone(),
            cfg.semantic_dir.clone(),
            cfg.comparison.clone(),
            cfg.summary_out.clone(),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn config(raw: &str) -> RunConfig {
        from_str(raw).unwrap()
    }

    #[test]
    fn pipeline_runs_stages_in_fixed_order() {
        let cfg = config(
            "repo_root: ./repo\nqueries: q.json\nsummary_out: summary.json\nstages: [compare, semantic, index, pattern]\n",
        );
        let calls: RefCell<Vec<String>> = RefCell::new(Vec::new());
        run_pipeline(
            cfg,
            |root, settings| {
                assert_eq!(root, "./repo");
                assert_eq!(settings.batch_size, 5);
                calls.borrow_mut().push("index".into());
                Ok(())
            },
            |backend, queries, output, root| {
                assert_eq!(queries, "q.json");
                assert_eq!(root, "./repo");
                calls
                    .borrow_mut()
                    .push(format!("{:?}:{}", backend, output.unwrap_or_default()));
                Ok(())
            },
            |pattern, semantic, out, summary| {
                assert_eq!(pattern, "results/pattern");
                assert_eq!(semantic, "results/semantic");
                assert_eq!(out, "comparison.json");
                assert_eq!(summary.as_deref(), Some("summary.json"));
                calls.borrow_mut().push("compare".into());
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(
            *calls.borrow(),
            vec![
                "index",
                "Pattern:results/pattern",
                "Semantic:results/semantic",
                "compare"
            ]
        );
    }

    #[test]
    fn pipeline_stops_at_first_failure() {
        let cfg = config("stages: [pattern, semantic, compare]\n");
        let calls: RefCell<Vec<Backend>> = RefCell::new(Vec::new());
        let err = run_pipeline(
            cfg,
            |_, _| Ok(()),
            |backend, _, _, _| {
                calls.borrow_mut().push(backend);
                if backend == Backend::Semantic {
                    return Err(anyhow!("context service unavailable"));
                }
                Ok(())
            },
            |_, _, _, _| panic!("compare must not run after a failed stage"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unavailable"));
        assert_eq!(*calls.borrow(), vec![Backend::Pattern, Backend::Semantic]);
    }

    #[test]
    fn pipeline_requires_a_stage() {
        let cfg = config("stages: []\n");
        let err = run_pipeline(cfg, |_, _| Ok(()), |_, _, _, _| Ok(()), |_, _, _, _| Ok(()))
            .unwrap_err();
        assert!(err.to_string().contains("at least one stage"));
    }
}
