//! End-to-end tests for stage orchestration against a scripted oracle.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use wct_pipeline::oracle::OracleCall;
use wct_pipeline::{
    AnalysisMode, CategoricalStructure, Corpus, MockOracle, OracleError, OutputFormat, Pipeline,
    PipelineError, PromptLibrary, ResultCache, RunRequest,
};

const CATEGORIZE_RESPONSE: &str = "Here is the structure:\n\n```yaml\npurpose: poses\npose:\n  - arms raised\n  - kneeling\nindex:\n  - __std/xl/pose__\n```\n";

fn write_prompts(dir: &Path) {
    fs::create_dir_all(dir.join("wct")).unwrap();
    fs::write(dir.join("prompting-guide-sdxl.md"), "GUIDE").unwrap();
    fs::write(dir.join("wct/wildcard_intro.md"), "INTRO").unwrap();
    for stage in ["categorize", "analyze", "cleanup", "output"] {
        fs::write(dir.join(format!("wct/{stage}.md")), format!("STAGE:{stage}")).unwrap();
    }
}

/// Stage a call was made for, read off the composed system prompt.
fn stage_of(call: &OracleCall) -> &str {
    call.system
        .rsplit("STAGE:")
        .next()
        .unwrap_or("unknown")
}

fn scripted_oracle() -> MockOracle {
    MockOracle::new(|call| {
        let response = match stage_of(call) {
            "categorize" => CATEGORIZE_RESPONSE.to_string(),
            "analyze" if call.user.contains("Mode: short") => "short report".to_string(),
            "analyze" => "long report".to_string(),
            "cleanup" => "arms raised\nkneeling".to_string(),
            "output" => "pose:\n  - arms raised\n  - kneeling\n".to_string(),
            other => panic!("unexpected stage {other}"),
        };
        Ok(response)
    })
}

struct Fixture {
    dir: TempDir,
    corpus: Corpus,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(&dir.path().join("prompts"));
        let corpus = Corpus::new("poses", "poses.txt", "arms raised\nkneeling\nkneeling\n");
        Self { dir, corpus }
    }

    fn cache(&self) -> ResultCache {
        ResultCache::new(self.dir.path().join(".wct_cache"))
    }

    fn pipeline(&self, oracle: MockOracle) -> Pipeline<MockOracle> {
        Pipeline::new(
            PromptLibrary::new(vec![self.dir.path().join("prompts")]),
            self.cache(),
            oracle,
        )
    }
}

fn stages(pipeline: &Pipeline<MockOracle>) -> Vec<String> {
    pipeline
        .oracle()
        .calls()
        .iter()
        .map(|c| {
            let stage = stage_of(c);
            if stage == "analyze" {
                let mode = if c.user.contains("Mode: long") { "long" } else { "short" };
                format!("analyze:{mode}")
            } else {
                stage.to_string()
            }
        })
        .collect()
}

#[test]
fn cleanup_alone_categorizes_once_and_analyzes_long_once() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    let request = RunRequest {
        cleanup: true,
        ..RunRequest::default()
    };

    let report = pipeline.run(&fx.corpus, &request).unwrap();

    assert_eq!(stages(&pipeline), vec!["categorize", "analyze:long", "cleanup"]);
    assert_eq!(report.output.as_deref(), Some("arms raised\nkneeling"));
    assert_eq!(report.cleaned, report.output);
    assert!(fx.cache().get("poses").is_some(), "categorization should be cached");
}

#[test]
fn cached_poses_cleanup_triggers_one_long_analysis() {
    let fx = Fixture::new();
    let cached = CategoricalStructure::new().with_category("pose", ["arms raised", "kneeling"]);
    fx.cache().put("poses", &cached).unwrap();

    // format=text: the cleanup result is the output.
    let pipeline = fx.pipeline(scripted_oracle());
    let report = pipeline
        .run(
            &fx.corpus,
            &RunRequest {
                cleanup: true,
                ..RunRequest::default()
            },
        )
        .unwrap();
    assert_eq!(stages(&pipeline), vec!["analyze:long", "cleanup"]);
    assert_eq!(report.output.as_deref(), Some("arms raised\nkneeling"));

    // format=yaml: one more call reformats it.
    let pipeline = fx.pipeline(scripted_oracle());
    let report = pipeline
        .run(
            &fx.corpus,
            &RunRequest {
                cleanup: true,
                output: OutputFormat::Yaml,
                ..RunRequest::default()
            },
        )
        .unwrap();
    assert_eq!(stages(&pipeline), vec!["analyze:long", "cleanup", "output"]);
    assert_eq!(
        report.output.as_deref(),
        Some("pose:\n  - arms raised\n  - kneeling\n")
    );

    let calls = pipeline.oracle().calls();
    let format_call = calls.last().unwrap();
    assert!(format_call.user.contains("Output format: yaml"));
    assert!(format_call.user.contains("Cleaned content to format:\narms raised\nkneeling"));
    assert!(format_call.user.contains("- kneeling"));
}

#[test]
fn explicit_long_analysis_is_reused_by_cleanup() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    let request = RunRequest {
        categorize: true,
        analyze: Some(AnalysisMode::Long),
        cleanup: true,
        ..RunRequest::default()
    };

    let report = pipeline.run(&fx.corpus, &request).unwrap();

    assert_eq!(stages(&pipeline), vec!["categorize", "analyze:long", "cleanup"]);
    let cleanup_call = &pipeline.oracle().calls()[2];
    assert!(cleanup_call.user.contains("Analysis Results:\nlong report"));

    let rendered = report.render();
    assert!(rendered.starts_with("=== CATEGORIZATION RESULTS ===\n"), "{rendered}");
    assert!(rendered.contains("=== ANALYSIS (LONG) ===\nlong report\n\n"), "{rendered}");
    assert!(rendered.ends_with("=== CLEANED OUTPUT ===\narms raised\nkneeling"), "{rendered}");
}

#[test]
fn short_analysis_plus_cleanup_runs_both_modes() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    let request = RunRequest {
        analyze: Some(AnalysisMode::Short),
        cleanup: true,
        ..RunRequest::default()
    };

    let report = pipeline.run(&fx.corpus, &request).unwrap();

    assert_eq!(
        stages(&pipeline),
        vec!["categorize", "analyze:short", "analyze:long", "cleanup"]
    );
    assert_eq!(
        report.requested_analysis(),
        Some((AnalysisMode::Short, "short report"))
    );
    assert!(!report.render().contains("CATEGORIZATION RESULTS"));
}

#[test]
fn cache_hit_skips_the_model() {
    let fx = Fixture::new();
    let cached = CategoricalStructure::new()
        .with_purpose("poses")
        .with_category("pose", ["kneeling"]);
    fx.cache().put("poses", &cached).unwrap();

    let pipeline = fx.pipeline(scripted_oracle());
    let report = pipeline
        .run(
            &fx.corpus,
            &RunRequest {
                categorize: true,
                ..RunRequest::default()
            },
        )
        .unwrap();

    assert_eq!(pipeline.oracle().call_count(), 0);
    assert_eq!(report.categories, Some(cached));
}

#[test]
fn force_refresh_bypasses_and_overwrites_the_cache() {
    let fx = Fixture::new();
    let stale = CategoricalStructure::new().with_category("pose", ["standing"]);
    fx.cache().put("poses", &stale).unwrap();

    let pipeline = fx.pipeline(scripted_oracle());
    let fresh = pipeline.categorize(&fx.corpus, true).unwrap();

    assert_eq!(stages(&pipeline), vec!["categorize"]);
    assert_eq!(fresh.entries("pose"), Some(vec!["arms raised", "kneeling"]));
    assert_eq!(fx.cache().get("poses"), Some(fresh));
}

#[test]
fn empty_or_corrupt_cache_records_are_misses() {
    let fx = Fixture::new();
    fx.cache().put("poses", &CategoricalStructure::new()).unwrap();
    let pipeline = fx.pipeline(scripted_oracle());
    pipeline.categorize(&fx.corpus, false).unwrap();
    assert_eq!(pipeline.oracle().call_count(), 1);

    fs::write(fx.cache().record_path("poses"), "{ truncated").unwrap();
    let pipeline = fx.pipeline(scripted_oracle());
    pipeline.categorize(&fx.corpus, false).unwrap();
    assert_eq!(pipeline.oracle().call_count(), 1);
}

#[test]
fn placeholders_are_hidden_from_analysis_but_kept_in_cache() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    pipeline
        .run(
            &fx.corpus,
            &RunRequest {
                analyze: Some(AnalysisMode::Short),
                ..RunRequest::default()
            },
        )
        .unwrap();

    let analyze_call = &pipeline.oracle().calls()[1];
    assert!(analyze_call.user.contains("- arms raised"));
    assert!(!analyze_call.user.contains("__std/xl/pose__"));
    assert!(!analyze_call.user.contains("index:"));
    assert!(analyze_call.user.ends_with("Wildcard file content:\narms raised\nkneeling\nkneeling\n"));

    let cached = fx.cache().get("poses").unwrap();
    assert_eq!(cached.entries("index"), Some(vec!["__std/xl/pose__"]));
}

#[test]
fn unstructured_categorization_degrades_but_the_run_completes() {
    let fx = Fixture::new();
    let oracle = MockOracle::new(|call| {
        Ok(match stage_of(call) {
            "categorize" => "I think these are all poses.".to_string(),
            other => format!("{other} done"),
        })
    });
    let pipeline = fx.pipeline(oracle);
    let report = pipeline
        .run(
            &fx.corpus,
            &RunRequest {
                cleanup: true,
                ..RunRequest::default()
            },
        )
        .unwrap();

    let categories = report.categories.unwrap();
    assert!(categories.is_degenerate());
    assert_eq!(report.output.as_deref(), Some("cleanup done"));

    let analyze_call = &pipeline.oracle().calls()[1];
    assert!(analyze_call
        .user
        .contains("raw_response: I think these are all poses."));
}

#[test]
fn oracle_failure_aborts_without_caching() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(MockOracle::failing("openai http error 503: overloaded"));
    let err = pipeline
        .run(
            &fx.corpus,
            &RunRequest {
                cleanup: true,
                ..RunRequest::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, PipelineError::Oracle(OracleError::Unavailable(_))));
    assert_eq!(err.to_string(), "openai http error 503: overloaded");
    assert_eq!(pipeline.oracle().call_count(), 1);
    assert_eq!(fx.cache().get("poses"), None);
}

#[test]
fn failure_in_a_later_stage_is_fatal_too() {
    let fx = Fixture::new();
    let oracle = MockOracle::new(|call| match stage_of(call) {
        "categorize" => Ok(CATEGORIZE_RESPONSE.to_string()),
        _ => Err(OracleError::Unavailable("timed out".into())),
    });
    let pipeline = fx.pipeline(oracle);
    let err = pipeline
        .analyze(&fx.corpus, AnalysisMode::Long, None)
        .unwrap_err();
    assert_eq!(err.to_string(), "timed out");
    // Categorization succeeded before the failure and stays cached.
    assert!(fx.cache().get("poses").is_some());
}

#[test]
fn blank_response_is_an_empty_response_error() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(MockOracle::always("  \n "));
    let err = pipeline.categorize(&fx.corpus, false).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Oracle(OracleError::EmptyResponse { .. })
    ));
}

#[test]
fn missing_prompt_fails_before_calling_the_model() {
    let fx = Fixture::new();
    fs::remove_file(fx.dir.path().join("prompts/wct/cleanup.md")).unwrap();
    let pipeline = fx.pipeline(scripted_oracle());
    let cached = CategoricalStructure::new().with_category("pose", ["kneeling"]);

    let err = pipeline
        .cleanup(&fx.corpus, Some(&cached), Some("analysis"))
        .unwrap_err();

    assert!(matches!(err, PipelineError::PromptNotFound { ref name, .. } if name == "cleanup"));
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[test]
fn nothing_requested_is_rejected() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    let err = pipeline.run(&fx.corpus, &RunRequest::default()).unwrap_err();
    assert!(matches!(err, PipelineError::NothingRequested));
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[test]
fn standalone_cleanup_fills_in_prerequisites() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    let cleaned = pipeline.cleanup(&fx.corpus, None, None).unwrap();
    assert_eq!(cleaned, "arms raised\nkneeling");
    assert_eq!(stages(&pipeline), vec!["categorize", "analyze:long", "cleanup"]);
}

#[test]
fn cache_write_failure_does_not_abort_the_run() {
    let fx = Fixture::new();
    let blocker = fx.dir.path().join("cache-is-a-file");
    fs::write(&blocker, "x").unwrap();
    let pipeline = Pipeline::new(
        PromptLibrary::new(vec![fx.dir.path().join("prompts")]),
        ResultCache::new(&blocker),
        scripted_oracle(),
    );

    let categories = pipeline.categorize(&fx.corpus, false).unwrap();
    assert_eq!(categories.purpose(), Some("poses"));
}

#[test]
fn system_prompt_is_guide_intro_stage() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    pipeline.categorize(&fx.corpus, true).unwrap();

    let call = &pipeline.oracle().calls()[0];
    assert_eq!(call.system, "GUIDE\n\n---\n\nINTRO\n\n---\n\nSTAGE:categorize");
    assert_eq!(
        call.user,
        "Wildcard filename: poses.txt\n\nWildcard file content:\n\narms raised\nkneeling\nkneeling\n"
    );
}

#[test]
fn corpus_text_reaches_the_model_verbatim() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(scripted_oracle());
    let corpus = Corpus::new("poses", "poses.txt", "arms raised\r\nkneeling\r\n");
    pipeline.categorize(&corpus, true).unwrap();

    let call = &pipeline.oracle().calls()[0];
    assert!(call.user.ends_with("\n\narms raised\r\nkneeling\r\n"), "{:?}", call.user);
}

#[test]
fn template_only_categories_never_reach_analysis() {
    let fx = Fixture::new();
    let cached = CategoricalStructure::new()
        .with_category("pose", ["kneeling"])
        .with_category(
            "all",
            [
                "__std/xl/outfit/color__ __std/xl/outfit/garment__",
                "__a____b__",
            ],
        );
    fx.cache().put("poses", &cached).unwrap();

    let pipeline = fx.pipeline(scripted_oracle());
    pipeline
        .analyze(&fx.corpus, AnalysisMode::Short, None)
        .unwrap();

    let analyze_call = &pipeline.oracle().calls()[0];
    assert!(analyze_call.user.contains("- kneeling"));
    assert!(!analyze_call.user.contains("all:"), "{}", analyze_call.user);
    assert!(!analyze_call.user.contains("__a____b__"));
}
