/*!
 * Command-level tests: files in, files out
 */

mod common;

use std::fs;
use std::sync::Arc;

use assert_fs::TempDir;
use assert_fs::prelude::*;

use common::{ScriptedTranslator, sample_srt};
use legenda::config::Config;
use legenda::context::{ContextKind, MovieContext, TranslationContext};
use legenda::error::LegendaError;
use legenda::orchestrator::CancellationToken;
use legenda::quality::LayoutSeverity;
use legenda::session::SessionState;
use legenda::subtitle::SubtitleEncoding;
use legenda::workflow::{ContextOverrides, TranslateRequest, Workflow};

fn config_in(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.dir = temp.path().join(".legenda");
    config.batch.batch_size = 2;
    config.batch.delay_ms = 0;
    config
}

fn workflow(temp: &TempDir, translator: ScriptedTranslator) -> Workflow {
    Workflow::new(config_in(temp))
        .unwrap()
        .with_translator(Arc::new(translator))
        .with_progress(false)
}

fn request(input: &std::path::Path) -> TranslateRequest {
    TranslateRequest {
        input: input.to_path_buf(),
        output: None,
        kind: ContextKind::Movie,
        overrides: ContextOverrides::default(),
        search: None,
        source_language: "en".to_string(),
        limit: None,
    }
}

#[tokio::test]
async fn test_translate_writes_output_next_to_input() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("Heat.1995.srt");
    input.write_str(&sample_srt(&[1, 2, 3])).unwrap();

    let workflow = workflow(&temp, ScriptedTranslator::new());
    let summary = workflow
        .translate(request(input.path()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.report.batches_sent, 2);

    let output = temp.child("Heat.1995_pt-br.srt");
    assert_eq!(summary.output.as_deref(), Some(output.path()));
    let written = fs::read_to_string(output.path()).unwrap();
    assert!(written.starts_with("1\n00:00:01,000 --> 00:00:01,900\n[pt] Line number 1\n\n2\n"));

    let status = workflow.status().await.unwrap();
    assert_eq!(status.session.state(), SessionState::Editing);
    assert_eq!(status.session.context().unwrap().title(), "Heat");
}

#[tokio::test]
async fn test_limited_translate_then_resume() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("show.srt");
    input.write_str(&sample_srt(&[1, 2, 3, 4, 5])).unwrap();

    let workflow = workflow(&temp, ScriptedTranslator::new());
    let mut first = request(input.path());
    first.limit = Some(3);
    let summary = workflow.translate(first, &CancellationToken::new()).await.unwrap();
    assert_eq!(summary.translated, 3);
    assert!(!summary.is_complete());

    let translator = ScriptedTranslator::new();
    let log = translator.log();
    let resumed = self::workflow(&temp, translator);
    let output = temp.child("final.srt");
    let summary = resumed
        .resume(Some(output.path().to_path_buf()), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(log.lock().unwrap().batches, vec![vec![4, 5]]);
    let written = fs::read_to_string(output.path()).unwrap();
    assert!(written.ends_with("5\n00:00:05,000 --> 00:00:05,900\n[pt] Line number 5"));
}

#[tokio::test]
async fn test_resume_without_session_fails() {
    let temp = TempDir::new().unwrap();
    let workflow = workflow(&temp, ScriptedTranslator::new());

    let err = workflow.resume(None, None, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, LegendaError::InvalidState(_)));
}

#[tokio::test]
async fn test_edit_then_export() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("a.srt");
    input.write_str(&sample_srt(&[1, 2])).unwrap();

    let workflow = workflow(&temp, ScriptedTranslator::new());
    workflow
        .translate(request(input.path()), &CancellationToken::new())
        .await
        .unwrap();
    workflow.edit(2, "Até logo.").await.unwrap();

    let output = temp.child("out/edited.srt");
    let count = workflow.export(output.path()).await.unwrap();
    assert_eq!(count, 2);

    let written = fs::read_to_string(output.path()).unwrap();
    assert!(written.ends_with("2\n00:00:02,000 --> 00:00:02,900\nAté logo."));

    workflow.reset().await.unwrap();
    let status = workflow.status().await.unwrap();
    assert!(status.session.blocks().is_empty());
}

#[tokio::test]
async fn test_search_result_seeds_the_context() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("heat.srt");
    input.write_str(&sample_srt(&[1])).unwrap();

    let found = TranslationContext::Movie(MovieContext {
        title: "Heat".to_string(),
        year: "1995".to_string(),
        director: "Michael Mann".to_string(),
        ..Default::default()
    });
    let translator = ScriptedTranslator::new().with_search_results(vec![found]);
    let log = translator.log();
    let workflow = workflow(&temp, translator);

    let mut req = request(input.path());
    req.search = Some("heat 1995".to_string());
    req.overrides.genre = Some("Crime".to_string());
    workflow.translate(req, &CancellationToken::new()).await.unwrap();

    assert_eq!(log.lock().unwrap().searches, vec!["heat 1995".to_string()]);
    let status = workflow.status().await.unwrap();
    match status.session.context().unwrap() {
        TranslationContext::Movie(movie) => {
            assert_eq!(movie.director, "Michael Mann");
            assert_eq!(movie.genre, "Crime");
        }
        other => panic!("unexpected context {:?}", other),
    }
}

#[tokio::test]
async fn test_clean_directory_mirrors_tree() {
    let temp = TempDir::new().unwrap();
    temp.child("in/s01/e01.srt")
        .write_str(
            "1\n00:00:01,000 --> 00:00:02,000\n(THEME MUSIC)\n\n\
             2\n00:00:03,000 --> 00:00:04,000\n>> ANCHOR: Good evening.",
        )
        .unwrap();
    temp.child("in/notes.txt").write_str("not subtitles").unwrap();

    let workflow = workflow(&temp, ScriptedTranslator::new());
    let out_dir = temp.child("out");
    let written = workflow
        .clean(temp.child("in").path(), Some(out_dir.path().to_path_buf()))
        .await
        .unwrap();

    let expected = out_dir.child("s01/e01.srt");
    assert_eq!(written, vec![expected.path().to_path_buf()]);
    assert_eq!(
        fs::read_to_string(expected.path()).unwrap(),
        "2\n00:00:03,000 --> 00:00:04,000\nGood evening."
    );
}

#[tokio::test]
async fn test_clean_single_file_default_name() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("ep.srt");
    input
        .write_str("\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nMAN: Hi.\r\n")
        .unwrap();

    let workflow = workflow(&temp, ScriptedTranslator::new());
    let written = workflow.clean(input.path(), None).await.unwrap();

    assert_eq!(written, vec![temp.child("ep_clean.srt").path().to_path_buf()]);
    assert_eq!(
        fs::read_to_string(&written[0]).unwrap(),
        "1\n00:00:01,000 --> 00:00:02,000\nHi."
    );
}

#[tokio::test]
async fn test_check_reports_layout_problems() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("long.srt");
    input
        .write_str(
            "1\n00:00:01,000 --> 00:00:02,000\nShort.\n\n\
             2\n00:00:03,000 --> 00:00:04,000\nOne\nTwo\nThree\n\n\
             3\n00:00:05,000 --> 00:00:06,000\nThis line is definitely far too long for a subtitle",
        )
        .unwrap();

    let workflow = workflow(&temp, ScriptedTranslator::new());
    let issues = workflow.check(input.path()).await.unwrap();

    let summary: Vec<(u32, LayoutSeverity)> = issues.iter().map(|r| (r.index, r.severity())).collect();
    assert_eq!(summary, vec![(2, LayoutSeverity::Warning), (3, LayoutSeverity::Error)]);
}

#[tokio::test]
async fn test_missing_input_is_reported() {
    let temp = TempDir::new().unwrap();
    let workflow = workflow(&temp, ScriptedTranslator::new());

    let err = workflow
        .translate(request(&temp.path().join("nope.srt")), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LegendaError::FileNotFound(_)));
}

#[tokio::test]
async fn test_western_encoded_input_is_decoded() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("latin.srt");
    input
        .write_binary(b"1\r\n00:00:01,000 --> 00:00:02,000\r\nHOMEM: Cora\xe7\xe3o partido.\r\n")
        .unwrap();

    let translator = ScriptedTranslator::new();
    let log = translator.log();
    let workflow = workflow(&temp, translator);
    let summary = workflow
        .translate(request(input.path()), &CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.is_complete());
    assert_eq!(log.lock().unwrap().batches, vec![vec![1]]);

    let written = workflow.clean(input.path(), None).await.unwrap();
    assert_eq!(
        fs::read_to_string(&written[0]).unwrap(),
        "1\n00:00:01,000 --> 00:00:02,000\nCoração partido."
    );
}

#[tokio::test]
async fn test_strict_utf8_rejects_western_bytes() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("latin.srt");
    input
        .write_binary(b"1\n00:00:01,000 --> 00:00:02,000\nN\xe3o.\n")
        .unwrap();

    let mut config = config_in(&temp);
    config.input.encoding = SubtitleEncoding::Utf8;
    let workflow = Workflow::new(config)
        .unwrap()
        .with_translator(Arc::new(ScriptedTranslator::new()))
        .with_progress(false);

    let err = workflow.check(input.path()).await.unwrap_err();
    assert!(matches!(err, LegendaError::InvalidDocument(_)));
}
