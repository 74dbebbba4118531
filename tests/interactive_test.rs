mod common;

use std::io::Cursor;

use common::{init, tokenizer, FixedScoreModel};
use prompt_taxonomy::classifier::Classifier;
use prompt_taxonomy::{run_interactive, LabelVocabulary};

fn classifier(dir: &std::path::Path) -> Classifier<FixedScoreModel> {
    let vocabulary = LabelVocabulary::from_pairs([("creative writing", 0u32), ("closed QA", 1u32)]).unwrap();
    Classifier::builder()
        .with_model(FixedScoreModel { scores: vec![5.0, 0.1] })
        .with_tokenizer(tokenizer(dir, 16))
        .with_vocabulary(vocabulary)
        .build()
        .unwrap()
}

fn run(input: &str) -> (usize, String) {
    let dir = tempfile::tempdir().unwrap();
    let classifier = classifier(dir.path());
    let mut output = Vec::new();
    let count = run_interactive(&classifier, Cursor::new(input), &mut output).unwrap();
    (count, String::from_utf8(output).unwrap())
}

#[test]
fn test_one_prompt_then_exit() {
    init();
    let (count, output) = run("write a short story\nexit\n");
    assert_eq!(count, 1);
    let lines: Vec<&str> = output.lines().filter(|l| l.contains("Predicted Prompt Tag")).collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Predicted Prompt Tag: creative writing ("));
    assert!(lines[0].ends_with("% confidence)"));
}

#[test]
fn test_exit_is_case_insensitive() {
    let (count, output) = run("  EXIT  \nwrite a short story\n");
    assert_eq!(count, 0);
    assert!(!output.contains("Predicted Prompt Tag"));
}

#[test]
fn test_end_of_input_stops() {
    let (count, _) = run("write a short story\nwho wrote hamlet");
    assert_eq!(count, 2);
}

#[test]
fn test_bad_prompt_does_not_end_session() {
    let (count, output) = run("\nwrite a short story\nexit\n");
    assert_eq!(count, 1);
    assert!(output.contains("Error: Validation error"));
    assert!(output.contains("Predicted Prompt Tag"));
}

#[test]
fn test_confidence_has_two_decimals() {
    let (_, output) = run("write\n");
    // softmax([5.0, 0.1])[0] = 0.99260...
    assert!(output.contains("(99.26% confidence)"));
}

#[test]
fn test_invalid_utf8_prompt_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = classifier(dir.path());
    let mut input = b"write\n".to_vec();
    input.extend_from_slice(&[0xff, 0xfe, b'\n']);
    input.extend_from_slice(b"write a short story\nexit\n");

    let mut output = Vec::new();
    let count = run_interactive(&classifier, Cursor::new(input), &mut output).unwrap();
    let output = String::from_utf8(output).unwrap();

    assert_eq!(count, 2);
    assert!(output.contains("Error: prompt is not valid UTF-8"));
    assert_eq!(output.matches("Predicted Prompt Tag").count(), 2);
}
