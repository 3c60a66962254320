use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deckfit"))
        .args(args)
        .env_remove("DECKFIT_AUDIT_TOLERANCE")
        .env_remove("DECKFIT_HEIGHT_TABLE")
        .output()
        .expect("Failed to execute command")
}

const LESSON: &str = "% Volcanoes\n% Earth Science\n\n\
# What is a volcano?\n\n\
- An opening in the crust\n\
- Magma rises from the mantle\n\
- Lava is magma at the surface\n\n\
![Cross-section of a volcano](volcano)\n\n\
# Closing: Review\n";

fn overflowing_section(index: usize) -> String {
    let items: String = (0..20).map(|i| format!("<li>item {}</li>", i)).collect();
    format!(
        "<section class=\"slide\" data-slide-index=\"{}\" data-slide-kind=\"title-and-content\">\n<h1 class=\"slide-title\">Long</h1>\n<div class=\"slide-content\">\n<div class=\"block block-bullets\"><ul>{}</ul></div>\n</div>\n</section>\n",
        index, items
    )
}

#[test]
fn test_build_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let temp_path = temp_dir.path();

    let lesson_path = temp_path.join("volcanoes.md");
    fs::write(&lesson_path, LESSON).expect("Failed to write lesson file");
    let resources_path = temp_path.join("resources.json");
    fs::write(&resources_path, r#"{"volcano": "https://cdn.example.com/volcano.png"}"#)
        .expect("Failed to write resources file");
    let output_path = temp_path.join("out/deck.html");
    let report_path = temp_path.join("out/report.json");

    let output = run_command(&[
        "build",
        "-i",
        lesson_path.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
        "--resources",
        resources_path.to_str().unwrap(),
        "--report",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let html = fs::read_to_string(&output_path).expect("Failed to read output file");
    assert!(html.contains("<title>Volcanoes</title>"));
    assert!(html.contains("data-slide-kind=\"cover\""));
    assert!(html.contains("data-slide-kind=\"closing\""));
    assert!(html.contains("src=\"https://cdn.example.com/volcano.png\""));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["failures"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_build_then_audit_is_clean() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let lesson_path = temp_dir.path().join("lesson.md");
    fs::write(&lesson_path, LESSON).unwrap();
    let output_path = temp_dir.path().join("deck.html");

    let build = run_command(&[
        "build",
        "-i",
        lesson_path.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
    ]);
    assert!(build.status.success(), "Build failed: {:?}", build);

    let pattern = format!("{}/*.html", temp_dir.path().to_string_lossy());
    let audit = run_command(&["audit", "-p", &pattern, "--fail-on-overflow"]);
    assert!(audit.status.success(), "Audit failed: {:?}", audit);
    assert!(String::from_utf8_lossy(&audit.stdout).contains("0 overflowing slides"));
}

#[test]
fn test_audit_command_annotates_and_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let deck_path = temp_dir.path().join("deck.html");
    fs::write(&deck_path, overflowing_section(0)).unwrap();
    let pattern = format!("{}/*.html", temp_dir.path().to_string_lossy());

    let output = run_command(&["audit", "-p", &pattern, "--write", "--fail-on-overflow"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("slide 0 overflows by 140px"));

    let annotated = fs::read_to_string(&deck_path).unwrap();
    assert!(annotated.contains("data-overflow=\"true\" data-estimated-height=\"680\""));
}

#[test]
fn test_audit_tolerance_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("deck.html"), overflowing_section(0)).unwrap();
    let pattern = format!("{}/*.html", temp_dir.path().to_string_lossy());

    // 680px against 540px is about 26% over
    let output = run_command(&["audit", "-p", &pattern, "--tolerance", "30", "--fail-on-overflow"]);
    assert!(output.status.success(), "Audit failed: {:?}", output);
}

#[test]
fn test_audit_no_matches() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let pattern = format!("{}/*.html", temp_dir.path().to_string_lossy());
    let output = run_command(&["audit", "-p", &pattern]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No markup files found"));
}

#[test]
fn test_patch_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let deck_path = temp_dir.path().join("deck.html");
    let markup = format!("{}{}", overflowing_section(0), overflowing_section(1));
    fs::write(&deck_path, &markup).unwrap();
    let updates_path = temp_dir.path().join("updates.json");
    fs::write(
        &updates_path,
        r#"[{"index": 1, "title": "Short", "blocks": [{"type": "callout", "text": "Just one idea."}]},
            {"index": 7, "blocks": [{"type": "callout", "text": "nowhere"}]},
            {"index": "zero", "blocks": [{"type": "callout", "text": "unreadable"}]}]"#,
    )
    .unwrap();
    let output_path = temp_dir.path().join("patched.html");

    let output = run_command(&[
        "patch",
        "-i",
        deck_path.to_str().unwrap(),
        "-u",
        updates_path.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let patched = fs::read_to_string(&output_path).unwrap();
    assert!(patched.starts_with(&overflowing_section(0)));
    assert!(patched.contains("<h1 class=\"slide-title\">Short</h1>"));
    assert!(patched.contains("<p>Just one idea.</p>"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"missingSlide\""));
    assert!(stdout.contains("\"rejected\""));
    assert!(!patched.contains("unreadable"));
}

#[test]
fn test_estimate_command() {
    let output = run_command(&["estimate"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Budget without subtitle: 540px"));
    assert!(stdout.contains("Budget with subtitle: 480px"));
}
