use super::*;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn create_temp_lesson_file(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file
}

fn words(n: usize) -> String {
    (0..n)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

const LESSON: &str = "% Photosynthesis\n% Grade 7 Science\n\n\
# How plants make food\n\n## Light, water, air\n\n\
- Leaves capture sunlight with chlorophyll\n\
- Roots draw water up through the stem\n\
- Stomata let carbon dioxide in\n\
- Glucose is stored as starch\n\
- Oxygen is released as a by-product\n\
- The process happens in chloroplasts\n\
- Temperature changes the rate\n\
- Light intensity changes the rate\n\
- Carbon dioxide concentration changes the rate\n\n\
# The leaf\n\n\
![Cross-section of a leaf](leaf)\n\n\
- The upper epidermis is transparent so light reaches the palisade layer\n\
- Palisade cells are packed with chloroplasts\n\
- The spongy layer has air spaces for gas exchange\n\
- Guard cells open and close the stomata\n\n\
# Section: Experiments\n\n\
# Testing a leaf for starch\n\n\
Boil the leaf in water to kill it. Soak it in warm ethanol to remove the chlorophyll. \
Rinse it and add iodine solution. Areas that turn blue-black contain starch. \
Compare a variegated leaf with a fully green one and explain the difference you see. \
Record the results in a table and draw a labelled diagram of both leaves.\n\n\
# Closing: Any questions?\n";

#[test]
fn test_twelve_identical_bullets_shorten_to_five() {
    let items = vec!["Chlorophyll absorbs red and blue light".to_string(); 12];
    let shortened = shorten_bullets(&items, 5);
    assert_eq!(shortened.len(), 5);
    assert_eq!(&shortened[..4], &items[..4]);
    let last = &shortened[4];
    assert!(last.starts_with("Also covers:") || last.ends_with('…'));
}

#[test]
fn test_long_bullet_splits_and_keeps_image_once() {
    let mut slide = LessonSlide::new("Respiration");
    slide.image = Some("mitochondria".to_string());
    slide.bullets = vec![words(200)];

    let parts = split_slide_content(&slide, 6);
    assert!(parts.len() >= 2);
    assert_eq!(parts[0].image.as_deref(), Some("mitochondria"));
    assert!(parts[1..].iter().all(|p| p.image.is_none()));
}

#[test]
fn test_subtitle_budget_is_smaller() {
    let config = Config::new();
    let three: Vec<String> = vec!["Sun".into(), "Water".into(), "Air".into()];
    let fifteen: Vec<String> = (0..15).map(|i| format!("Point {}", i)).collect();

    let mut packer = config.packer();
    packer.start_slide("With subtitle", Some("Inputs"), SlideLayout::TitleAndContent);
    assert!(packer.add_bullets(None, &three).is_ok());

    packer.start_slide("With subtitle", Some("Inputs"), SlideLayout::TitleAndContent);
    assert!(matches!(
        packer.add_bullets(None, &fifteen),
        Err(PackError::CapacityExhausted { needed: 510, budget: 480 })
    ));

    packer.start_slide("Without subtitle", None, SlideLayout::TitleAndContent);
    assert_eq!(packer.add_bullets(None, &fifteen).unwrap(), 510);
}

#[test]
fn test_built_deck_passes_audit() {
    let lesson_file = create_temp_lesson_file(LESSON, ".md");
    let config = Config::new();

    let content = utils::read_text_file(lesson_file.path()).unwrap();
    let lessons = parse_lesson(&content, LessonFormat::from_path(lesson_file.path())).unwrap();
    let mut resources = ResourceMap::new();
    resources.insert("leaf", "images/leaf.png");

    let report = build_deck(&lessons, &config.preprocessor(), config.packer(), &resources);
    assert!(report.is_clean());
    assert!(report.deck.len() >= lessons.len());

    let html = generate_html(&report.deck, "Photosynthesis");
    assert!(html.contains("src=\"images/leaf.png\" data-ref=\"leaf\""));

    let audit = config.auditor().audit(&html).unwrap();
    assert!(!audit.has_overflow());
    assert_eq!(audit.markup, html);
    assert_eq!(
        audit.slides.len() + audit.skipped_protected.len(),
        report.deck.len()
    );

    // the packer's own accounting matches what the auditor recovers from markup
    let unprotected = report
        .deck
        .slides()
        .iter()
        .filter(|s| !s.layout().is_protected());
    for (slide, audited) in unprotected.zip(&audit.slides) {
        assert_eq!(slide.consumed_height(), audited.estimated_height);
        assert_eq!(slide.height_budget(), audited.budget);
    }
}

#[test]
fn test_one_table_across_build_and_audit() {
    let config = Config::new();
    let preprocessor = config.preprocessor();
    let packer = config.packer();
    let auditor = config.auditor();
    assert!(Arc::ptr_eq(preprocessor.table(), packer.table()));
    assert!(Arc::ptr_eq(packer.table(), auditor.table()));
}

#[test]
fn test_patch_then_audit_flags_overfull_slide() {
    let config = Config::new();
    let mut lesson = LessonSlide::new("Stomata");
    lesson.bullets = vec!["Open in light".to_string()];
    let report = build_deck(&[lesson], &config.preprocessor(), config.packer(), &ResourceMap::new());
    let html = generate_html(&report.deck, "Stomata");

    // editors can push past the budget; the audit catches it afterwards
    let items: Vec<String> = (0..20).map(|i| format!("Fact {}", i)).collect();
    let updates = vec![SlideUpdate::new(
        0,
        vec![ContentBlock::Bullets {
            heading: None,
            items,
        }],
    )];
    let patched = apply_patch(&html, &updates).unwrap();
    assert_eq!(patched.patched, vec![0]);

    let audit = config.auditor().audit(&patched.markup).unwrap();
    let overflow: Vec<&SlideAudit> = audit.overflowing().collect();
    assert_eq!(overflow.len(), 1);
    assert_eq!(overflow[0].estimated_height, 680);
    assert!(audit.markup.contains("data-overflow=\"true\""));
}

#[test]
fn test_json_lesson_file() {
    let json = r#"[
        {"title": "Welcome", "layout": "cover"},
        {"title": "Cells", "bullets": ["Membrane", "Nucleus"], "caption": "Every living thing is made of cells."}
    ]"#;
    let lesson_file = create_temp_lesson_file(json, ".json");
    let content = utils::read_text_file(lesson_file.path()).unwrap();
    let lessons = parse_lesson(&content, LessonFormat::from_path(lesson_file.path())).unwrap();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].layout, SlideLayout::Cover);
    assert_eq!(lessons[1].bullets.len(), 2);
}
