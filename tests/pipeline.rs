//! End-to-end runs of the marker pipeline against converters that move
//! ordinary content around.

use marker_relay::pipeline::ranges::{assign_removal_regions, assign_section_bodies, assign_section_ranges};
use marker_relay::{
    ConvertError, MarkerRegistry, MarkerTemplate, Passthrough, Pipeline, PipelineError, RuleSet,
    TemplateKind,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use regex::Regex;

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn is_placeholder(line: &str) -> bool {
    line.len() == 32 && line.chars().all(|c| c.is_ascii_hexdigit())
}

/// Joins runs of non-blank content lines into single paragraph lines and
/// separates blocks with blank lines, roughly what a markup converter does.
fn rewrap(input: &str) -> Result<String, ConvertError> {
    let mut blocks: Vec<String> = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in input.split('\n') {
        if is_placeholder(line) || line.trim().is_empty() {
            if !paragraph.is_empty() {
                blocks.push(paragraph.join(" "));
                paragraph.clear();
            }
            if is_placeholder(line) {
                blocks.push(line.to_string());
            }
        } else {
            paragraph.push(line.trim());
        }
    }
    if !paragraph.is_empty() {
        blocks.push(paragraph.join(" "));
    }

    Ok(blocks.join("\n\n") + "\n")
}

/// Reverses all non-placeholder lines and interleaves them with the
/// placeholders according to `picks`, keeping placeholders in order.
fn scramble(input: &str, picks: &[bool]) -> String {
    let (markers, mut others): (Vec<&str>, Vec<&str>) =
        input.split('\n').partition(|line| is_placeholder(line));
    others.reverse();

    let mut markers = markers.into_iter().peekable();
    let mut others = others.into_iter().peekable();
    let mut out = vec!["inserted by converter"];
    let mut step = 0;

    while markers.peek().is_some() || others.peek().is_some() {
        let take_marker = picks.get(step % picks.len().max(1)).copied().unwrap_or(true);
        step += 1;
        let next = if take_marker || others.peek().is_none() {
            markers.next().or_else(|| others.next())
        } else {
            others.next()
        };
        if let Some(line) = next {
            out.push(line);
            if step % 3 == 0 {
                out.push("");
            }
        }
    }

    out.join("\n")
}

fn mark_registry() -> MarkerRegistry {
    let mut registry = MarkerRegistry::new();
    registry.register_template(MarkerTemplate {
        pattern: Regex::new(r"%%\\mark\{(.*?)\}").unwrap(),
        capture: 1,
        identity: Some("mark".to_string()),
        kind: TemplateKind::Collector,
    });
    registry.register_template(MarkerTemplate {
        pattern: Regex::new(r"%%\\head\{(.*?)\}").unwrap(),
        capture: 1,
        identity: Some("head".to_string()),
        kind: TemplateKind::Section { level: 2 },
    });
    registry
}

#[derive(Debug, Clone)]
enum Entry {
    Content(String),
    Mark(String),
    Head(String),
}

fn entry_strategy() -> impl Strategy<Value = Entry> {
    prop_oneof![
        3 => "[g-z ]{0,16}".prop_map(Entry::Content),
        1 => "[g-z]{1,8}".prop_map(Entry::Mark),
        1 => "[g-z]{1,8}".prop_map(Entry::Head),
    ]
}

fn render(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| match e {
            Entry::Content(text) => text.clone(),
            Entry::Mark(text) => format!(r"%%\mark{{{}}}", text),
            Entry::Head(text) => format!(r"%%\head{{{}}}", text),
        })
        .collect()
}

#[test]
fn test_rewrapping_converter_keeps_markers() {
    let registry = mark_registry();
    let input = lines(&[
        r"%%\head{Intro}",
        "first line of a",
        "wrapped paragraph",
        r"%%\mark{remember}",
        "",
        "another",
        r"%%\head{Next}",
        "tail",
    ]);

    let mut doc = Pipeline::new(&registry).run(input, &rewrap).unwrap();
    let mark_comment = doc.matches.values().find(|m| m.is_collector()).unwrap().final_text.clone();

    assert_eq!(
        doc.lines,
        lines(&[
            "## Intro",
            "",
            "first line of a wrapped paragraph",
            "",
            mark_comment.as_str(),
            "",
            "another",
            "",
            "## Next",
            "",
            "tail",
            "",
        ])
    );

    assign_section_ranges(&mut doc, Some("head"));
    assign_section_bodies(&mut doc, Some("head")).unwrap();

    assert_eq!(doc.matches[&0].range(), Some((0, 8)));
    assert_eq!(doc.matches[&8].range(), Some((8, 12)));
    assert_eq!(doc.matches[&8].assigned_text(), Some("## Next\n\ntail\n"));
}

#[test]
fn test_converter_dropping_a_marker_fails() {
    let registry = mark_registry();
    let input = lines(&["a", r"%%\mark{one}", "b", r"%%\mark{two}"]);

    let drop_last_marker = |text: &str| -> Result<String, ConvertError> {
        let mut kept: Vec<&str> = text.split('\n').collect();
        if let Some(pos) = kept.iter().rposition(|l| is_placeholder(l)) {
            kept.remove(pos);
        }
        Ok(kept.join("\n"))
    };

    let err = Pipeline::new(&registry).run(input, &drop_last_marker).unwrap_err();
    match err {
        PipelineError::UnresolvedMarkers { placeholders } => assert_eq!(placeholders.len(), 1),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_rule_driven_document() {
    let rules = RuleSet::from_yaml_str(
        r#"
sections:
  - { name: chapter, syntax: chapter, level: 1 }
collectors:
  - { name: keypoint, syntax: keypoint }
removals:
  - name: solution
    syntax: { start: beginsolution, end: endsolution }
"#,
    )
    .unwrap();
    let registry = rules.build_registry(true).unwrap();
    let input = lines(&[
        r"%%\chapter{Forces}",
        "Objects accelerate",
        "when pushed.",
        r"%%\keypoint{F = ma}",
        r"%%\beginsolution",
        "The answer is 4.",
        r"%%\endsolution",
        r"%%\chapter{Energy}",
        "Conserved.",
    ]);

    let mut doc = Pipeline::new(&registry).run(input, &rewrap).unwrap();
    let report = rules.postprocess(&mut doc);
    assert!(report.is_success());

    let starts: Vec<&str> = doc
        .matches
        .values()
        .filter(|m| m.is_removal())
        .map(|m| m.final_text.as_str())
        .collect();
    assert_eq!(starts.len(), 1);
    assert!(starts[0].starts_with("<!-- BeginRemoval solution"));

    let region = doc
        .matches
        .values()
        .find(|m| m.is_removal())
        .and_then(|m| m.assigned_text())
        .unwrap();
    let region_lines: Vec<&str> = region.split('\n').collect();
    assert_eq!(region_lines[1..region_lines.len() - 1], ["", "The answer is 4.", ""]);
    assert!(region_lines[region_lines.len() - 1].starts_with("<!-- EndRemoval solution"));

    let chapters: Vec<&str> = doc
        .matches
        .values()
        .filter(|m| m.is_section())
        .filter_map(|m| m.assigned_text())
        .collect();
    assert_eq!(chapters.len(), 2);
    assert!(chapters[0].starts_with("# Forces\n\nObjects accelerate when pushed."));
    assert_eq!(chapters[1], "# Energy\n\nConserved.\n");
}

#[test]
fn test_removal_pair_region_text() {
    let mut registry = MarkerRegistry::new();
    for (syntax, role) in [("open", marker_relay::BoundaryRole::Start), ("close", marker_relay::BoundaryRole::End)] {
        registry.register_template(MarkerTemplate {
            pattern: Regex::new(&format!(r"%%\\{}\b", syntax)).unwrap(),
            capture: 0,
            identity: Some("hide".to_string()),
            kind: TemplateKind::Removal { role },
        });
    }

    let mut doc = Pipeline::new(&registry)
        .run(lines(&[r"%%\open", "content", r"%%\close"]), &Passthrough)
        .unwrap();
    let expected = format!("{}\ncontent\n{}", doc.matches[&0].final_text, doc.matches[&2].final_text);

    assign_removal_regions(&mut doc, Some("hide")).unwrap();

    assert_eq!(doc.matches.len(), 1);
    assert_eq!(doc.matches[&0].assigned_text(), Some(expected.as_str()));
}

proptest! {
    #[test]
    fn identity_converter_keeps_positions(entries in prop::collection::vec(entry_strategy(), 0..40)) {
        let registry = mark_registry();
        let doc = Pipeline::new(&registry).run(render(&entries), &Passthrough).unwrap();

        let original: Vec<usize> = doc.original_matches.keys().copied().collect();
        let relocated: Vec<usize> = doc.matches.keys().copied().collect();
        prop_assert_eq!(original, relocated);
    }

    #[test]
    fn scrambled_content_keeps_marker_order(
        entries in prop::collection::vec(entry_strategy(), 1..40),
        picks in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let registry = mark_registry();
        let converter = |text: &str| -> Result<String, ConvertError> { Ok(scramble(text, &picks)) };

        let doc = Pipeline::new(&registry).run(render(&entries), &converter).unwrap();

        let before: Vec<&str> = doc.original_matches.values().map(|m| m.uid.as_str()).collect();
        let after: Vec<&str> = doc.matches.values().map(|m| m.uid.as_str()).collect();
        prop_assert_eq!(before, after);

        for (line, m) in &doc.matches {
            prop_assert_eq!(&doc.lines[*line], &m.final_text);
        }
    }

    #[test]
    fn section_ranges_partition_the_tail(
        entries in prop::collection::vec(entry_strategy(), 1..40),
        picks in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let registry = mark_registry();
        let converter = |text: &str| -> Result<String, ConvertError> { Ok(scramble(text, &picks)) };
        let mut doc = Pipeline::new(&registry).run(render(&entries), &converter).unwrap();

        let starts = assign_section_ranges(&mut doc, Some("head"));
        let ranges: Vec<(usize, usize)> = starts
            .iter()
            .filter_map(|line| doc.matches[line].range())
            .collect();

        prop_assert_eq!(ranges.len(), starts.len());
        if let (Some(first), Some(last)) = (ranges.first(), ranges.last()) {
            prop_assert_eq!(first.0, starts[0]);
            prop_assert_eq!(last.1, doc.line_count());
        }
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].1, pair[1].0);
        }
        for (start, end) in &ranges {
            prop_assert!(start < end);
        }
    }
}

#[test]
fn test_cli_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.yml");
    let input = dir.path().join("doc.tex");
    let output = dir.path().join("out/doc.md");
    let store = dir.path().join("db/records.json");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();

    std::fs::write(
        &rules,
        "sections:\n  - { name: chapter, syntax: chapter }\ncollectors:\n  - { name: keypoint, syntax: keypoint }\n",
    )
    .unwrap();
    std::fs::write(&input, "%%\\chapter{One}\ntext\n%%\\keypoint{k}\n").unwrap();

    let run = || {
        std::process::Command::new(env!("CARGO_BIN_EXE_marker_relay"))
            .arg("--input")
            .arg(&input)
            .arg("--rules")
            .arg(&rules)
            .arg("--output")
            .arg(&output)
            .arg("--store")
            .arg(&store)
            .arg("--passthrough")
            .status()
            .unwrap()
    };
    assert!(run().success());
    // A second run replaces the first run's records.
    assert!(run().success());

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("# One\ntext\n<!-- Collector "));
    assert!(written.ends_with(" -->\n"));

    let records: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(records["records"].as_object().unwrap().len(), 2);
}
