use std::path::PathBuf;

use exeval::patch::{self, PatchResult};
use exeval::registry::Mutant;

fn make_mutant(original: &str, mutated: &str, line: usize) -> Mutant {
    Mutant {
        id: 1,
        original_code: original.to_string(),
        mutated_code: mutated.to_string(),
        file_path: PathBuf::from("src/main/java/com/example/Foo.java"),
        line_number: line,
        compilation_failure: None,
    }
}

// --- patch_by_content ---

#[test]
fn content_patch_replaces_exact_substring() {
    let content = "class Foo {\n    int x = a + b;\n}\n";
    let mutant = make_mutant("int x = a + b;", "int x = a - b;", 2);
    let result = patch::patch_by_content(content, &mutant);
    assert_eq!(
        result,
        PatchResult::Patched("class Foo {\n    int x = a - b;\n}\n".to_string())
    );
}

#[test]
fn content_patch_trims_original_before_matching() {
    let content = "int x = a + b;";
    let mutant = make_mutant("  int x = a + b;  ", "int x = a - b;", 1);
    let result = patch::patch_by_content(content, &mutant);
    assert_eq!(result, PatchResult::Patched("int x = a - b;".to_string()));
}

#[test]
fn content_patch_falls_back_to_whitespace_insensitive_prefix() {
    // The artifact spells the call without inner spaces.
    let content = "class Foo {\nString buildNumber = matcher.group(4);\n}";
    let mutant = make_mutant(
        "String buildNumber = matcher.group( 4 )",
        "String buildNumber = matcher.group( 5 )",
        2,
    );
    match patch::patch_by_content(content, &mutant) {
        PatchResult::Patched(patched) => {
            assert!(patched.contains("String buildNumber = matcher.group( 5 );"));
            assert!(!patched.contains("group(4)"));
        }
        PatchResult::NotFound => panic!("prefix match should have applied"),
    }
}

#[test]
fn content_patch_prefix_keeps_line_remainder() {
    // Doubled spaces defeat exact matching; only the squeezed prefix
    // comparison can locate the statement.
    let content = "a = b  >>  1; // shift";
    let mutant = make_mutant("a = b >> 1;", "a = b << 1;", 1);
    match patch::patch_by_content(content, &mutant) {
        PatchResult::Patched(patched) => {
            assert!(patched.starts_with("a = b << 1;"));
            assert!(patched.contains("//shift"));
        }
        PatchResult::NotFound => panic!("prefix match should have applied"),
    }
}

#[test]
fn content_patch_matches_bare_condition_form() {
    // The artifact asserts the condition itself, without the `if`
    // wrapper the mutant carries.
    let content = "assertTrue(a > b);";
    let mutant = make_mutant("if (a > b) {", "if (a >= b) {", 1);
    assert_eq!(
        patch::patch_by_content(content, &mutant),
        PatchResult::Patched("assertTrue(a >= b);".to_string())
    );
}

#[test]
fn content_patch_absent_statement_is_not_found() {
    // Original absent under both exact and whitespace-insensitive
    // matching: no execution is attempted for this pair.
    let content = "class Foo {\n    int y = 0;\n}";
    let mutant = make_mutant("int x = a + b;", "int x = a - b;", 2);
    assert_eq!(patch::patch_by_content(content, &mutant), PatchResult::NotFound);
    assert_eq!(mutant.compilation_failure, None);
}

#[test]
fn content_patch_empty_original_is_not_found() {
    let mutant = make_mutant("   ", "int x = 1;", 1);
    assert_eq!(patch::patch_by_content("int y;", &mutant), PatchResult::NotFound);
}

// --- patch_source_line ---

#[test]
fn source_line_patch_overwrites_physical_line() {
    let content = "line one\nline two\nline three";
    let mutant = make_mutant("line two", "mutated line", 2);
    assert_eq!(
        patch::patch_source_line(content, &mutant),
        PatchResult::Patched("line one\nmutated line\nline three".to_string())
    );
}

#[test]
fn source_line_patch_is_verbatim_no_search() {
    // The physical line need not match original_code at all.
    let content = "a\nb\nc";
    let mutant = make_mutant("completely unrelated", "X", 3);
    assert_eq!(
        patch::patch_source_line(content, &mutant),
        PatchResult::Patched("a\nb\nX".to_string())
    );
}

#[test]
fn source_line_patch_out_of_range_is_not_found() {
    let mutant = make_mutant("x", "y", 10);
    assert_eq!(patch::patch_source_line("one line", &mutant), PatchResult::NotFound);
}

#[test]
fn source_line_patch_line_zero_is_not_found() {
    let mutant = make_mutant("x", "y", 0);
    assert_eq!(patch::patch_source_line("one line", &mutant), PatchResult::NotFound);
}

// --- strip_condition ---

#[test]
fn strip_condition_removes_if_parens_and_brace() {
    assert_eq!(patch::strip_condition("if (a > b) {"), "a > b");
    assert_eq!(patch::strip_condition("if (x == null)"), "x == null");
    assert_eq!(patch::strip_condition("a > b"), "a > b");
}

// --- render_diff ---

#[test]
fn render_diff_shows_only_changed_lines() {
    let diff = patch::render_diff("a\nb\nc\n", "a\nB\nc\n");
    assert!(diff.contains("- b"));
    assert!(diff.contains("+ B"));
    assert!(!diff.contains("- a"));
}
