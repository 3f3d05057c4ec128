use crate::registry::Mutant;

/// Outcome of applying one mutant to one target text.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchResult {
    Patched(String),
    /// Neither exact nor whitespace-insensitive matching located the
    /// original statement. The (mutant, battery) pair is skipped; this
    /// is never fatal to the batch.
    NotFound,
}

/// Patch a source file for a unit battery: overwrite the physical line
/// at the mutant's 1-based line number with the mutated statement.
/// Line numbers are pre-validated against the checkout revision, so no
/// text search is involved; an out-of-range line is `NotFound`.
pub fn patch_source_line(content: &str, mutant: &Mutant) -> PatchResult {
    if mutant.line_number == 0 {
        return PatchResult::NotFound;
    }
    let mut lines: Vec<&str> = content.lines().collect();
    let index = mutant.line_number - 1;
    if index >= lines.len() {
        return PatchResult::NotFound;
    }
    lines[index] = &mutant.mutated_code;
    PatchResult::Patched(lines.join("\n"))
}

/// Patch a generated inline-test artifact. Line numbers in the artifact
/// are a derived copy's and do not coincide with the original file's,
/// so matching is by content:
/// 1. exact substring replacement of the trimmed original statement;
/// 2. whitespace-insensitive prefix match per line, keeping the
///    space-stripped remainder of the matched line.
pub fn patch_by_content(content: &str, mutant: &Mutant) -> PatchResult {
    let original = mutant.original_code.trim();
    let mutated = mutant.mutated_code.trim();
    if original.is_empty() {
        return PatchResult::NotFound;
    }

    if content.contains(original) {
        return PatchResult::Patched(content.replace(original, mutated));
    }

    // A mutated `if (...) {` line lands in the inline test as a bare
    // assertion of the condition.
    let original_cond = strip_condition(original);
    if original_cond != original && content.contains(original_cond) {
        return PatchResult::Patched(content.replace(original_cond, strip_condition(mutated)));
    }

    // String x = m.group( 4 ) in the artifact may be String x = m.group(4)
    let squeezed_original = original.replace(' ', "");
    let mut replaced = false;
    let mut new_lines = Vec::new();
    for line in content.lines() {
        let squeezed_line = line.trim().replace(' ', "");
        if !line.is_empty() && squeezed_line.starts_with(&squeezed_original) {
            let remainder = &squeezed_line[squeezed_original.len()..];
            new_lines.push(format!("{}{}", mutated, remainder));
            replaced = true;
        } else {
            new_lines.push(line.to_string());
        }
    }
    if !replaced {
        return PatchResult::NotFound;
    }
    PatchResult::Patched(new_lines.join("\n"))
}

/// Normalize a condition statement for comparison: strip a leading
/// `if`, a trailing `{`, and one wrapping pair of parentheses.
pub fn strip_condition(statement: &str) -> &str {
    let mut s = statement.trim();
    if let Some(rest) = s.strip_prefix("if") {
        s = rest.trim();
    }
    if let Some(rest) = s.strip_suffix('{') {
        s = rest.trim();
    }
    if s.starts_with('(') && s.ends_with(')') {
        s = s[1..s.len() - 1].trim();
    }
    s
}

/// Render the line diff for a patched file, for console output and the
/// per-attempt log.
pub fn render_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}
