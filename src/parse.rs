use serde_json::Value;

/// Extracts the first JSON object embedded in free-form agent output.
///
/// Agents are asked for bare JSON but routinely wrap it in prose or code
/// fences. The widest `{ .. }` span is tried; anything unparseable yields
/// `None` so callers can fall back to defaults.
pub fn extract_json_object(output: &str) -> Option<Value> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&output[start..=end]).ok()
}

/// Returns the body of a `### <name>` markdown section, up to the next
/// `###` heading or end of output.
pub fn extract_section(output: &str, name: &str) -> Option<String> {
    let heading = format!("### {name}");
    let mut lines = output.lines();
    lines.by_ref().find(|line| line.trim() == heading)?;

    let mut body = Vec::new();
    for line in lines {
        if line.trim_start().starts_with("###") {
            break;
        }
        body.push(line);
    }
    let text = body.join("\n").trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

/// Extracts the value of a `Category: <word>` line, lowercased.
pub fn extract_category(output: &str) -> Option<String> {
    for line in output.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed
            .strip_prefix("Category:")
            .or_else(|| trimmed.strip_prefix("category:"))
        else {
            continue;
        };
        let word = rest
            .split_whitespace()
            .next()
            .map(|word| {
                word.trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-' && ch != '_')
            })
            .unwrap_or_default();
        if !word.is_empty() {
            return Some(word.to_ascii_lowercase());
        }
    }
    None
}

/// Parses the numbered question list from a `### Questions Needed` body.
/// The literal `None` means the prompt needs no clarification.
pub fn parse_questions(output: &str) -> Vec<String> {
    let Some(body) = extract_section(output, "Questions Needed") else {
        return Vec::new();
    };
    if body.trim().eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    body.lines()
        .map(strip_list_prefix)
        .filter(|question| !question.is_empty())
        .map(str::to_string)
        .collect()
}

/// Removes `1.` / `2)` / `-` style list markers from a question line.
fn strip_list_prefix(line: &str) -> &str {
    let trimmed = line.trim();
    let without_digits = trimmed.trim_start_matches(|ch: char| ch.is_ascii_digit());
    if without_digits.len() < trimmed.len() {
        if let Some(rest) = without_digits
            .strip_prefix('.')
            .or_else(|| without_digits.strip_prefix(')'))
        {
            return rest.trim();
        }
        return trimmed;
    }
    trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .map(str::trim)
        .unwrap_or(trimmed)
}
