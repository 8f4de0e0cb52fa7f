/// Builder for the structured markdown blocks returned to MCP clients and
/// printed by the CLI.
#[derive(Debug, Default)]
pub struct OutputBuilder {
    lines: Vec<String>,
}

impl OutputBuilder {
    pub fn new() -> OutputBuilder {
        OutputBuilder::default()
    }

    pub fn add(&mut self, text: impl Into<String>) -> &mut OutputBuilder {
        self.lines.push(text.into());
        self
    }

    pub fn blank(&mut self) -> &mut OutputBuilder {
        self.lines.push(String::new());
        self
    }

    pub fn header(&mut self, text: &str) -> &mut OutputBuilder {
        self.header_level(text, 2)
    }

    pub fn header_level(&mut self, text: &str, level: usize) -> &mut OutputBuilder {
        self.lines.push(format!("{} {}", "#".repeat(level), text));
        self
    }

    pub fn field(&mut self, name: &str, value: &str) -> &mut OutputBuilder {
        self.lines.push(format!("**{name}**: {value}"));
        self
    }

    pub fn bullet(&mut self, text: impl AsRef<str>) -> &mut OutputBuilder {
        self.lines.push(format!("- {}", text.as_ref()));
        self
    }

    pub fn numbered(&mut self, number: usize, text: &str) -> &mut OutputBuilder {
        self.lines.push(format!("{number}. {text}"));
        self
    }

    pub fn code(&mut self, text: &str, language: &str) -> &mut OutputBuilder {
        self.lines.push(format!("```{language}"));
        self.lines.push(text.to_string());
        self.lines.push("```".to_string());
        self
    }

    pub fn separator(&mut self) -> &mut OutputBuilder {
        self.lines.push("---".to_string());
        self
    }

    pub fn build(&self) -> String {
        self.lines.join("\n")
    }
}

/// Truncates on a char boundary, appending a marker when content was cut.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        format!("{head}\n\n... (output truncated)")
    } else {
        text.to_string()
    }
}
