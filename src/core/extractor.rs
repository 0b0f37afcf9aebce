// src/core/extractor.rs — Pull a syntactically valid code candidate out of a model answer
//
// The first fenced block (preferring one tagged python) is the candidate;
// an answer without fences is taken whole. A candidate that does not parse
// is replaced by the empty string.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// Checks source text for syntax errors without executing it.
pub trait SyntaxValidator: Send + Sync {
    fn is_valid(&self, source: &str) -> bool;
}

/// Python syntax check backed by tree-sitter-python.
pub struct PythonSyntax;

impl SyntaxValidator for PythonSyntax {
    fn is_valid(&self, source: &str) -> bool {
        let mut parser = tree_sitter::Parser::new();
        if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
            tracing::warn!("Python grammar unavailable: {}", e);
            return false;
        }
        match parser.parse(source, None) {
            Some(tree) => !tree.root_node().has_error(),
            None => false,
        }
    }
}

/// Accepts anything. Useful when the harness does its own syntax checks.
pub struct AcceptAll;

impl SyntaxValidator for AcceptAll {
    fn is_valid(&self, _source: &str) -> bool {
        true
    }
}

pub struct CodeExtractor {
    validator: Box<dyn SyntaxValidator>,
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new(Box::new(PythonSyntax))
    }
}

impl CodeExtractor {
    pub fn new(validator: Box<dyn SyntaxValidator>) -> Self {
        Self { validator }
    }

    /// Valid code candidate from `raw`, or `""` when there is none.
    pub fn extract(&self, raw: &str) -> String {
        let candidate = candidate(raw);
        if self.validator.is_valid(&candidate) {
            candidate
        } else {
            tracing::debug!(
                preview = %crate::util::preview(&candidate, 80),
                "Discarding candidate with syntax errors"
            );
            String::new()
        }
    }
}

/// The unvalidated candidate: first python fence, else first fence, else the whole answer.
pub fn candidate(raw: &str) -> String {
    let mut blocks: Vec<(bool, String)> = Vec::new();
    let mut current: Option<(bool, String)> = None;

    for event in Parser::new(raw) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let lang = info.split_whitespace().next().unwrap_or("");
                let is_python = matches!(lang.to_ascii_lowercase().as_str(), "python" | "py" | "python3");
                current = Some((is_python, String::new()));
            }
            Event::Text(text) => {
                if let Some((_, ref mut body)) = current {
                    body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    let chosen = blocks
        .iter()
        .find(|(is_python, _)| *is_python)
        .or_else(|| blocks.first());

    match chosen {
        Some((_, body)) => body.strip_suffix('\n').unwrap_or(body).to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fenced_python_block() {
        let raw = "Here you go:\n```python\nimport numpy as np\nresult = np.zeros(3)\n```\nDone.";
        let ex = CodeExtractor::default();
        assert_eq!(ex.extract(raw), "import numpy as np\nresult = np.zeros(3)");
    }

    #[test]
    fn test_no_fence_takes_whole_answer() {
        let raw = "result = df.groupby('a').sum()";
        assert_eq!(CodeExtractor::default().extract(raw), raw);
    }

    #[test]
    fn test_invalid_candidate_is_empty() {
        let ex = CodeExtractor::default();
        assert_eq!(ex.extract("```python\ndef broken(:\n    return 1\n```"), "");
        assert_eq!(ex.extract("result = (1 +"), "");
    }

    #[test]
    fn test_prose_answer_is_invalid() {
        let raw = "I'm sorry, I cannot help with that request because it's ambiguous.";
        assert_eq!(CodeExtractor::default().extract(raw), "");
    }

    #[test]
    fn test_prefers_python_block() {
        let raw = "```bash\npip install numpy\n```\n\n```python\nx = 1\n```";
        assert_eq!(candidate(raw), "x = 1");
    }

    #[test]
    fn test_untagged_block_used_when_no_python() {
        let raw = "```\ny = 2\n```\n```\nz = 3\n```";
        assert_eq!(candidate(raw), "y = 2");
    }

    #[test]
    fn test_first_of_several_python_blocks() {
        let raw = "```python\na = 1\n```\ntext\n```python\nb = 2\n```";
        assert_eq!(candidate(raw), "a = 1");
    }

    #[test]
    fn test_only_one_trailing_newline_stripped() {
        let raw = "```python\nx = 1\n\n```";
        assert_eq!(candidate(raw), "x = 1\n");
    }

    #[test]
    fn test_accept_all_validator() {
        let ex = CodeExtractor::new(Box::new(AcceptAll));
        assert_eq!(ex.extract("not ( python"), "not ( python");
    }

    #[test]
    fn test_python_syntax_validator() {
        let v = PythonSyntax;
        assert!(v.is_valid("def f(x):\n    return x * 2\n"));
        assert!(v.is_valid(""));
        assert!(!v.is_valid("x = = 2"));
    }
}
