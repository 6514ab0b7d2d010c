//! Syntax-tree navigation helpers shared by the language extractors.

use tree_sitter::Node;

use crate::parser::ParsedFile;

/// All direct children of `node`, named and anonymous.
pub fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Named direct children of `node`.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First direct child of the given kind.
pub fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    children(node).into_iter().find(|c| c.kind() == kind)
}

/// Whether a token of `kind` (e.g. `async`, `static`) is a direct child.
pub fn has_token(node: Node, kind: &str) -> bool {
    children(node).iter().any(|c| c.kind() == kind)
}

/// Whether any ancestor of `node`, at any depth, has one of `kinds`.
pub fn has_ancestor(node: Node, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return true;
        }
        current = n.parent();
    }
    false
}

/// Nearest ancestor whose kind is one of `kinds`.
pub fn find_ancestor<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Depth-first, pre-order walk over every node below `root`.
pub fn walk_tree<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    'outer: loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'outer;
            }
            if !cursor.goto_parent() {
                break 'outer;
            }
        }
    }
}

/// Doc comment attached to `decl`: the immediately preceding sibling comment
/// that opens with `marker`, separated by no blank line.
pub fn preceding_doc_comment(
    parsed: &ParsedFile,
    decl: Node,
    comment_kinds: &[&str],
    marker: &str,
) -> Option<String> {
    let prev = decl.prev_sibling()?;
    if !comment_kinds.contains(&prev.kind()) {
        return None;
    }
    if decl.start_position().row > prev.end_position().row + 1 {
        return None;
    }
    let text = parsed.node_text(prev);
    if !text.starts_with(marker) {
        return None;
    }
    Some(clean_doc_comment(text))
}

/// Contiguous run of line comments immediately preceding `decl`.
pub fn preceding_line_comments(parsed: &ParsedFile, decl: Node, comment_kind: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = decl.start_position().row;
    let mut current = decl.prev_sibling();
    while let Some(prev) = current {
        if prev.kind() != comment_kind || prev.end_position().row + 1 != expected_row {
            break;
        }
        let text = parsed.node_text(prev);
        if !text.starts_with("//") {
            break;
        }
        lines.push(text.trim_start_matches('/').trim().to_string());
        expected_row = prev.start_position().row;
        current = prev.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

/// Strip comment delimiters and leading `*` gutters from a doc block.
pub fn clean_doc_comment(raw: &str) -> String {
    let body = raw
        .trim()
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/");
    body.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clean a Python docstring literal.
pub fn clean_docstring(raw: &str) -> String {
    let mut text = raw.trim();
    for prefix in ["r", "u", "R", "U"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            if rest.starts_with('"') || rest.starts_with('\'') {
                text = rest;
            }
        }
    }
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if text.len() >= quote.len() * 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = &text[quote.len()..text.len() - quote.len()];
            break;
        }
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Type annotation text with the leading `:` removed.
pub fn strip_type_prefix(raw: &str) -> String {
    raw.trim().trim_start_matches(':').trim().to_string()
}

/// Remove surrounding quotes from a string literal.
pub fn unquote(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// Drop generic arguments: `Repository<User>` -> `Repository`.
pub fn base_type_name(raw: &str) -> String {
    let raw = raw.trim();
    let end = raw
        .find(|c| c == '<' || c == '[' || c == '(')
        .unwrap_or(raw.len());
    raw[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_doc_comment() {
        let raw = "/**\n * Fetch a user.\n *\n * @param id user id\n */";
        assert_eq!(clean_doc_comment(raw), "Fetch a user.\n@param id user id");
        assert_eq!(clean_doc_comment("/** One liner */"), "One liner");
    }

    #[test]
    fn test_clean_docstring() {
        assert_eq!(clean_docstring("\"\"\"Get a task by ID.\"\"\""), "Get a task by ID.");
        assert_eq!(clean_docstring("'''\n    Multi\n    line\n    '''"), "Multi\nline");
    }

    #[test]
    fn test_strip_helpers() {
        assert_eq!(strip_type_prefix(": Promise<User>"), "Promise<User>");
        assert_eq!(unquote("'./user'"), "./user");
        assert_eq!(unquote("\"fmt\""), "fmt");
        assert_eq!(base_type_name("Repository<User>"), "Repository");
        assert_eq!(base_type_name("Mapped[List[\"Task\"]]"), "Mapped");
    }
}
