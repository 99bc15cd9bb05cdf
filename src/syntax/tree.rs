//! Flattens a tree-sitter-bash syntax tree into printable pieces
//!
//! Every leaf token keeps its source text. Only the whitespace between
//! tokens is reinterpreted, and only where that cannot change meaning.

use tree_sitter::{Node, Parser, Tree};

use super::{position_of, ParseError, ParseMode};

/// Nodes printed exactly as written, without descending into them
const VERBATIM: &[&str] = &[
    "word",
    "string",
    "raw_string",
    "ansi_c_string",
    "translated_string",
    "expansion",
    "command_substitution",
    "process_substitution",
    "arithmetic_expansion",
    "test_command",
    "regex",
    "extglob_pattern",
    "heredoc_body",
    "comment",
];

/// Operators that continue a command on the next line
const JOINERS: &[&str] = &["|", "|&", "&&", "||"];

/// Parsed script ready for printing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub(super) pieces: Vec<Piece>,

    /// Source ends its last line with `\r\n`
    pub(super) crlf: bool,
}

/// A leaf token and the whitespace that preceded it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Piece {
    pub text: String,
    pub gap: Gap,
    /// Block nesting level
    pub depth: usize,
    pub comment: bool,
    /// Trailing `|`, `&&` and friends carry the command onto the next line
    pub joins: bool,
}

/// Whitespace between two pieces
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Gap {
    /// Directly adjacent
    None,
    /// Blanks on one line
    Space,
    /// Line breaks; the count includes blank lines
    Lines(usize),
    /// Backslash-newline
    Continuation,
    /// Between a redirect operator and its target
    Redirect { amp: bool },
    /// Copied as written
    Verbatim(String),
}

impl Gap {
    /// Gap left behind when the piece in between is dropped
    fn merge(self, after: Gap) -> Gap {
        match (self, after) {
            (Gap::Lines(a), Gap::Lines(b)) => Gap::Lines(a + b - 1),
            (_, after) => after,
        }
    }
}

pub(super) fn parse(text: &str, name: &str, mode: ParseMode) -> Result<Program, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_bash::LANGUAGE.into())
        .map_err(|e| ParseError::new(name, 1, 1, format!("bash grammar unavailable: {}", e)))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| ParseError::new(name, 1, 1, "parser gave up"))?;

    check(&tree, text, name)?;

    let mut walk = Walk::default();
    walk.visit(tree.root_node(), 0);
    walk.leaves.sort_by_key(|(node, _)| node.start_byte());

    let mut builder = Builder {
        src: text,
        name,
        keep_comments: mode.keep_comments,
        targets: &walk.targets,
        pieces: Vec::new(),
        end: 0,
        carried: None,
    };
    for (node, depth) in walk.leaves {
        builder.push(node, depth)?;
    }

    let crlf = text[builder.end..].starts_with("\r\n");
    Ok(Program {
        pieces: builder.pieces,
        crlf,
    })
}

/// Reports the first `ERROR` or `MISSING` node
fn check(tree: &Tree, src: &str, name: &str) -> Result<(), ParseError> {
    let Some(node) = first_error(tree.root_node()) else {
        return Ok(());
    };

    let (line, col) = position_of(&src.as_bytes()[..node.start_byte()]);
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        match text_of(src, node).split_whitespace().next() {
            Some(token) => format!("unexpected `{}`", token),
            None => "syntax error".to_string(),
        }
    };
    Err(ParseError::new(name, line, col, message))
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find_map(first_error);
    found
}

fn text_of<'s>(src: &'s str, node: Node) -> &'s str {
    src.get(node.byte_range()).unwrap_or_default()
}

/// Collects leaves with their block depth
#[derive(Default)]
struct Walk<'t> {
    leaves: Vec<(Node<'t>, usize)>,
    /// Start offsets of redirect targets
    targets: Vec<usize>,
}

impl<'t> Walk<'t> {
    fn visit(&mut self, node: Node<'t>, depth: usize) {
        if node.child_count() == 0 || VERBATIM.contains(&node.kind()) {
            self.leaves.push((node, depth));
            return;
        }

        if node.kind() == "file_redirect" {
            if let Some(target) = node.child_by_field_name("destination") {
                self.targets.push(target.start_byte());
            }
        }

        let mut past_pattern = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let nested = match node.kind() {
                "do_group" | "compound_statement" | "subshell" | "elif_clause" | "else_clause"
                | "case_statement" => child.is_named(),
                "if_statement" => {
                    child.is_named() && !matches!(child.kind(), "elif_clause" | "else_clause")
                }
                "case_item" => past_pattern,
                _ => false,
            };
            if node.kind() == "case_item" && child.kind() == ")" {
                past_pattern = true;
            }
            self.visit(child, depth + usize::from(nested));
        }
    }
}

struct Builder<'a> {
    src: &'a str,
    name: &'a str,
    keep_comments: bool,
    targets: &'a [usize],
    pieces: Vec<Piece>,
    /// End offset of the last leaf seen
    end: usize,
    /// Gap of a dropped comment, folded into the next piece
    carried: Option<Gap>,
}

impl Builder<'_> {
    fn push(&mut self, node: Node, depth: usize) -> Result<(), ParseError> {
        let text = text_of(self.src, node);
        // newline terminators are whitespace to us
        if text.trim().is_empty() {
            return Ok(());
        }
        if node.start_byte() < self.end {
            let (line, col) = position_of(&self.src.as_bytes()[..node.start_byte()]);
            return Err(ParseError::new(self.name, line, col, "overlapping tokens"));
        }

        let mut gap = self.gap(&self.src[self.end..node.start_byte()], node, text);
        self.end = node.end_byte();
        if let Some(carried) = self.carried.take() {
            gap = carried.merge(gap);
        }

        let comment = node.kind() == "comment";
        let shebang = node.start_byte() == 0 && text.starts_with("#!");
        if comment && !self.keep_comments && !shebang {
            self.carried = Some(gap);
            return Ok(());
        }

        self.pieces.push(Piece {
            text: if comment { text.trim_end() } else { text }.to_string(),
            gap,
            depth,
            comment,
            joins: !node.is_named() && JOINERS.contains(&text),
        });
        Ok(())
    }

    fn gap(&self, between: &str, node: Node, text: &str) -> Gap {
        if matches!(node.kind(), "heredoc_body" | "heredoc_content" | "heredoc_end") {
            return Gap::Verbatim(between.to_string());
        }

        let blank = |b: u8| b == b' ' || b == b'\t';
        if between.bytes().all(blank) {
            if self.targets.contains(&node.start_byte()) {
                // `< <(cmd)` must not become `<<(cmd)`
                if text.starts_with(['<', '>']) {
                    return Gap::Space;
                }
                let amp = self.pieces.last().is_some_and(|p| p.text.ends_with('&'));
                return Gap::Redirect { amp };
            }
            return if between.is_empty() || text == ";" {
                Gap::None
            } else {
                Gap::Space
            };
        }

        if between.bytes().all(|b| blank(b) || b == b'\n') {
            return Gap::Lines(between.bytes().filter(|&b| b == b'\n').count());
        }

        if let Some((before, after)) = between.split_once("\\\n") {
            if before.bytes().all(blank) && after.bytes().all(blank) {
                return Gap::Continuation;
            }
        }

        Gap::Verbatim(between.to_string())
    }
}
