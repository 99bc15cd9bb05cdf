//! # Shell Syntax
//!
//! Parser and printer used to bring shell scripts into canonical form.
//! Parsing is done by tree-sitter-bash; the printer walks the resulting
//! concrete syntax tree and only ever rewrites the whitespace between
//! tokens.
//!
//! The formatter only depends on the [`ShellSyntax`] trait: it hands raw
//! bytes to [`ShellSyntax::parse`] and renders the opaque tree with
//! [`ShellSyntax::print`]. [`Shell`] is the built-in implementation.
//!
//! ## Canonical Form
//!
//! | Construct | Printed as |
//! |-----------|------------|
//! | Tokens | text kept as written; adjacent tokens stay adjacent |
//! | Blanks between tokens | collapsed to a single space |
//! | `;` | glued to the preceding token (`a; b`) |
//! | Quotes, `[[ ]]`, `$( )`, `$(( ))`, `${ }` | kept verbatim |
//! | Redirections | `>file`, `2>&1`, `< <(cmd)` |
//! | Blocks | indented one level per `if`/loop/`case`/`{`/`(` |
//! | Backslash line continuations | one extra level |
//! | Lines after trailing `\|`, `&&`, `\|\|` | one extra level |
//! | Comments | kept verbatim, one space before inline comments |
//! | Blank lines | runs collapsed to one |
//! | Here-documents | body and delimiter kept verbatim |
//! | Carriage returns | left where they are, with the surrounding whitespace |
//!
//! Printing is stable: printing the parse of printed output yields the
//! same bytes again.

mod printer;
mod tree;

use thiserror::Error;

pub use tree::Program;

/// Error produced when source cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}:{line}:{col}: {message}")]
pub struct ParseError {
    /// Label of the parsed source, usually its path
    pub name: String,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(name: &str, line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            line,
            col,
            message: message.into(),
        }
    }
}

/// Parser options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseMode {
    /// Keep comments in the tree (otherwise they are dropped)
    pub keep_comments: bool,
}

impl Default for ParseMode {
    fn default() -> Self {
        Self {
            keep_comments: true,
        }
    }
}

/// Printer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintConfig {
    /// Spaces per indentation level, 0 means tabs
    pub indent: u8,

    /// Put a space between redirect operators and their targets
    pub space_redirects: bool,
}

/// A shell parser and printer pair
pub trait ShellSyntax {
    /// Parsed representation handed from `parse` to `print`
    type Tree;

    /// Parses shell source; `name` labels diagnostics
    fn parse(&self, src: &[u8], name: &str, mode: ParseMode) -> Result<Self::Tree, ParseError>;

    /// Renders a tree, appending to `out`
    fn print(&self, out: &mut Vec<u8>, tree: &Self::Tree);
}

/// Built-in POSIX/bash syntax
#[derive(Debug, Clone, Default)]
pub struct Shell {
    config: PrintConfig,
}

impl Shell {
    pub fn new(config: PrintConfig) -> Self {
        Self { config }
    }
}

impl ShellSyntax for Shell {
    type Tree = Program;

    fn parse(&self, src: &[u8], name: &str, mode: ParseMode) -> Result<Program, ParseError> {
        let text = std::str::from_utf8(src).map_err(|e| {
            let (line, col) = position_of(&src[..e.valid_up_to()]);
            ParseError::new(name, line, col, "invalid UTF-8")
        })?;
        tree::parse(text, name, mode)
    }

    fn print(&self, out: &mut Vec<u8>, tree: &Program) {
        printer::print(out, tree, &self.config);
    }
}

/// Line and column just past the given prefix
fn position_of(prefix: &[u8]) -> (usize, usize) {
    let line = prefix.iter().filter(|&&b| b == b'\n').count() + 1;
    let col = match prefix.iter().rposition(|&b| b == b'\n') {
        Some(idx) => prefix.len() - idx,
        None => prefix.len() + 1,
    };
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn format(src: &str) -> String {
        format_with(src, PrintConfig::default())
    }

    fn format_with(src: &str, config: PrintConfig) -> String {
        let shell = Shell::new(config);
        let tree = shell
            .parse(src.as_bytes(), "test.sh", ParseMode::default())
            .unwrap();
        let mut out = Vec::new();
        shell.print(&mut out, &tree);
        String::from_utf8(out).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        Shell::default()
            .parse(src.as_bytes(), "test.sh", ParseMode::default())
            .unwrap_err()
    }

    #[test]
    fn normalizes_spacing() {
        assert_eq!(
            format("#!/bin/bash\n\n  echo   \"hi\"   there ;  ls\n"),
            "#!/bin/bash\n\necho \"hi\" there; ls\n"
        );
    }

    #[test]
    fn indents_blocks_with_tabs() {
        let src = "if [ -f x ]; then\necho yes\nelif [ -d x ]; then\necho dir\nelse\necho no\nfi\n";
        assert_eq!(
            format(src),
            "if [ -f x ]; then\n\techo yes\nelif [ -d x ]; then\n\techo dir\nelse\n\techo no\nfi\n"
        );
    }

    #[test]
    fn indents_with_spaces() {
        let config = PrintConfig {
            indent: 2,
            ..PrintConfig::default()
        };
        let src = "for f in a b; do\n    while true; do\nbreak\n done\ndone\n";
        assert_eq!(
            format_with(src, config),
            "for f in a b; do\n  while true; do\n    break\n  done\ndone\n"
        );
    }

    #[test]
    fn formats_case_clauses() {
        let src = "case \"$1\" in\n  start)  run ;;\nstop|halt)\nhalt\n;;\n*) usage ;;\nesac\n";
        assert_eq!(
            format(src),
            "case \"$1\" in\n\tstart) run ;;\n\tstop|halt)\n\t\thalt\n\t\t;;\n\t*) usage ;;\nesac\n"
        );
    }

    #[test]
    fn formats_functions_and_subshells() {
        let src = "build() {\n( cd src;   make )\n}\nfunction clean {\nrm -rf out\n}\n";
        assert_eq!(
            format(src),
            "build() {\n\t( cd src; make )\n}\nfunction clean {\n\trm -rf out\n}\n"
        );
    }

    #[test]
    fn glues_redirects() {
        assert_eq!(format("cmd > out.log 2>&1 < in\n"), "cmd >out.log 2>&1 <in\n");
        let config = PrintConfig {
            space_redirects: true,
            ..PrintConfig::default()
        };
        assert_eq!(format_with("cmd >out 2>&1\n", config), "cmd > out 2>&1\n");
    }

    #[test]
    fn keeps_variable_descriptor_redirects() {
        let src = "exec {fd}>/tmp/x\necho hi >&$fd\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn keeps_heredoc_bodies_verbatim() {
        let src = "cat <<'EOF' > out\n  keep   this\n$not_expanded\nEOF\necho   done\n";
        assert_eq!(
            format(src),
            "cat <<'EOF' >out\n  keep   this\n$not_expanded\nEOF\necho done\n"
        );
    }

    #[test]
    fn strips_tabs_for_dash_heredoc_delimiters() {
        let src = "if true; then\n\tcat <<-END\n\t\tbody\n\tEND\nfi\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn keeps_quoted_and_substituted_words_intact() {
        let src = "x=$(echo  \"a  b\" | tr a b)\ny=\"${x:-  default }\"\narr=(one two)\necho $((1 +  2)) `date   -u`\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn keeps_test_commands_verbatim() {
        let src = "[[ $x =~ ^(foo|bar)$ ]] && echo match\nif [[ $x =~ a|b ]]; then\n\techo alt\nfi\n[[  -n $y  ]]\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn keeps_extglob_patterns() {
        let src = "[[ $f == @(a|b).sh ]] && echo script\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn case_inside_command_substitution() {
        let src = "x=$(case $v in a) echo 1;; esac)\necho \"$x\"\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn preserves_comments() {
        let src = "# leading\necho hi    # trailing   \nif x; then\n# inside\ny\nfi\n";
        assert_eq!(
            format(src),
            "# leading\necho hi # trailing\nif x; then\n\t# inside\n\ty\nfi\n"
        );
    }

    #[test]
    fn drops_comments_when_asked() {
        let shell = Shell::default();
        let mode = ParseMode {
            keep_comments: false,
        };
        let tree = shell.parse(b"# c\necho a # d\n", "t", mode).unwrap();
        let mut out = Vec::new();
        shell.print(&mut out, &tree);
        assert_eq!(out, b"echo a\n");

        let tree = shell
            .parse(b"#!/bin/sh\n# c\necho a\n\n# e\necho b\n", "t", mode)
            .unwrap();
        let mut out = Vec::new();
        shell.print(&mut out, &tree);
        assert_eq!(out, b"#!/bin/sh\necho a\n\necho b\n");
    }

    #[test]
    fn collapses_blank_lines() {
        assert_eq!(format("\n\na\n\n\n\nb\n\n\n"), "a\n\nb\n");
    }

    #[test]
    fn indents_continued_pipelines() {
        let src = "find . -name x |\nsort &&\necho ok\n";
        assert_eq!(format(src), "find . -name x |\n\tsort &&\n\techo ok\n");
    }

    #[test]
    fn keeps_line_continuations() {
        let src = "docker run \\\n      --rm   \\\n  image\n";
        assert_eq!(format(src), "docker run \\\n\t--rm \\\n\timage\n");
    }

    #[test]
    fn arithmetic_commands_keep_their_spacing() {
        let src = "for ((i = 0; i < 3; i++)); do\n(( n += i ))\ndone\n";
        assert_eq!(
            format(src),
            "for ((i = 0; i < 3; i++)); do\n\t(( n += i ))\ndone\n"
        );
    }

    #[test]
    fn keywords_only_count_in_command_position() {
        let src = "echo if then fi\necho done\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn process_substitution_keeps_its_space() {
        let src = "while read -r l; do echo \"$l\"; done < <(ls)\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn keeps_carriage_returns() {
        let src = "echo a\r\necho b\r\n";
        assert_eq!(format(src), src);
        assert_eq!(format(&format(src)), src);
    }

    #[test]
    fn reports_unterminated_quote() {
        let err = parse_err("echo \"oops\nls\n");
        assert!(err.to_string().starts_with("test.sh:"), "{}", err);
        assert!(err.line >= 1 && err.col >= 1);
    }

    #[test]
    fn reports_unclosed_block() {
        let err = parse_err("if true; then\n  echo\n");
        assert!(err.to_string().starts_with("test.sh:"), "{}", err);
    }

    #[test]
    fn reports_mismatched_closer() {
        assert!(Shell::default()
            .parse(b"if x; then y; done\n", "t", ParseMode::default())
            .is_err());
        assert!(Shell::default()
            .parse(b"echo 'open\n", "t", ParseMode::default())
            .is_err());
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = Shell::default()
            .parse(b"echo a\n\xff\n", "bin.sh", ParseMode::default())
            .unwrap_err();
        assert_eq!((err.line, err.col), (2, 1));
        assert_eq!(err.message, "invalid UTF-8");
    }

    const FRAGMENTS: &[&str] = &[
        "echo hello",
        "x=1",
        "cmd >out 2>&1",
        "a && b || c",
        "ls | sort | uniq",
        "if x; then y; fi",
        "if a\nthen\nb\nelif c; then\nd\nelse\ne\nfi",
        "for i in 1 2 3; do\necho $i\ndone",
        "while read -r l; do echo \"$l\"; done <f",
        "case $v in\na|b) x ;;\n*)\ny\n;;\nesac",
        "f() {\nlocal v=\"$1\"\n}",
        "(cd dir; make)",
        "# a comment",
        "echo 'single  quoted'  # tail",
        "cat <<EOF\n  body  \nEOF",
        "run \\\n  --flag",
        "[[ $x =~ ^(foo|bar)$ ]] && echo m",
        "[[ $f == @(a|b).sh ]]",
        "exec {fd}>/tmp/x",
        "x=$(case $v in a) echo 1;; esac)",
        "",
    ];

    fn script() -> impl Strategy<Value = String> {
        let line = (prop::sample::select(FRAGMENTS), 0usize..3, 0usize..2);
        prop::collection::vec(line, 0..12).prop_map(|lines| {
            lines
                .into_iter()
                .map(|(frag, lead, blank)| {
                    let pad = "  ".repeat(lead);
                    format!("{}{}{}", pad, frag.replace(' ', "  "), "\n".repeat(blank + 1))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn printing_is_idempotent(src in script()) {
            let once = format(&src);
            let twice = format(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn output_ends_with_single_newline(src in script()) {
            let out = format(&src);
            prop_assert!(out.is_empty() || (out.ends_with('\n') && !out.ends_with("\n\n")));
        }
    }
}
