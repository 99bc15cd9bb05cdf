//! Renders a [`Program`] in canonical form

use super::tree::{Gap, Program};
use super::PrintConfig;

pub(super) fn print(out: &mut Vec<u8>, program: &Program, config: &PrintConfig) {
    let mut level = 0;
    let mut joined = false;

    for (idx, piece) in program.pieces.iter().enumerate() {
        if idx > 0 {
            match &piece.gap {
                Gap::None => {}
                Gap::Space => out.push(b' '),
                Gap::Redirect { amp } => {
                    if config.space_redirects && !amp {
                        out.push(b' ');
                    }
                }
                Gap::Lines(count) => {
                    out.extend(std::iter::repeat(b'\n').take((*count).min(2)));
                    level = piece.depth + usize::from(joined);
                    indent(out, level, config);
                }
                Gap::Continuation => {
                    out.extend_from_slice(b" \\\n");
                    indent(out, level + 1, config);
                }
                Gap::Verbatim(text) => out.extend_from_slice(text.as_bytes()),
            }
        }

        out.extend_from_slice(piece.text.as_bytes());
        if !piece.comment {
            joined = piece.joins;
        }
    }

    if !program.pieces.is_empty() {
        let eol: &[u8] = if program.crlf { b"\r\n" } else { b"\n" };
        out.extend_from_slice(eol);
    }
}

fn indent(out: &mut Vec<u8>, level: usize, config: &PrintConfig) {
    if config.indent == 0 {
        out.extend(std::iter::repeat(b'\t').take(level));
    } else {
        out.extend(std::iter::repeat(b' ').take(level * usize::from(config.indent)));
    }
}
