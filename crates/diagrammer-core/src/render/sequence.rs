use super::indent;
use crate::sequence::*;

/// Render as a Mermaid `sequenceDiagram`.
///
/// Participants are declared up front in order of first appearance. The
/// `option` sections of a critical block are not rendered.
pub fn render(diagram: &SequenceDiagram) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("sequenceDiagram\n");
    for name in diagram.participants() {
        indent(&mut out, 1);
        out.push_str("participant ");
        out.push_str(&line_text(name));
        out.push('\n');
    }
    write_body(&mut out, &diagram.elements, 1);
    out
}

fn write_body(out: &mut String, elements: &[SequenceElement], depth: usize) {
    for element in elements {
        write_element(out, element, depth);
    }
}

fn write_element(out: &mut String, element: &SequenceElement, depth: usize) {
    match element {
        SequenceElement::Statement(s) => {
            indent(out, depth);
            out.push_str(&format!(
                "{} {} {}: {}\n",
                line_text(&s.sender),
                s.arrow_type.token(),
                line_text(&s.receiver),
                line_text(&s.message)
            ));
        }
        SequenceElement::Alt { block } => {
            for (i, branch) in block.branches.iter().enumerate() {
                let keyword = if i == 0 { "alt" } else { "else" };
                header(out, depth, keyword, &branch.condition);
                write_body(out, &branch.elements, depth + 1);
            }
            footer(out, depth);
        }
        SequenceElement::Loop { block } => {
            header(out, depth, "loop", &block.title);
            write_body(out, &block.elements, depth + 1);
            footer(out, depth);
        }
        SequenceElement::Parallel { block } => {
            for (i, branch) in block.branches.iter().enumerate() {
                let keyword = if i == 0 { "par" } else { "and" };
                header(out, depth, keyword, &branch.title);
                write_body(out, &branch.elements, depth + 1);
            }
            footer(out, depth);
        }
        SequenceElement::Critical { block } => {
            header(out, depth, "critical", &block.title);
            write_body(out, &block.elements, depth + 1);
            footer(out, depth);
        }
    }
}

fn header(out: &mut String, depth: usize, keyword: &str, text: &str) {
    indent(out, depth);
    out.push_str(keyword);
    if !text.is_empty() {
        out.push(' ');
        out.push_str(&line_text(text));
    }
    out.push('\n');
}

/// Each statement is one line and `;` also ends one.
fn line_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(';', "#59;")
}

fn footer(out: &mut String, depth: usize) {
    indent(out, depth);
    out.push_str("end\n");
}
