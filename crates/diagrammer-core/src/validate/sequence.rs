use serde_json::Value;

use super::{Cursor, Result};
use crate::sequence::*;

const BLOCK_KEYS: [&str; 4] = ["AltBlock", "LoopBlock", "ParallelBlock", "CriticalBlock"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Statement,
    Alt,
    Loop,
    Parallel,
    Critical,
}

pub fn validate(json: &Value) -> Result<SequenceDiagram> {
    let root = Cursor::root(json);
    root.as_object()?;
    Ok(SequenceDiagram {
        elements: body(&root)?,
    })
}

fn body(parent: &Cursor<'_>) -> Result<Vec<SequenceElement>> {
    parent
        .non_empty_array("Elements")?
        .iter()
        .map(element)
        .collect()
}

/// Decide which variant an element is from the keys it carries.
fn classify(item: &Cursor<'_>) -> Result<Shape> {
    item.as_object()?;
    let mut shapes = Vec::new();
    if item.has("Participant1") || item.has("Participant2") {
        shapes.push(Shape::Statement);
    }
    for (key, shape) in BLOCK_KEYS
        .iter()
        .zip([Shape::Alt, Shape::Loop, Shape::Parallel, Shape::Critical])
    {
        if item.has(key) {
            shapes.push(shape);
        }
    }

    match shapes.as_slice() {
        [shape] => Ok(*shape),
        [] => Err(item.error(format!(
            "unrecognized element shape (keys: [{}]); expected a statement with \
             Participant1, Participant2, Message and ArrowType, or an object with exactly \
             one of {}",
            item.keys().join(", "),
            BLOCK_KEYS.join(", ")
        ))),
        _ => Err(item.error(format!(
            "ambiguous element shape (keys: [{}]); an element must be either a statement \
             or exactly one block",
            item.keys().join(", ")
        ))),
    }
}

fn element(item: &Cursor<'_>) -> Result<SequenceElement> {
    match classify(item)? {
        Shape::Statement => statement(item).map(SequenceElement::Statement),
        Shape::Alt => {
            let block = item.field("AltBlock")?;
            let branches = block
                .non_empty_array("Branches")?
                .iter()
                .map(|b| -> Result<AltBranch> {
                    Ok(AltBranch {
                        condition: b.string("Condition")?,
                        elements: body(b)?,
                    })
                })
                .collect::<Result<_>>()?;
            Ok(SequenceElement::Alt {
                block: AltBlock { branches },
            })
        }
        Shape::Loop => {
            let block = item.field("LoopBlock")?;
            Ok(SequenceElement::Loop {
                block: LoopBlock {
                    title: block.string("Title")?,
                    elements: body(&block)?,
                },
            })
        }
        Shape::Parallel => {
            let block = item.field("ParallelBlock")?;
            let branches = block
                .non_empty_array("Branches")?
                .iter()
                .map(|b| -> Result<ParallelBranch> {
                    Ok(ParallelBranch {
                        title: b.string("Title")?,
                        elements: body(b)?,
                    })
                })
                .collect::<Result<_>>()?;
            Ok(SequenceElement::Parallel {
                block: ParallelBlock { branches },
            })
        }
        Shape::Critical => {
            let block = item.field("CriticalBlock")?;
            let options = block
                .optional_array("Options")?
                .iter()
                .map(|o| -> Result<OptionBlock> {
                    Ok(OptionBlock {
                        condition: o.string("Condition")?,
                        elements: body(o)?,
                    })
                })
                .collect::<Result<_>>()?;
            Ok(SequenceElement::Critical {
                block: CriticalBlock {
                    title: block.string("Title")?,
                    elements: body(&block)?,
                    options,
                },
            })
        }
    }
}

fn statement(item: &Cursor<'_>) -> Result<Statement> {
    let allowed: Vec<&str> = ArrowType::ALL.iter().map(|a| a.name()).collect();
    Ok(Statement {
        sender: item.string("Participant1")?,
        receiver: item.string("Participant2")?,
        message: item.string("Message")?,
        arrow_type: item.choice("ArrowType", ArrowType::parse, &allowed)?,
    })
}
