use serde::{Deserialize, Serialize};

/// Message arrow styles, named after the Mermaid connector they render to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ArrowType {
    SolidLine,
    DottedLine,
    SolidArrow,
    DottedArrow,
    SolidCross,
    DottedCross,
    SolidOpen,
    DottedOpen,
}

impl ArrowType {
    pub const ALL: [ArrowType; 8] = [
        ArrowType::SolidLine,
        ArrowType::DottedLine,
        ArrowType::SolidArrow,
        ArrowType::DottedArrow,
        ArrowType::SolidCross,
        ArrowType::DottedCross,
        ArrowType::SolidOpen,
        ArrowType::DottedOpen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArrowType::SolidLine => "SolidLine",
            ArrowType::DottedLine => "DottedLine",
            ArrowType::SolidArrow => "SolidArrow",
            ArrowType::DottedArrow => "DottedArrow",
            ArrowType::SolidCross => "SolidCross",
            ArrowType::DottedCross => "DottedCross",
            ArrowType::SolidOpen => "SolidOpen",
            ArrowType::DottedOpen => "DottedOpen",
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            ArrowType::SolidLine => "->",
            ArrowType::DottedLine => "-->",
            ArrowType::SolidArrow => "->>",
            ArrowType::DottedArrow => "-->>",
            ArrowType::SolidCross => "-x",
            ArrowType::DottedCross => "--x",
            ArrowType::SolidOpen => "-)",
            ArrowType::DottedOpen => "--)",
        }
    }

    /// Accepts a variant name (any case) or the literal Mermaid token.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s) || a.token() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(rename = "Participant1")]
    pub sender: String,
    #[serde(rename = "Participant2")]
    pub receiver: String,
    pub message: String,
    pub arrow_type: ArrowType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AltBranch {
    pub condition: String,
    pub elements: Vec<SequenceElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AltBlock {
    pub branches: Vec<AltBranch>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LoopBlock {
    pub title: String,
    pub elements: Vec<SequenceElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ParallelBranch {
    pub title: String,
    pub elements: Vec<SequenceElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ParallelBlock {
    pub branches: Vec<ParallelBranch>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OptionBlock {
    pub condition: String,
    pub elements: Vec<SequenceElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CriticalBlock {
    pub title: String,
    pub elements: Vec<SequenceElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionBlock>,
}

/// One entry of a sequence body. On the wire the variant is identified by
/// which keys are present, never by an explicit tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SequenceElement {
    Statement(Statement),
    Alt {
        #[serde(rename = "AltBlock")]
        block: AltBlock,
    },
    Loop {
        #[serde(rename = "LoopBlock")]
        block: LoopBlock,
    },
    Parallel {
        #[serde(rename = "ParallelBlock")]
        block: ParallelBlock,
    },
    Critical {
        #[serde(rename = "CriticalBlock")]
        block: CriticalBlock,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SequenceDiagram {
    pub elements: Vec<SequenceElement>,
}

impl SequenceDiagram {
    /// Participants in order of first appearance, walking nested bodies.
    pub fn participants(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        collect_participants(&self.elements, &mut out);
        out
    }
}

fn collect_participants<'a>(elements: &'a [SequenceElement], out: &mut Vec<&'a str>) {
    for element in elements {
        match element {
            SequenceElement::Statement(s) => {
                push_unique(out, &s.sender);
                push_unique(out, &s.receiver);
            }
            SequenceElement::Alt { block } => {
                for branch in &block.branches {
                    collect_participants(&branch.elements, out);
                }
            }
            SequenceElement::Loop { block } => collect_participants(&block.elements, out),
            SequenceElement::Parallel { block } => {
                for branch in &block.branches {
                    collect_participants(&branch.elements, out);
                }
            }
            SequenceElement::Critical { block } => {
                collect_participants(&block.elements, out);
                for option in &block.options {
                    collect_participants(&option.elements, out);
                }
            }
        }
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, name: &'a str) {
    if !out.contains(&name) {
        out.push(name);
    }
}
