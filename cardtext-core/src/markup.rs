//! Card markup: `[token]` brackets become inline placeholders.
//!
//! ```text
//! "[w][w]. Draw a card."  ──►  Symbol(w) Symbol(w) Text(". Draw a card.")
//! "[Judgement][3]"        ──►  Keyword("Judgement") Symbol(voidcost, "3")
//! "[Energize!]"           ──►  Keyword("Energize", gradient)
//! ```
//!
//! Parsing never fails: anything that is not a well-formed token stays
//! literal text. Literal slashes are wrapped in word joiners so a line never
//! breaks next to them.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{CharFormat, ContentChange, Document, InlinePlaceholder, Run, WORD_JOINER};
use crate::geometry::Pen;

/// Asset drawn behind cost numerals.
pub const COST_SYMBOL: &str = "symbol-voidcost";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[([^+/]+?)\]").expect("token pattern is valid")
});

// ── Symbol table ────────────────────────────────────────────────────

/// Token → symbol asset lookup. Keys are matched case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    replacements: HashMap<String, String>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (word, asset) in [
            ("w", "attribute-light"),
            ("r", "attribute-fire"),
            ("u", "attribute-water"),
            ("g", "attribute-wind"),
            ("b", "attribute-darkness"),
            ("v", "attribute-void"),
            ("moon", "attribute-moon"),
            ("time", "attribute-time"),
            ("rest", "symbol-rest"),
        ] {
            table.add_replacement(word, asset);
        }
        table
    }
}

impl SymbolTable {
    pub fn empty() -> Self {
        Self {
            replacements: HashMap::new(),
        }
    }

    /// Registers (or replaces) a token → asset mapping.
    pub fn add_replacement(&mut self, word: &str, asset: &str) {
        self.replacements
            .insert(word.to_lowercase(), asset.to_string());
    }

    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.replacements
            .get(&token.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Every asset name the table can produce, plus the cost pip.
    pub fn asset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.replacements.values().cloned().collect();
        names.push(COST_SYMBOL.to_string());
        names.sort();
        names.dedup();
        names
    }
}

// ── Parser ──────────────────────────────────────────────────────────

/// One unit of parsed markup, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Literal text, already word-joined.
    Text(String),
    Keyword { label: String, gradient: bool },
    Symbol { symbol: String, overlay: Option<String> },
}

/// Wraps every `/` in word joiners.
pub fn word_join(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '/' {
            out.push(WORD_JOINER);
            out.push('/');
            out.push(WORD_JOINER);
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn strip_word_joiners(text: &str) -> String {
    text.chars().filter(|&c| c != WORD_JOINER).collect()
}

fn classify(token: &str, symbols: &SymbolTable) -> Instruction {
    if let Some(asset) = symbols.lookup(token) {
        return Instruction::Symbol {
            symbol: asset.to_string(),
            overlay: None,
        };
    }
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_digit() {
            return Instruction::Symbol {
                symbol: COST_SYMBOL.to_string(),
                overlay: Some(token.to_string()),
            };
        }
    }
    match token.strip_suffix('!') {
        Some(label) => Instruction::Keyword {
            label: label.to_string(),
            gradient: true,
        },
        None => Instruction::Keyword {
            label: token.to_string(),
            gradient: false,
        },
    }
}

/// Splits `text` into literal spans and placeholders.
pub fn parse(text: &str, symbols: &SymbolTable) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut last_end = 0;
    for caps in TOKEN.captures_iter(text) {
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last_end {
            out.push(Instruction::Text(word_join(&text[last_end..whole.start()])));
        }
        out.push(classify(token.as_str(), symbols));
        last_end = whole.end();
    }
    if last_end < text.len() {
        out.push(Instruction::Text(word_join(&text[last_end..])));
    }
    out
}

/// Reassembles the literal spans, without word joiners.
pub fn literal_text(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Text(t) => Some(strip_word_joiners(t)),
            _ => None,
        })
        .collect()
}

/// Formatting context for emitting instructions into a document.
#[derive(Clone, Debug, Default)]
pub struct InsertContext {
    pub format: CharFormat,
    /// Outline pen of the owning text item; recorded on symbol placeholders.
    pub outline: Option<Pen>,
    /// Family used for cost numerals.
    pub cost_family: Option<String>,
}

/// Parses `text` and appends the result to the document's last block.
pub fn insert_markup(
    document: &mut Document,
    text: &str,
    symbols: &SymbolTable,
    context: &InsertContext,
) -> ContentChange {
    let from = document.character_count().saturating_sub(1);
    let mut added = 0;
    for instruction in parse(text, symbols) {
        let run = match instruction {
            Instruction::Text(t) => Run::text(t, context.format.clone()),
            Instruction::Keyword { label, gradient } => Run::Object(InlinePlaceholder::keyword(
                label,
                gradient,
                context.format.clone(),
            )),
            Instruction::Symbol { symbol, overlay } => {
                let overlay_family = overlay.as_ref().and(context.cost_family.clone());
                Run::Object(InlinePlaceholder::symbol(
                    symbol,
                    overlay,
                    overlay_family,
                    context.outline.map(|p| p.width),
                    context.format.clone(),
                ))
            }
        };
        added += document.append_run(run).added;
    }
    log::trace!("insert_markup: {} positions from {}", added, from);
    ContentChange::new(from, 0, added)
}
