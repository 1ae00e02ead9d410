//! Caveat message templates.
//!
//! Caveats are shown once after a successful install. The template is parsed
//! when the formula loads so that a typo in a placeholder is reported before
//! anything is downloaded.
//!
//! Placeholders are written `{name}`; `{{` and `}}` produce literal braces.

use crate::error::{FormulaError, Result};
use crate::install_rule::Shell;
use crate::layout::PrefixLayout;
use serde::{Deserialize, Serialize};

/// A value substituted into a caveat template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Prefix,
    Bin,
    Completion(Shell),
    Name,
    Version,
}

impl Placeholder {
    const NAMES: &'static str =
        "prefix, bin, bash_completion, zsh_completion, fish_completion, name, version";

    fn parse(key: &str) -> Option<Self> {
        match key {
            "prefix" => Some(Self::Prefix),
            "bin" => Some(Self::Bin),
            "bash_completion" => Some(Self::Completion(Shell::Bash)),
            "zsh_completion" => Some(Self::Completion(Shell::Zsh)),
            "fish_completion" => Some(Self::Completion(Shell::Fish)),
            "name" => Some(Self::Name),
            "version" => Some(Self::Version),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// Values a caveat is rendered against.
#[derive(Debug, Clone, Copy)]
pub struct CaveatContext<'a> {
    /// The resolved installation layout.
    pub layout: &'a PrefixLayout,
    /// The package name.
    pub name: &'a str,
    /// The package version.
    pub version: &'a str,
}

/// A parsed caveat template.
///
/// # Examples
///
/// ```
/// use keg::caveat::{CaveatContext, CaveatTemplate};
/// use keg::layout::PrefixLayout;
///
/// let template = CaveatTemplate::parse("source {zsh_completion}/_unity3d")
///     .expect("valid template");
/// let layout = PrefixLayout::new("/opt/homebrew");
/// let context = CaveatContext { layout: &layout, name: "unity3d", version: "1.0.0" };
/// assert_eq!(
///     template.render(&context),
///     "source /opt/homebrew/share/zsh/site-functions/_unity3d",
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaveatTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CaveatTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::InvalidCaveat`] for unknown placeholders,
    /// unterminated `{`, or a lone `}`.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(index) = rest.find(['{', '}']) {
            let (text, tail) = rest.split_at(index);
            literal.push_str(text);
            if let Some(after) = tail.strip_prefix("{{") {
                literal.push('{');
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                literal.push('}');
                rest = after;
            } else if let Some(after) = tail.strip_prefix('{') {
                let (key, after_key) = after.split_once('}').ok_or_else(unterminated)?;
                let placeholder = Placeholder::parse(key).ok_or_else(|| unknown(key))?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Value(placeholder));
                rest = after_key;
            } else {
                return Err(FormulaError::InvalidCaveat {
                    reason: "unmatched '}' (write '}}' for a literal brace)".to_owned(),
                });
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// Return the template as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the template against `context`.
    #[must_use]
    pub fn render(&self, context: &CaveatContext<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Value(placeholder) => out.push_str(&resolve(*placeholder, context)),
            }
        }
        out
    }
}

fn unknown(key: &str) -> FormulaError {
    FormulaError::InvalidCaveat {
        reason: format!(
            "unknown placeholder {{{key}}}; expected one of: {}",
            Placeholder::NAMES
        ),
    }
}

fn unterminated() -> FormulaError {
    FormulaError::InvalidCaveat {
        reason: "unterminated '{' (write '{{' for a literal brace)".to_owned(),
    }
}

fn resolve(placeholder: Placeholder, context: &CaveatContext<'_>) -> String {
    match placeholder {
        Placeholder::Prefix => context.layout.prefix().to_string(),
        Placeholder::Bin => context.layout.bin_dir().to_string(),
        Placeholder::Completion(shell) => context.layout.completion_dir(shell).to_string(),
        Placeholder::Name => context.name.to_owned(),
        Placeholder::Version => context.version.to_owned(),
    }
}

impl TryFrom<String> for CaveatTemplate {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CaveatTemplate> for String {
    fn from(value: CaveatTemplate) -> Self {
        value.source
    }
}
