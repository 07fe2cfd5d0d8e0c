//! Minimal CSS selector support
//!
//! Covers what the gallery page needs: type, `#id` and `.class` compounds
//! joined by the descendant combinator (`.musCardCont a.title`).

/// One compound selector such as `a.downloadLink` or `#bgDiv`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

/// Compounds separated by whitespace, matched right to left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub compounds: Vec<Compound>,
}

/// Element data the matcher needs
pub trait Matchable {
    fn tag(&self) -> &str;
    fn id(&self) -> Option<&str>;
    fn has_class(&self, class: &str) -> bool;
}

impl Compound {
    fn parse(input: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = input;

        let tag_end = rest.find(['#', '.']).unwrap_or(rest.len());
        if tag_end > 0 {
            let tag = &rest[..tag_end];
            if tag != "*" {
                compound.tag = Some(tag.to_ascii_lowercase());
            }
        }
        rest = &rest[tag_end..];

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                '#' => compound.id = Some(name.to_string()),
                '.' => compound.classes.push(name.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    pub fn matches<M: Matchable + ?Sized>(&self, element: &M) -> bool {
        if let Some(tag) = &self.tag
            && !element.tag().eq_ignore_ascii_case(tag)
        {
            return false;
        }
        if let Some(id) = &self.id
            && element.id() != Some(id.as_str())
        {
            return false;
        }
        self.classes.iter().all(|c| element.has_class(c))
    }
}

impl Selector {
    /// `None` for empty input or unsupported syntax
    pub fn parse(input: &str) -> Option<Self> {
        let compounds = input
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()?;
        if compounds.is_empty() {
            return None;
        }
        Some(Self { compounds })
    }

    /// Match `element` given its ancestors ordered nearest first
    pub fn matches<'a, M, I>(&self, element: &M, ancestors: I) -> bool
    where
        M: Matchable + ?Sized + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        let Some((last, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(element) {
            return false;
        }

        // Greedy right-to-left walk is exact for descendant-only selectors
        let mut pending = rest.iter().rev().peekable();
        for ancestor in ancestors {
            match pending.peek() {
                Some(compound) if compound.matches(ancestor) => {
                    pending.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        pending.peek().is_none()
    }
}
