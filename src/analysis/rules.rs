//! Header naming rules: derived-column patterns and identifier patterns.

use regex::{Regex, RegexBuilder};

/// A naming pattern that marks a column as derived from another.
#[derive(Debug, Clone)]
pub struct DerivedRule {
    pattern: Regex,
    /// Replacement producing the base column's name; when set, the rule only
    /// applies if a column with that name exists.
    base_replacement: Option<&'static str>,
}

impl DerivedRule {
    fn new(pattern: &str, base_replacement: Option<&'static str>) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            base_replacement,
        })
    }

    /// Name of the base column this header derives from, if the rule has one.
    pub fn base_name(&self, header: &str) -> Option<String> {
        self.base_replacement
            .map(|rep| self.pattern.replace(header, rep).into_owned())
    }
}

/// Ordered set of derived-column naming rules.
#[derive(Debug, Clone)]
pub struct DerivedRuleSet {
    rules: Vec<DerivedRule>,
}

impl DerivedRuleSet {
    /// The built-in rules: estimate/percentile prefixes that need a base
    /// column, and rate/percentage/margin-of-error markers that do not.
    pub fn builtin() -> Result<Self, regex::Error> {
        let rules = vec![
            DerivedRule::new("^EP_", Some("E_"))?,
            DerivedRule::new("^MP_", Some("M_"))?,
            DerivedRule::new("^EPL_", Some("EP_"))?,
            DerivedRule::new("^F_", Some("E_"))?,
            DerivedRule::new("^RPL_", None)?,
            DerivedRule::new("^SPL_", None)?,
            DerivedRule::new("_pct$", None)?,
            DerivedRule::new("_percent$", None)?,
            DerivedRule::new("_rate$", None)?,
            DerivedRule::new("_moe$", None)?,
        ];
        Ok(Self { rules })
    }

    /// Whether `header` is derived by name, given all headers of the table.
    pub fn is_derived(&self, header: &str, headers: &[String]) -> bool {
        self.rules.iter().any(|rule| {
            if !rule.pattern.is_match(header) {
                return false;
            }
            match rule.base_name(header) {
                Some(base) => headers.iter().any(|h| *h == base),
                None => true,
            }
        })
    }
}

/// Matches identifier columns by case-insensitive header substrings.
#[derive(Debug, Clone, Default)]
pub struct IdColumnMatcher {
    patterns: Vec<String>,
}

impl IdColumnMatcher {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_uppercase())
                .collect(),
        }
    }

    pub fn is_id_column(&self, header: &str) -> bool {
        let upper = header.to_uppercase();
        self.patterns.iter().any(|p| upper.contains(p.as_str()))
    }
}
