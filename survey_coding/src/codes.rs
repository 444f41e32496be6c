/*!
Code tables: ordered rules that turn a raw categorical (or numeric) value into a small integer code.

```
use survey_coding::codes::CodeTable;
use survey_coding::CodedValue;

let region = CodeTable::text("region")
    .equals("Northeast", 1)
    .equals("Midwest", 2)
    .equals("South", 3)
    .equals("West", 4);

assert_eq!(region.code_text(" midwest "), CodedValue::Code(2));
assert_eq!(region.code_text("Puerto Rico"), CodedValue::Missing);
```
*/

use snafu::prelude::*;

use crate::config::{normalize_text, parse_finite, CodedValue};

/// Which side of a bucket interval is included.
///
/// `Right` is `(lower, upper]`, `Left` is `[lower, upper)`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Closed {
    Left,
    Right,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Predicate {
    /// Equality with some text, compared after trimming and lowercasing.
    Equals(String),
    OneOf(Vec<String>),
    Interval {
        lower: f64,
        upper: f64,
        closed: Closed,
    },
    /// Matches any value, including a missing one.
    Always,
}

impl Predicate {
    pub fn equals(s: &str) -> Predicate {
        Predicate::Equals(normalize_text(s))
    }

    pub fn one_of(choices: &[&str]) -> Predicate {
        Predicate::OneOf(choices.iter().map(|s| normalize_text(s)).collect())
    }

    /// The text is expected to be normalized already.
    fn matches_text(&self, text: Option<&str>) -> bool {
        match (self, text) {
            (Predicate::Always, _) => true,
            (Predicate::Equals(s), Some(t)) => s == t,
            (Predicate::OneOf(l), Some(t)) => l.iter().any(|s| s == t),
            (Predicate::Interval { .. }, Some(t)) => match parse_finite(t) {
                Some(x) => self.matches_number(x),
                None => false,
            },
            (_, None) => false,
        }
    }

    fn matches_number(&self, x: f64) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Interval {
                lower,
                upper,
                closed: Closed::Right,
            } => *lower < x && x <= *upper,
            Predicate::Interval {
                lower,
                upper,
                closed: Closed::Left,
            } => *lower <= x && x < *upper,
            Predicate::Equals(_) | Predicate::OneOf(_) => {
                let s = format!("{}", x);
                self.matches_text(Some(s.as_str()))
            }
        }
    }
}

/// Whether the values of a table are compared as text or parsed as numbers first.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TableKind {
    Text,
    Numeric,
}

#[derive(Debug, Snafu, PartialEq)]
pub enum TableError {
    #[snafu(display("bucket edges of table {table} must be strictly increasing"))]
    UnsortedEdges { table: String },
    #[snafu(display("table {table} has {edges} edges and {codes} codes, expected one code per bucket"))]
    BucketCountMismatch {
        table: String,
        edges: usize,
        codes: usize,
    },
}

/// An ordered list of (predicate, code) rules and a default.
///
/// Invariant: the rules are evaluated in declaration order and the first
/// match wins. A value that matches no rule gets the default.
#[derive(PartialEq, Debug, Clone)]
pub struct CodeTable {
    name: String,
    kind: TableKind,
    rules: Vec<(Predicate, i32)>,
    default: CodedValue,
}

impl CodeTable {
    /// A text table with a missing default.
    pub fn text(name: &str) -> CodeTable {
        CodeTable {
            name: name.to_string(),
            kind: TableKind::Text,
            rules: Vec::new(),
            default: CodedValue::Missing,
        }
    }

    /// A numeric table with a missing default.
    pub fn numeric(name: &str) -> CodeTable {
        CodeTable {
            kind: TableKind::Numeric,
            ..CodeTable::text(name)
        }
    }

    /// Builds a numeric bucket table.
    ///
    /// `edges` are the interval boundaries and `codes` the code of each interval,
    /// so that there must be exactly one code less than edges.
    ///
    /// ```
    /// use survey_coding::codes::{CodeTable, Closed};
    /// use survey_coding::CodedValue;
    ///
    /// let ages = CodeTable::buckets("age_group", &[0.0, 1965.0, 1985.0, 2002.0], &[2, 1, 0], Closed::Right)?;
    /// assert_eq!(ages.code_number(1965.0), CodedValue::Code(2));
    /// assert_eq!(ages.code_number(1986.0), CodedValue::Code(0));
    /// # Ok::<(), survey_coding::codes::TableError>(())
    /// ```
    pub fn buckets(
        name: &str,
        edges: &[f64],
        codes: &[i32],
        closed: Closed,
    ) -> Result<CodeTable, TableError> {
        ensure!(
            !edges.is_empty() && codes.len() + 1 == edges.len(),
            BucketCountMismatchSnafu {
                table: name,
                edges: edges.len(),
                codes: codes.len()
            }
        );
        ensure!(
            edges.windows(2).all(|w| w[0] < w[1]),
            UnsortedEdgesSnafu { table: name }
        );
        let mut table = CodeTable::numeric(name);
        for (w, code) in edges.windows(2).zip(codes.iter()) {
            table = table.rule(
                Predicate::Interval {
                    lower: w[0],
                    upper: w[1],
                    closed,
                },
                *code,
            );
        }
        Ok(table)
    }

    pub fn rule(mut self, predicate: Predicate, code: i32) -> CodeTable {
        self.rules.push((predicate, code));
        self
    }

    pub fn equals(self, value: &str, code: i32) -> CodeTable {
        self.rule(Predicate::equals(value), code)
    }

    pub fn one_of(self, values: &[&str], code: i32) -> CodeTable {
        self.rule(Predicate::one_of(values), code)
    }

    pub fn default_code(mut self, default: CodedValue) -> CodeTable {
        self.default = default;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn default_value(&self) -> CodedValue {
        self.default
    }

    pub fn rules(&self) -> &[(Predicate, i32)] {
        &self.rules
    }

    /// All the codes this table can produce, the default included.
    pub fn declared_codes(&self) -> Vec<CodedValue> {
        let mut res: Vec<CodedValue> = Vec::new();
        for c in self
            .rules
            .iter()
            .map(|(_, c)| CodedValue::Code(*c))
            .chain(std::iter::once(self.default))
        {
            if !res.contains(&c) {
                res.push(c);
            }
        }
        res
    }

    /// First matching rule for a set of normalized texts (one per input field).
    pub(crate) fn lookup_texts(&self, texts: &[Option<String>]) -> Option<i32> {
        self.rules
            .iter()
            .find(|(p, _)| texts.iter().any(|t| p.matches_text(t.as_deref())))
            .map(|(_, c)| *c)
    }

    pub(crate) fn lookup_numbers(&self, numbers: &[f64]) -> Option<i32> {
        self.rules
            .iter()
            .find(|(p, _)| numbers.iter().any(|x| p.matches_number(*x)))
            .map(|(_, c)| *c)
    }

    /// Codes a single text value.
    pub fn code_text(&self, value: &str) -> CodedValue {
        self.lookup_texts(&[Some(normalize_text(value))])
            .map(CodedValue::Code)
            .unwrap_or(self.default)
    }

    /// Codes a single numeric value.
    pub fn code_number(&self, value: f64) -> CodedValue {
        self.lookup_numbers(&[value])
            .map(CodedValue::Code)
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let t = CodeTable::text("race")
            .equals("asian", 3)
            .one_of(&["asian", "other"], 9);
        assert_eq!(t.code_text("ASIAN"), CodedValue::Code(3));
        assert_eq!(t.code_text("other"), CodedValue::Code(9));
    }

    #[test]
    fn unmatched_values_get_the_default() {
        let t = CodeTable::text("gender")
            .equals("male", 1)
            .default_code(CodedValue::Code(0));
        assert_eq!(t.code_text("female"), CodedValue::Code(0));
        assert_eq!(t.code_text("prefer not to say"), CodedValue::Code(0));

        let t2 = CodeTable::text("religion").equals("catholic", 2);
        assert_eq!(t2.code_text("druid"), CodedValue::Missing);
    }

    #[test]
    fn right_closed_buckets() {
        let t = CodeTable::buckets(
            "age_group",
            &[0.0, 1965.0, 1985.0, 2002.0],
            &[2, 1, 0],
            Closed::Right,
        )
        .unwrap();
        assert_eq!(t.code_number(1965.0), CodedValue::Code(2));
        assert_eq!(t.code_number(1966.0), CodedValue::Code(1));
        assert_eq!(t.code_number(1985.0), CodedValue::Code(1));
        assert_eq!(t.code_number(1986.0), CodedValue::Code(0));
        assert_eq!(t.code_number(2002.0), CodedValue::Code(0));
        // Outside of all the buckets
        assert_eq!(t.code_number(2003.0), CodedValue::Missing);
        assert_eq!(t.code_number(0.0), CodedValue::Missing);
    }

    #[test]
    fn left_closed_buckets() {
        let t = CodeTable::buckets("x", &[0.0, 10.0, 20.0], &[1, 2], Closed::Left).unwrap();
        assert_eq!(t.code_number(0.0), CodedValue::Code(1));
        assert_eq!(t.code_number(10.0), CodedValue::Code(2));
        assert_eq!(t.code_number(20.0), CodedValue::Missing);
    }

    #[test]
    fn invalid_buckets() {
        assert_eq!(
            CodeTable::buckets("x", &[0.0, 10.0], &[1, 2], Closed::Left),
            Err(TableError::BucketCountMismatch {
                table: "x".to_string(),
                edges: 2,
                codes: 2
            })
        );
        assert_eq!(
            CodeTable::buckets("x", &[0.0, 10.0, 5.0], &[1, 2], Closed::Left),
            Err(TableError::UnsortedEdges {
                table: "x".to_string()
            })
        );
    }

    #[test]
    fn declared_codes_include_the_default() {
        let t = CodeTable::text("religion")
            .equals("catholic", 2)
            .equals("jewish", 4)
            .default_code(CodedValue::Code(-9));
        assert_eq!(
            t.declared_codes(),
            vec![
                CodedValue::Code(2),
                CodedValue::Code(4),
                CodedValue::Code(-9)
            ]
        );
    }
}
