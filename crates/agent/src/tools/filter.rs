//! Local validation of ERP filter expressions.
//!
//! Accepted grammar: `field op value [and field op value ...]` where `op` is one
//! of `eq ne gt ge lt le` and `value` is a single-quoted string, a number, a
//! boolean, `null` or an ISO date. Anything else is rejected before a request
//! leaves the process.

use std::fmt;

use chrono::NaiveDate;

use super::ToolError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(String),
    Bool(bool),
    Null,
    Date(NaiveDate),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Self::Number(number) => f.write_str(number),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Null => f.write_str("null"),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub op: Comparison,
    pub value: FilterValue,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErpFilter {
    clauses: Vec<FilterClause>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
}

impl ErpFilter {
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let tokens = tokenize(raw)?;
        let mut clauses = Vec::new();
        let mut rest = tokens.as_slice();

        while !rest.is_empty() {
            if !clauses.is_empty() {
                match rest.first() {
                    Some(Token::Word(word)) if word.eq_ignore_ascii_case("and") => {
                        rest = &rest[1..];
                        if rest.is_empty() {
                            return Err(invalid("expected a clause after `and`"));
                        }
                    }
                    _ => return Err(invalid("clauses must be joined with `and`")),
                }
            }
            let (clause, remaining) = parse_clause(rest)?;
            clauses.push(clause);
            rest = remaining;
        }

        Ok(Self { clauses })
    }

    pub fn equals(field: &str, value: impl Into<String>) -> Self {
        Self {
            clauses: vec![FilterClause {
                field: field.to_string(),
                op: Comparison::Eq,
                value: FilterValue::Text(value.into()),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }
}

impl fmt::Display for ErpFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, clause) in self.clauses.iter().enumerate() {
            if index > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{} {} {}", clause.field, clause.op.as_str(), clause.value)?;
        }
        Ok(())
    }
}

fn parse_clause(tokens: &[Token]) -> Result<(FilterClause, &[Token]), ToolError> {
    let [field, op, value, rest @ ..] = tokens else {
        return Err(invalid(&format!(
            "filter clause `{}` must look like `field op value`",
            render(tokens)
        )));
    };

    let Token::Word(field) = field else {
        return Err(invalid("filter field must not be quoted"));
    };
    if !is_field_name(field) {
        return Err(invalid(&format!("`{field}` is not a valid field name")));
    }

    let op = match op {
        Token::Word(word) => Comparison::parse(word),
        Token::Quoted(_) => None,
    }
    .ok_or_else(|| invalid("operator must be one of eq, ne, gt, ge, lt, le"))?;

    let value = match value {
        Token::Quoted(text) => FilterValue::Text(text.clone()),
        Token::Word(word) => parse_bare_value(word)?,
    };

    Ok((FilterClause { field: field.clone(), op, value }, rest))
}

fn parse_bare_value(word: &str) -> Result<FilterValue, ToolError> {
    match word.to_ascii_lowercase().as_str() {
        "true" => return Ok(FilterValue::Bool(true)),
        "false" => return Ok(FilterValue::Bool(false)),
        "null" => return Ok(FilterValue::Null),
        _ => {}
    }
    if word.parse::<f64>().is_ok_and(f64::is_finite) {
        return Ok(FilterValue::Number(word.to_string()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(word, "%Y-%m-%d") {
        return Ok(FilterValue::Date(date));
    }
    Err(invalid(&format!("`{word}` is not a valid value; quote text values with single quotes")))
}

fn is_field_name(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/')
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&next) = chars.peek() {
        if next.is_whitespace() {
            chars.next();
            continue;
        }

        if next == '\'' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        text.push('\'');
                    }
                    Some('\'') => break,
                    Some(c) => text.push(c),
                    None => return Err(invalid("unterminated quoted value")),
                }
            }
            tokens.push(Token::Quoted(text));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '\'' {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    Ok(tokens)
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| match token {
            Token::Word(word) => word.clone(),
            Token::Quoted(text) => format!("'{text}'"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn invalid(message: &str) -> ToolError {
    ToolError::InvalidInput(format!("invalid filter_params: {message}"))
}

#[cfg(test)]
mod tests {
    use super::{Comparison, ErpFilter, FilterValue};
    use crate::tools::ToolError;

    #[test]
    fn parses_conjunction_of_clauses() {
        let filter =
            ErpFilter::parse("vendorName eq 'O''Brien Supplies' and orderDate ge 2024-01-01")
                .expect("valid filter");

        assert_eq!(filter.clauses().len(), 2);
        assert_eq!(filter.clauses()[0].value, FilterValue::Text("O'Brien Supplies".to_string()));
        assert_eq!(filter.clauses()[1].op, Comparison::Ge);
        assert_eq!(
            filter.to_string(),
            "vendorName eq 'O''Brien Supplies' and orderDate ge 2024-01-01"
        );
    }

    #[test]
    fn empty_input_means_no_filter() {
        assert!(ErpFilter::parse("   ").expect("empty is valid").is_empty());
    }

    #[test]
    fn rejects_malformed_expressions() {
        for raw in [
            "bogus",
            "amount gt",
            "amount between 5",
            "amount gt 5 or amount lt 2",
            "amount gt 5 and",
            "vendorName eq 'unterminated",
            "1field eq 3",
            "vendorName eq Acme",
        ] {
            let result = ErpFilter::parse(raw);
            assert!(
                matches!(result, Err(ToolError::InvalidInput(ref message)) if message.starts_with("invalid filter_params")),
                "expected rejection for {raw:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn equals_builds_quoted_clause() {
        assert_eq!(ErpFilter::equals("documentNo", "PO-1001").to_string(), "documentNo eq 'PO-1001'");
    }
}
