#![allow(missing_docs)]
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, iter::FromIterator};

use thiserror::Error;

// local type aliases
type Map = BTreeMap<String, String>;
type Expressions = Vec<Expression>;

/// A single selector expression
///
/// Values of `In`/`NotIn` keep their insertion order when serialized.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Expression {
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Equal(String, String),
    NotEqual(String, String),
    Exists(String),
    DoesNotExist(String),
}

/// An ordered list of expressions serializable for the API
///
/// Expressions are serialized in insertion order, joined by `,`.
/// An empty selector serializes to the empty string and selects everything.
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct Selector(Expressions);

/// A selector expression in its generic record form
///
/// This is how a selector arrives from an untyped source (a manifest or a
/// caller-assembled table): a key, an operator name, and zero or more values.
/// Conversion into [`Expression`] validates the value count for the operator.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Recognized selector operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Operator {
    In,
    NotIn,
    Equal,
    NotEqual,
    Exists,
    DoesNotExist,
}

/// A requirement whose value count does not fit its operator
#[derive(Debug, Error)]
#[error("invalid selector requirement on {key:?}: {reason}")]
pub struct InvalidExpression {
    /// The key of the offending requirement
    pub key: String,
    /// Why the requirement was rejected
    pub reason: String,
}

impl Selector {
    /// Create a selector from a vector of expressions
    pub fn from_expressions(exprs: Expressions) -> Self {
        Self(exprs)
    }

    /// Create a selector from generic requirement records
    ///
    /// Fails on the first requirement whose value count does not fit its
    /// operator; validation happens here, not at request time.
    pub fn try_from_requirements<I>(reqs: I) -> Result<Self, InvalidExpression>
    where
        I: IntoIterator<Item = Requirement>,
    {
        reqs.into_iter()
            .map(Expression::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Append an expression to the selector
    #[must_use]
    pub fn and(mut self, expr: Expression) -> Self {
        self.0.push(expr);
        self
    }

    /// Append all expressions of another selector, preserving order
    #[must_use]
    pub fn merge(mut self, other: Selector) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Convert the selector to its query-string form
    pub fn to_query_string(&self) -> String {
        let selectors: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        selectors.join(",")
    }

    /// Indicates whether this selector matches everything
    pub fn selects_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the selector against a label map
    pub fn matches(&self, labels: &Map) -> bool {
        self.0.iter().all(|expr| expr.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

// === Expression ===

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::In(key, values) => write!(f, "{key} in ({})", values.join(",")),
            Expression::NotIn(key, values) => write!(f, "{key} notin ({})", values.join(",")),
            Expression::Equal(key, value) => write!(f, "{key}={value}"),
            Expression::NotEqual(key, value) => write!(f, "{key}!={value}"),
            Expression::Exists(key) => write!(f, "{key}"),
            Expression::DoesNotExist(key) => write!(f, "!{key}"),
        }
    }
}

impl Expression {
    fn matches(&self, labels: &Map) -> bool {
        match self {
            Expression::In(key, values) => match labels.get(key) {
                Some(v) => values.contains(v),
                None => false,
            },
            Expression::NotIn(key, values) => match labels.get(key) {
                Some(v) => !values.contains(v),
                None => true,
            },
            Expression::Exists(key) => labels.contains_key(key),
            Expression::DoesNotExist(key) => !labels.contains_key(key),
            Expression::Equal(key, value) => labels.get(key) == Some(value),
            Expression::NotEqual(key, value) => labels.get(key) != Some(value),
        }
    }
}

impl TryFrom<Requirement> for Expression {
    type Error = InvalidExpression;

    fn try_from(req: Requirement) -> Result<Self, Self::Error> {
        let Requirement { key, operator, values } = req;
        let invalid = |key: &str, reason: &str| InvalidExpression {
            key: key.to_owned(),
            reason: reason.to_owned(),
        };
        match operator {
            Operator::In => {
                if values.is_empty() {
                    return Err(invalid(&key, "operator In requires at least one value"));
                }
                Ok(Expression::In(key, values))
            }
            Operator::NotIn => {
                if values.is_empty() {
                    return Err(invalid(&key, "operator NotIn requires at least one value"));
                }
                Ok(Expression::NotIn(key, values))
            }
            Operator::Equal => match <[String; 1]>::try_from(values) {
                Ok([value]) => Ok(Expression::Equal(key, value)),
                Err(_) => Err(invalid(&key, "operator Equal requires exactly one value")),
            },
            Operator::NotEqual => match <[String; 1]>::try_from(values) {
                Ok([value]) => Ok(Expression::NotEqual(key, value)),
                Err(_) => Err(invalid(&key, "operator NotEqual requires exactly one value")),
            },
            Operator::Exists => {
                if !values.is_empty() {
                    return Err(invalid(&key, "operator Exists takes no values"));
                }
                Ok(Expression::Exists(key))
            }
            Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(invalid(&key, "operator DoesNotExist takes no values"));
                }
                Ok(Expression::DoesNotExist(key))
            }
        }
    }
}

// convenience conversions for Selector

impl FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| Expression::Equal(k, v))
                .collect(),
        )
    }
}

impl FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| Expression::Equal(k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Expression> for Selector {
    fn from(value: Expression) -> Self {
        Self(vec![value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selector_serializes_empty() {
        assert_eq!(Selector::default().to_query_string(), "");
        assert!(Selector::default().selects_all());
    }

    #[test]
    fn serialization_is_insertion_ordered() {
        let selector = Selector::from_expressions(vec![
            Expression::Equal("a".into(), "b".into()),
            Expression::In("c".into(), vec!["d".into(), "e".into()]),
        ]);
        assert_eq!(selector.to_query_string(), "a=b,c in (d,e)");
    }

    #[test]
    fn all_operators_serialize() {
        let selector = Selector::from_expressions(vec![
            Expression::In("foo".into(), vec!["bar".into(), "baz".into()]),
            Expression::NotIn("foo".into(), vec!["bar".into(), "baz".into()]),
            Expression::Equal("foo".into(), "bar".into()),
            Expression::NotEqual("foo".into(), "bar".into()),
            Expression::Exists("foo".into()),
            Expression::DoesNotExist("foo".into()),
        ]);
        assert_eq!(
            selector.to_query_string(),
            "foo in (bar,baz),foo notin (bar,baz),foo=bar,foo!=bar,foo,!foo"
        );
    }

    #[test]
    fn label_map_preserves_insertion_order() {
        let selector: Selector = [("z", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(selector.to_query_string(), "z=1,a=2");
    }

    #[test]
    fn requirements_validate_value_counts() {
        let ok = Selector::try_from_requirements(vec![Requirement {
            key: "env".into(),
            operator: Operator::In,
            values: vec!["prod".into()],
        }])
        .unwrap();
        assert_eq!(ok.to_query_string(), "env in (prod)");

        for (operator, values) in [
            (Operator::In, vec![]),
            (Operator::NotIn, vec![]),
            (Operator::Equal, vec![]),
            (Operator::Equal, vec!["a".into(), "b".into()]),
            (Operator::NotEqual, vec![]),
            (Operator::Exists, vec!["a".into()]),
            (Operator::DoesNotExist, vec!["a".into()]),
        ] {
            let err = Selector::try_from_requirements(vec![Requirement {
                key: "k".into(),
                operator,
                values,
            }]);
            assert!(err.is_err(), "{operator:?} should have been rejected");
        }
    }

    #[test]
    fn matching_honours_all_expressions() {
        let labels: Map = [
            ("app".to_string(), "web".to_string()),
            ("tier".to_string(), "frontend".to_string()),
        ]
        .into();

        let hit = Selector::from_expressions(vec![
            Expression::Equal("app".into(), "web".into()),
            Expression::In("tier".into(), vec!["frontend".into(), "edge".into()]),
            Expression::DoesNotExist("batch".into()),
        ]);
        assert!(hit.matches(&labels));

        let miss = hit.and(Expression::NotEqual("app".into(), "web".into()));
        assert!(!miss.matches(&labels));
    }
}
