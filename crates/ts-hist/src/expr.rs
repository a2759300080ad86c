//! Histogram variable expressions: a branch, optionally wrapped in one function.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ts_core::{Error, Result};

/// Function applied to a branch value before filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprFunc {
    /// Square root.
    Sqrt,
    /// Base-10 logarithm.
    Log10,
}

impl ExprFunc {
    fn name(self) -> &'static str {
        match self {
            ExprFunc::Sqrt => "sqrt",
            ExprFunc::Log10 => "log10",
        }
    }
}

/// `branch`, `sqrt(branch)` or `log10(branch)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariableExpr {
    branch: String,
    func: Option<ExprFunc>,
}

impl VariableExpr {
    /// Plain branch.
    pub fn branch(name: impl Into<String>) -> Self {
        Self { branch: name.into(), func: None }
    }

    /// `func(name)`.
    pub fn with_func(name: impl Into<String>, func: ExprFunc) -> Self {
        Self { branch: name.into(), func: Some(func) }
    }

    /// Parse `"Q2"`, `"sqrt(Q2)"` or `"log10(X)"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::Validation(format!("invalid variable expression '{s}'"));

        let (func, inner) = match s.split_once('(') {
            Some((head, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(invalid)?;
                let func = match head.trim() {
                    "sqrt" => ExprFunc::Sqrt,
                    "log10" => ExprFunc::Log10,
                    _ => return Err(invalid()),
                };
                (Some(func), inner.trim())
            }
            None => (None, s),
        };

        let ok = !inner.is_empty()
            && inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !inner.starts_with(|c: char| c.is_ascii_digit());
        if !ok {
            return Err(invalid());
        }
        Ok(Self { branch: inner.to_string(), func })
    }

    /// Branch read from the event sample.
    pub fn branch_name(&self) -> &str {
        &self.branch
    }

    /// Applied function, if any.
    pub fn func(&self) -> Option<ExprFunc> {
        self.func
    }

    /// Evaluate on one branch value. Out-of-domain inputs give NaN.
    pub fn eval(&self, v: f64) -> f64 {
        match self.func {
            None => v,
            Some(ExprFunc::Sqrt) => v.sqrt(),
            Some(ExprFunc::Log10) => v.log10(),
        }
    }
}

impl fmt::Display for VariableExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.func {
            None => f.write_str(&self.branch),
            Some(func) => write!(f, "{}({})", func.name(), self.branch),
        }
    }
}

impl FromStr for VariableExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VariableExpr {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<VariableExpr> for String {
    fn from(e: VariableExpr) -> Self {
        e.to_string()
    }
}
