//! Arithmetic tools
//!
//! `calc` evaluates an expression with a fixed-grammar recursive-descent
//! parser over numbers, `+ - * / ^`, parentheses and unary sign. Input is
//! first screened against a character allow-list; anything outside it is
//! rejected before parsing. This is the sole defense against arbitrary
//! code reaching an evaluator, and the allow-list must not be relaxed.
//!
//! `find_number` pulls the first signed integer or decimal out of free
//! text.

use super::{require_str, Tool};
use crate::error::AgentError;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    static ref NUM_RE: Regex = Regex::new(r"[+-]?(?:\d+(?:\.\d*)?|\.\d+)").unwrap();
}

/// Safe arithmetic evaluation
pub struct Calc;

#[async_trait]
impl Tool for Calc {
    fn name(&self) -> &str {
        "calc"
    }

    fn description(&self) -> &str {
        "evaluate an arithmetic expression"
    }

    fn usage(&self) -> &str {
        "calc(expr)"
    }

    fn required_args(&self) -> &[&str] {
        &["expr"]
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, AgentError> {
        let expr = require_str(self.name(), args, "expr")?;
        evaluate(&expr)
    }
}

/// Evaluate an arithmetic expression to its rendered result.
pub fn evaluate(expr: &str) -> Result<String, AgentError> {
    let allowed = |c: char| {
        c.is_ascii_digit() || c.is_whitespace() || "+-*/().^".contains(c)
    };
    if !expr.chars().all(allowed) {
        return Err(AgentError::EvaluationFailure(
            "invalid characters in expression".into(),
        ));
    }

    let value = Parser::new(expr).parse()?;
    render(value)
}

/// Integer-valued results print without a fractional part.
fn render(value: f64) -> Result<String, AgentError> {
    if !value.is_finite() {
        return Err(AgentError::EvaluationFailure("arithmetic overflow".into()));
    }
    if value.fract() == 0.0 && value.abs() < 9e15 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{value}"))
    }
}

/// Recursive-descent parser.
///
/// Grammar (Python operator precedence, `^` right-associative and binding
/// tighter than unary sign):
///
/// ```text
/// expr  := term  (('+' | '-') term)*
/// term  := unary (('*' | '/') unary)*
/// unary := ('+' | '-') unary | power
/// power := atom ('^' unary)?
/// atom  := number | '(' expr ')'
/// ```
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expr: &'a str) -> Self {
        Parser {
            input: expr.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<f64, AgentError> {
        let value = self.expr()?;
        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(self.fail("trailing input"));
        }
        Ok(value)
    }

    fn fail(&self, what: &str) -> AgentError {
        AgentError::EvaluationFailure(format!("{what} at position {}", self.pos))
    }

    fn skip_ws(&mut self) {
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, AgentError> {
        let mut value = self.term()?;
        loop {
            if self.eat(b'+') {
                value += self.term()?;
            } else if self.eat(b'-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, AgentError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(b'*') {
                value *= self.unary()?;
            } else if self.eat(b'/') {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err(AgentError::EvaluationFailure("division by zero".into()));
                }
                value /= rhs;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, AgentError> {
        if self.eat(b'-') {
            Ok(-self.unary()?)
        } else if self.eat(b'+') {
            self.unary()
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<f64, AgentError> {
        let base = self.atom()?;
        if self.eat(b'^') {
            let exponent = self.unary()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> Result<f64, AgentError> {
        if self.eat(b'(') {
            let value = self.expr()?;
            if !self.eat(b')') {
                return Err(self.fail("expected ')'"));
            }
            return Ok(value);
        }

        self.skip_ws();
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.fail("expected a number"));
        }
        let literal = String::from_utf8_lossy(&self.input[start..self.pos]);
        literal
            .parse::<f64>()
            .map_err(|_| AgentError::EvaluationFailure(format!("bad number '{literal}'")))
    }
}

/// First signed integer-or-decimal substring in free text
pub struct FindNumber;

#[async_trait]
impl Tool for FindNumber {
    fn name(&self) -> &str {
        "find_number"
    }

    fn description(&self) -> &str {
        "extract the first number from text"
    }

    fn usage(&self) -> &str {
        "find_number(text)"
    }

    fn required_args(&self) -> &[&str] {
        &["text"]
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, AgentError> {
        let text = require_str(self.name(), args, "text")?;
        NUM_RE
            .find(&text)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| AgentError::EvaluationFailure("no number found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_results_render_without_fraction() {
        assert_eq!(evaluate("2+2").unwrap(), "4");
        assert_eq!(evaluate("10 - 3 * 2").unwrap(), "4");
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), "9");
    }

    #[test]
    fn caret_is_exponentiation() {
        assert_eq!(evaluate("2^3").unwrap(), "8");
        assert_eq!(evaluate("2^3^2").unwrap(), "512"); // right-associative
        assert_eq!(evaluate("2^-1").unwrap(), "0.5");
    }

    #[test]
    fn unary_minus_binds_below_exponent() {
        assert_eq!(evaluate("-2^2").unwrap(), "-4");
        assert_eq!(evaluate("(-2)^2").unwrap(), "4");
    }

    #[test]
    fn division_yields_decimals() {
        assert_eq!(evaluate("10/4").unwrap(), "2.5");
    }

    #[test]
    fn allow_list_rejects_code() {
        let err = evaluate("__import__('os')").unwrap_err();
        assert_eq!(err.to_observation(), "ERROR: invalid characters in expression");
        assert!(evaluate("2 + os.getcwd()").is_err());
    }

    #[test]
    fn division_by_zero_is_an_evaluation_failure() {
        assert!(matches!(
            evaluate("1/0").unwrap_err(),
            AgentError::EvaluationFailure(_)
        ));
    }

    #[test]
    fn malformed_expressions_fail_cleanly() {
        assert!(evaluate("").is_err());
        assert!(evaluate("(1+2").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("1..5 + 1").is_err());
    }

    #[tokio::test]
    async fn find_number_matches_first_signed_decimal() {
        let tool = FindNumber;
        let mut args = Map::new();
        args.insert(
            "text".into(),
            Value::String("the drop was -2.5 degrees over 3 days".into()),
        );
        assert_eq!(tool.call(&args).await.unwrap(), "-2.5");

        args.insert("text".into(), Value::String("no digits here".into()));
        let err = tool.call(&args).await.unwrap_err();
        assert_eq!(err.to_observation(), "ERROR: no number found");
    }
}
