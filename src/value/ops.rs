//! Arithmetic/string operator overloads for `Value`.
//!
//! A calc closure (spec.md §4.4, §6.2) is ordinary Rust code operating on
//! `Value` inputs; these impls give it the ergonomics of `a + b` while
//! enforcing spec.md §3.4's rule that any arithmetic or string operation
//! involving `Missing` yields `Missing`.

use super::Value;
use std::ops::{Add, Div, Mul, Sub};

fn propagate_missing(a: &Value, b: &Value) -> Option<Value> {
    if a.is_missing() || b.is_missing() {
        Some(Value::missing())
    } else {
        None
    }
}

macro_rules! numeric_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for Value {
            type Output = Value;

            fn $method(self, rhs: Value) -> Value {
                if let Some(missing) = propagate_missing(&self, &rhs) {
                    return missing;
                }
                match (&self, &rhs) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(a $op b),
                    (Value::Decimal(a), Value::Decimal(b)) => Value::Decimal(*a $op *b),
                    _ => Value::Float(self.to_f() $op rhs.to_f()),
                }
            }
        }
    };
}

numeric_op!(Add, add, +);
numeric_op!(Sub, sub, -);
numeric_op!(Mul, mul, *);

impl Div for Value {
    type Output = Value;

    fn div(self, rhs: Value) -> Value {
        if let Some(missing) = propagate_missing(&self, &rhs) {
            return missing;
        }
        match (&self, &rhs) {
            (Value::Decimal(a), Value::Decimal(b)) if !b.is_zero() => Value::Decimal(*a / *b),
            _ => {
                let divisor = rhs.to_f();
                if divisor == 0.0 {
                    Value::missing_because("division by zero")
                } else {
                    Value::Float(self.to_f() / divisor)
                }
            }
        }
    }
}

impl Value {
    /// String concatenation; `Missing` on either side yields `Missing`
    /// (spec.md §3.4).
    pub fn concat(&self, other: &Value) -> Value {
        if self.is_missing() || other.is_missing() {
            return Value::missing();
        }
        Value::String(format!("{self}{other}"))
    }

    /// Sum a sequence of values, short-circuiting to `Missing` as soon as
    /// one element is missing.
    pub fn sum<'a>(values: impl IntoIterator<Item = &'a Value>) -> Value {
        let mut total = Value::Int(0);
        for v in values {
            if v.is_missing() {
                return Value::missing();
            }
            total = total + v.clone();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_propagates_missing() {
        let result = Value::Int(1) + Value::missing();
        assert!(result.is_missing());
    }

    #[test]
    fn integer_addition_stays_integer() {
        assert_eq!(Value::Int(2) + Value::Int(3), Value::Int(5));
    }

    #[test]
    fn mixed_numeric_promotes_to_float() {
        assert_eq!(Value::Int(2) + Value::Float(0.5), Value::Float(2.5));
    }

    #[test]
    fn division_by_zero_yields_missing() {
        assert!((Value::Int(1) / Value::Int(0)).is_missing());
    }

    #[test]
    fn sum_short_circuits_on_missing() {
        let values = vec![Value::Int(1), Value::missing(), Value::Int(3)];
        assert!(Value::sum(values.iter()).is_missing());
    }
}
