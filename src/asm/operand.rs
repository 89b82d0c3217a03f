//! Literal and operand grammar.
//!
//! Literals are octal unless prefixed: `#` for decimal, `$` for hex.
//! An operand is an address followed by optional `,I` and `,X` suffixes in
//! either order:
//!
//! ```text
//! .+10  .-3  .       relative to the instruction's own address
//! P+10  P-3          the same, older spelling
//! DB+36  DB+LABEL    DB-relative
//! 36  LABEL          bare literal or symbol
//! ```

use crate::asm::codec::EncodeError;

/// Parse an unsigned literal.
pub fn parse_literal(text: &str) -> Option<u64> {
    let text = text.trim();
    let (digits, radix) = if let Some(rest) = text.strip_prefix('#') {
        (rest, 10)
    } else if let Some(rest) = text.strip_prefix('$') {
        (rest, 16)
    } else {
        (text, 8)
    };
    // from_str_radix would also take a leading '+'
    if !digits.chars().next().is_some_and(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Parse a literal with an optional leading `-`.
pub fn parse_signed(text: &str) -> Option<i128> {
    let text = text.trim();
    match text.strip_prefix('-') {
        Some(rest) => parse_literal(rest).map(|v| -(v as i128)),
        None => parse_literal(text).map(|v| v as i128),
    }
}

/// Whether `text` is a label name.
pub fn is_symbol(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A number, or a symbol still waiting for its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(u64),
    Symbol(String),
}

impl Value {
    fn parse(text: &str) -> Option<Self> {
        if let Some(n) = parse_literal(text) {
            Some(Value::Number(n))
        } else if is_symbol(text) {
            Some(Value::Symbol(text.to_owned()))
        } else {
            None
        }
    }
}

/// Address part of an operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `.±n` or `P±n`; a lone `.` is `.+0`
    Relative { back: bool, magnitude: u64 },
    /// `DB+n`
    Db(Value),
    /// Anything without a base
    Plain(Value),
}

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub address: Address,
    pub indirect: bool,
    pub indexed: bool,
}

impl Operand {
    /// Operand with no suffixes.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            indirect: false,
            indexed: false,
        }
    }
}

fn invalid(text: &str) -> EncodeError {
    EncodeError::InvalidOperand(text.to_owned())
}

fn parse_address(base: &str) -> Option<Address> {
    if base == "." {
        return Some(Address::Relative {
            back: false,
            magnitude: 0,
        });
    }

    let upper = base.to_ascii_uppercase();
    for prefix in [".", "P"] {
        for (sign, back) in [('+', false), ('-', true)] {
            let head = format!("{}{}", prefix, sign);
            if upper.starts_with(&head) {
                let magnitude = parse_literal(&base[head.len()..])?;
                return Some(Address::Relative { back, magnitude });
            }
        }
    }

    if upper.starts_with("DB+") {
        return Value::parse(&base[3..]).map(Address::Db);
    }

    Value::parse(base).map(Address::Plain)
}

/// Parse an operand. Whitespace anywhere in the text is ignored.
pub fn parse_operand(text: &str) -> Result<Operand, EncodeError> {
    let compact: String = text.split_whitespace().collect();
    let (base, suffixes) = match compact.split_once(',') {
        Some((base, rest)) => (base, Some(rest)),
        None => (compact.as_str(), None),
    };

    let address = parse_address(base).ok_or_else(|| invalid(text))?;
    let mut operand = Operand::new(address);

    for suffix in suffixes.into_iter().flat_map(|s| s.split(',')) {
        let flag = match suffix.to_ascii_uppercase().as_str() {
            "I" => &mut operand.indirect,
            "X" => &mut operand.indexed,
            _ => return Err(invalid(text)),
        };
        if *flag {
            return Err(invalid(text));
        }
        *flag = true;
    }

    Ok(operand)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_radixes() {
        assert_eq!(parse_literal("17"), Some(15));
        assert_eq!(parse_literal("#17"), Some(17));
        assert_eq!(parse_literal("$1F"), Some(31));
        assert_eq!(parse_literal("8"), None);
        assert_eq!(parse_literal("+5"), None);
        assert_eq!(parse_literal(""), None);
        assert_eq!(parse_literal("#"), None);
        assert_eq!(parse_signed("-#2"), Some(-2));
    }

    #[test]
    fn test_relative_forms() {
        let op = parse_operand(".-10,I,X").unwrap();
        assert_eq!(
            op.address,
            Address::Relative {
                back: true,
                magnitude: 8
            }
        );
        assert!(op.indirect && op.indexed);

        assert_eq!(parse_operand("p+3").unwrap(), parse_operand(".+3").unwrap());
        assert_eq!(
            parse_operand(".").unwrap().address,
            Address::Relative {
                back: false,
                magnitude: 0
            }
        );
    }

    #[test]
    fn test_db_and_plain() {
        assert_eq!(
            parse_operand("DB+36").unwrap().address,
            Address::Db(Value::Number(0o36))
        );
        assert_eq!(
            parse_operand("db+buf, x").unwrap(),
            Operand {
                address: Address::Db(Value::Symbol("buf".into())),
                indirect: false,
                indexed: true,
            }
        );
        assert_eq!(
            parse_operand("LOOP").unwrap().address,
            Address::Plain(Value::Symbol("LOOP".into()))
        );
    }

    #[test]
    fn test_bad_operands() {
        assert!(parse_operand("").is_err());
        assert!(parse_operand(".+9").is_err());
        assert!(parse_operand("DB+5,I,I").is_err());
        assert!(parse_operand("5,Y").is_err());
        assert!(parse_operand("5,").is_err());
        assert!(parse_operand("9LIVES").is_err());
    }
}
