use crate::buffer::ByteCursor;
use crate::error::{Result, TypeError};
use crate::scalar::Scalar;

use super::{Cell, Column, ColumnCode, Conversion};

/// Reads row cells from a line, `scanf` style.
///
/// Whitespace in a literal matches any run of input whitespace (including
/// none). Numeric conversions skip leading whitespace and read greedily.
pub(super) struct Scanner<'a> {
    cursor: ByteCursor<'a>,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(line: &'a [u8]) -> Self {
        Self {
            cursor: ByteCursor::new(line),
        }
    }

    pub(super) fn literal(&mut self, text: &str) -> Result<()> {
        for byte in text.bytes() {
            if byte.is_ascii_whitespace() {
                self.cursor.skip_while(|b| b.is_ascii_whitespace());
                continue;
            }
            match self.cursor.peek() {
                Some(found) if found == byte => {
                    self.cursor.take(1);
                }
                found => {
                    return Err(scan_error(format!(
                        "expected {:?} at offset {}, found {}",
                        byte as char,
                        self.cursor.position(),
                        describe(found)
                    )))
                }
            }
        }
        Ok(())
    }

    pub(super) fn column(&mut self, column: &Column) -> Result<Cell> {
        let conv = &column.parts[0];
        match column.code {
            ColumnCode::Bytes => self.text(conv).map(Cell::Text),
            ColumnCode::Complex => {
                let re = self.float()?;
                let im = self.float()?;
                self.literal("j")?;
                let value = if column.size == 8 {
                    Scalar::C64(re as f32, im as f32)
                } else {
                    Scalar::C128(re, im)
                };
                Ok(Cell::Scalar(value))
            }
            ColumnCode::Float => Ok(Cell::Scalar(Scalar::F32(self.float()? as f32))),
            ColumnCode::Double => Ok(Cell::Scalar(Scalar::F64(self.float()?))),
            code => {
                let bits = column.size * 8;
                let signed = matches!(
                    code,
                    ColumnCode::Int8
                        | ColumnCode::Int16
                        | ColumnCode::Int32
                        | ColumnCode::Int64
                        | ColumnCode::IntNative
                );
                let value = if signed {
                    let parsed = self.integer(conv)?;
                    Scalar::from_i64(bits, parsed)
                } else {
                    let parsed = self.unsigned(conv)?;
                    Scalar::from_u64(bits, parsed)
                };
                value
                    .map(Cell::Scalar)
                    .ok_or_else(|| scan_error(format!("value out of range for {bits}-bit column")))
            }
        }
    }

    fn text(&mut self, conv: &Conversion) -> Result<Vec<u8>> {
        if conv.conv == 'c' {
            let width = conv.width.unwrap_or(1);
            return self
                .cursor
                .take(width)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| scan_error(format!("expected {width} characters")));
        }
        self.cursor.skip_while(|b| b.is_ascii_whitespace());
        let limit = conv.width.unwrap_or(usize::MAX);
        let word = self.cursor.take_while(limit, |b| !b.is_ascii_whitespace());
        if word.is_empty() {
            return Err(scan_error("expected a string"));
        }
        Ok(word.to_vec())
    }

    fn digits(&mut self, radix: u32) -> &'a [u8] {
        self.cursor
            .take_while(usize::MAX, |b| (b as char).is_digit(radix))
    }

    fn radix(&mut self, conv: &Conversion) -> u32 {
        match conv.conv {
            'o' => 8,
            'x' | 'X' => {
                let rest = self.cursor.rest();
                if rest.len() > 2 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X') {
                    self.cursor.take(2);
                }
                16
            }
            _ => 10,
        }
    }

    fn integer(&mut self, conv: &Conversion) -> Result<i64> {
        self.cursor.skip_while(|b| b.is_ascii_whitespace());
        let negative = self.sign();
        let radix = self.radix(conv);
        let digits = self.digits(radix);
        let text = std::str::from_utf8(digits).unwrap_or_default();
        let magnitude = i128::from_str_radix(text, radix)
            .map_err(|_| scan_error(format!("expected an integer, found {:?}", text)))?;
        let value = if negative { -magnitude } else { magnitude };
        i64::try_from(value).map_err(|_| scan_error("integer out of range"))
    }

    fn unsigned(&mut self, conv: &Conversion) -> Result<u64> {
        self.cursor.skip_while(|b| b.is_ascii_whitespace());
        if self.sign() {
            return Err(scan_error("negative value in unsigned column"));
        }
        let radix = self.radix(conv);
        let digits = self.digits(radix);
        let text = std::str::from_utf8(digits).unwrap_or_default();
        u64::from_str_radix(text, radix)
            .map_err(|_| scan_error(format!("expected an unsigned integer, found {:?}", text)))
    }

    /// Consume an optional sign; true if it was `-`.
    fn sign(&mut self) -> bool {
        match self.cursor.peek() {
            Some(b'-') => {
                self.cursor.take(1);
                true
            }
            Some(b'+') => {
                self.cursor.take(1);
                false
            }
            _ => false,
        }
    }

    fn float(&mut self) -> Result<f64> {
        self.cursor.skip_while(|b| b.is_ascii_whitespace());
        let start = self.cursor.clone();
        let negative = self.sign();

        let word = self.cursor.rest();
        for (name, value) in [("inf", f64::INFINITY), ("nan", f64::NAN)] {
            if word.len() >= 3 && word[..3].eq_ignore_ascii_case(name.as_bytes()) {
                self.cursor.take(3);
                if name == "inf" && self.peek_word_ci("inity") {
                    self.cursor.take(5);
                }
                return Ok(if negative { -value } else { value });
            }
        }

        let mut len = self.digits(10).len();
        if self.cursor.peek() == Some(b'.') {
            self.cursor.take(1);
            len += self.digits(10).len();
        }
        if len == 0 {
            return Err(scan_error(format!(
                "expected a number at offset {}",
                start.position()
            )));
        }
        if matches!(self.cursor.peek(), Some(b'e' | b'E')) {
            let before_exponent = self.cursor.clone();
            self.cursor.take(1);
            self.sign();
            if self.digits(10).is_empty() {
                self.cursor = before_exponent;
            }
        }

        let consumed = self.cursor.position() - start.position();
        let text = start
            .rest()
            .get(..consumed)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .unwrap_or_default();
        text.parse::<f64>()
            .map_err(|_| scan_error(format!("invalid number {text:?}")))
    }

    fn peek_word_ci(&self, word: &str) -> bool {
        let rest = self.cursor.rest();
        rest.len() >= word.len() && rest[..word.len()].eq_ignore_ascii_case(word.as_bytes())
    }
}

fn describe(found: Option<u8>) -> String {
    match found {
        Some(byte) => format!("{:?}", byte as char),
        None => "end of line".to_string(),
    }
}

fn scan_error(reason: impl Into<String>) -> TypeError {
    TypeError::decode("ascii_table", reason)
}

#[cfg(test)]
mod tests {
    use crate::format::{Cell, TableFormat};
    use crate::scalar::Scalar;

    fn scan(format: &str, line: &str) -> crate::error::Result<Vec<Cell>> {
        TableFormat::parse(format).unwrap().scan_row(line)
    }

    #[test]
    fn whitespace_literals_match_any_run() {
        let cells = scan("%d %d\n", "  1 \t\t 2").unwrap();
        assert_eq!(
            cells,
            vec![Cell::Scalar(Scalar::I32(1)), Cell::Scalar(Scalar::I32(2))]
        );
    }

    #[test]
    fn adjacent_conversions_read_greedily() {
        let cells = scan("%s%d", "abc 12").unwrap();
        assert_eq!(cells[0], Cell::Text(b"abc".to_vec()));
        assert_eq!(cells[1], Cell::Scalar(Scalar::I32(12)));
    }

    #[test]
    fn width_limits_strings_only() {
        let cells = scan("%3s%d", "abc123").unwrap();
        assert_eq!(cells[0], Cell::Text(b"abc".to_vec()));
        assert_eq!(cells[1], Cell::Scalar(Scalar::I32(123)));
    }

    #[test]
    fn floats_and_exponents() {
        let cells = scan("%f,%e,%hf", "-1.5,2e3,.25").unwrap();
        assert_eq!(
            cells,
            vec![
                Cell::Scalar(Scalar::F64(-1.5)),
                Cell::Scalar(Scalar::F64(2000.0)),
                Cell::Scalar(Scalar::F32(0.25)),
            ]
        );
    }

    #[test]
    fn hex_and_octal() {
        let cells = scan("%x %o", "0xff 17").unwrap();
        assert_eq!(
            cells,
            vec![Cell::Scalar(Scalar::U32(255)), Cell::Scalar(Scalar::U32(15))]
        );
    }

    #[test]
    fn out_of_range_is_a_decode_error() {
        let err = scan("%hhd", "300").unwrap_err();
        assert!(matches!(err, crate::error::TypeError::Decode { .. }));
        assert!(scan("%u", "-1").is_err());
    }

    #[test]
    fn literal_mismatch_reports_position() {
        let err = scan("%d,%d", "1;2").unwrap_err();
        assert!(err.to_string().contains("expected ','"));
    }

    #[test]
    fn complex_requires_trailing_j() {
        let cells = scan("%f%fj", "1.0+2.0j").unwrap();
        assert_eq!(cells, vec![Cell::Scalar(Scalar::C128(1.0, 2.0))]);
        assert!(scan("%f%fj", "1.0+2.0").is_err());
    }
}
