use crate::error::{Result, TypeError};
use crate::scalar::Scalar;

use super::{Cell, Column, ColumnCode, Conversion};

pub(super) fn render_column(column: &Column, cell: &Cell, out: &mut String) -> Result<()> {
    match (column.code, cell) {
        (ColumnCode::Bytes, Cell::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            out.push_str(&render_text(&column.parts[0], &text));
        }
        (ColumnCode::Complex, Cell::Scalar(value)) => {
            let (re, im) = value
                .as_complex()
                .ok_or_else(|| mismatch(column, value))?;
            out.push_str(&render_float(&column.parts[0], re));
            out.push_str(&render_float(&column.parts[1], im));
            out.push('j');
        }
        (ColumnCode::Float | ColumnCode::Double, Cell::Scalar(value)) => {
            let number = value.as_f64().ok_or_else(|| mismatch(column, value))?;
            out.push_str(&render_float(&column.parts[0], number));
        }
        (_, Cell::Scalar(value)) if value.subtype() == column.code.subtype() => {
            let conv = &column.parts[0];
            let rendered = match (value.as_i64(), value.as_u64()) {
                (Some(signed), _) if matches!(conv.conv, 'd' | 'i') => render_signed(conv, signed),
                (Some(signed), _) => render_unsigned(conv, wrap_unsigned(signed, column.size)),
                (_, Some(unsigned)) if matches!(conv.conv, 'd' | 'i') => {
                    render_signed(conv, unsigned as i64)
                }
                (_, Some(unsigned)) => render_unsigned(conv, unsigned),
                _ => return Err(mismatch(column, value)),
            };
            out.push_str(&rendered);
        }
        (_, Cell::Scalar(value)) => return Err(mismatch(column, value)),
        (_, Cell::Text(_)) => {
            return Err(TypeError::encode(
                "ascii_table",
                format!("text cell in {:?} column", column.code),
            ))
        }
    }
    Ok(())
}

fn mismatch(column: &Column, value: &Scalar) -> TypeError {
    TypeError::encode(
        "ascii_table",
        format!("{} value in {:?} column", value.label(), column.code),
    )
}

/// Reinterpret a negative value as the unsigned integer of `size` bytes.
fn wrap_unsigned(value: i64, size: usize) -> u64 {
    let raw = value as u64;
    if size >= 8 {
        raw
    } else {
        raw & ((1u64 << (size * 8)) - 1)
    }
}

fn sign_prefix(conv: &Conversion, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if conv.flags.plus {
        "+"
    } else if conv.flags.space {
        " "
    } else {
        ""
    }
}

/// Apply width, alignment and zero padding to `prefix` + `digits`.
fn pad(conv: &Conversion, prefix: &str, digits: &str, zero_ok: bool) -> String {
    let len = prefix.len() + digits.len();
    let width = conv.width.unwrap_or(0);
    if len >= width {
        return format!("{prefix}{digits}");
    }
    let fill = width - len;
    if conv.flags.left {
        format!("{prefix}{digits}{}", " ".repeat(fill))
    } else if conv.flags.zero && zero_ok {
        format!("{prefix}{}{digits}", "0".repeat(fill))
    } else {
        format!("{}{prefix}{digits}", " ".repeat(fill))
    }
}

fn min_digits(conv: &Conversion, digits: String) -> String {
    match conv.precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
        _ => digits,
    }
}

fn render_signed(conv: &Conversion, value: i64) -> String {
    let digits = min_digits(conv, value.unsigned_abs().to_string());
    pad(
        conv,
        sign_prefix(conv, value < 0),
        &digits,
        conv.precision.is_none(),
    )
}

fn render_unsigned(conv: &Conversion, value: u64) -> String {
    let (digits, alt_prefix) = match conv.conv {
        'o' => (format!("{value:o}"), "0"),
        'x' => (format!("{value:x}"), "0x"),
        'X' => (format!("{value:X}"), "0X"),
        _ => (value.to_string(), ""),
    };
    let mut digits = min_digits(conv, digits);
    let mut prefix = "";
    if conv.flags.alt && value != 0 {
        if conv.conv == 'o' {
            if !digits.starts_with('0') {
                digits.insert(0, '0');
            }
        } else {
            prefix = alt_prefix;
        }
    }
    pad(conv, prefix, &digits, conv.precision.is_none())
}

fn render_text(conv: &Conversion, text: &str) -> String {
    let shown: String = match conv.precision {
        Some(p) if conv.conv == 's' => text.chars().take(p).collect(),
        _ => text.to_string(),
    };
    pad(conv, "", &shown, false)
}

fn render_float(conv: &Conversion, value: f64) -> String {
    let upper = conv.conv.is_ascii_uppercase();
    let prefix = sign_prefix(conv, value.is_sign_negative() && !value.is_nan());
    if !value.is_finite() {
        let word = match (value.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        return pad(conv, prefix, word, false);
    }

    let magnitude = value.abs();
    let precision = conv.precision.unwrap_or(6);
    let body = match conv.conv.to_ascii_lowercase() {
        'e' => exponent_form(magnitude, precision, upper, conv.flags.alt),
        'g' => general_form(magnitude, precision, upper, conv.flags.alt),
        _ => fixed_form(magnitude, precision, conv.flags.alt),
    };
    pad(conv, prefix, &body, true)
}

fn fixed_form(magnitude: f64, precision: usize, alt: bool) -> String {
    let mut body = format!("{magnitude:.precision$}");
    if alt && precision == 0 {
        body.push('.');
    }
    body
}

/// `d.ddde+XX` with at least two exponent digits.
fn exponent_form(magnitude: f64, precision: usize, upper: bool, alt: bool) -> String {
    let (mantissa, exponent) = split_exponent(magnitude, precision);
    let mut mantissa = mantissa;
    if alt && precision == 0 {
        mantissa.push('.');
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exponent.unsigned_abs())
}

fn split_exponent(magnitude: f64, precision: usize) -> (String, i32) {
    let rendered = format!("{magnitude:.precision$e}");
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (rendered, 0),
    }
}

fn general_form(magnitude: f64, precision: usize, upper: bool, alt: bool) -> String {
    let significant = precision.max(1);
    let exponent = if magnitude == 0.0 {
        0
    } else {
        split_exponent(magnitude, significant - 1).1
    };
    let mut body = if exponent < -4 || exponent >= significant as i32 {
        exponent_form(magnitude, significant - 1, upper, alt)
    } else {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        fixed_form(magnitude, decimals, alt)
    };
    if !alt {
        body = strip_trailing_zeros(&body);
    }
    body
}

fn strip_trailing_zeros(body: &str) -> String {
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(at) => body.split_at(at),
        None => (body, ""),
    };
    if !mantissa.contains('.') {
        return body.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{exponent}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TableFormat;

    fn render(format: &str, cell: Cell) -> String {
        TableFormat::parse(format)
            .unwrap()
            .format_row(&[cell])
            .unwrap()
    }

    #[test]
    fn integers_with_flags() {
        assert_eq!(render("%5d", Cell::Scalar(Scalar::I32(42))), "   42");
        assert_eq!(render("%-5d|", Cell::Scalar(Scalar::I32(42))), "42   |");
        assert_eq!(render("%05d", Cell::Scalar(Scalar::I32(-42))), "-0042");
        assert_eq!(render("%+d", Cell::Scalar(Scalar::I32(7))), "+7");
        assert_eq!(render("%.3d", Cell::Scalar(Scalar::I32(7))), "007");
        assert_eq!(render("%x", Cell::Scalar(Scalar::U32(255))), "ff");
        assert_eq!(render("%#X", Cell::Scalar(Scalar::U32(255))), "0XFF");
        assert_eq!(render("%#o", Cell::Scalar(Scalar::U32(8))), "010");
        assert_eq!(render("%hhu", Cell::Scalar(Scalar::U8(200))), "200");
    }

    #[test]
    fn floats_in_each_style() {
        assert_eq!(render("%f", Cell::Scalar(Scalar::F64(1.5))), "1.500000");
        assert_eq!(render("%8.3f", Cell::Scalar(Scalar::F64(-1.5))), "  -1.500");
        assert_eq!(render("%e", Cell::Scalar(Scalar::F64(12345.678))), "1.234568e+04");
        assert_eq!(render("%.2E", Cell::Scalar(Scalar::F64(0.000123))), "1.23E-04");
        assert_eq!(render("%g", Cell::Scalar(Scalar::F64(0.0001))), "0.0001");
        assert_eq!(render("%g", Cell::Scalar(Scalar::F64(1234567.0))), "1.23457e+06");
        assert_eq!(render("%g", Cell::Scalar(Scalar::F64(100.0))), "100");
        assert_eq!(render("%g", Cell::Scalar(Scalar::F64(0.0))), "0");
        assert_eq!(render("%f", Cell::Scalar(Scalar::F64(f64::INFINITY))), "inf");
        assert_eq!(render("%hf", Cell::Scalar(Scalar::F32(0.25))), "0.250000");
    }

    #[test]
    fn strings_pad_and_truncate() {
        assert_eq!(render("%5s|", Cell::Text(b"ab".to_vec())), "   ab|");
        assert_eq!(render("%-5s|", Cell::Text(b"ab".to_vec())), "ab   |");
        assert_eq!(render("%.2s", Cell::Text(b"abcdef".to_vec())), "ab");
        assert_eq!(render("%c", Cell::Text(b"z".to_vec())), "z");
    }

    #[test]
    fn mismatched_cell_is_an_encode_error() {
        let format = TableFormat::parse("%d").unwrap();
        let err = format
            .format_row(&[Cell::Scalar(Scalar::F64(1.0))])
            .unwrap_err();
        assert!(matches!(err, TypeError::Encode { .. }));
        assert_eq!(err.path().unwrap().to_string(), "$#0");
    }

    #[test]
    fn negative_into_unsigned_wraps_to_column_width() {
        assert_eq!(wrap_unsigned(-1, 1), 255);
        assert_eq!(wrap_unsigned(-1, 8), u64::MAX);
    }
}
