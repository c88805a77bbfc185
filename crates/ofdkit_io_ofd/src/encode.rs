//! Fixed-width field encoder.
//!
//! Widths are counted in GB18030 bytes. A token returned by [`encode_field`]
//! always measures exactly `spec.byte_length` bytes under GB18030.

use encoding_rs::GB18030;

use crate::conf::{CHR_PAD_CHARACTER, CHR_PAD_NUMERIC};
use crate::spec::{OfdError, SpecFieldSpec};

/// How a token was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFieldEncodeStatus {
    /// Value encoded without loss.
    Encoded,
    /// Empty or whitespace-only input.
    Blank,
    /// Numeric input could not be parsed; blank-filled.
    ParseFailed,
    /// Character input was cut to fit.
    Truncated,
}

/// Token plus the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEncodedField {
    /// Fixed-width token.
    pub token: String,
    /// Encoding outcome.
    pub status: EnumFieldEncodeStatus,
}

////////////////////////////////////////////////////////////////////////////////
// #region Measurement

/// Encode text as GB18030 bytes.
pub fn encode_text(text: &str) -> Vec<u8> {
    let (v_bytes, _, _) = GB18030.encode(text);
    v_bytes.into_owned()
}

/// GB18030 byte length of `text`.
pub fn measure_encoded_len(text: &str) -> usize {
    text.chars().map(measure_char_encoded_len).sum()
}

/// GB18030 byte length of one character (1, 2 or 4).
pub fn measure_char_encoded_len(chr: char) -> usize {
    if chr.is_ascii() {
        return 1;
    }
    let mut v_buf = [0u8; 4];
    let (v_bytes, _, _) = GB18030.encode(chr.encode_utf8(&mut v_buf));
    v_bytes.len()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Encoding

/// Encode one cell into its fixed-width token.
///
/// Unparseable numeric input is blank-filled. Numeric input needing more
/// digits than `spec.byte_length` fails with [`OfdError::EncodingOverflow`].
pub fn encode_field(value: &str, spec: &SpecFieldSpec) -> Result<String, OfdError> {
    encode_field_checked(value, spec).map(|spec_encoded| spec_encoded.token)
}

/// Same as [`encode_field`], also reporting which rule applied.
pub fn encode_field_checked(
    value: &str,
    spec: &SpecFieldSpec,
) -> Result<SpecEncodedField, OfdError> {
    if value.trim().is_empty() {
        return Ok(SpecEncodedField {
            token: derive_blank_token(spec.byte_length),
            status: EnumFieldEncodeStatus::Blank,
        });
    }

    if spec.type_class.is_numeric_like() {
        return match encode_numeric(value, spec)? {
            Some(token) => Ok(SpecEncodedField {
                token,
                status: EnumFieldEncodeStatus::Encoded,
            }),
            None => Ok(SpecEncodedField {
                token: derive_blank_token(spec.byte_length),
                status: EnumFieldEncodeStatus::ParseFailed,
            }),
        };
    }

    Ok(encode_character(value, spec.byte_length))
}

/// `n_len` spaces.
pub fn derive_blank_token(n_len: usize) -> String {
    CHR_PAD_CHARACTER.to_string().repeat(n_len)
}

/// Keep digits and `.`; full-width digits are folded to ASCII.
pub fn normalize_numeric_text(value: &str) -> String {
    value
        .chars()
        .filter_map(|chr| match chr {
            '0'..='9' | '.' => Some(chr),
            '\u{FF10}'..='\u{FF19}' => char::from_u32(chr as u32 - 0xFF10 + '0' as u32),
            _ => None,
        })
        .collect()
}

/// Format `num` with `decimal_places` fraction digits and drop the point.
pub fn format_numeric_digits(num: f64, decimal_places: usize) -> String {
    format!("{num:.decimal_places$}").replace('.', "")
}

/// `Ok(None)` means the text is not a number.
fn encode_numeric(value: &str, spec: &SpecFieldSpec) -> Result<Option<String>, OfdError> {
    let c_cleaned = normalize_numeric_text(value);
    let Ok(num) = c_cleaned.parse::<f64>() else {
        return Ok(None);
    };

    let c_digits = if num.is_finite() {
        format_numeric_digits(num, spec.decimal_places)
    } else {
        // Only reachable with hundreds of digits.
        c_cleaned.replace('.', "")
    };
    if c_digits.len() > spec.byte_length || !num.is_finite() {
        return Err(OfdError::EncodingOverflow {
            field_name: spec.canonical_name.to_string(),
            value: value.to_string(),
            byte_length: spec.byte_length,
            n_digits: c_digits.len(),
            row_idx: None,
        });
    }

    let mut token = CHR_PAD_NUMERIC
        .to_string()
        .repeat(spec.byte_length - c_digits.len());
    token.push_str(&c_digits);
    Ok(Some(token))
}

fn encode_character(value: &str, byte_length: usize) -> SpecEncodedField {
    let c_trimmed = value.trim();

    let mut token = String::with_capacity(byte_length);
    let mut n_len_used = 0usize;
    let mut if_truncated = false;
    for chr in c_trimmed.chars() {
        // Line breaks and tabs inside a cell must not split the record line.
        let chr = if chr.is_control() { CHR_PAD_CHARACTER } else { chr };
        let n_len_chr = measure_char_encoded_len(chr);
        if n_len_used + n_len_chr > byte_length {
            if_truncated = true;
            break;
        }
        token.push(chr);
        n_len_used += n_len_chr;
    }

    token.push_str(&derive_blank_token(byte_length - n_len_used));
    SpecEncodedField {
        token,
        status: if if_truncated {
            EnumFieldEncodeStatus::Truncated
        } else {
            EnumFieldEncodeStatus::Encoded
        },
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EnumFieldTypeClass;

    fn spec(type_class: EnumFieldTypeClass, byte_length: usize, decimal_places: usize) -> SpecFieldSpec {
        SpecFieldSpec {
            canonical_name: "测试字段",
            identifier: "TestField",
            type_class,
            byte_length,
            decimal_places,
        }
    }

    #[test]
    fn test_numeric_implied_decimal_places() {
        let spec_num = spec(EnumFieldTypeClass::Numeric, 8, 2);
        assert_eq!(encode_field("123.4", &spec_num).unwrap(), "00012340");
        assert_eq!(encode_field("0", &spec_num).unwrap(), "00000000");
        assert_eq!(encode_field("1,234.5", &spec_num).unwrap(), "00123450");
        assert_eq!(encode_field("¥ 99", &spec_num).unwrap(), "00009900");
    }

    #[test]
    fn test_numeric_rounds_to_declared_places() {
        let spec_rate = spec(EnumFieldTypeClass::Numeric, 5, 4);
        assert_eq!(encode_field("0.12345678", &spec_rate).unwrap(), "01235");
        let spec_int = spec(EnumFieldTypeClass::Numeric, 2, 0);
        assert_eq!(encode_field("3", &spec_int).unwrap(), "03");
    }

    #[test]
    fn test_digit_string_uses_numeric_rule() {
        let spec_date = spec(EnumFieldTypeClass::DigitString, 8, 0);
        assert_eq!(encode_field("2023-08-01", &spec_date).unwrap(), "20230801");
        let spec_code = spec(EnumFieldTypeClass::DigitString, 6, 0);
        assert_eq!(encode_field("1234", &spec_code).unwrap(), "001234");
    }

    #[test]
    fn test_full_width_digits_are_folded() {
        let spec_num = spec(EnumFieldTypeClass::Numeric, 6, 0);
        assert_eq!(encode_field("１２３", &spec_num).unwrap(), "000123");
    }

    #[test]
    fn test_blank_rule_for_every_type_class() {
        for type_class in [
            EnumFieldTypeClass::Character,
            EnumFieldTypeClass::DigitString,
            EnumFieldTypeClass::Numeric,
        ] {
            let spec_field = spec(type_class, 6, 0);
            assert_eq!(encode_field("", &spec_field).unwrap(), "      ");
            let spec_checked = encode_field_checked(" \t\u{3000}", &spec_field).unwrap();
            assert_eq!(spec_checked.token, "      ");
            assert_eq!(spec_checked.status, EnumFieldEncodeStatus::Blank);
        }
    }

    #[test]
    fn test_numeric_parse_failure_blank_fills() {
        let spec_num = spec(EnumFieldTypeClass::Numeric, 4, 0);
        for value in ["abc", "1.2.3", "."] {
            let spec_checked = encode_field_checked(value, &spec_num).unwrap();
            assert_eq!(spec_checked.token, "    ", "{value}");
            assert_eq!(spec_checked.status, EnumFieldEncodeStatus::ParseFailed);
        }
    }

    #[test]
    fn test_numeric_overflow_is_an_error() {
        let spec_num = spec(EnumFieldTypeClass::Numeric, 5, 2);
        let err = encode_field("1234.5", &spec_num).unwrap_err();
        assert_eq!(
            err,
            OfdError::EncodingOverflow {
                field_name: "测试字段".to_string(),
                value: "1234.5".to_string(),
                byte_length: 5,
                n_digits: 6,
                row_idx: None,
            }
        );
        assert_eq!(encode_field("999.99", &spec_num).unwrap(), "99999");
    }

    #[test]
    fn test_character_pads_and_trims() {
        let spec_code = spec(EnumFieldTypeClass::Character, 6, 0);
        assert_eq!(encode_field("000001", &spec_code).unwrap(), "000001");
        assert_eq!(encode_field("  AB ", &spec_code).unwrap(), "AB    ");
        assert_eq!(encode_field("张三", &spec_code).unwrap(), "张三  ");
    }

    #[test]
    fn test_character_control_chars_become_spaces() {
        let spec_addr = spec(EnumFieldTypeClass::Character, 16, 0);
        let token = encode_field("北京市\n朝阳区", &spec_addr).unwrap();
        assert_eq!(token, "北京市 朝阳区   ");
        assert_eq!(measure_encoded_len(&token), 16);

        let token = encode_field("a\r\nb\tc", &spec(EnumFieldTypeClass::Character, 8, 0)).unwrap();
        assert_eq!(token, "a  b c  ");
        assert!(!token.chars().any(char::is_control));
    }

    #[test]
    fn test_character_truncation_keeps_whole_characters() {
        let spec_name = spec(EnumFieldTypeClass::Character, 5, 0);
        let spec_checked = encode_field_checked("张三丰", &spec_name).unwrap();
        assert_eq!(spec_checked.token, "张三 ");
        assert_eq!(spec_checked.status, EnumFieldEncodeStatus::Truncated);

        let v_bytes = encode_text(&spec_checked.token);
        assert_eq!(v_bytes.len(), 5);
        let (c_decoded, if_malformed) = GB18030.decode_without_bom_handling(&v_bytes);
        assert!(!if_malformed);
        assert_eq!(c_decoded, "张三 ");
    }

    #[test]
    fn test_token_width_invariant_over_mixed_inputs() {
        let l_values = [
            "",
            "   ",
            "abc",
            "投资人户名很长很长很长很长很长很长",
            "a张b三c丰d",
            "12ab34.5",
            "😀😀😀",
            "x😀",
        ];
        for type_class in [
            EnumFieldTypeClass::Character,
            EnumFieldTypeClass::DigitString,
            EnumFieldTypeClass::Numeric,
        ] {
            for n_len in [1usize, 2, 3, 5, 16] {
                let spec_field = spec(type_class, n_len, 0);
                for value in l_values {
                    let Ok(token) = encode_field(value, &spec_field) else {
                        continue;
                    };
                    assert_eq!(
                        measure_encoded_len(&token),
                        n_len,
                        "{type_class} {n_len} {value:?}"
                    );
                    assert_eq!(encode_text(&token).len(), n_len);
                }
            }
        }
    }

    #[test]
    fn test_measure_encoded_len() {
        assert_eq!(measure_encoded_len("abc"), 3);
        assert_eq!(measure_encoded_len("基金"), 4);
        assert_eq!(measure_char_encoded_len('😀'), 4);
    }
}
