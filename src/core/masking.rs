use crate::models::MaskedIdentity;

/// Redact a name and national id for display.
///
/// The first name is kept, every later name keeps only its initial. The CPF
/// keeps its first block and check digits: `123.456.789-01` becomes
/// `123.***.***-01`.
pub fn mask_sensitive_data(name: &str, national_id: &str) -> MaskedIdentity {
    MaskedIdentity {
        name: mask_name(name),
        national_id: mask_national_id(national_id),
    }
}

pub fn mask_name(name: &str) -> String {
    name.split(' ')
        .enumerate()
        .map(|(index, part)| {
            if index == 0 {
                return part.to_string();
            }
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut masked = String::with_capacity(part.len());
                    masked.push(first);
                    masked.extend(chars.map(|_| '*'));
                    masked
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Redact the middle blocks of the first `ddd.ddd.ddd-dd` occurrence.
/// Inputs without that shape come back unchanged.
pub fn mask_national_id(national_id: &str) -> String {
    const PATTERN_LEN: usize = 14;

    let bytes = national_id.as_bytes();
    if bytes.len() < PATTERN_LEN {
        return national_id.to_string();
    }

    for start in 0..=bytes.len() - PATTERN_LEN {
        let window = &bytes[start..start + PATTERN_LEN];
        if is_cpf_shape(window) {
            // Window is pure ASCII so these slice boundaries are char boundaries
            let end = start + PATTERN_LEN;
            return format!(
                "{}{}.***.***-{}{}",
                &national_id[..start],
                &national_id[start..start + 3],
                &national_id[end - 2..end],
                &national_id[end..],
            );
        }
    }

    national_id.to_string()
}

#[inline]
fn is_cpf_shape(window: &[u8]) -> bool {
    window.iter().enumerate().all(|(i, b)| match i {
        3 | 7 => *b == b'.',
        11 => *b == b'-',
        _ => b.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_reference_identity() {
        let masked = mask_sensitive_data("João Silva Santos", "123.456.789-01");
        assert_eq!(masked.name, "João S**** S*****");
        assert_eq!(masked.national_id, "123.***.***-01");
    }

    #[test]
    fn test_single_name_unchanged() {
        assert_eq!(mask_name("Madonna"), "Madonna");
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        assert_eq!(mask_name("Ana Ávila Conceição"), "Ana Á**** C********");
    }

    #[test]
    fn test_repeated_spaces_keep_empty_tokens() {
        assert_eq!(mask_name("Ana  Paula"), "Ana  P****");
    }

    #[test]
    fn test_national_id_without_pattern_unchanged() {
        assert_eq!(mask_national_id("12345678901"), "12345678901");
        assert_eq!(mask_national_id(""), "");
        assert_eq!(mask_national_id("123.456.789-0"), "123.456.789-0");
    }

    #[test]
    fn test_national_id_pattern_inside_text() {
        assert_eq!(mask_national_id("CPF: 987.654.321-09."), "CPF: 987.***.***-09.");
    }

    #[test]
    fn test_masking_is_deterministic() {
        let a = mask_sensitive_data("Maria Oliveira Costa", "987.654.321-09");
        let b = mask_sensitive_data("Maria Oliveira Costa", "987.654.321-09");
        assert_eq!(a, b);
    }
}
