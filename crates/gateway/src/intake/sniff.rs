//! Content type sniffing from the first bytes of an upload

/// Best guess at the media type of `head`
pub fn sniff(head: &[u8]) -> String {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }
    if looks_like_text(head) {
        "text/plain; charset=utf-8".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// Compare media types ignoring parameters and case
pub fn is_allowed(detected: &str, allowed: &[String]) -> bool {
    let detected = essence(detected);
    allowed.iter().any(|a| essence(a).eq_ignore_ascii_case(detected))
}

/// `type/subtype` without parameters
pub fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or(media_type).trim()
}

fn looks_like_text(head: &[u8]) -> bool {
    let valid = match std::str::from_utf8(head) {
        Ok(s) => s,
        // A multi-byte character cut off at the sniff boundary is still text
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&head[..e.valid_up_to()]) {
            Ok(s) => s,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    valid
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r' | '\x0c' | '\x1b'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_magic() {
        assert_eq!(sniff(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n"), "application/pdf");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(sniff(b"hello text"), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_binary_fallback() {
        assert_eq!(sniff(&[0x00, 0x01, 0x02, 0xff]), "application/octet-stream");
    }

    #[test]
    fn test_png_is_not_pdf() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let allowed = vec!["application/pdf".to_string()];
        assert!(!is_allowed(&sniff(&png), &allowed));
    }

    #[test]
    fn test_allowed_ignores_parameters() {
        let allowed = vec!["text/plain".to_string(), "Application/PDF".to_string()];
        assert!(is_allowed("text/plain; charset=utf-8", &allowed));
        assert!(is_allowed("application/pdf", &allowed));
        assert!(!is_allowed("image/png", &allowed));
    }

    #[test]
    fn test_truncated_utf8_is_text() {
        let mut head = "résumé".as_bytes().to_vec();
        head.pop();
        assert_eq!(sniff(&head), "text/plain; charset=utf-8");
    }
}
