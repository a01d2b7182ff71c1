//! Placeholder malware check
//!
//! Looks for the EICAR anti-virus test signature anywhere in the stream.
//! Chunks are fed as they arrive; a short tail is carried over so a
//! signature split across two chunks is still found.

const EICAR: &[u8] = br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

#[derive(Debug, Default)]
pub struct SignatureScanner {
    tail: Vec<u8>,
    detected: bool,
}

impl SignatureScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if self.detected {
            return;
        }

        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);
        self.detected = window.windows(EICAR.len()).any(|w| w == EICAR);

        let keep = (EICAR.len() - 1).min(window.len());
        self.tail = window.split_off(window.len() - keep);
    }

    pub fn detected(&self) -> bool {
        self.detected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input() {
        let mut scanner = SignatureScanner::new();
        scanner.feed(b"%PDF-1.4 nothing to see here");
        assert!(!scanner.detected());
    }

    #[test]
    fn test_signature_in_one_chunk() {
        let mut scanner = SignatureScanner::new();
        let mut data = b"%PDF-1.4\n".to_vec();
        data.extend_from_slice(EICAR);
        scanner.feed(&data);
        assert!(scanner.detected());
    }

    #[test]
    fn test_signature_split_across_chunks() {
        let mut scanner = SignatureScanner::new();
        let (a, b) = EICAR.split_at(20);
        scanner.feed(b"prefix ");
        scanner.feed(a);
        scanner.feed(b);
        assert!(scanner.detected());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut scanner = SignatureScanner::new();
        for byte in EICAR {
            scanner.feed(std::slice::from_ref(byte));
        }
        assert!(scanner.detected());
    }
}
