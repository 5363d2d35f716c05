use base64::Engine;

/// Sample rate of PCM16 audio on the realtime wire, in both directions.
pub const REALTIME_PCM16_SAMPLE_RATE: u32 = 24000;

/// Encodes i16 samples as base64 little-endian PCM16.
pub fn encode_i16(pcm16: &[i16]) -> String {
    let pcm16_bytes: Vec<u8> = pcm16
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16_bytes)
}

/// Decodes base64 little-endian PCM16 into i16 samples.
///
/// Invalid base64 yields an empty vector; a trailing odd byte is dropped.
pub fn decode_i16(base64_fragment: &str) -> Vec<i16> {
    if let Ok(pcm16_bytes) = base64::engine::general_purpose::STANDARD.decode(base64_fragment) {
        pcm16_bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    } else {
        tracing::error!("Failed to decode base64 fragment to i16");
        Vec::new()
    }
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Converts a slice of i16 samples to a vector of f32 samples.
pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_encode_i16_is_little_endian() {
        // 256 = 0x0100 -> [0x00, 0x01]; -2 = 0xFFFE -> [0xFE, 0xFF]
        let encoded = encode_i16(&[256, -2]);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0xFE, 0xFF]);

        assert_eq!(encode_i16(&[]), "");
    }

    #[test]
    fn test_decode_i16() {
        let original = vec![1000i16, -2000, 0, i16::MAX, i16::MIN];
        assert_eq!(decode_i16(&encode_i16(&original)), original);

        // Test with invalid base64
        assert!(decode_i16("invalid_base64!").is_empty());

        // Test with empty string
        assert!(decode_i16("").is_empty());

        // Odd trailing byte is skipped by chunks_exact(2)
        let base64_input = base64::engine::general_purpose::STANDARD.encode([0x00u8, 0x40, 0x7F]);
        assert_eq!(decode_i16(&base64_input), vec![16384]);
    }

    #[test]
    fn test_convert_f32_to_i16() {
        let input = vec![1.0f32, -1.0f32, 0.0f32, 0.5f32];
        let result = convert_f32_to_i16(&input);

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], i16::MAX);
        // -1.0 * 32767 = -32767, not i16::MIN (-32768)
        assert_eq!(result[1], -32767);
        assert_eq!(result[2], 0);
        assert_eq!(result[3], (0.5 * i16::MAX as f32) as i16);

        // Test with values that need clamping
        let result = convert_f32_to_i16(&[2.0f32, -2.0f32]);
        assert_eq!(result[0], i16::MAX);
        assert_eq!(result[1], i16::MIN);

        assert!(convert_f32_to_i16(&[]).is_empty());
    }

    #[test]
    fn test_convert_i16_to_f32() {
        let input = vec![i16::MAX, i16::MIN, 0i16, 16384i16];
        let result = convert_i16_to_f32(&input);

        assert_eq!(result.len(), 4);
        assert_abs_diff_eq!(result[0], i16::MAX as f32 / 32768.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[1], -1.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[2], 0.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[3], 0.5, epsilon = 0.0001);
    }

    #[test]
    fn test_sample_rate_constant() {
        assert_eq!(REALTIME_PCM16_SAMPLE_RATE, 24000);
    }
}
