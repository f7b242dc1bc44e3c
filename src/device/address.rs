use crate::error::{UpdateError, UpdateResult};

/// Address the bootloader advertises after a model B device reboots.
///
/// The last colon-separated byte is incremented modulo 256; the result is
/// uppercase. `AA:BB:CC:DD:EE:FF` becomes `AA:BB:CC:DD:EE:00`.
pub fn derive_bootloader_address(address: &str) -> UpdateResult<String> {
    let (prefix, last) = match address.rsplit_once(':') {
        Some((prefix, last)) => (Some(prefix), last),
        None => (None, address),
    };

    let byte = u8::from_str_radix(last.trim(), 16).map_err(|_| {
        UpdateError::validation(format!("'{}' does not end in a hex byte", address))
    })?;
    let next = format!("{:02X}", byte.wrapping_add(1));

    Ok(match prefix {
        Some(prefix) => format!("{}:{}", prefix.to_ascii_uppercase(), next),
        None => next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_last_byte() {
        assert_eq!(
            derive_bootloader_address("AA:BB:CC:DD:EE:0F").unwrap(),
            "AA:BB:CC:DD:EE:10"
        );
    }

    #[test]
    fn test_wraps_and_uppercases() {
        assert_eq!(
            derive_bootloader_address("aa:bb:cc:dd:ee:ff").unwrap(),
            "AA:BB:CC:DD:EE:00"
        );
    }

    #[test]
    fn test_rejects_non_hex_tail() {
        assert!(matches!(
            derive_bootloader_address("AA:BB:CC:DD:EE:ZZ"),
            Err(UpdateError::Validation { .. })
        ));
        assert!(derive_bootloader_address("").is_err());
        assert!(derive_bootloader_address("AA:BB:").is_err());
    }
}
