//! SD card identification registers, as presented to the core.
//!
//! The SD card driver doesn't expose the card's raw CID and CSD, so we
//! build a consistent pair from what we do know - the card's size and
//! whether it is block addressed.  The core only uses these to answer its
//! own CMD9/CMD10 requests, and the capacity is the only field any known
//! core looks at.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

/// CSD version 2.0 counts capacity in units of 1024 sectors.
const CSD_V2_UNIT: u32 = 1024;

/// CSD version 1.0, with READ_BL_LEN 9 and C_SIZE_MULT 7, counts capacity in
/// units of 512 sectors, in a 12-bit field.
const CSD_V1_UNIT: u32 = 512;
const CSD_V1_MAX_C_SIZE: u32 = 0xfff;

/// Product name in the CID.
const CID_PRODUCT: [u8; 5] = *b"USRIO";

/// A card identification register.
pub fn cid() -> [u8; 16] {
    let mut cid = [0u8; 16];
    // Manufacturer and OEM ids left as 0.
    cid[3..8].copy_from_slice(&CID_PRODUCT);
    cid[8] = 0x10; // revision 1.0
    cid[14] = 0x01; // manufactured January 2000
    cid[15] = 0x01; // CRC not used, stop bit set
    cid
}

/// A card specific data register describing a card of `sectors` sectors.
pub fn csd(sectors: u32, high_capacity: bool) -> [u8; 16] {
    if high_capacity {
        let c_size = (sectors / CSD_V2_UNIT).saturating_sub(1);
        [
            0x40,
            0x0e,
            0x00,
            0x32,
            0x5b,
            0x59,
            0x00,
            ((c_size >> 16) & 0x3f) as u8,
            (c_size >> 8) as u8,
            c_size as u8,
            0x7f,
            0x80,
            0x0a,
            0x40,
            0x00,
            0x01,
        ]
    } else {
        let c_size = (sectors / CSD_V1_UNIT)
            .saturating_sub(1)
            .min(CSD_V1_MAX_C_SIZE);
        [
            0x00,
            0x26,
            0x00,
            0x32,
            0x5f,
            0x59,
            0x80 | ((c_size >> 10) & 0x03) as u8,
            (c_size >> 2) as u8,
            (((c_size & 0x03) as u8) << 6) | 0x2d,
            0xb7,
            0xff,
            0x80,
            0x0a,
            0x40,
            0x00,
            0x01,
        ]
    }
}

/// The capacity, in sectors, a CSD describes.
pub fn csd_sectors(csd: &[u8; 16]) -> u32 {
    let sectors = match csd[0] >> 6 {
        1 => {
            let c_size =
                ((csd[7] as u64 & 0x3f) << 16) | ((csd[8] as u64) << 8) | csd[9] as u64;
            (c_size + 1) * CSD_V2_UNIT as u64
        }
        _ => {
            let c_size = ((csd[6] as u64 & 0x03) << 10)
                | ((csd[7] as u64) << 2)
                | ((csd[8] as u64) >> 6);
            let mult = ((csd[9] & 0x03) << 1) | (csd[10] >> 7);
            let block_len = 1u64 << (csd[5] & 0x0f);
            (c_size + 1) * (1 << (mult + 2)) * block_len / 512
        }
    };
    u32::try_from(sectors).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdhc_capacity() {
        // 8GB
        let sectors = 16 * 1024 * 1024;
        let csd = csd(sectors, true);
        assert_eq!(csd[0], 0x40);
        assert_eq!(csd_sectors(&csd), sectors);
    }

    #[test]
    fn sdsc_capacity() {
        // 1GB
        let sectors = 2 * 1024 * 1024;
        let csd = csd(sectors, false);
        assert_eq!(csd[0] >> 6, 0);
        assert_eq!(csd[5] & 0x0f, 9);
        assert_eq!(csd_sectors(&csd), sectors);
    }

    #[test]
    fn sdsc_capacity_clamped() {
        // Too big for a version 1 CSD with 512 byte blocks
        let csd = csd(u32::MAX, false);
        assert_eq!(csd_sectors(&csd), 4096 * 512);
    }

    #[test]
    fn cid_fields() {
        let cid = cid();
        assert_eq!(&cid[3..8], b"USRIO");
        assert_eq!(cid[15] & 0x01, 0x01);
    }
}
