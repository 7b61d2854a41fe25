//! desktop.inf reader (`sh_rdinf`)
//!
//! Only the records the AES itself needs are decoded; the desktop parses
//! the rest. Everything of interest must sit in the first `INF_SIZE` bytes.
//!
//! ```text
//! #M 00 00 01 FF C HARD DISK@ @     drive icon: type at +8, letter at +14
//! #E 3A 11                          environment: dclick at +2, flags at +5
//! #Z 01 C:\TOOLS\THING.APP@         autostart program at +5, up to '@'
//! ```
//!
//! Offsets count from the record letter.

use alloc::string::String;
use bitflags::bitflags;

use crate::config::INF_SIZE;

/// `NIL` as produced by [`scan_2`] for the byte `FF`
pub const NIL: u16 = 0xFFFF;

/// Icon type of a hard disk in a `#M` record
const IG_HARD: u16 = 0;

bitflags! {
    /// One bit per drive, A is the most significant
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DriveSet: u16 {
        const A = 0x8000;
        const B = 0x4000;
        const C = 0x2000;
        const D = 0x1000;
        const E = 0x0800;
        const F = 0x0400;
        const G = 0x0200;
        const H = 0x0100;
        const I = 0x0080;
        const J = 0x0040;
        const K = 0x0020;
        const L = 0x0010;
        const M = 0x0008;
        const N = 0x0004;
        const O = 0x0002;
        const P = 0x0001;
    }
}

impl DriveSet {
    /// Bit of a drive letter, `None` outside A..P
    pub fn from_letter(letter: u8) -> Option<Self> {
        if !(b'A'..=b'P').contains(&letter) {
            return None;
        }
        Some(Self::from_bits_retain(0x8000 >> (letter - b'A')))
    }
}

bitflags! {
    /// Second byte of the `#E` record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeskEnv: u16 {
        /// Key click / bell enabled
        const SOUND = 0x01;
        /// Menus drop down on click instead of hover
        const MENU_CLICK = 0x08;
    }
}

/// Decoded `#E` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// Double-click speed, 0 (slow) to 4 (fast); the low three bits
    pub double_click: u16,
    pub flags: DeskEnv,
}

/// Decoded `#Z` record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Autostart {
    /// Up to the last separator, separator excluded
    pub dir: String,
    pub program: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesktopInf {
    /// `gl_bvdisk`
    pub disks: DriveSet,
    /// `gl_bvhard`
    pub hard_disks: DriveSet,
    pub environment: Option<Environment>,
    pub autostart: Option<Autostart>,
}

/// One hex digit. Anything that is not a hex digit yields 0, exactly like
/// a real `0`; callers cannot tell the two apart.
pub fn hex_dig(c: u8) -> u16 {
    match c {
        b'0'..=b'9' => u16::from(c - b'0'),
        b'a'..=b'f' => u16::from(c - b'a' + 10),
        b'A'..=b'F' => u16::from(c - b'A' + 10),
        _ => 0,
    }
}

/// Two hex digits at `pos`, after at most one blank. `FF` becomes [`NIL`].
/// Returns the value and the position after the digits.
pub fn scan_2(buf: &[u8], mut pos: usize) -> (u16, usize) {
    let at = |i: usize| buf.get(i).copied().unwrap_or(0);
    if at(pos) == b' ' {
        pos += 1;
    }
    let value = (hex_dig(at(pos)) << 4) | hex_dig(at(pos + 1));
    let value = if value == 0x00FF { NIL } else { value };
    (value, pos + 2)
}

/// Decode the first `INF_SIZE` bytes of a desktop.inf image
pub fn parse(data: &[u8]) -> DesktopInf {
    let buf = &data[..data.len().min(INF_SIZE)];
    // Reads past the end see the NUL terminator
    let at = |i: usize| buf.get(i).copied().unwrap_or(0);
    let mut inf = DesktopInf::default();

    let mut pos = 0;
    while at(pos) != 0 {
        let c = at(pos);
        pos += 1;
        if c != b'#' {
            continue;
        }
        match at(pos) {
            b'M' => {
                let (icon, _) = scan_2(buf, pos + 8);
                pos += 14;
                match DriveSet::from_letter(at(pos)) {
                    Some(drive) => {
                        inf.disks |= drive;
                        if icon == IG_HARD {
                            inf.hard_disks |= drive;
                        }
                    }
                    None => log::warn!("[INF] #M record with drive {:#04x} ignored", at(pos)),
                }
            }
            b'E' => {
                let (speed, _) = scan_2(buf, pos + 2);
                let (flags, _) = scan_2(buf, pos + 5);
                pos += 5;
                inf.environment = Some(Environment {
                    double_click: speed & 0x07,
                    flags: DeskEnv::from_bits_truncate(flags),
                });
            }
            b'Z' => {
                pos += 5;
                let start = pos.min(buf.len());
                while at(pos) != 0 && at(pos) != b'@' {
                    pos += 1;
                }
                let end = pos.min(buf.len());
                inf.autostart = Some(split_path(&buf[start..end]));
                pos += 1;
            }
            _ => {}
        }
    }
    log::debug!(
        "[INF] disks {:#06x}, hard {:#06x}",
        inf.disks.bits(),
        inf.hard_disks.bits()
    );
    inf
}

/// `C:\TOOLS\THING.APP` -> (`C:\TOOLS`, `THING.APP`), `A:PROG.PRG` -> (`A`, `PROG.PRG`).
///
/// The separator is overwritten, whether `\` or `:`. A bare name has no
/// directory; the AES would clobber the byte before the path there.
fn split_path(path: &[u8]) -> Autostart {
    let text = String::from_utf8_lossy(path);
    match text.rfind(|c: char| c == '\\' || c == ':') {
        Some(i) => Autostart {
            dir: String::from(&text[..i]),
            program: String::from(&text[i + 1..]),
        },
        None => Autostart {
            dir: String::new(),
            program: text.into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dig_legacy_zero() {
        assert_eq!(hex_dig(b'7'), 7);
        assert_eq!(hex_dig(b'c'), 12);
        assert_eq!(hex_dig(b'F'), 15);
        // Indistinguishable from '0'
        assert_eq!(hex_dig(b'x'), hex_dig(b'0'));
    }

    #[test]
    fn test_scan_2() {
        assert_eq!(scan_2(b" 3A", 0), (0x3A, 3));
        assert_eq!(scan_2(b"FF", 0), (NIL, 2));
        assert_eq!(scan_2(b"  11", 0), (0x01, 3));
        assert_eq!(scan_2(b"1", 0), (0x10, 2));
    }

    #[test]
    fn test_drives() {
        let inf = parse(b"#M 00 00 01 FF A FLOPPY@ @\r\n#M 00 01 00 FF C DISK@ @\r\n");
        assert_eq!(inf.disks, DriveSet::A | DriveSet::C);
        assert_eq!(inf.hard_disks, DriveSet::C);
    }

    #[test]
    fn test_environment() {
        let inf = parse(b"#E 3B 09\r\n");
        let env = inf.environment.unwrap();
        assert_eq!(env.double_click, 3);
        assert_eq!(env.flags, DeskEnv::SOUND | DeskEnv::MENU_CLICK);
    }

    #[test]
    fn test_last_autostart_wins() {
        let inf = parse(b"#Z 01 A:\\OLD.PRG@\r\n#Z 01 C:\\TOOLS\\THING.APP@\r\n");
        assert_eq!(
            inf.autostart,
            Some(Autostart { dir: "C:\\TOOLS".into(), program: "THING.APP".into() })
        );
    }

    #[test]
    fn test_autostart_separator_is_dropped() {
        let inf = parse(b"#Z 01 A:PROG.PRG@");
        assert_eq!(
            inf.autostart,
            Some(Autostart { dir: "A".into(), program: "PROG.PRG".into() })
        );
        let inf = parse(b"#Z 01 PROG.PRG@");
        assert_eq!(inf.autostart.unwrap().dir, "");
    }

    #[test]
    fn test_only_first_inf_size_bytes() {
        let mut data = alloc::vec![b' '; INF_SIZE];
        data.extend_from_slice(b"#M 00 00 01 FF D DISK@ @");
        assert_eq!(parse(&data), DesktopInf::default());
    }

    #[test]
    fn test_stops_at_nul() {
        let inf = parse(b"#E 3B 09\0#M 00 00 01 FF C DISK@ @");
        assert!(inf.disks.is_empty());
        assert!(inf.environment.is_some());
    }
}
