//! Known-answer test run against every engine before it is installed.

use crate::engine::Sha256Engine;
use crate::sha256::INIT;

const DATA: &str = concat!(
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do ",
    "eiusmod tempor incididunt ut labore et dolore magna aliqua. Et m",
    "olestie ac feugiat sed lectus vestibulum mattis ullamcorper. Mor",
    "bi blandit cursus risus at ultrices mi tempus imperdiet nulla. N",
    "unc congue nisi vita suscipit tellus mauris. Imperdiet proin fer",
    "mentum leo vel orci. Massa tempor nec feugiat nisl pretium fusce",
    " id velit. Telus in metus vulputate eu scelerisque felis. Mi tem",
    "pus imperdiet nulla malesuada pellentesque. Tristique magna sit.",
);

/// State after transforming the first `i * 64` bytes of `DATA` from `INIT`,
/// without padding.
const STATES: [[u32; 8]; 9] = [
    [0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19],
    [0x91f8ec6b, 0x4da10fe3, 0x1c9c292c, 0x45e18185, 0x435cc111, 0x3ca26f09, 0xeb954cae, 0x402a7069],
    [0xcabea5ac, 0x374fb97c, 0x182ad996, 0x7bd69cbf, 0x450ff900, 0xc1d2be8a, 0x6a41d505, 0xe6212dc3],
    [0xbcff09d6, 0x3e76f36e, 0x3ecb2501, 0x78866e97, 0xe1c1e2fd, 0x32f4eaff, 0x8aa6c4e5, 0xdfc024bc],
    [0xa08c5d94, 0x0a862f93, 0x6b7f2f40, 0x8f9fae76, 0x6d40439f, 0x79dcee0c, 0x3e39ff3a, 0xdc3bdbb1],
    [0x216a0895, 0x9f1a3662, 0xe99946f9, 0x87ba4364, 0x0fb5db2c, 0x12bed3d3, 0x6689c0c7, 0x292f1b04],
    [0xca3067f8, 0xbc8c2656, 0x37cb7e0d, 0x9b6b8b0f, 0x46dc380b, 0xf1287f57, 0xc42e4b23, 0x3fefe94d],
    [0x3e4c4039, 0xbb6fca8c, 0x6f27d2f7, 0x301e44a4, 0x8352ba14, 0x5769ce37, 0x48a1155f, 0xc0e1c4c6],
    [0xfe2fa9dd, 0x69d0862b, 0x1ae0db23, 0x471f9244, 0xf55c0145, 0xc30f9c3b, 0x40a84ea0, 0x5b8a266c],
];

/// Double-SHA-256 of each of the eight 64-byte blocks of `DATA`.
const DOUBLE_64: [u8; 256] = [
    0x09, 0x3a, 0xc4, 0xd0, 0x0f, 0xf7, 0x57, 0xe1, 0x72, 0x85, 0x79, 0x42, 0xfe, 0xe7, 0xe0, 0xa0,
    0xfc, 0x52, 0xd7, 0xdb, 0x07, 0x63, 0x45, 0xfb, 0x53, 0x14, 0x7d, 0x17, 0x22, 0x86, 0xf0, 0x52,
    0x48, 0xb6, 0x11, 0x9e, 0x6e, 0x48, 0x81, 0x6d, 0xcc, 0x57, 0x1f, 0xb2, 0x97, 0xa8, 0xd5, 0x25,
    0x9b, 0x82, 0xaa, 0x89, 0xe2, 0xfd, 0x2d, 0x56, 0xe8, 0x28, 0x83, 0x0b, 0xe2, 0xfa, 0x53, 0xb7,
    0xd6, 0x6b, 0x07, 0x85, 0x83, 0xb0, 0x10, 0xa2, 0xf5, 0x51, 0x3c, 0xf9, 0x60, 0x03, 0xab, 0x45,
    0x6c, 0x15, 0x6e, 0xef, 0xb5, 0xac, 0x3e, 0x6c, 0xdf, 0xb4, 0x92, 0x22, 0x2d, 0xce, 0xbf, 0x3e,
    0xe9, 0xe5, 0xf6, 0x29, 0x0e, 0x01, 0x4f, 0xd2, 0xd4, 0x45, 0x65, 0xb3, 0xbb, 0xf2, 0x4c, 0x16,
    0x37, 0x50, 0x3c, 0x6e, 0x49, 0x8c, 0x5a, 0x89, 0x2b, 0x1b, 0xab, 0xc4, 0x37, 0xd1, 0x46, 0xe9,
    0x3d, 0x0e, 0x85, 0xa2, 0x50, 0x73, 0xa1, 0x5e, 0x54, 0x37, 0xd7, 0x94, 0x17, 0x56, 0xc2, 0xd8,
    0xe5, 0x9f, 0xed, 0x4e, 0xae, 0x15, 0x42, 0x06, 0x0d, 0x74, 0x74, 0x5e, 0x24, 0x30, 0xce, 0xd1,
    0x9e, 0x50, 0xa3, 0x9a, 0xb8, 0xf0, 0x4a, 0x57, 0x69, 0x78, 0x67, 0x12, 0x84, 0x58, 0xbe, 0xc7,
    0x36, 0xaa, 0xee, 0x7c, 0x64, 0xa3, 0x76, 0xec, 0xff, 0x55, 0x41, 0x00, 0x2a, 0x44, 0x68, 0x4d,
    0xb6, 0x53, 0x9e, 0x1c, 0x95, 0xb7, 0xca, 0xdc, 0x7f, 0x7d, 0x74, 0x27, 0x5c, 0x8e, 0xa6, 0x84,
    0xb5, 0xac, 0x87, 0xa9, 0xf3, 0xff, 0x75, 0xf2, 0x34, 0xcd, 0x1a, 0x3b, 0x82, 0x2c, 0x2b, 0x4e,
    0x6a, 0x46, 0x30, 0xa6, 0x89, 0x86, 0x23, 0xac, 0xf8, 0xa5, 0x15, 0xe9, 0x0a, 0xaa, 0x1e, 0x9a,
    0xd7, 0x93, 0x6b, 0x28, 0xe4, 0x3b, 0xfd, 0x59, 0xc6, 0xed, 0x7c, 0x5f, 0xa5, 0x41, 0xcb, 0x51,
];

/// Check every routine of `engine` against the fixed vectors.
///
/// # Returns
/// The name of the first routine whose output differs.
pub fn check(engine: &Sha256Engine) -> Result<(), &'static str> {
    // Offset by one byte so the transforms see an unaligned input.
    let mut buf = [0u8; 513];
    buf[1..].copy_from_slice(DATA.as_bytes());
    let data = &buf[1..];

    for (blocks, expected) in STATES.iter().enumerate() {
        let mut state = INIT;
        engine.transform(&mut state, &data[..64 * blocks]);
        if state != *expected {
            return Err("transform");
        }
    }

    let mut out = [0u8; 256];
    (engine.d64)(&mut out[..32], data);
    if out[..32] != DOUBLE_64[..32] {
        return Err("d64");
    }

    let batches = [
        (engine.d64_2way, 2, "d64_2way"),
        (engine.d64_4way, 4, "d64_4way"),
        (engine.d64_8way, 8, "d64_8way"),
    ];
    for (routine, width, name) in batches {
        if let Some(routine) = routine {
            let mut out = [0u8; 256];
            routine(&mut out[..32 * width], &data[..64 * width]);
            if out[..32 * width] != DOUBLE_64[..32 * width] {
                return Err(name);
            }
        }
    }

    Ok(())
}
