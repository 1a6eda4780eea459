#![allow(dead_code)]

// Packet builders for fixtures. Hashes are computed the way PAR2 writers do:
// MD5 over set id + type + body.

pub const SET_ID: [u8; 16] = [0x5e; 16];

pub const MAIN: &[u8; 16] = b"PAR 2.0\0Main\0\0\0\0";
pub const FILE_DESC: &[u8; 16] = b"PAR 2.0\0FileDesc";
pub const IFSC: &[u8; 16] = b"PAR 2.0\0IFSC\0\0\0\0";
pub const RECV_SLIC: &[u8; 16] = b"PAR 2.0\0RecvSlic";
pub const CREATOR: &[u8; 16] = b"PAR 2.0\0Creator\0";

pub fn frame(type_id: &[u8; 16], body: &[u8]) -> Vec<u8> {
    let length = 64 + body.len() as u64;
    let mut hashed = Vec::with_capacity(32 + body.len());
    hashed.extend_from_slice(&SET_ID);
    hashed.extend_from_slice(type_id);
    hashed.extend_from_slice(body);
    let hash = md5::compute(&hashed).0;
    let mut p = Vec::with_capacity(length as usize);
    p.extend_from_slice(b"PAR2\0PKT");
    p.extend_from_slice(&length.to_le_bytes());
    p.extend_from_slice(&hash);
    p.extend_from_slice(&hashed);
    p
}

fn padded(s: &str) -> Vec<u8> {
    let mut b = s.as_bytes().to_vec();
    while b.len() % 4 != 0 {
        b.push(0);
    }
    b
}

pub fn recovery_slice(exponent: u32, data: &[u8]) -> Vec<u8> {
    let mut body = exponent.to_le_bytes().to_vec();
    body.extend_from_slice(data);
    frame(RECV_SLIC, &body)
}

pub fn file_id(n: u8) -> [u8; 16] {
    let mut id = [0u8; 16];
    id[0] = n;
    id[15] = 0xf1;
    id
}

pub fn file_description(id: [u8; 16], name: &str, size: u64) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&id);
    body.extend_from_slice(&[0xaa; 16]); // md5 of the whole file
    body.extend_from_slice(&[0xbb; 16]); // md5 of the first 16k
    body.extend_from_slice(&size.to_le_bytes());
    body.extend_from_slice(&padded(name));
    frame(FILE_DESC, &body)
}

pub fn main_packet(
    slice_size: u64,
    recoverable: &[[u8; 16]],
    non_recoverable: &[[u8; 16]],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&slice_size.to_le_bytes());
    body.extend_from_slice(&(recoverable.len() as u32).to_le_bytes());
    for id in recoverable.iter().chain(non_recoverable) {
        body.extend_from_slice(id);
    }
    frame(MAIN, &body)
}

pub fn ifsc(id: [u8; 16], crcs: &[u32]) -> Vec<u8> {
    let mut body = id.to_vec();
    for crc in crcs {
        body.extend_from_slice(&[0xcc; 16]);
        body.extend_from_slice(&crc.to_le_bytes());
    }
    frame(IFSC, &body)
}

pub fn creator(client: &str) -> Vec<u8> {
    frame(CREATOR, &padded(client))
}

pub fn unknown(body_len: usize) -> Vec<u8> {
    frame(b"PAR 2.0\0Future\0\0", &vec![0x11; body_len])
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// Deterministic filler for slice data.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
